//! Compiled program handles.

use rustc_hash::FxHashMap;

use crate::errors::{Result, UmbraError};

use super::device::{AttributeLocation, GpuDevice, ProgramId, UniformLocation, UniformValue};
use super::shader_defines::ShaderDefines;

/// What an operator asks the shader service for.
#[derive(Debug, Clone, Copy)]
pub struct ProgramRequest<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub attributes: &'a [&'static str],
    pub uniforms: &'a [&'static str],
    pub defines: &'a ShaderDefines,
}

/// A linked program variant plus the locations requested for it.
///
/// Uniforms the compiler optimized out are simply absent; setting them is a
/// no-op, mirroring how GPU APIs treat inactive uniforms.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub id: ProgramId,
    uniforms: FxHashMap<&'static str, UniformLocation>,
    attributes: FxHashMap<&'static str, AttributeLocation>,
}

impl ShaderProgram {
    #[must_use]
    pub fn new(
        id: ProgramId,
        uniforms: FxHashMap<&'static str, UniformLocation>,
        attributes: FxHashMap<&'static str, AttributeLocation>,
    ) -> Self {
        Self {
            id,
            uniforms,
            attributes,
        }
    }

    #[inline]
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes.get(name).copied()
    }

    /// Looks up an attribute the operator cannot draw without.
    pub fn require_attribute(
        &self,
        name: &str,
        request: &ProgramRequest<'_>,
    ) -> Result<AttributeLocation> {
        self.attribute(name)
            .ok_or_else(|| UmbraError::ShaderCompilation {
                vertex: request.vertex.to_owned(),
                fragment: request.fragment.to_owned(),
                message: format!("vertex attribute '{name}' is not active"),
            })
    }

    /// Uploads `value` to the named uniform of this program.
    ///
    /// The program must be the one currently in use on `device`.
    #[inline]
    pub fn set(&self, device: &mut dyn GpuDevice, name: &str, value: UniformValue) {
        if let Some(location) = self.uniform(name) {
            device.set_uniform(location, value);
        }
    }
}
