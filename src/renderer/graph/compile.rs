//! Declaration -> Operator
//!
//! The second half of the two-phase pass protocol. Once the scheduler has
//! resolved every slot of a [`PassDeclaration`] to a physical resource it
//! calls [`compile`], which builds the operator named by the declaration's
//! [`PassKind`]. No build-time context is captured anywhere else.

use std::borrow::Cow;

use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::core::TextureResource;

use super::context::CompileContext;
use super::declaration::{PassDeclaration, PassKind, SlotName};
use super::node::RenderOperator;
use super::passes::light::LightPassOperator;
use super::passes::tone_mapping::ToneMappingOperator;
use super::passes::volumetric::VolumetricOperator;

/// What a slot resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedResource {
    Texture(TextureResource),
    /// The shadow map service's storage; operators reach it through
    /// [`FrameContext::shadow_maps`](super::context::FrameContext).
    ShadowMaps,
    /// A `None` input, or an optional output nobody reads.
    Absent,
}

impl ResolvedResource {
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<TextureResource> {
        match self {
            Self::Texture(texture) => Some(*texture),
            _ => None,
        }
    }
}

/// Physical resources for every slot of one declaration.
#[derive(Debug, Clone)]
pub struct ResolvedBindings {
    pass: Cow<'static, str>,
    inputs: SmallVec<[(SlotName, ResolvedResource); 8]>,
    outputs: SmallVec<[(SlotName, ResolvedResource); 2]>,
}

impl ResolvedBindings {
    #[must_use]
    pub fn new(pass: impl Into<Cow<'static, str>>) -> Self {
        Self {
            pass: pass.into(),
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn with_input(mut self, slot: SlotName, resource: ResolvedResource) -> Self {
        self.bind_input(slot, resource);
        self
    }

    #[must_use]
    pub fn with_output(mut self, slot: SlotName, resource: ResolvedResource) -> Self {
        self.bind_output(slot, resource);
        self
    }

    pub fn bind_input(&mut self, slot: SlotName, resource: ResolvedResource) {
        self.inputs.retain(|(name, _)| *name != slot);
        self.inputs.push((slot, resource));
    }

    pub fn bind_output(&mut self, slot: SlotName, resource: ResolvedResource) {
        self.outputs.retain(|(name, _)| *name != slot);
        self.outputs.push((slot, resource));
    }

    #[inline]
    #[must_use]
    pub fn pass(&self) -> &str {
        &self.pass
    }

    fn unknown(&self, slot: &str) -> UmbraError {
        UmbraError::UnknownSlot {
            pass: self.pass.to_string(),
            slot: slot.to_owned(),
        }
    }

    pub fn input(&self, slot: &str) -> Result<ResolvedResource> {
        self.inputs
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, resource)| *resource)
            .ok_or_else(|| self.unknown(slot))
    }

    pub fn output(&self, slot: &str) -> Result<ResolvedResource> {
        self.outputs
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, resource)| *resource)
            .ok_or_else(|| self.unknown(slot))
    }

    /// Texture bound to an input that may legally be absent.
    pub fn optional_input_texture(&self, slot: &str) -> Result<Option<TextureResource>> {
        Ok(self.input(slot)?.texture())
    }

    /// Texture bound to an input the operator cannot work without.
    pub fn input_texture(&self, slot: &str) -> Result<TextureResource> {
        let resource = self.input(slot)?;
        debug_assert!(
            matches!(resource, ResolvedResource::Texture(_)),
            "pass '{}' requires a texture on input '{slot}', got {resource:?}",
            self.pass
        );
        resource.texture().ok_or_else(|| UmbraError::MissingImport {
            name: format!("{}.{slot}", self.pass),
        })
    }

    pub fn output_texture(&self, slot: &str) -> Result<TextureResource> {
        let resource = self.output(slot)?;
        debug_assert!(
            matches!(resource, ResolvedResource::Texture(_)),
            "pass '{}' requires a texture on output '{slot}', got {resource:?}",
            self.pass
        );
        resource.texture().ok_or_else(|| UmbraError::MissingImport {
            name: format!("{}.{slot}", self.pass),
        })
    }
}

/// Builds the operator for `declaration` over `bindings`.
///
/// Fails only at construction time: unknown slots, shader compilation,
/// framebuffer creation.
pub fn compile(
    declaration: &PassDeclaration,
    bindings: &ResolvedBindings,
    ctx: &mut CompileContext<'_>,
) -> Result<Box<dyn RenderOperator>> {
    log::debug!("Compiling pass '{}'", declaration.name);
    let operator: Box<dyn RenderOperator> = match &declaration.kind {
        PassKind::Light(config) => Box::new(LightPassOperator::new(config, bindings, ctx)?),
        PassKind::ToneMapping(config) => {
            Box::new(ToneMappingOperator::new(config, bindings, ctx)?)
        }
        PassKind::Volumetric(config) => Box::new(VolumetricOperator::new(config, bindings, ctx)?),
    };
    Ok(operator)
}
