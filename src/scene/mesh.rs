use std::borrow::Cow;

/// Shading model of a material, as reported by the material system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadingModel {
    #[default]
    Opaque,
    Unlit,
    /// Point-sprite participating media rendered by the volumetric pass.
    Volumetric,
}

impl ShadingModel {
    #[inline]
    #[must_use]
    pub fn is_volumetric(self) -> bool {
        matches!(self, Self::Volumetric)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: Cow<'static, str>,
    pub shading_model: ShadingModel,
}

impl Material {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, shading_model: ShadingModel) -> Self {
        Self {
            name: name.into(),
            shading_model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: Cow<'static, str>,
    pub material: Material,
}

impl Mesh {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, material: Material) -> Self {
        Self {
            name: name.into(),
            material,
        }
    }
}
