//! Renderer Settings
//!
//! Configuration shared by the pass components. Every field has a default, so
//! a partial JSON document is enough to override a single value.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use umbra::renderer::settings::{RendererSettings, ShadowNearExtension};
//!
//! let settings = RendererSettings {
//!     supports_srgb: false,
//!     shadow_near_extension: ShadowNearExtension::Fixed(25.0),
//!     ..Default::default()
//! };
//!
//! let from_file = RendererSettings::from_json(r#"{ "supports_srgb": false }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{Result, UmbraError};

/// How far the fitted shadow volume is pushed past its `minZ` bound.
///
/// The fitting algorithm is identical for every variant; only the distance
/// fed into it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ShadowNearExtension {
    /// Use the light's `shadow_camera_near` value.
    ///
    /// That field is nominally a clip distance; reusing it as an extension
    /// is kept so existing scenes produce identical shadow volumes.
    #[default]
    ShadowCameraNear,
    /// Use a fixed world-space distance for every light.
    Fixed(f32),
}

impl ShadowNearExtension {
    #[inline]
    #[must_use]
    pub fn resolve(self, shadow_camera_near: f32) -> f32 {
        match self {
            Self::ShadowCameraNear => shadow_camera_near,
            Self::Fixed(distance) => distance,
        }
    }
}

/// Renderer-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Whether the target platform can render into sRGB 8-bit targets.
    /// Output buffers fall back to plain RGBA8 when it cannot.
    pub supports_srgb: bool,

    /// Shadow filter jitter radius, in shadow map texels.
    pub shadow_jitter_texels: f32,

    /// Extension applied to the fitted shadow volume.
    pub shadow_near_extension: ShadowNearExtension,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            supports_srgb: true,
            shadow_jitter_texels: 8.0,
            shadow_near_extension: ShadowNearExtension::default(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.shadow_jitter_texels.is_finite() || self.shadow_jitter_texels < 0.0 {
            return Err(UmbraError::InvalidConfig(format!(
                "shadow_jitter_texels must be a non-negative number, got {}",
                self.shadow_jitter_texels
            )));
        }
        if let ShadowNearExtension::Fixed(distance) = self.shadow_near_extension {
            if !distance.is_finite() {
                return Err(UmbraError::InvalidConfig(
                    "shadow_near_extension distance must be finite".to_owned(),
                ));
            }
        }
        Ok(())
    }
}
