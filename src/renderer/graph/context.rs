//! Operator contexts.
//!
//! - [`CompileContext`]: what an operator may touch while it is being built
//! - [`FrameContext`]: what it may touch while a frame runs
//!
//! Both only borrow; the caller owns every collaborator.

use crate::renderer::core::{
    GeometryRenderer, GpuDevice, PassthroughRenderer, QuadRenderer, ShaderService,
    ShadowMapService, TextureId,
};
use crate::renderer::settings::RendererSettings;
use crate::scene::{Camera, Scene};

/// Collaborators available during operator construction.
pub struct CompileContext<'a> {
    pub device: &'a mut dyn GpuDevice,
    pub shaders: &'a mut dyn ShaderService,
    pub settings: &'a RendererSettings,
}

/// Tiled noise textures shared by every operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxiliaryTextures {
    /// Uniformly distributed noise used for dithering.
    pub uniform_jitter: TextureId,
    /// Gaussian distributed offsets used for shadow filtering.
    pub gaussian_jitter: TextureId,
    /// Edge length in pixels of both jitter tiles.
    pub jitter_size: u32,
}

/// Per-frame collaborators.
///
/// `scene` is mutable because operators update state the scene owns, such as
/// each shadow-casting light's fitted shadow camera.
pub struct FrameContext<'a> {
    pub device: &'a mut dyn GpuDevice,
    pub scene: &'a mut Scene,
    pub camera: &'a Camera,
    pub shadow_maps: &'a mut dyn ShadowMapService,
    pub quad: &'a mut dyn QuadRenderer,
    pub passthrough: &'a mut dyn PassthroughRenderer,
    pub geometry: &'a mut dyn GeometryRenderer,
    pub aux: AuxiliaryTextures,
}
