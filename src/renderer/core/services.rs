//! Services the passes delegate to.

use glam::Mat4;

use crate::errors::Result;
use crate::renderer::graph::descriptor::RenderBufferDescriptor;
use crate::scene::{Material, Scene, ShadowCamera};

use super::device::{AttributeLocation, GpuDevice, TextureId, TextureResource};
use super::program::{ProgramRequest, ShaderProgram};

/// Allocates physical textures for declared render buffers.
pub trait RenderTargetService {
    fn allocate(&mut self, descriptor: &RenderBufferDescriptor) -> Result<TextureResource>;
    fn release(&mut self, texture: TextureResource);
}

/// Compiles (or returns a cached) program variant.
///
/// Implementations keep one program per distinct
/// [`ShaderDefines::compilation_hash`](super::ShaderDefines::compilation_hash).
pub trait ShaderService {
    fn get(&mut self, request: &ProgramRequest<'_>) -> Result<ShaderProgram>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMapType {
    Normal,
}

/// Owns shadow map storage and renders depth from a light's shadow camera.
pub trait ShadowMapService {
    /// Reserves a shadow map for `camera`. Nothing is drawn yet.
    fn prepare_shadow_map(&mut self, camera: &ShadowCamera, kind: ShadowMapType);

    /// Renders the depth map for `camera`.
    ///
    /// May rebind framebuffers and change any fixed-function state; callers
    /// restore their own state afterwards.
    fn render_shadow_map(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        camera: &ShadowCamera,
        kind: ShadowMapType,
    );

    /// Depth texture produced by the last `render_shadow_map` call.
    fn current_shadow_map_depth(&self) -> Option<TextureId>;

    /// Size in pixels of the last rendered shadow map.
    fn shadow_map_size(&self) -> (u32, u32);
}

/// Draws a full-screen triangle/quad at the far plane.
pub trait QuadRenderer {
    fn render(&mut self, device: &mut dyn GpuDevice, position: AttributeLocation);
}

/// Copies the texture bound to unit 0 into the bound framebuffer.
pub trait PassthroughRenderer {
    fn render(&mut self, device: &mut dyn GpuDevice);
}

/// Per-pass customization points of [`GeometryRenderer`].
pub trait GeometryPassHooks {
    /// Meshes whose material is skipped are not drawn by this pass.
    fn skips_material(&self, material: &Material) -> bool;

    /// Called after a mesh's program is bound. `texture_stages` is the number
    /// of texture units the material itself occupies; extra textures go above.
    fn setup_additional_uniforms(
        &mut self,
        device: &mut dyn GpuDevice,
        program: &ShaderProgram,
        texture_stages: u32,
    );
}

/// Draws scene meshes with their material programs.
pub trait GeometryRenderer {
    fn render_geometry(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        view: &Mat4,
        projection: &Mat4,
        hooks: &mut dyn GeometryPassHooks,
    );
}
