//! Volumetric Geometry Pass
//!
//! Forward-renders meshes whose material uses the volumetric shading model
//! as screen-aligned sprites composited with premultiplied alpha on top of
//! the lit scene color.
//!
//! When the graph gives the output its own storage the input color is first
//! copied across with a pass-through draw; when the output aliases the input
//! the sprites are blended in place.

use glam::{Mat3, Mat4, Vec3};

use crate::errors::Result;
use crate::renderer::core::{
    BlendFunc, FramebufferDesc, FramebufferId, GeometryPassHooks, GpuDevice, GpuStateFlags,
    ShaderProgram, TextureId, TextureResource, UniformValue,
};
use crate::renderer::graph::compile::ResolvedBindings;
use crate::renderer::graph::context::{CompileContext, FrameContext};
use crate::renderer::graph::declaration::{PassDeclaration, PassKind, SlotName};
use crate::renderer::graph::descriptor::{RenderBufferDescriptor, RenderBufferFormat};
use crate::renderer::graph::node::RenderOperator;
use crate::scene::Material;

pub const COLOR: SlotName = "color";
pub const LINEAR_DEPTH: SlotName = "linearDepth";

pub const VOLUMETRIC_VERTEX: &str = "VS_SimpleVolumetricGeometry";
pub const VOLUMETRIC_FRAGMENT: &str = "FS_SimpleVolumetricGeometry";

#[derive(Debug, Clone, Copy)]
pub struct VolumetricPassInput<'a> {
    pub color: &'a RenderBufferDescriptor,
    pub linear_depth: &'a RenderBufferDescriptor,
}

#[derive(Debug, Clone)]
pub struct VolumetricPassOutput {
    pub color: RenderBufferDescriptor,
}

/// Parameters the operator is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumetricPassConfig;

/// Declares simple volumetric geometry passes.
#[derive(Debug, Clone, Default)]
pub struct SimpleVolumetricRenderer;

impl SimpleVolumetricRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn setup(
        &self,
        input: &VolumetricPassInput<'_>,
        ops: &mut Vec<PassDeclaration>,
    ) -> VolumetricPassOutput {
        let color = RenderBufferDescriptor::linear_rgb(
            "Color",
            input.color.width(),
            input.color.height(),
            RenderBufferFormat::Rgba16Float,
        );

        ops.push(
            PassDeclaration::new(
                "Volumetric Geometry Pass (Simple)",
                PassKind::Volumetric(VolumetricPassConfig),
            )
            .with_input(COLOR, input.color)
            .with_input(LINEAR_DEPTH, input.linear_depth)
            .with_output(COLOR, &color)
            .with_alias(COLOR, COLOR),
        );

        VolumetricPassOutput { color }
    }
}

/// Projection terms that let the vertex shader size a sprite in pixels from
/// its view-space position.
///
/// Columns are the X, Z and W columns of `projection` restricted to their X,
/// Z and W rows, with the X row scaled by half the target width.
#[must_use]
pub fn point_size_matrix(projection: &Mat4, width: u32) -> Mat3 {
    let scale = width as f32 * 0.5;
    let column = |c: glam::Vec4| Vec3::new(c.x * scale, c.z, c.w);
    Mat3::from_cols(
        column(projection.x_axis),
        column(projection.z_axis),
        column(projection.w_axis),
    )
}

/// Per-mesh customization handed to the geometry renderer.
pub struct VolumetricGeometryHooks {
    pub point_size_matrix: Mat3,
    pub linear_depth: TextureId,
}

impl GeometryPassHooks for VolumetricGeometryHooks {
    fn skips_material(&self, material: &Material) -> bool {
        !material.shading_model.is_volumetric()
    }

    fn setup_additional_uniforms(
        &mut self,
        device: &mut dyn GpuDevice,
        program: &ShaderProgram,
        texture_stages: u32,
    ) {
        program.set(
            device,
            "u_pointSizeMatrix",
            UniformValue::Mat3(self.point_size_matrix),
        );
        program.set(
            device,
            "u_linearDepth",
            UniformValue::Int(texture_stages as i32),
        );
        device.bind_texture(texture_stages, self.linear_depth);
    }
}

pub struct VolumetricOperator {
    framebuffer: FramebufferId,
    input_color: TextureResource,
    output_color: TextureResource,
    linear_depth: TextureResource,
}

impl VolumetricOperator {
    pub fn new(
        _config: &VolumetricPassConfig,
        bindings: &ResolvedBindings,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Self> {
        let input_color = bindings.input_texture(COLOR)?;
        let linear_depth = bindings.input_texture(LINEAR_DEPTH)?;
        let output_color = bindings.output_texture(COLOR)?;

        let framebuffer = ctx.device.create_framebuffer(
            &FramebufferDesc::new("Volumetric Geometry Pass").with_color(output_color),
        )?;

        Ok(Self {
            framebuffer,
            input_color,
            output_color,
            linear_depth,
        })
    }

    /// Whether the output shares storage with the input color.
    #[inline]
    #[must_use]
    pub fn in_place(&self) -> bool {
        self.input_color.id == self.output_color.id
    }
}

impl RenderOperator for VolumetricOperator {
    fn name(&self) -> &str {
        "Volumetric Geometry Pass (Simple)"
    }

    fn perform(&mut self, ctx: &mut FrameContext<'_>) {
        let device = &mut *ctx.device;
        device.bind_framebuffer(self.framebuffer);

        let projection = ctx.camera.jittered_projection_matrix();
        let mut hooks = VolumetricGeometryHooks {
            point_size_matrix: point_size_matrix(&projection, self.output_color.width),
            linear_depth: self.linear_depth.id,
        };

        device.set_viewport(0, 0, self.output_color.width, self.output_color.height);

        if !self.in_place() {
            device.set_state_flags(GpuStateFlags::empty());
            device.invalidate_framebuffer();
            device.bind_texture(0, self.input_color.id);
            ctx.passthrough.render(device);
        }

        device.set_state_flags(GpuStateFlags::BLEND);
        device.set_blend_func(BlendFunc::PREMULTIPLIED_ALPHA);

        ctx.geometry.render_geometry(
            device,
            ctx.scene,
            &ctx.camera.view_matrix(),
            &projection,
            &mut hooks,
        );
    }

    fn dispose(self: Box<Self>, device: &mut dyn GpuDevice) {
        device.destroy_framebuffer(self.framebuffer);
    }
}
