//! Tone Mapping Pass
//!
//! Maps the HDR scene color to a displayable 8-bit target in a single
//! full-screen draw. Besides the curve itself the shader applies:
//! - **Vignette**: radial falloff shaped by the view-vector extents, so it is
//!   round regardless of aspect ratio
//! - **Exposure**: gain of `2^exposure_bias`
//! - **Tint**: per-channel color multiplier
//! - **Highlight crush / contrast**: curve shaping scalars
//!
//! Parameters live behind a shared lock; edits made through
//! [`ToneMappingFilter::params`] are picked up by every operator on its next
//! frame without recompiling the graph.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::renderer::core::{
    AttributeLocation, FramebufferDesc, FramebufferId, GpuDevice, GpuStateFlags, ProgramRequest,
    ShaderDefines, ShaderProgram, TextureResource, UniformValue,
};
use crate::renderer::graph::compile::ResolvedBindings;
use crate::renderer::graph::context::{CompileContext, FrameContext};
use crate::renderer::graph::declaration::{PassDeclaration, PassKind, SlotName};
use crate::renderer::graph::descriptor::{ColorSpaceTag, RenderBufferDescriptor, RenderBufferFormat};
use crate::renderer::graph::node::RenderOperator;
use crate::renderer::graph::view_vectors::ViewVectors;
use crate::renderer::settings::RendererSettings;

pub const INPUT: SlotName = "input";
pub const OUTPUT: SlotName = "output";

pub const TONE_MAPPING_VERTEX: &str = "VS_ToneMapping";
pub const TONE_MAPPING_FRAGMENT: &str = "FS_ToneMapping";

const UNIFORMS: &[&str] = &[
    "u_input",
    "u_vignetteAmount",
    "u_vignetteScale",
    "u_gain",
    "u_color",
    "u_highlightCrush",
    "u_contrast",
];

/// User-facing tone mapping controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingParams {
    /// Vignette strength; `0` disables it.
    pub vignette: f32,
    /// Reserved for automatic exposure. Currently has no effect.
    pub auto_exposure_enabled: bool,
    /// Exposure in stops.
    pub exposure_bias: f32,
    pub color: Vec3,
    pub highlight_crush: f32,
    pub contrast: f32,
}

impl Default for ToneMappingParams {
    fn default() -> Self {
        Self {
            vignette: 1.0,
            auto_exposure_enabled: true,
            exposure_bias: 0.0,
            color: Vec3::ONE,
            highlight_crush: 0.2,
            contrast: 0.5,
        }
    }
}

impl ToneMappingParams {
    /// Linear gain applied before the curve.
    #[inline]
    #[must_use]
    pub fn gain(&self) -> f32 {
        self.exposure_bias.exp2()
    }
}

/// Parameters the operator is built with.
#[derive(Debug, Clone)]
pub struct ToneMappingPassConfig {
    pub params: Arc<RwLock<ToneMappingParams>>,
    /// Selects the shader variant decoding log-encoded input.
    pub input_is_log_rgb: bool,
}

/// Declares tone mapping passes.
#[derive(Debug, Clone)]
pub struct ToneMappingFilter {
    params: Arc<RwLock<ToneMappingParams>>,
    supports_srgb: bool,
}

impl ToneMappingFilter {
    #[must_use]
    pub fn new(settings: &RendererSettings) -> Self {
        Self::with_params(settings, ToneMappingParams::default())
    }

    #[must_use]
    pub fn with_params(settings: &RendererSettings, params: ToneMappingParams) -> Self {
        Self {
            params: Arc::new(RwLock::new(params)),
            supports_srgb: settings.supports_srgb,
        }
    }

    /// Shared handle to the live parameters.
    #[must_use]
    pub fn params(&self) -> Arc<RwLock<ToneMappingParams>> {
        Arc::clone(&self.params)
    }

    /// Appends a tone mapping declaration reading `input` and returns the
    /// tone mapped output, sized like the input.
    pub fn setup_filter(
        &self,
        input: &RenderBufferDescriptor,
        ops: &mut Vec<PassDeclaration>,
    ) -> RenderBufferDescriptor {
        let format = if self.supports_srgb {
            RenderBufferFormat::Srgba8
        } else {
            RenderBufferFormat::Rgba8
        };
        let output =
            RenderBufferDescriptor::linear_rgb("Tone Mapped", input.width(), input.height(), format);

        let config = ToneMappingPassConfig {
            params: self.params(),
            input_is_log_rgb: input.color_space() == ColorSpaceTag::Log,
        };
        ops.push(
            PassDeclaration::new("Tone Mapping", PassKind::ToneMapping(config))
                .with_input(INPUT, input)
                .with_output(OUTPUT, &output),
        );
        output
    }
}

pub struct ToneMappingOperator {
    params: Arc<RwLock<ToneMappingParams>>,
    framebuffer: FramebufferId,
    input: TextureResource,
    output: TextureResource,
    program: ShaderProgram,
    position: AttributeLocation,
    view_vectors: ViewVectors,
}

impl ToneMappingOperator {
    pub fn new(
        config: &ToneMappingPassConfig,
        bindings: &ResolvedBindings,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Self> {
        let input = bindings.input_texture(INPUT)?;
        let output = bindings.output_texture(OUTPUT)?;

        let defines = ShaderDefines::new().with_flag("inputIsLogRGB", config.input_is_log_rgb);
        let request = ProgramRequest {
            vertex: TONE_MAPPING_VERTEX,
            fragment: TONE_MAPPING_FRAGMENT,
            attributes: &["a_position"],
            uniforms: UNIFORMS,
            defines: &defines,
        };
        let program = ctx.shaders.get(&request)?;
        let position = program.require_attribute("a_position", &request)?;

        let framebuffer = ctx
            .device
            .create_framebuffer(&FramebufferDesc::new("Tone Mapping").with_color(output))?;

        Ok(Self {
            params: Arc::clone(&config.params),
            framebuffer,
            input,
            output,
            program,
            position,
            view_vectors: ViewVectors::default(),
        })
    }
}

impl RenderOperator for ToneMappingOperator {
    fn name(&self) -> &str {
        "Tone Mapping"
    }

    fn perform(&mut self, ctx: &mut FrameContext<'_>) {
        let device = &mut *ctx.device;
        device.bind_framebuffer(self.framebuffer);
        device.set_viewport(0, 0, self.output.width, self.output.height);
        device.invalidate_framebuffer();
        device.set_state_flags(GpuStateFlags::empty());

        device.bind_texture(0, self.input.id);

        let program = &self.program;
        device.use_program(program.id);
        program.set(device, "u_input", UniformValue::Int(0));

        let params = *self.params.read();

        self.view_vectors
            .update_from_projection(&ctx.camera.projection_matrix());
        program.set(device, "u_vignetteAmount", UniformValue::Float(params.vignette));
        program.set(
            device,
            "u_vignetteScale",
            UniformValue::Vec2(self.view_vectors.vignette_scale()),
        );
        program.set(device, "u_gain", UniformValue::Float(params.gain()));
        program.set(device, "u_color", UniformValue::Vec3(params.color));

        // TODO: auto exposure needs a luminance histogram pass feeding u_gain.
        program.set(
            device,
            "u_highlightCrush",
            UniformValue::Float(params.highlight_crush),
        );
        program.set(device, "u_contrast", UniformValue::Float(params.contrast));

        ctx.quad.render(device, self.position);
    }

    fn dispose(self: Box<Self>, device: &mut dyn GpuDevice) {
        device.destroy_framebuffer(self.framebuffer);
    }
}
