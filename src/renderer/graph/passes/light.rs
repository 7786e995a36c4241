//! Deferred Light Accumulation Pass
//!
//! Accumulates every light's contribution into the `Lit` buffer with
//! additive blending, reading the G-buffer through full-screen quads.
//!
//! # Frame Flow
//!
//! ```text
//! before_render (Preparing)
//!   ├─ camera matrices, view vectors, frustum fit points
//!   ├─ total ambient := 0
//!   └─ prepare traversal: fit + reserve a shadow map per shadow caster
//! perform (Rendering)
//!   ├─ bind framebuffer, clear, depth test + additive blend
//!   ├─ G-buffer / jitter textures on fixed units, shared uniforms
//!   ├─ render traversal:
//!   │    directional → (shadow map render, state restore) → one quad
//!   │    ambient     → summed only
//!   └─ one ambient quad when the sum is non-zero
//! → Done
//! ```
//!
//! Both traversals walk the scene in the same pre-order, so the shadow
//! camera fitted for a light in the prepare traversal is the one rendered in
//! the render traversal.
//!
//! # Texture Units
//!
//! | Unit | Directional | Ambient |
//! |------|-------------|---------|
//! | 0..2 | G-buffer 0..2 | G-buffer 0..2 |
//! | 3 | dither | dither |
//! | 4 | linear depth | linear depth |
//! | 5 | shadow jitter | SSAO |
//! | 6 | shadow map | |

use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3};

use crate::errors::Result;
use crate::renderer::core::{
    AttributeLocation, BlendFunc, FramebufferDesc, FramebufferId, GpuDevice, GpuStateFlags,
    ProgramRequest, QuadRenderer, ShaderDefines, ShaderProgram, ShadowMapType, TextureResource,
    UniformValue,
};
use crate::renderer::graph::compile::{ResolvedBindings, ResolvedResource};
use crate::renderer::graph::context::{AuxiliaryTextures, CompileContext, FrameContext};
use crate::renderer::graph::declaration::{PassDeclaration, PassKind, SlotName};
use crate::renderer::graph::descriptor::{RenderBufferDescriptor, RenderBufferFormat};
use crate::renderer::graph::node::RenderOperator;
use crate::renderer::graph::shadow_utils::{
    FRUSTUM_FIT_POINT_COUNT, LightBasis, LightSpaceBounds, compute_frustum_fit_points,
    fit_shadow_camera, shadow_map_matrix,
};
use crate::renderer::graph::view_vectors::{ViewVectors, far_depth_from_projection_matrix};
use crate::renderer::settings::{RendererSettings, ShadowNearExtension};
use crate::scene::{LightKey, LightKind, ShadowCamera};

pub const G0: SlotName = "g0";
pub const G1: SlotName = "g1";
pub const G2: SlotName = "g2";
pub const G3: SlotName = "g3";
pub const DEPTH: SlotName = "depth";
pub const LINEAR_DEPTH: SlotName = "linearDepth";
pub const SSAO: SlotName = "ssao";
pub const SHADOW_MAPS: SlotName = "shadowMaps";
pub const LIT: SlotName = "lit";

pub const DIRECTIONAL_LIGHT_VERTEX: &str = "VS_DeferredDirectionalLight";
pub const DIRECTIONAL_LIGHT_FRAGMENT: &str = "FS_DeferredDirectionalLight";
pub const AMBIENT_LIGHT_VERTEX: &str = "VS_DeferredAmbientLight";
pub const AMBIENT_LIGHT_FRAGMENT: &str = "FS_DeferredAmbientLight";

const POSITION_ATTRIBUTE: &str = "a_position";

const DIRECTIONAL_UNIFORMS: &[&str] = &[
    "u_g0",
    "u_g1",
    "u_g2",
    "u_linearDepth",
    "u_lightDir",
    "u_lightColor",
    "u_viewDirCoefX",
    "u_viewDirCoefY",
    "u_viewDirOffset",
    "u_shadowMap",
    "u_shadowMapMatrix",
    "u_jitter",
    "u_jitterScale",
    "u_jitterAmount",
    "u_dither",
    "u_ditherScale",
];

const AMBIENT_UNIFORMS: &[&str] = &[
    "u_g0",
    "u_g1",
    "u_g2",
    "u_linearDepth",
    "u_ssao",
    "u_lightColor",
    "u_viewDirCoefX",
    "u_viewDirCoefY",
    "u_viewDirOffset",
    "u_dither",
    "u_ditherScale",
];

const DITHER_UNIT: u32 = 3;
const LINEAR_DEPTH_UNIT: u32 = 4;
const JITTER_UNIT: u32 = 5;
const SSAO_UNIT: u32 = 5;
const SHADOW_MAP_UNIT: u32 = 6;

bitflags! {
    /// Variant key of the directional light program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirectionalLightProgramFlags: u8 {
        const HAS_SHADOW_MAP = 1 << 0;
    }
}

impl DirectionalLightProgramFlags {
    fn defines(self) -> ShaderDefines {
        ShaderDefines::new().with_flag("hasShadowMap", self.contains(Self::HAS_SHADOW_MAP))
    }
}

// ============================================================================
// Declaration
// ============================================================================

/// Upstream buffers the light pass reads.
#[derive(Debug, Clone, Copy)]
pub struct LightPassInput<'a> {
    pub g0: &'a RenderBufferDescriptor,
    pub g1: &'a RenderBufferDescriptor,
    pub g2: &'a RenderBufferDescriptor,
    pub g3: &'a RenderBufferDescriptor,
    /// Hardware depth buffer; used for culling unlit pixels when compatible.
    pub depth: Option<&'a RenderBufferDescriptor>,
    pub linear_depth: &'a RenderBufferDescriptor,
    pub ssao: &'a RenderBufferDescriptor,
    pub shadow_maps: &'a RenderBufferDescriptor,
}

#[derive(Debug, Clone)]
pub struct LightPassOutput {
    pub lit: RenderBufferDescriptor,
}

/// Build-time parameters of a light pass operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightPassConfig {
    pub near_extension: ShadowNearExtension,
    /// Shadow filter radius in shadow map texels.
    pub shadow_jitter_texels: f32,
}

impl LightPassConfig {
    #[must_use]
    pub fn from_settings(settings: &RendererSettings) -> Self {
        Self {
            near_extension: settings.shadow_near_extension,
            shadow_jitter_texels: settings.shadow_jitter_texels,
        }
    }
}

/// Whether the light pass can cull against `depth` when rendering into a
/// `width` x `height` target.
#[must_use]
pub fn depth_cull_enabled(depth: Option<&RenderBufferDescriptor>, width: u32, height: u32) -> bool {
    depth.is_some_and(|d| d.has_size(width, height) && d.is_depth_buffer())
}

/// Declares deferred light accumulation passes.
#[derive(Debug, Clone)]
pub struct LightRenderer {
    supports_srgb: bool,
    config: LightPassConfig,
}

impl LightRenderer {
    #[must_use]
    pub fn new(settings: &RendererSettings) -> Self {
        Self {
            supports_srgb: settings.supports_srgb,
            config: LightPassConfig::from_settings(settings),
        }
    }

    /// Appends one light pass declaration to `ops` and returns its output.
    pub fn setup_light_pass(
        &self,
        input: &LightPassInput<'_>,
        ops: &mut Vec<PassDeclaration>,
    ) -> LightPassOutput {
        let width = input.g0.width();
        let height = input.g0.height();

        let format = if self.supports_srgb {
            RenderBufferFormat::Srgba8
        } else {
            RenderBufferFormat::Rgba8
        };
        let lit = RenderBufferDescriptor::linear_rgb("Lit", width, height, format);

        let depth = input
            .depth
            .filter(|_| depth_cull_enabled(input.depth, width, height));
        if let (Some(d), None) = (input.depth, depth) {
            log::debug!(
                "Light pass: depth '{}' ({}x{}, {:?}) unusable for {width}x{height} output, culling disabled",
                d.name(),
                d.width(),
                d.height(),
                d.format()
            );
        }

        ops.push(
            PassDeclaration::new("Light Pass", PassKind::Light(self.config))
                .with_input(G0, input.g0)
                .with_input(G1, input.g1)
                .with_input(G2, input.g2)
                .with_input(G3, input.g3)
                .with_optional_input(DEPTH, depth)
                .with_input(LINEAR_DEPTH, input.linear_depth)
                .with_input(SSAO, input.ssao)
                .with_input(SHADOW_MAPS, input.shadow_maps)
                .with_output(LIT, &lit),
        );

        LightPassOutput { lit }
    }
}

// ============================================================================
// Operator
// ============================================================================

/// Where the operator is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightPassPhase {
    #[default]
    Idle,
    Preparing,
    Rendering,
    Done,
}

/// Camera-derived data and light sums of the current frame.
#[derive(Debug, Clone, Default)]
pub struct LightAccumulationState {
    pub view_matrix: Mat4,
    pub projection_view_matrix: Mat4,
    pub view_vectors: ViewVectors,
    pub total_ambient: Vec3,
    /// Far-plane corners followed by the eye, in world space.
    pub frustum_points: [Vec3; FRUSTUM_FIT_POINT_COUNT],
}

struct LightProgram {
    program: ShaderProgram,
    position: AttributeLocation,
}

impl LightProgram {
    fn load(ctx: &mut CompileContext<'_>, request: &ProgramRequest<'_>) -> Result<Self> {
        log::debug!(
            "Light pass: requesting {} / {} {:?}",
            request.vertex,
            request.fragment,
            request.defines
        );
        let program = ctx.shaders.get(request)?;
        let position = program.require_attribute(POSITION_ATTRIBUTE, request)?;
        Ok(Self { program, position })
    }
}

pub struct LightPassOperator {
    config: LightPassConfig,
    framebuffer: FramebufferId,

    lit: TextureResource,
    g_buffer: [TextureResource; 3],
    linear_depth: TextureResource,
    ssao: TextureResource,
    depth_cull: bool,

    /// Indexed by [`DirectionalLightProgramFlags`] bits.
    directional_programs: [LightProgram; 2],
    ambient_program: LightProgram,

    state: LightAccumulationState,
    phase: LightPassPhase,
    light_scratch: Vec<LightKey>,
}

impl LightPassOperator {
    pub fn new(
        config: &LightPassConfig,
        bindings: &ResolvedBindings,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Self> {
        let lit = bindings.output_texture(LIT)?;
        let g_buffer = [
            bindings.input_texture(G0)?,
            bindings.input_texture(G1)?,
            bindings.input_texture(G2)?,
        ];
        let linear_depth = bindings.input_texture(LINEAR_DEPTH)?;
        let ssao = bindings.input_texture(SSAO)?;
        debug_assert_eq!(bindings.input(SHADOW_MAPS)?, ResolvedResource::ShadowMaps);

        let depth = bindings
            .optional_input_texture(DEPTH)?
            .filter(|d| d.format.is_depth() && d.size() == lit.size());

        let directional_programs = [
            DirectionalLightProgramFlags::empty(),
            DirectionalLightProgramFlags::HAS_SHADOW_MAP,
        ]
        .map(|flags| {
            let defines = flags.defines();
            LightProgram::load(
                ctx,
                &ProgramRequest {
                    vertex: DIRECTIONAL_LIGHT_VERTEX,
                    fragment: DIRECTIONAL_LIGHT_FRAGMENT,
                    attributes: &[POSITION_ATTRIBUTE],
                    uniforms: DIRECTIONAL_UNIFORMS,
                    defines: &defines,
                },
            )
        });
        let [plain, shadowed] = directional_programs;
        let directional_programs = [plain?, shadowed?];

        let ambient_program = LightProgram::load(
            ctx,
            &ProgramRequest {
                vertex: AMBIENT_LIGHT_VERTEX,
                fragment: AMBIENT_LIGHT_FRAGMENT,
                attributes: &[POSITION_ATTRIBUTE],
                uniforms: AMBIENT_UNIFORMS,
                defines: &ShaderDefines::new(),
            },
        )?;

        let fb_desc = FramebufferDesc::new("Light Pass")
            .with_color(lit)
            .with_depth(depth);
        fb_desc.validate()?;
        let framebuffer = ctx.device.create_framebuffer(&fb_desc)?;

        Ok(Self {
            config: *config,
            framebuffer,
            lit,
            g_buffer,
            linear_depth,
            ssao,
            depth_cull: depth.is_some(),
            directional_programs,
            ambient_program,
            state: LightAccumulationState::default(),
            phase: LightPassPhase::Idle,
            light_scratch: Vec::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn accumulation_state(&self) -> &LightAccumulationState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> LightPassPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn depth_cull(&self) -> bool {
        self.depth_cull
    }

    /// Binds the framebuffer and every piece of fixed-function state the
    /// light quads depend on.
    fn set_state(&self, device: &mut dyn GpuDevice, aux: &AuxiliaryTextures) {
        device.bind_framebuffer(self.framebuffer);

        let mut flags = GpuStateFlags::BLEND;
        if self.depth_cull {
            flags |= GpuStateFlags::DEPTH_TEST;
        }
        device.set_state_flags(flags);
        device.set_blend_func(BlendFunc::ADDITIVE);
        device.set_viewport(0, 0, self.lit.width, self.lit.height);

        for (unit, texture) in (0u32..).zip(&self.g_buffer) {
            device.bind_texture(unit, texture.id);
        }
        device.bind_texture(DITHER_UNIT, aux.uniform_jitter);
        device.bind_texture(LINEAR_DEPTH_UNIT, self.linear_depth.id);
    }

    fn upload_common_uniforms(&self, device: &mut dyn GpuDevice, aux: &AuxiliaryTextures) {
        let jitter_size = aux.jitter_size.max(1) as f32;
        let dither_scale = Vec2::new(
            self.lit.width as f32 / jitter_size / 4.0,
            self.lit.height as f32 / jitter_size / 4.0,
        );
        let vv = self.state.view_vectors;

        let programs = self
            .directional_programs
            .iter()
            .map(|p| (&p.program, true))
            .chain(std::iter::once((&self.ambient_program.program, false)));

        for (program, directional) in programs {
            device.use_program(program.id);
            program.set(device, "u_g0", UniformValue::Int(0));
            program.set(device, "u_g1", UniformValue::Int(1));
            program.set(device, "u_g2", UniformValue::Int(2));
            program.set(device, "u_dither", UniformValue::Int(DITHER_UNIT as i32));
            program.set(device, "u_ditherScale", UniformValue::Vec2(dither_scale));
            program.set(device, "u_linearDepth", UniformValue::Int(LINEAR_DEPTH_UNIT as i32));
            if directional {
                program.set(device, "u_jitter", UniformValue::Int(JITTER_UNIT as i32));
                program.set(device, "u_jitterScale", UniformValue::Vec2(dither_scale));
                program.set(device, "u_shadowMap", UniformValue::Int(SHADOW_MAP_UNIT as i32));
            } else {
                program.set(device, "u_ssao", UniformValue::Int(SSAO_UNIT as i32));
            }
            program.set(device, "u_viewDirOffset", UniformValue::Vec2(vv.offset));
            program.set(device, "u_viewDirCoefX", UniformValue::Vec2(vv.coef_x));
            program.set(device, "u_viewDirCoefY", UniformValue::Vec2(vv.coef_y));
        }
    }

    fn render_directional(
        &self,
        ctx: &mut FrameContext<'_>,
        color: Vec3,
        position: Vec3,
        shadow_camera: Option<ShadowCamera>,
    ) {
        let device = &mut *ctx.device;

        if let Some(camera) = &shadow_camera {
            ctx.shadow_maps
                .render_shadow_map(device, ctx.scene, camera, ShadowMapType::Normal);
            self.set_state(device, &ctx.aux);
            if let Some(depth) = ctx.shadow_maps.current_shadow_map_depth() {
                device.bind_texture(SHADOW_MAP_UNIT, depth);
            }
        }

        let flags = if shadow_camera.is_some() {
            DirectionalLightProgramFlags::HAS_SHADOW_MAP
        } else {
            DirectionalLightProgramFlags::empty()
        };
        let LightProgram { program, position: quad_position } =
            &self.directional_programs[usize::from(flags.bits())];
        device.use_program(program.id);

        let light_dir = (self.state.view_matrix * position.extend(0.0))
            .truncate()
            .normalize_or_zero();
        program.set(device, "u_lightDir", UniformValue::Vec3(light_dir));
        program.set(device, "u_lightColor", UniformValue::Vec3(color));

        if let Some(camera) = &shadow_camera {
            let matrix = shadow_map_matrix(camera, &ctx.camera.world_matrix());
            program.set(device, "u_shadowMapMatrix", UniformValue::Mat4(matrix));

            device.bind_texture(JITTER_UNIT, ctx.aux.gaussian_jitter);

            let (width, height) = ctx.shadow_maps.shadow_map_size();
            let amount = Vec2::new(
                self.config.shadow_jitter_texels / width.max(1) as f32,
                self.config.shadow_jitter_texels / height.max(1) as f32,
            );
            program.set(device, "u_jitterAmount", UniformValue::Vec2(amount));
        }

        draw_quad(device, ctx.quad, *quad_position);
    }
}

/// Full-screen quad that only touches pixels holding geometry.
fn draw_quad(
    device: &mut dyn GpuDevice,
    quad: &mut dyn QuadRenderer,
    position: AttributeLocation,
) {
    device.set_depth_func(wgpu::CompareFunction::Greater);
    quad.render(device, position);
    device.set_depth_func(wgpu::CompareFunction::Less);
}

impl RenderOperator for LightPassOperator {
    fn name(&self) -> &str {
        "Light Pass"
    }

    fn before_render(&mut self, ctx: &mut FrameContext<'_>) {
        self.phase = LightPassPhase::Preparing;

        let camera = ctx.camera;
        let projection = camera.projection_matrix();
        let camera_world = camera.world_matrix();

        self.state.view_matrix = camera.view_matrix();
        self.state.projection_view_matrix = projection * self.state.view_matrix;
        self.state.view_vectors.update_from_projection(&projection);
        self.state.total_ambient = Vec3::ZERO;

        let far = far_depth_from_projection_matrix(&projection);
        compute_frustum_fit_points(
            &self.state.view_vectors,
            far,
            &camera_world,
            &mut self.state.frustum_points,
        );

        let mut lights = std::mem::take(&mut self.light_scratch);
        lights.clear();
        ctx.scene.collect_lights(&mut lights);

        for &key in &lights {
            let Some(light) = ctx.scene.light_mut(key) else {
                continue;
            };
            let LightKind::Directional(directional) = &mut light.kind else {
                continue;
            };
            if !directional.cast_shadow {
                continue;
            }

            let Some(basis) = LightBasis::from_light_position(directional.position) else {
                log::warn!("Light pass: directional light {key:?} has no direction, no shadow");
                continue;
            };
            let Some(mut bounds) = LightSpaceBounds::fit(&basis, &self.state.frustum_points)
            else {
                continue;
            };
            bounds.extend_near(
                self.config
                    .near_extension
                    .resolve(directional.shadow_camera_near),
            );

            let shadow_camera = directional
                .shadow_camera
                .get_or_insert_with(ShadowCamera::default);
            fit_shadow_camera(shadow_camera, &basis, &bounds);
            ctx.shadow_maps
                .prepare_shadow_map(shadow_camera, ShadowMapType::Normal);
        }

        self.light_scratch = lights;
    }

    fn perform(&mut self, ctx: &mut FrameContext<'_>) {
        self.phase = LightPassPhase::Rendering;

        self.set_state(ctx.device, &ctx.aux);
        ctx.device.clear_color([0.0; 4]);
        self.upload_common_uniforms(ctx.device, &ctx.aux);

        let mut lights = std::mem::take(&mut self.light_scratch);
        lights.clear();
        ctx.scene.collect_lights(&mut lights);

        for &key in &lights {
            let Some(light) = ctx.scene.light(key) else {
                continue;
            };
            match &light.kind {
                LightKind::Directional(directional) => {
                    if directional.direction().is_none() {
                        continue;
                    }
                    let color = light.color * light.intensity;
                    let position = directional.position;
                    let shadow_camera = directional
                        .cast_shadow
                        .then_some(directional.shadow_camera)
                        .flatten();
                    self.render_directional(ctx, color, position, shadow_camera);
                }
                LightKind::Ambient => {
                    self.state.total_ambient += light.color;
                }
                LightKind::Point(_) => {}
            }
        }

        self.light_scratch = lights;

        let ambient = self.state.total_ambient;
        if ambient.cmpgt(Vec3::ZERO).any() {
            log::trace!("Light pass: ambient {ambient}");
            let device = &mut *ctx.device;
            let LightProgram { program, position } = &self.ambient_program;
            device.use_program(program.id);
            device.bind_texture(SSAO_UNIT, self.ssao.id);
            program.set(device, "u_lightColor", UniformValue::Vec3(ambient));
            draw_quad(device, ctx.quad, *position);
        }

        self.phase = LightPassPhase::Done;
    }

    fn dispose(self: Box<Self>, device: &mut dyn GpuDevice) {
        device.destroy_framebuffer(self.framebuffer);
    }
}
