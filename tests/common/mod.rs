//! Software Backend
//!
//! CPU implementation of every collaborator contract the frame graph talks
//! to. All collaborators share one [`SoftBackend`] which:
//! - records every GPU call in order
//! - rasterizes full-screen draws with depth test and blending
//! - evaluates a small CPU stand-in for each fragment program

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};
use rustc_hash::FxHashMap;

use umbra::errors::{Result, UmbraError};
use umbra::renderer::core::{
    AttributeLocation, BlendFunc, FramebufferDesc, FramebufferId, GeometryPassHooks,
    GeometryRenderer, GpuDevice, GpuStateFlags, PassthroughRenderer, ProgramId, ProgramRequest,
    QuadRenderer, RenderTargetService, ShaderDefines, ShaderProgram, ShaderService,
    ShadowMapService, ShadowMapType, TextureId, TextureResource, UniformLocation, UniformValue,
};
use umbra::renderer::graph::passes::LightPassInput;
use umbra::renderer::graph::{
    AuxiliaryTextures, CompileContext, FrameContext, FrameGraph, GraphImports, PassDeclaration,
    RenderBufferDescriptor, RenderBufferFormat,
};
use umbra::renderer::settings::RendererSettings;
use umbra::scene::{Camera, Scene, ShadowCamera};

/// Depth at which full-screen quads are rasterized (the far plane).
pub const FULLSCREEN_DEPTH: f32 = 1.0;

pub const JITTER_SIZE: u32 = 16;

const MAGENTA: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Recorded calls
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DrawKind {
    Quad,
    Passthrough,
    Mesh(String),
}

/// GPU state captured at the moment of a draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub kind: DrawKind,
    pub program: Option<ProgramId>,
    pub fragment: String,
    pub defines: ShaderDefines,
    pub framebuffer: Option<FramebufferId>,
    pub flags: GpuStateFlags,
    pub blend: BlendFunc,
    pub depth_func: wgpu::CompareFunction,
    pub units: BTreeMap<u32, TextureId>,
    pub uniforms: Vec<(&'static str, UniformValue)>,
}

impl DrawRecord {
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateFramebuffer(FramebufferId),
    DestroyFramebuffer(FramebufferId),
    BindFramebuffer(FramebufferId),
    Invalidate,
    Viewport(u32, u32, u32, u32),
    StateFlags(GpuStateFlags),
    Blend(BlendFunc),
    DepthFunc(wgpu::CompareFunction),
    Clear([f32; 4]),
    BindTexture(u32, TextureId),
    UseProgram(ProgramId),
    Draw(DrawRecord),
    PrepareShadowMap,
    RenderShadowMap,
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone)]
pub struct SoftTexture {
    pub width: u32,
    pub height: u32,
    pub format: RenderBufferFormat,
    pub texels: Vec<[f32; 4]>,
}

impl SoftTexture {
    fn new(width: u32, height: u32, format: RenderBufferFormat) -> Self {
        let fill = if format.is_depth() { [1.0; 4] } else { [0.0; 4] };
        Self {
            width,
            height,
            format,
            texels: vec![fill; (width * height) as usize],
        }
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 4];
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        if x < self.width && y < self.height {
            self.texels[(y * self.width + x) as usize] = value;
        }
    }

    /// Nearest-texel lookup; `uv` origin is the top-left corner.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> [f32; 4] {
        let x = (uv.x.clamp(0.0, 1.0) * self.width as f32) as u32;
        let y = (uv.y.clamp(0.0, 1.0) * self.height as f32) as u32;
        self.get(x, y)
    }
}

#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub vertex: String,
    pub fragment: String,
    pub defines: ShaderDefines,
    pub uniform_names: Vec<&'static str>,
    pub attribute_names: Vec<&'static str>,
}

#[derive(Clone, Copy)]
enum Shading {
    Program,
    Copy,
}

pub struct SoftBackend {
    next_id: u32,
    pub textures: HashMap<TextureId, SoftTexture>,
    pub framebuffers: HashMap<FramebufferId, FramebufferDesc>,
    pub programs: HashMap<ProgramId, ProgramInfo>,
    program_cache: HashMap<(String, String, u64), ProgramId>,
    pub calls: Vec<Call>,

    bound_framebuffer: Option<FramebufferId>,
    viewport: (u32, u32, u32, u32),
    flags: GpuStateFlags,
    blend: BlendFunc,
    depth_func: wgpu::CompareFunction,
    units: BTreeMap<u32, TextureId>,
    current_program: Option<ProgramId>,
    uniforms: HashMap<(ProgramId, UniformLocation), UniformValue>,

    pub program_requests: u32,
    pub fail_fragment: Option<&'static str>,
    pub allocated: u32,
    pub released: u32,
    pub shadow_samples: Cell<u32>,
    pub shadow_out_of_range: Cell<u32>,
}

pub type Shared = Rc<RefCell<SoftBackend>>;

impl SoftBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            program_cache: HashMap::new(),
            calls: Vec::new(),
            bound_framebuffer: None,
            viewport: (0, 0, 0, 0),
            flags: GpuStateFlags::empty(),
            blend: BlendFunc::ADDITIVE,
            depth_func: wgpu::CompareFunction::Less,
            units: BTreeMap::new(),
            current_program: None,
            uniforms: HashMap::new(),
            program_requests: 0,
            fail_fragment: None,
            allocated: 0,
            released: 0,
            shadow_samples: Cell::new(0),
            shadow_out_of_range: Cell::new(0),
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: RenderBufferFormat,
    ) -> TextureResource {
        let id = TextureId(self.next());
        self.textures
            .insert(id, SoftTexture::new(width, height, format));
        TextureResource {
            id,
            width,
            height,
            format,
        }
    }

    pub fn fill(&mut self, texture: TextureId, value: [f32; 4]) {
        if let Some(t) = self.textures.get_mut(&texture) {
            t.texels.fill(value);
        }
    }

    #[must_use]
    pub fn texel(&self, texture: TextureId, x: u32, y: u32) -> [f32; 4] {
        self.textures[&texture].get(x, y)
    }

    pub fn register_program(&mut self, request: &ProgramRequest<'_>) -> Result<ShaderProgram> {
        if self.fail_fragment.is_some_and(|f| f == request.fragment) {
            return Err(UmbraError::ShaderCompilation {
                vertex: request.vertex.to_owned(),
                fragment: request.fragment.to_owned(),
                message: "forced failure".to_owned(),
            });
        }
        self.program_requests += 1;

        let key = (
            request.vertex.to_owned(),
            request.fragment.to_owned(),
            request.defines.compilation_hash(),
        );
        let id = if let Some(id) = self.program_cache.get(&key) {
            *id
        } else {
            let id = ProgramId(self.next());
            self.programs.insert(
                id,
                ProgramInfo {
                    vertex: request.vertex.to_owned(),
                    fragment: request.fragment.to_owned(),
                    defines: request.defines.clone(),
                    uniform_names: request.uniforms.to_vec(),
                    attribute_names: request.attributes.to_vec(),
                },
            );
            self.program_cache.insert(key, id);
            id
        };

        let info = &self.programs[&id];
        let uniforms: FxHashMap<&'static str, UniformLocation> = info
            .uniform_names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, UniformLocation(i as u32)))
            .collect();
        let attributes: FxHashMap<&'static str, AttributeLocation> = info
            .attribute_names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, AttributeLocation(i as u32)))
            .collect();
        Ok(ShaderProgram::new(id, uniforms, attributes))
    }

    /// Value of a named uniform of `program`, as last uploaded.
    #[must_use]
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let info = self.programs.get(&program)?;
        let index = info.uniform_names.iter().position(|n| *n == name)?;
        self.uniforms
            .get(&(program, UniformLocation(index as u32)))
            .copied()
    }

    fn uniform_vec2(&self, program: ProgramId, name: &str) -> Vec2 {
        match self.uniform(program, name) {
            Some(UniformValue::Vec2(v)) => v,
            _ => Vec2::ZERO,
        }
    }

    fn uniform_vec3(&self, program: ProgramId, name: &str) -> Vec3 {
        match self.uniform(program, name) {
            Some(UniformValue::Vec3(v)) => v,
            _ => Vec3::ZERO,
        }
    }

    fn uniform_float(&self, program: ProgramId, name: &str) -> f32 {
        match self.uniform(program, name) {
            Some(UniformValue::Float(v)) => v,
            _ => 0.0,
        }
    }

    fn uniform_mat4(&self, program: ProgramId, name: &str) -> Mat4 {
        match self.uniform(program, name) {
            Some(UniformValue::Mat4(m)) => m,
            _ => Mat4::IDENTITY,
        }
    }

    fn sample(&self, unit: u32, uv: Vec2) -> [f32; 4] {
        self.units
            .get(&unit)
            .and_then(|id| self.textures.get(id))
            .map_or([0.0; 4], |t| t.sample(uv))
    }

    fn snapshot(&self, kind: DrawKind) -> DrawRecord {
        let info = self.current_program.and_then(|p| self.programs.get(&p));
        let uniforms = match (self.current_program, info) {
            (Some(program), Some(info)) => info
                .uniform_names
                .iter()
                .filter_map(|name| self.uniform(program, name).map(|v| (*name, v)))
                .collect(),
            _ => Vec::new(),
        };
        DrawRecord {
            kind,
            program: self.current_program,
            fragment: info.map(|i| i.fragment.clone()).unwrap_or_default(),
            defines: info.map(|i| i.defines.clone()).unwrap_or_default(),
            framebuffer: self.bound_framebuffer,
            flags: self.flags,
            blend: self.blend,
            depth_func: self.depth_func,
            units: self.units.clone(),
            uniforms,
        }
    }

    pub fn draw_mesh(&mut self, name: String) {
        let record = self.snapshot(DrawKind::Mesh(name));
        self.calls.push(Call::Draw(record));
    }

    fn draw_fullscreen(&mut self, kind: DrawKind) {
        let shading = if kind == DrawKind::Passthrough {
            Shading::Copy
        } else {
            Shading::Program
        };
        let record = self.snapshot(kind);
        self.calls.push(Call::Draw(record));
        self.rasterize_fullscreen(shading);
    }

    fn rasterize_fullscreen(&mut self, shading: Shading) {
        let Some(fb) = self
            .bound_framebuffer
            .and_then(|id| self.framebuffers.get(&id))
            .cloned()
        else {
            return;
        };
        let (x0, y0, w, h) = self.viewport;
        if w == 0 || h == 0 {
            return;
        }
        let depth = fb
            .depth
            .filter(|_| self.flags.contains(GpuStateFlags::DEPTH_TEST));

        let mut writes = Vec::new();
        for py in y0..y0 + h {
            for px in x0..x0 + w {
                if let Some(depth) = depth {
                    let stored = self.texel(depth.id, px, py)[0];
                    if !compare(self.depth_func, FULLSCREEN_DEPTH, stored) {
                        continue;
                    }
                }
                let ndc = Vec2::new(
                    ((px - x0) as f32 + 0.5) / w as f32 * 2.0 - 1.0,
                    1.0 - ((py - y0) as f32 + 0.5) / h as f32 * 2.0,
                );
                writes.push((px, py, self.shade(shading, ndc)));
            }
        }

        let blend = self
            .flags
            .contains(GpuStateFlags::BLEND)
            .then_some(self.blend);
        for color in &fb.colors {
            let Some(texture) = self.textures.get_mut(&color.id) else {
                continue;
            };
            for &(px, py, src) in &writes {
                let out = match blend {
                    Some(func) => apply_blend(func, src, texture.get(px, py)),
                    None => src,
                };
                texture.set(px, py, out);
            }
        }
    }

    fn shade(&self, shading: Shading, ndc: Vec2) -> [f32; 4] {
        let uv = Vec2::new((ndc.x + 1.0) * 0.5, (1.0 - ndc.y) * 0.5);
        let Shading::Program = shading else {
            return self.sample(0, uv);
        };
        let Some(program) = self.current_program else {
            return MAGENTA;
        };
        let info = &self.programs[&program];

        match info.fragment.as_str() {
            "FS_DeferredDirectionalLight" => {
                let albedo = rgb(self.sample(0, uv));
                let normal = rgb(self.sample(1, uv));
                let dir = self.uniform_vec3(program, "u_lightDir");
                let color = self.uniform_vec3(program, "u_lightColor");
                let ndl = normal.dot(dir).max(0.0);

                let mut visibility = 1.0;
                if info.defines.flag("hasShadowMap") {
                    let linear_depth = self.sample(4, uv)[0];
                    let view_pos = self.view_ray(program, ndc) * linear_depth;
                    let matrix = self.uniform_mat4(program, "u_shadowMapMatrix");
                    let coord = matrix.project_point3(view_pos);

                    self.shadow_samples.set(self.shadow_samples.get() + 1);
                    let eps = 1e-3;
                    if coord.cmplt(Vec3::splat(-eps)).any()
                        || coord.cmpgt(Vec3::splat(1.0 + eps)).any()
                    {
                        self.shadow_out_of_range
                            .set(self.shadow_out_of_range.get() + 1);
                    } else {
                        let stored = self.sample(6, Vec2::new(coord.x, coord.y))[0];
                        if coord.z > stored + eps {
                            visibility = 0.0;
                        }
                    }
                }
                (albedo * color * ndl * visibility).extend(1.0).to_array()
            }
            "FS_DeferredAmbientLight" => {
                let albedo = rgb(self.sample(0, uv));
                let color = self.uniform_vec3(program, "u_lightColor");
                let occlusion = self.sample(5, uv)[0];
                (albedo * color * occlusion).extend(1.0).to_array()
            }
            "FS_ToneMapping" => {
                let gain = self.uniform_float(program, "u_gain");
                let tint = self.uniform_vec3(program, "u_color");
                let c = rgb(self.sample(0, uv)) * gain * tint;
                (c / (Vec3::ONE + c)).extend(1.0).to_array()
            }
            _ => MAGENTA,
        }
    }

    fn view_ray(&self, program: ProgramId, ndc: Vec2) -> Vec3 {
        let offset = self.uniform_vec2(program, "u_viewDirOffset");
        let coef_x = self.uniform_vec2(program, "u_viewDirCoefX");
        let coef_y = self.uniform_vec2(program, "u_viewDirCoefY");
        let xy = offset + coef_x * ndc.x + coef_y * ndc.y;
        Vec3::new(-xy.x, -xy.y, -1.0)
    }

    /// Every recorded draw, in order.
    #[must_use]
    pub fn draws(&self) -> Vec<DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn draws_with_fragment(&self, fragment: &str) -> Vec<DrawRecord> {
        self.draws()
            .into_iter()
            .filter(|d| d.fragment == fragment)
            .collect()
    }

    #[must_use]
    pub fn count_calls(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| matches(c)).count()
    }
}

impl Default for SoftBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn rgb(v: [f32; 4]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

#[allow(unreachable_patterns)]
fn compare(func: wgpu::CompareFunction, incoming: f32, stored: f32) -> bool {
    use wgpu::CompareFunction as F;
    match func {
        F::Never => false,
        F::Less => incoming < stored,
        F::Equal => incoming == stored,
        F::LessEqual => incoming <= stored,
        F::Greater => incoming > stored,
        F::NotEqual => incoming != stored,
        F::GreaterEqual => incoming >= stored,
        _ => true,
    }
}

#[allow(unreachable_patterns)]
fn blend_factor(factor: wgpu::BlendFactor, src: [f32; 4], dst: [f32; 4]) -> f32 {
    use wgpu::BlendFactor as B;
    match factor {
        B::Zero => 0.0,
        B::SrcAlpha => src[3],
        B::OneMinusSrcAlpha => 1.0 - src[3],
        B::DstAlpha => dst[3],
        B::OneMinusDstAlpha => 1.0 - dst[3],
        _ => 1.0,
    }
}

fn apply_blend(func: BlendFunc, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let fs = blend_factor(func.src, src, dst);
    let fd = blend_factor(func.dst, src, dst);
    std::array::from_fn(|i| src[i] * fs + dst[i] * fd)
}

// ============================================================================
// Collaborators
// ============================================================================

pub struct SoftDevice(pub Shared);

impl GpuDevice for SoftDevice {
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        desc.validate()?;
        let mut b = self.0.borrow_mut();
        let missing = desc
            .colors
            .iter()
            .chain(desc.depth.iter())
            .find(|t| !b.textures.contains_key(&t.id));
        if let Some(texture) = missing {
            return Err(UmbraError::Device(format!(
                "framebuffer '{}' references unknown texture {:?}",
                desc.label, texture.id
            )));
        }
        let id = FramebufferId(b.next());
        b.framebuffers.insert(id, desc.clone());
        b.calls.push(Call::CreateFramebuffer(id));
        Ok(id)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        let mut b = self.0.borrow_mut();
        b.framebuffers.remove(&framebuffer);
        b.calls.push(Call::DestroyFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        let mut b = self.0.borrow_mut();
        b.bound_framebuffer = Some(framebuffer);
        b.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn invalidate_framebuffer(&mut self) {
        self.0.borrow_mut().calls.push(Call::Invalidate);
    }

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let mut b = self.0.borrow_mut();
        b.viewport = (x, y, width, height);
        b.calls.push(Call::Viewport(x, y, width, height));
    }

    fn set_state_flags(&mut self, flags: GpuStateFlags) {
        let mut b = self.0.borrow_mut();
        b.flags = flags;
        b.calls.push(Call::StateFlags(flags));
    }

    fn set_blend_func(&mut self, func: BlendFunc) {
        let mut b = self.0.borrow_mut();
        b.blend = func;
        b.calls.push(Call::Blend(func));
    }

    fn set_depth_func(&mut self, func: wgpu::CompareFunction) {
        let mut b = self.0.borrow_mut();
        b.depth_func = func;
        b.calls.push(Call::DepthFunc(func));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        let mut b = self.0.borrow_mut();
        b.calls.push(Call::Clear(color));
        let Some(fb) = b
            .bound_framebuffer
            .and_then(|id| b.framebuffers.get(&id))
            .cloned()
        else {
            return;
        };
        for texture in fb.colors {
            b.fill(texture.id, color);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        let mut b = self.0.borrow_mut();
        b.units.insert(unit, texture);
        b.calls.push(Call::BindTexture(unit, texture));
    }

    fn use_program(&mut self, program: ProgramId) {
        let mut b = self.0.borrow_mut();
        b.current_program = Some(program);
        b.calls.push(Call::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let mut b = self.0.borrow_mut();
        if let Some(program) = b.current_program {
            b.uniforms.insert((program, location), value);
        }
    }
}

pub struct SoftTargets(pub Shared);

impl RenderTargetService for SoftTargets {
    fn allocate(&mut self, descriptor: &RenderBufferDescriptor) -> Result<TextureResource> {
        if descriptor.texture_descriptor().is_none() {
            return Err(UmbraError::Device(format!(
                "'{}' has no texture format",
                descriptor.name()
            )));
        }
        let mut b = self.0.borrow_mut();
        b.allocated += 1;
        Ok(b.create_texture(descriptor.width(), descriptor.height(), descriptor.format()))
    }

    fn release(&mut self, texture: TextureResource) {
        let mut b = self.0.borrow_mut();
        b.released += 1;
        b.textures.remove(&texture.id);
    }
}

pub struct SoftShaders(pub Shared);

impl ShaderService for SoftShaders {
    fn get(&mut self, request: &ProgramRequest<'_>) -> Result<ShaderProgram> {
        self.0.borrow_mut().register_program(request)
    }
}

pub struct SoftQuad(pub Shared);

impl QuadRenderer for SoftQuad {
    fn render(&mut self, _device: &mut dyn GpuDevice, _position: AttributeLocation) {
        self.0.borrow_mut().draw_fullscreen(DrawKind::Quad);
    }
}

pub struct SoftPassthrough(pub Shared);

impl PassthroughRenderer for SoftPassthrough {
    fn render(&mut self, _device: &mut dyn GpuDevice) {
        self.0.borrow_mut().draw_fullscreen(DrawKind::Passthrough);
    }
}

/// Shadow map service with an empty occluder set: every rendered map is
/// cleared to the far depth.
pub struct SoftShadowMaps {
    backend: Shared,
    pub size: u32,
    texture: Option<TextureResource>,
    framebuffer: Option<FramebufferId>,
    current: Option<TextureId>,
    pub prepared: Vec<ShadowCamera>,
    pub rendered: Vec<ShadowCamera>,
}

impl SoftShadowMaps {
    #[must_use]
    pub fn new(backend: Shared, size: u32) -> Self {
        Self {
            backend,
            size,
            texture: None,
            framebuffer: None,
            current: None,
            prepared: Vec::new(),
            rendered: Vec::new(),
        }
    }
}

impl ShadowMapService for SoftShadowMaps {
    fn prepare_shadow_map(&mut self, camera: &ShadowCamera, _kind: ShadowMapType) {
        self.prepared.push(*camera);
        self.backend.borrow_mut().calls.push(Call::PrepareShadowMap);
    }

    fn render_shadow_map(
        &mut self,
        device: &mut dyn GpuDevice,
        _scene: &Scene,
        camera: &ShadowCamera,
        _kind: ShadowMapType,
    ) {
        let size = self.size;
        let texture = *self.texture.get_or_insert_with(|| {
            self.backend
                .borrow_mut()
                .create_texture(size, size, RenderBufferFormat::Depth32Float)
        });
        let framebuffer = match self.framebuffer {
            Some(fb) => fb,
            None => {
                let fb = device
                    .create_framebuffer(&FramebufferDesc::new("Shadow Map").with_depth(Some(texture)))
                    .expect("shadow map framebuffer");
                self.framebuffer = Some(fb);
                fb
            }
        };

        // Clobber the caller's state the way a real depth render does.
        device.bind_framebuffer(framebuffer);
        device.set_viewport(0, 0, size, size);
        device.set_state_flags(GpuStateFlags::DEPTH_TEST | GpuStateFlags::DEPTH_WRITE);
        device.set_blend_func(BlendFunc {
            src: wgpu::BlendFactor::One,
            dst: wgpu::BlendFactor::Zero,
        });
        device.set_depth_func(wgpu::CompareFunction::Less);
        device.bind_texture(0, texture.id);

        let mut b = self.backend.borrow_mut();
        b.fill(texture.id, [1.0; 4]);
        b.calls.push(Call::RenderShadowMap);
        drop(b);

        self.rendered.push(*camera);
        self.current = Some(texture.id);
    }

    fn current_shadow_map_depth(&self) -> Option<TextureId> {
        self.current
    }

    fn shadow_map_size(&self) -> (u32, u32) {
        (self.size, self.size)
    }
}

/// Geometry renderer drawing every non-skipped mesh with one shared program.
pub struct SoftGeometry {
    backend: Shared,
    program: Option<ShaderProgram>,
    pub drawn: Vec<String>,
}

impl SoftGeometry {
    /// Texture units the stand-in material occupies.
    pub const MATERIAL_TEXTURE_STAGES: u32 = 2;

    #[must_use]
    pub fn new(backend: Shared) -> Self {
        Self {
            backend,
            program: None,
            drawn: Vec::new(),
        }
    }
}

impl GeometryRenderer for SoftGeometry {
    fn render_geometry(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        _view: &Mat4,
        _projection: &Mat4,
        hooks: &mut dyn GeometryPassHooks,
    ) {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => {
                let program = self
                    .backend
                    .borrow_mut()
                    .register_program(&ProgramRequest {
                        vertex: "VS_SimpleVolumetricGeometry",
                        fragment: "FS_SimpleVolumetricGeometry",
                        attributes: &["a_position"],
                        uniforms: &["u_pointSizeMatrix", "u_linearDepth"],
                        defines: &ShaderDefines::new(),
                    })
                    .expect("geometry program");
                self.program = Some(program.clone());
                program
            }
        };

        let mut meshes = Vec::new();
        scene.collect_meshes(&mut meshes);
        for key in meshes {
            let Some(mesh) = scene.mesh(key) else {
                continue;
            };
            if hooks.skips_material(&mesh.material) {
                continue;
            }
            device.use_program(program.id);
            hooks.setup_additional_uniforms(device, &program, Self::MATERIAL_TEXTURE_STAGES);
            self.backend.borrow_mut().draw_mesh(mesh.name.to_string());
            self.drawn.push(mesh.name.to_string());
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Every collaborator wired to one backend, plus helpers to compile and run
/// graphs against it.
pub struct Harness {
    pub backend: Shared,
    pub device: SoftDevice,
    pub targets: SoftTargets,
    pub shaders: SoftShaders,
    pub shadow_maps: SoftShadowMaps,
    pub quad: SoftQuad,
    pub passthrough: SoftPassthrough,
    pub geometry: SoftGeometry,
    pub aux: AuxiliaryTextures,
    pub settings: RendererSettings,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(RendererSettings::default())
    }

    #[must_use]
    pub fn with_settings(settings: RendererSettings) -> Self {
        init_logger();
        let backend: Shared = Rc::new(RefCell::new(SoftBackend::new()));

        let aux = {
            let mut b = backend.borrow_mut();
            let uniform = b.create_texture(JITTER_SIZE, JITTER_SIZE, RenderBufferFormat::Rgba8);
            b.fill(uniform.id, [0.5; 4]);
            let gaussian = b.create_texture(JITTER_SIZE, JITTER_SIZE, RenderBufferFormat::Rgba8);
            b.fill(gaussian.id, [0.5; 4]);
            AuxiliaryTextures {
                uniform_jitter: uniform.id,
                gaussian_jitter: gaussian.id,
                jitter_size: JITTER_SIZE,
            }
        };

        Self {
            device: SoftDevice(Rc::clone(&backend)),
            targets: SoftTargets(Rc::clone(&backend)),
            shaders: SoftShaders(Rc::clone(&backend)),
            shadow_maps: SoftShadowMaps::new(Rc::clone(&backend), 1024),
            quad: SoftQuad(Rc::clone(&backend)),
            passthrough: SoftPassthrough(Rc::clone(&backend)),
            geometry: SoftGeometry::new(Rc::clone(&backend)),
            backend,
            aux,
            settings,
        }
    }

    /// Creates an externally owned texture for `descriptor`.
    pub fn create_texture(&self, descriptor: &RenderBufferDescriptor) -> TextureResource {
        self.backend.borrow_mut().create_texture(
            descriptor.width(),
            descriptor.height(),
            descriptor.format(),
        )
    }

    pub fn fill(&self, texture: TextureResource, value: [f32; 4]) {
        self.backend.borrow_mut().fill(texture.id, value);
    }

    pub fn write(&self, texture: TextureResource, x: u32, y: u32, value: [f32; 4]) {
        if let Some(t) = self.backend.borrow_mut().textures.get_mut(&texture.id) {
            t.set(x, y, value);
        }
    }

    #[must_use]
    pub fn read(&self, texture: TextureResource, x: u32, y: u32) -> [f32; 4] {
        self.backend.borrow().texel(texture.id, x, y)
    }

    pub fn compile_context(&mut self) -> CompileContext<'_> {
        CompileContext {
            device: &mut self.device,
            shaders: &mut self.shaders,
            settings: &self.settings,
        }
    }

    pub fn frame_context<'a>(
        &'a mut self,
        scene: &'a mut Scene,
        camera: &'a Camera,
    ) -> FrameContext<'a> {
        FrameContext {
            device: &mut self.device,
            scene,
            camera,
            shadow_maps: &mut self.shadow_maps,
            quad: &mut self.quad,
            passthrough: &mut self.passthrough,
            geometry: &mut self.geometry,
            aux: self.aux,
        }
    }

    pub fn compile(
        &mut self,
        declarations: &[PassDeclaration],
        final_outputs: &[&RenderBufferDescriptor],
        imports: &GraphImports,
    ) -> Result<FrameGraph> {
        let mut ctx = CompileContext {
            device: &mut self.device,
            shaders: &mut self.shaders,
            settings: &self.settings,
        };
        FrameGraph::compile(declarations, final_outputs, imports, &mut self.targets, &mut ctx)
    }

    pub fn render(&mut self, graph: &mut FrameGraph, scene: &mut Scene, camera: &Camera) {
        let mut ctx = self.frame_context(scene, camera);
        graph.render_frame(&mut ctx);
    }

    pub fn dispose(&mut self, graph: FrameGraph) {
        graph.dispose(&mut self.device, &mut self.targets);
    }

    pub fn clear_calls(&self) {
        self.backend.borrow_mut().calls.clear();
    }

    #[must_use]
    pub fn draws_with_fragment(&self, fragment: &str) -> Vec<DrawRecord> {
        self.backend.borrow().draws_with_fragment(fragment)
    }

    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.backend.borrow().framebuffers.len()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// G-buffer fixture
// ============================================================================

/// Imported G-buffer descriptors with backing textures.
pub struct GBufferFixture {
    pub g0: RenderBufferDescriptor,
    pub g1: RenderBufferDescriptor,
    pub g2: RenderBufferDescriptor,
    pub g3: RenderBufferDescriptor,
    pub depth: RenderBufferDescriptor,
    pub linear_depth: RenderBufferDescriptor,
    pub ssao: RenderBufferDescriptor,
    pub shadow_maps: RenderBufferDescriptor,

    pub g0_texture: TextureResource,
    pub g1_texture: TextureResource,
    pub g2_texture: TextureResource,
    pub g3_texture: TextureResource,
    pub depth_texture: TextureResource,
    pub linear_depth_texture: TextureResource,
    pub ssao_texture: TextureResource,
}

impl GBufferFixture {
    pub fn new(harness: &Harness, width: u32, height: u32) -> Self {
        let g0 = RenderBufferDescriptor::linear_rgb("G0", width, height, RenderBufferFormat::Rgba8);
        let g1 = RenderBufferDescriptor::linear_rgb("G1", width, height, RenderBufferFormat::Rgba16Float);
        let g2 = RenderBufferDescriptor::linear_rgb("G2", width, height, RenderBufferFormat::Rgba8);
        let g3 = RenderBufferDescriptor::linear_rgb("G3", width, height, RenderBufferFormat::Rgba8);
        let depth = RenderBufferDescriptor::depth("Depth", width, height);
        let linear_depth = RenderBufferDescriptor::linear_depth("Linear Depth", width, height);
        let ssao = RenderBufferDescriptor::linear_rgb("SSAO", width, height, RenderBufferFormat::Rgba8);
        let shadow_maps = RenderBufferDescriptor::shadow_maps("Shadow Maps");

        let ssao_texture = harness.create_texture(&ssao);
        harness.fill(ssao_texture, [1.0; 4]);

        Self {
            g0_texture: harness.create_texture(&g0),
            g1_texture: harness.create_texture(&g1),
            g2_texture: harness.create_texture(&g2),
            g3_texture: harness.create_texture(&g3),
            depth_texture: harness.create_texture(&depth),
            linear_depth_texture: harness.create_texture(&linear_depth),
            ssao_texture,
            g0,
            g1,
            g2,
            g3,
            depth,
            linear_depth,
            ssao,
            shadow_maps,
        }
    }

    /// Every buffer imported, including the shadow map service.
    #[must_use]
    pub fn imports(&self) -> GraphImports {
        let mut imports = GraphImports::new();
        imports
            .import_texture(&self.g0, self.g0_texture)
            .import_texture(&self.g1, self.g1_texture)
            .import_texture(&self.g2, self.g2_texture)
            .import_texture(&self.g3, self.g3_texture)
            .import_texture(&self.depth, self.depth_texture)
            .import_texture(&self.linear_depth, self.linear_depth_texture)
            .import_texture(&self.ssao, self.ssao_texture)
            .import_shadow_maps(&self.shadow_maps);
        imports
    }

    #[must_use]
    pub fn light_input(&self) -> LightPassInput<'_> {
        LightPassInput {
            g0: &self.g0,
            g1: &self.g1,
            g2: &self.g2,
            g3: &self.g3,
            depth: Some(&self.depth),
            linear_depth: &self.linear_depth,
            ssao: &self.ssao,
            shadow_maps: &self.shadow_maps,
        }
    }

    /// Marks pixel `(x, y)` as holding a surface.
    #[allow(clippy::too_many_arguments)]
    pub fn write_surface(
        &self,
        harness: &Harness,
        x: u32,
        y: u32,
        albedo: Vec3,
        view_normal: Vec3,
        depth: f32,
        linear_depth: f32,
    ) {
        harness.write(self.g0_texture, x, y, albedo.extend(1.0).to_array());
        harness.write(self.g1_texture, x, y, view_normal.extend(0.0).to_array());
        harness.write(self.depth_texture, x, y, [depth; 4]);
        harness.write(self.linear_depth_texture, x, y, [linear_depth; 4]);
    }
}
