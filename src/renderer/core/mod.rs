//! GPU Collaborator Contracts
//!
//! The frame graph never talks to a graphics API directly. Everything it needs
//! from the outside world is expressed through the narrow interfaces here:
//!
//! - [`GpuDevice`]: fixed-function state, framebuffers, texture units, uniforms
//! - [`RenderTargetService`]: physical allocation of declared render buffers
//! - [`ShaderService`]: compiled program variants with uniform/attribute lookup
//! - [`ShadowMapService`]: shadow map reservation and depth rendering
//! - [`QuadRenderer`] / [`PassthroughRenderer`]: full-screen draws
//! - [`GeometryRenderer`]: material-driven mesh rendering for forward passes

pub mod device;
pub mod program;
pub mod services;
pub mod shader_defines;
pub mod state;

pub use device::{
    AttributeLocation, FramebufferDesc, FramebufferId, GpuDevice, ProgramId, TextureId,
    TextureResource, UniformLocation, UniformValue,
};
pub use program::{ProgramRequest, ShaderProgram};
pub use services::{
    GeometryPassHooks, GeometryRenderer, PassthroughRenderer, QuadRenderer, RenderTargetService,
    ShaderService, ShadowMapService, ShadowMapType,
};
pub use shader_defines::{DefineValue, ShaderDefines};
pub use state::{BlendFunc, GpuStateFlags};
