pub mod errors;
pub mod renderer;
pub mod scene;

pub use errors::{Result, UmbraError};
pub use renderer::graph::passes::{LightRenderer, SimpleVolumetricRenderer, ToneMappingFilter};
pub use renderer::graph::{FrameGraph, PassDeclaration, RenderBufferDescriptor};
pub use renderer::settings::RendererSettings;
pub use scene::{Camera, Light, Scene};
