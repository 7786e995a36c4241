//! Renderer
//!
//! - `core`: contracts of the GPU device and the services passes delegate to
//! - `graph`: pass declarations, operators and the frame graph
//! - `settings`: renderer-wide configuration

pub mod core;
pub mod graph;
pub mod settings;

pub use settings::{RendererSettings, ShadowNearExtension};
