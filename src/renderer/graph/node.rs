//! Render Operator Trait
//!
//! The runtime side of a declared pass. An operator is built once per graph
//! compile from its [`PassDeclaration`](super::declaration::PassDeclaration)
//! and the physical resources resolved for it, then driven every frame.
//!
//! # Lifecycle
//! - construction: compile time, may fail (shader compilation, framebuffer
//!   creation)
//! - `before_render`: CPU-side precompute; must not rely on GPU state
//! - `perform`: issues GPU commands; sets every piece of fixed-function state
//!   it depends on
//! - `after_render`: optional
//! - `dispose`: graph teardown; consumes the operator so it cannot be used
//!   afterwards
//!
//! Per-frame hooks never fail. A resize disposes the operator and builds a
//! new one.

use super::context::FrameContext;
use crate::renderer::core::GpuDevice;

pub trait RenderOperator {
    /// Name used for logging.
    fn name(&self) -> &str;

    fn before_render(&mut self, _ctx: &mut FrameContext<'_>) {}

    fn perform(&mut self, ctx: &mut FrameContext<'_>);

    fn after_render(&mut self, _ctx: &mut FrameContext<'_>) {}

    /// Releases the GPU objects this operator created.
    fn dispose(self: Box<Self>, device: &mut dyn GpuDevice);
}
