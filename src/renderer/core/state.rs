//! Fixed-function GPU state.
//!
//! The device's depth/blend configuration is a single global resource shared
//! by every operator. Operators set what they need at the start of `perform`
//! and never assume a previous pass left the state compatible.

use bitflags::bitflags;

bitflags! {
    /// Toggleable fixed-function state.
    ///
    /// An empty set means: no depth test, no depth writes, no blending.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GpuStateFlags: u8 {
        const DEPTH_TEST  = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
        const BLEND       = 1 << 2;
    }
}

/// Source/destination blend factors applied to color writes when
/// [`GpuStateFlags::BLEND`] is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: wgpu::BlendFactor,
    pub dst: wgpu::BlendFactor,
}

impl BlendFunc {
    /// `ONE, ONE`: accumulates contributions.
    pub const ADDITIVE: Self = Self {
        src: wgpu::BlendFactor::One,
        dst: wgpu::BlendFactor::One,
    };

    /// `ONE, ONE_MINUS_SRC_ALPHA`: composites premultiplied color.
    pub const PREMULTIPLIED_ALPHA: Self = Self {
        src: wgpu::BlendFactor::One,
        dst: wgpu::BlendFactor::OneMinusSrcAlpha,
    };

    /// Blend state for a wgpu color target using this function on both
    /// color and alpha channels.
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BlendState {
        let component = wgpu::BlendComponent {
            src_factor: self.src,
            dst_factor: self.dst,
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    }
}
