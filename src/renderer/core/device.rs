//! GPU device abstraction.

use glam::{Mat3, Mat4, Vec2, Vec3};
use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::graph::descriptor::RenderBufferFormat;

use super::state::{BlendFunc, GpuStateFlags};

/// Handle to a physical texture owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Location of a uniform inside a specific program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Location of a vertex attribute inside a specific program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub u32);

/// A physical texture together with the shape it was allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureResource {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub format: RenderBufferFormat,
}

impl TextureResource {
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Attachments of a framebuffer to create.
#[derive(Debug, Clone, Default)]
pub struct FramebufferDesc {
    pub label: &'static str,
    pub colors: SmallVec<[TextureResource; 4]>,
    pub depth: Option<TextureResource>,
}

impl FramebufferDesc {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_color(mut self, texture: TextureResource) -> Self {
        self.colors.push(texture);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: Option<TextureResource>) -> Self {
        self.depth = depth;
        self
    }

    /// Checks that every attachment shares the size of the first one.
    pub fn validate(&self) -> Result<()> {
        let mut attachments = self
            .colors
            .iter()
            .map(|t| ("color", t))
            .chain(self.depth.iter().map(|t| ("depth", t)));

        let Some((_, first)) = attachments.next() else {
            return Ok(());
        };

        for (kind, texture) in attachments {
            if texture.size() != first.size() {
                return Err(UmbraError::AttachmentSizeMismatch {
                    attachment: format!("{} {kind}", self.label),
                    expected_width: first.width,
                    expected_height: first.height,
                    width: texture.width,
                    height: texture.height,
                });
            }
        }
        Ok(())
    }
}

/// A value uploaded to a uniform of the currently bound program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Mat3(Mat3),
    Mat4(Mat4),
}

/// The immediate-mode GPU surface operators issue commands against.
///
/// All calls happen on one thread in a fixed per-frame order. State set
/// through this trait persists until changed by anyone, including
/// collaborators such as the shadow map service.
pub trait GpuDevice {
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Hints that the bound framebuffer's color contents may be discarded
    /// because they are about to be overwritten entirely.
    fn invalidate_framebuffer(&mut self);

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);
    fn set_state_flags(&mut self, flags: GpuStateFlags);
    fn set_blend_func(&mut self, func: BlendFunc);
    fn set_depth_func(&mut self, func: wgpu::CompareFunction);
    fn clear_color(&mut self, color: [f32; 4]);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn use_program(&mut self, program: ProgramId);
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
}
