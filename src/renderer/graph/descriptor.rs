//! Render Buffer Descriptors
//!
//! A descriptor is immutable metadata describing a render target's shape and
//! format, never the target itself. Passes produce descriptors from their
//! `setup` calls and consume the descriptors of upstream passes; the frame
//! graph later resolves each one to a physical texture.
//!
//! Every descriptor carries a random [`RenderBufferId`]. Identity is
//! what links a producer's output to a consumer's input; the *shape*
//! ([`RenderBufferShape`]) is what must stay stable across rebuilds.

use std::borrow::Cow;

use uuid::Uuid;

/// Identity of one declared render buffer.
///
/// Ids are v4 UUIDs, so graphs built independently never share an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderBufferId(Uuid);

impl RenderBufferId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Storage format of a render buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBufferFormat {
    Rgba8,
    Srgba8,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth24Plus,
    Depth32Float,
    /// Not a texture: stands for the shadow map service's storage.
    ShadowMaps,
}

impl RenderBufferFormat {
    #[inline]
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24Plus | Self::Depth32Float)
    }

    /// The matching wgpu texture format, or `None` for virtual buffers.
    #[must_use]
    pub fn to_wgpu(self) -> Option<wgpu::TextureFormat> {
        let format = match self {
            Self::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            Self::Srgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            Self::R32Float => wgpu::TextureFormat::R32Float,
            Self::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
            Self::Depth32Float => wgpu::TextureFormat::Depth32Float,
            Self::ShadowMaps => return None,
        };
        Some(format)
    }
}

/// What the values stored in a buffer mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpaceTag {
    Linear,
    Log,
    Depth,
    LinearDepth,
    ShadowMap,
}

/// The parts of a descriptor that must match for two buffers to be
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderBufferShape {
    pub width: u32,
    pub height: u32,
    pub format: RenderBufferFormat,
    pub color_space: ColorSpaceTag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderBufferDescriptor {
    id: RenderBufferId,
    name: Cow<'static, str>,
    width: u32,
    height: u32,
    format: RenderBufferFormat,
    color_space: ColorSpaceTag,
}

impl RenderBufferDescriptor {
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        width: u32,
        height: u32,
        format: RenderBufferFormat,
        color_space: ColorSpaceTag,
    ) -> Self {
        Self {
            id: RenderBufferId::new(),
            name: name.into(),
            width,
            height,
            format,
            color_space,
        }
    }

    #[must_use]
    pub fn linear_rgb(
        name: impl Into<Cow<'static, str>>,
        width: u32,
        height: u32,
        format: RenderBufferFormat,
    ) -> Self {
        Self::new(name, width, height, format, ColorSpaceTag::Linear)
    }

    #[must_use]
    pub fn log_rgb(
        name: impl Into<Cow<'static, str>>,
        width: u32,
        height: u32,
        format: RenderBufferFormat,
    ) -> Self {
        Self::new(name, width, height, format, ColorSpaceTag::Log)
    }

    #[must_use]
    pub fn depth(name: impl Into<Cow<'static, str>>, width: u32, height: u32) -> Self {
        Self::new(
            name,
            width,
            height,
            RenderBufferFormat::Depth24Plus,
            ColorSpaceTag::Depth,
        )
    }

    #[must_use]
    pub fn linear_depth(name: impl Into<Cow<'static, str>>, width: u32, height: u32) -> Self {
        Self::new(
            name,
            width,
            height,
            RenderBufferFormat::R32Float,
            ColorSpaceTag::LinearDepth,
        )
    }

    #[must_use]
    pub fn shadow_maps(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(
            name,
            0,
            0,
            RenderBufferFormat::ShadowMaps,
            ColorSpaceTag::ShadowMap,
        )
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> RenderBufferId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> RenderBufferFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn color_space(&self) -> ColorSpaceTag {
        self.color_space
    }

    /// True for buffers usable as a depth attachment.
    #[inline]
    #[must_use]
    pub fn is_depth_buffer(&self) -> bool {
        self.format.is_depth()
    }

    #[inline]
    #[must_use]
    pub fn has_size(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    #[must_use]
    pub fn shape(&self) -> RenderBufferShape {
        RenderBufferShape {
            width: self.width,
            height: self.height,
            format: self.format,
            color_space: self.color_space,
        }
    }

    /// Texture descriptor for a wgpu-backed render target service.
    ///
    /// Returns `None` for virtual buffers that have no texture.
    #[must_use]
    pub fn texture_descriptor(&self) -> Option<wgpu::TextureDescriptor<'_>> {
        let format = self.format.to_wgpu()?;
        Some(wgpu::TextureDescriptor {
            label: Some(&self.name),
            size: wgpu::Extent3d {
                width: self.width.max(1),
                height: self.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    }
}
