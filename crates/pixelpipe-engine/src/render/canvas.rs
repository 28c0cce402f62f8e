use winit::dpi::PhysicalSize;

/// Color format of the canvas.
///
/// Plain 8-bit RGBA so readback bytes map one-to-one onto exported pixels.
pub(crate) const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Canvas dimensions in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub(crate) fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl From<PhysicalSize<u32>> for CanvasSize {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Persistent drawing buffer: color + depth attachments of a fixed size.
///
/// Contents survive until the next draw or resize, which is what makes
/// readback possible at any time.
pub(crate) struct Canvas {
    size: CanvasSize,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl Canvas {
    /// Creates the attachments. `size` must be non-empty.
    pub(crate) fn new(device: &wgpu::Device, size: CanvasSize) -> Self {
        debug_assert!(!size.is_empty());

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixelpipe canvas color"),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixelpipe canvas depth"),
            size: size.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            size,
            color,
            color_view,
            depth_view,
        }
    }

    #[inline]
    pub(crate) fn size(&self) -> CanvasSize {
        self.size
    }

    #[inline]
    pub(crate) fn color_texture(&self) -> &wgpu::Texture {
        &self.color
    }

    #[inline]
    pub(crate) fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    #[inline]
    pub(crate) fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }
}
