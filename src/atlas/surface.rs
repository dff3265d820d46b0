use super::canvas::RegionCanvas;
use super::rect::Region;
use crate::error::AtlasError;
use glam::UVec2;
use image::{Rgba, RgbaImage};
use std::path::Path;

/// The single shared drawing surface sprites are batched into.
///
/// Contents are not preserved across `resize`. `upload` pushes the whole
/// surface to the GPU and is called at most once per flush.
pub trait AtlasSurface {
    fn size(&self) -> UVec2;

    fn resize(&mut self, size: UVec2);

    fn clear(&mut self);

    /// Runs `draw` against a canvas restricted to `region`.
    fn draw_region(&mut self, region: Region, draw: &mut dyn FnMut(&mut RegionCanvas<'_>));

    fn upload(&mut self);

    fn release(&mut self);

    /// CPU copy of the atlas as last drawn.
    fn pixels(&self) -> &RgbaImage;

    /// Writes the CPU copy of the atlas to `path` as PNG.
    fn save_png(&self, path: &Path) -> Result<(), AtlasError> {
        let pixels = self.pixels();
        pixels.save_with_format(path, image::ImageFormat::Png)?;
        log::info!(
            "Wrote {}x{} atlas snapshot to {:?}",
            pixels.width(),
            pixels.height(),
            path
        );
        Ok(())
    }
}

/// CPU-side RGBA8 atlas store.
///
/// Used on its own for headless rendering and as the staging buffer of
/// [`GpuAtlasSurface`](super::texture::GpuAtlasSurface).
#[derive(Debug, Clone)]
pub struct PixelSurface {
    pixels: RgbaImage,
    clear_color: Rgba<u8>,
}

impl PixelSurface {
    pub fn new(clear_color: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            clear_color: Rgba(clear_color),
        }
    }

    pub fn clear_color(&self) -> Rgba<u8> {
        self.clear_color
    }

    /// Owned copy of the current atlas contents.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }

}

impl Default for PixelSurface {
    fn default() -> Self {
        Self::new([0, 0, 0, 0])
    }
}

impl AtlasSurface for PixelSurface {
    fn size(&self) -> UVec2 {
        UVec2::new(self.pixels.width(), self.pixels.height())
    }

    fn resize(&mut self, size: UVec2) {
        self.pixels = RgbaImage::from_pixel(size.x, size.y, self.clear_color);
    }

    fn clear(&mut self) {
        let texels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut *self.pixels);
        texels.fill(self.clear_color.0);
    }

    fn draw_region(&mut self, region: Region, draw: &mut dyn FnMut(&mut RegionCanvas<'_>)) {
        let mut canvas = RegionCanvas::new(&mut self.pixels, region);
        draw(&mut canvas);
    }

    fn upload(&mut self) {}

    fn release(&mut self) {
        self.pixels = RgbaImage::new(0, 0);
    }

    fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
