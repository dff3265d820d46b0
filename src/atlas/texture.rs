// atlas/texture.rs (GPU-backed atlas)

use super::canvas::RegionCanvas;
use super::rect::Region;
use super::surface::{AtlasSurface, PixelSurface};
use crate::error::AtlasError;
use crate::settings::AtlasSettings;
use glam::UVec2;
use image::RgbaImage;

/// Sampled RGBA8 texture the atlas is uploaded into.
#[derive(Debug)]
pub struct AtlasTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl AtlasTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// wgpu rejects zero-sized textures, so an empty atlas is backed by 1x1.
    fn extent(size: UVec2) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: size.x.max(1),
            height: size.y.max(1),
            depth_or_array_layers: 1,
        }
    }

    pub fn new(device: &wgpu::Device, size: UVec2, label: Option<&str>) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: Self::extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler_label = label.map(|name| format!("{name} Sampler"));
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: sampler_label.as_deref(),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    pub fn size(&self) -> UVec2 {
        let size = self.texture.size();
        UVec2::new(size.width, size.height)
    }
}

/// Atlas drawn on the CPU and uploaded to a wgpu texture once per flush.
pub struct GpuAtlasSurface {
    device: wgpu::Device,
    queue: wgpu::Queue,
    staging: PixelSurface,
    texture: AtlasTexture,
}

impl GpuAtlasSurface {
    const LABEL: &'static str = "Sprite Atlas";

    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        settings: &AtlasSettings,
    ) -> Result<Self, AtlasError> {
        let limit = device.limits().max_texture_dimension_2d;
        let requested = settings.packer.max_width.max(settings.packer.max_height);
        if requested > limit {
            return Err(AtlasError::ExceedsDeviceLimit { requested, limit });
        }

        let texture = AtlasTexture::new(&device, UVec2::ZERO, Some(Self::LABEL));
        Ok(Self {
            device,
            queue,
            staging: PixelSurface::new(settings.clear_color),
            texture,
        })
    }

    /// Creates a headless device and the surface on top of it.
    pub async fn request(settings: &AtlasSettings) -> Result<Self, AtlasError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| AtlasError::Gpu(err.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Sprite Atlas Device"),
                ..Default::default()
            })
            .await
            .map_err(|err| AtlasError::Gpu(err.to_string()))?;

        log::info!("Atlas uploads go to {:?}", adapter.get_info().name);
        Self::new(device, queue, settings)
    }

    pub fn texture(&self) -> &AtlasTexture {
        &self.texture
    }

    pub fn staging(&self) -> &PixelSurface {
        &self.staging
    }
}

impl AtlasSurface for GpuAtlasSurface {
    fn size(&self) -> UVec2 {
        self.staging.size()
    }

    fn resize(&mut self, size: UVec2) {
        self.staging.resize(size);
        if self.texture.size() != size.max(UVec2::ONE) {
            self.texture = AtlasTexture::new(&self.device, size, Some(Self::LABEL));
            log::debug!("Recreated atlas texture at {}x{}", size.x, size.y);
        }
    }

    fn clear(&mut self) {
        self.staging.clear();
    }

    fn draw_region(&mut self, region: Region, draw: &mut dyn FnMut(&mut RegionCanvas<'_>)) {
        self.staging.draw_region(region, draw);
    }

    fn upload(&mut self) {
        let size = self.staging.size();
        if size.x == 0 || size.y == 0 {
            return;
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            self.staging.pixels().as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.x),
                rows_per_image: Some(size.y),
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
        );
    }

    fn release(&mut self) {
        self.staging.release();
        self.texture = AtlasTexture::new(&self.device, UVec2::ZERO, Some(Self::LABEL));
    }

    fn pixels(&self) -> &RgbaImage {
        self.staging.pixels()
    }
}
