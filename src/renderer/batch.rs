// renderer/batch.rs
use super::payload::SharedPayload;
use super::registry::{SpriteId, SpriteRegistry};
use crate::atlas::{
    AtlasSurface, BinPackingStrategy, MaxRectsPacker, PackError, PackerStats, Region,
    RegionCanvas,
};
use crate::error::AtlasError;
use crate::settings::AtlasSettings;
use crate::sprite::SpriteLayout;
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, UVec2, Vec2};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// The renderer as shared between the frame loop and every sprite handle.
pub type SharedRenderer = Rc<RefCell<BatchRenderer>>;

/// What the renderer needs to know about a sprite to pack and draw it.
pub trait Sprite {
    fn sprite_id(&self) -> SpriteId;

    /// Backing resolution requested in the atlas.
    fn desired_size(&self) -> UVec2;

    fn payload(&self) -> SharedPayload;

    fn layout(&self) -> SpriteLayout;
}

/// Where a sprite currently lives in the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureFrame {
    pub region: Region,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
    /// Repack generation the frame was read at.
    pub generation: u64,
}

impl TextureFrame {
    pub fn rotated(&self) -> bool {
        self.region.rotated
    }

    pub fn uniform(&self) -> FrameUniform {
        FrameUniform {
            uv_min: self.uv_min.to_array(),
            uv_max: self.uv_max.to_array(),
            rotated: self.region.rotated as u32,
            _padding: [0; 3],
        }
    }
}

/// GPU layout of a [`TextureFrame`] for sampling the atlas in a shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniform {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub rotated: u32,
    pub _padding: [u32; 3],
}

/// Outcome of one [`BatchRenderer::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlushReport {
    pub repacked: bool,
    pub drawn: usize,
    pub uploaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RendererStats {
    pub packer: PackerStats,
    pub registered: usize,
    pub pending: usize,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub repack_generation: u64,
    pub flushes: u64,
    pub uploads: u64,
}

/// Batches every registered sprite into one shared atlas.
///
/// Registration changes only mark the atlas dirty; the repack, the draw pass
/// and the single upload all happen in [`flush`](Self::flush).
pub struct BatchRenderer {
    packer: Box<dyn BinPackingStrategy>,
    surface: Box<dyn AtlasSurface>,
    registry: SpriteRegistry,
    settings: AtlasSettings,
    /// Set when the current inputs cannot be packed. Cleared by any change to
    /// the registered set or sizes.
    repack_failure: Option<PackError>,
    repack_generation: u64,
    flushes: u64,
    uploads: u64,
}

impl BatchRenderer {
    pub fn new(settings: AtlasSettings, surface: Box<dyn AtlasSurface>) -> Self {
        let packer = Box::new(MaxRectsPacker::new(settings.packer.clone()));
        Self::with_packer(settings, packer, surface)
    }

    pub fn with_packer(
        settings: AtlasSettings,
        packer: Box<dyn BinPackingStrategy>,
        surface: Box<dyn AtlasSurface>,
    ) -> Self {
        Self {
            packer,
            surface,
            registry: SpriteRegistry::new(),
            settings,
            repack_failure: None,
            repack_generation: 0,
            flushes: 0,
            uploads: 0,
        }
    }

    pub fn into_shared(self) -> SharedRenderer {
        Rc::new(RefCell::new(self))
    }

    pub fn settings(&self) -> &AtlasSettings {
        &self.settings
    }

    pub fn surface(&self) -> &dyn AtlasSurface {
        self.surface.as_ref()
    }

    pub fn atlas_size(&self) -> UVec2 {
        self.surface.size()
    }

    pub fn repack_generation(&self) -> u64 {
        self.repack_generation
    }

    pub fn is_dirty(&self) -> bool {
        self.registry.is_dirty()
    }

    pub fn is_registered(&self, id: SpriteId) -> bool {
        self.registry.is_registered(id)
    }

    /// Claims an identity for a new sprite. It stays unregistered until
    /// [`register`](Self::register) is called.
    pub fn reserve(&mut self) -> SpriteId {
        self.registry.reserve()
    }

    /// Unregisters the sprite and frees its identity for reuse.
    pub fn release(&mut self, id: SpriteId) {
        self.unregister_id(id);
        self.registry.release(id);
    }

    /// Returns whether the sprite is registered afterwards.
    pub fn register<S: Sprite + ?Sized>(&mut self, sprite: &S) -> bool {
        let id = sprite.sprite_id();
        if self.registry.is_registered(id) {
            return true;
        }

        let desired_size = sprite.desired_size();
        if !self
            .registry
            .insert(id, desired_size, sprite.payload(), sprite.layout())
        {
            warn!("Cannot register sprite {}: its slot was released", id);
            return false;
        }

        self.repack_failure = None;
        debug!(
            "Registered sprite {} at {}x{}",
            id, desired_size.x, desired_size.y
        );
        true
    }

    pub fn unregister<S: Sprite + ?Sized>(&mut self, sprite: &S) {
        self.unregister_id(sprite.sprite_id());
    }

    fn unregister_id(&mut self, id: SpriteId) {
        if self.registry.remove(id) {
            self.repack_failure = None;
            debug!("Unregistered sprite {}", id);
        }
    }

    /// Re-reads the sprite's desired size. The region is reassigned by the
    /// next repack.
    pub fn invalidate_size<S: Sprite + ?Sized>(&mut self, sprite: &S) {
        let id = sprite.sprite_id();
        let desired_size = sprite.desired_size();
        if self.registry.set_desired_size(id, desired_size) {
            self.repack_failure = None;
            debug!(
                "Sprite {} now wants {}x{}",
                id, desired_size.x, desired_size.y
            );
        }
    }

    pub fn mark_for_render<S: Sprite + ?Sized>(&mut self, sprite: &S) {
        let id = sprite.sprite_id();
        if !self.registry.mark_pending(id, sprite.layout()) {
            warn!("Sprite {} marked for render while unregistered", id);
        }
    }

    /// Current atlas placement of a registered sprite, if it has been packed.
    pub fn frame(&self, id: SpriteId) -> Option<TextureFrame> {
        let region = self.registry.region(id)?;
        let (uv_min, uv_max) = region.uv_bounds(self.surface.size());
        Some(TextureFrame {
            region,
            uv_min,
            uv_max,
            generation: self.repack_generation,
        })
    }

    /// Repacks if needed, draws every pending sprite and uploads once.
    ///
    /// A failed repack is not retried until the registered set or a size
    /// changes; until then sprites keep the regions of the last successful
    /// repack.
    pub fn flush(&mut self) -> Result<FlushReport, AtlasError> {
        self.flushes += 1;
        let mut report = FlushReport::default();

        if self.registry.is_dirty() {
            if let Some(err) = &self.repack_failure {
                debug!("Skipping repack of unchanged inputs: {}", err);
            } else if let Err(err) = self.repack() {
                error!("Atlas repack failed: {}", err);
                self.repack_failure = Some(err.clone());
                self.registry.take_pending();
                return Err(err.into());
            } else {
                report.repacked = true;
            }
        }

        if self.registry.pending_len() == 0 {
            return Ok(report);
        }

        let pending = self.registry.take_pending();
        self.surface.clear();

        for id in pending {
            let Some(target) = self.registry.draw_target(id) else {
                continue;
            };
            let Ok(mut payload) = target.payload.try_borrow_mut() else {
                warn!("Skipping sprite {}: payload is borrowed elsewhere", id);
                continue;
            };

            let content = payload.intrinsic_size();
            let layout = target.layout;
            let mut draw = |canvas: &mut RegionCanvas<'_>| {
                canvas.set_layout(layout.transform(content, canvas.size()));
                payload.render(canvas);
            };
            self.surface.draw_region(target.region, &mut draw);
            report.drawn += 1;
        }

        self.surface.upload();
        self.uploads += 1;
        report.uploaded = true;

        debug!(
            "Flushed {} sprites into {}x{} atlas",
            report.drawn,
            self.surface.size().x,
            self.surface.size().y
        );
        Ok(report)
    }

    fn repack(&mut self) -> Result<(), PackError> {
        let descriptors = self.registry.descriptors_by_area();
        let sizes: Vec<IVec2> = descriptors
            .iter()
            .map(|descriptor| packing_size(descriptor.desired_size))
            .collect();

        self.packer.reset();
        self.packer.prepare_for_batch(&sizes)?;
        let mut regions = Vec::with_capacity(descriptors.len());
        for (descriptor, size) in descriptors.iter().zip(&sizes) {
            regions.push((descriptor.id, self.packer.allocate(size.x, size.y)?));
        }
        for (id, region) in regions {
            self.registry.assign_region(id, region);
        }

        let canvas = self.packer.canvas_dimensions();
        let current = self.surface.size();
        if canvas != current {
            info!(
                "Resizing atlas {}x{} -> {}x{}",
                current.x, current.y, canvas.x, canvas.y
            );
            self.surface.resize(canvas);
        }

        self.registry.mark_clean();
        self.repack_generation += 1;

        let stats = self.packer.stats();
        info!(
            "Repacked {} sprites into {}x{} ({:.1}% used)",
            descriptors.len(),
            canvas.x,
            canvas.y,
            stats.efficiency * 100.0
        );
        Ok(())
    }

    pub fn stats(&self) -> RendererStats {
        let size = self.surface.size();
        RendererStats {
            packer: self.packer.stats(),
            registered: self.registry.len(),
            pending: self.registry.pending_len(),
            atlas_width: size.x,
            atlas_height: size.y,
            repack_generation: self.repack_generation,
            flushes: self.flushes,
            uploads: self.uploads,
        }
    }

    /// Drops every sprite and frees the atlas storage.
    pub fn destroy(&mut self) {
        self.registry.clear();
        self.repack_failure = None;
        self.surface.release();
        info!("Batch renderer destroyed");
    }
}

fn packing_size(size: UVec2) -> IVec2 {
    size.min(UVec2::splat(i32::MAX as u32)).as_ivec2()
}
