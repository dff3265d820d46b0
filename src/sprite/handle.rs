use super::layout::{Alignment, Fit, SpriteLayout};
use crate::renderer::{SharedPayload, SharedRenderer, Sprite, SpriteId, TextureFrame};
use glam::{UVec2, Vec2};
use log::warn;

/// Consumer-side wrapper around one animated payload drawn through the shared
/// atlas.
///
/// The desired size is the backing resolution in the atlas. The display size
/// is how large the consumer shows the sprite and never affects packing.
pub struct SpriteHandle {
    id: SpriteId,
    renderer: SharedRenderer,
    payload: SharedPayload,
    desired_size: UVec2,
    display_size: Vec2,
    layout: SpriteLayout,
    visible: bool,
    paused: bool,
    last_tick_ms: Option<f64>,
    settle_frames: u32,
    settle_frames_left: u32,
    seen_generation: u64,
}

impl SpriteHandle {
    pub fn new(renderer: &SharedRenderer, payload: SharedPayload, desired_size: UVec2) -> Self {
        let (id, settle_frames, seen_generation) = {
            let mut renderer = renderer.borrow_mut();
            (
                renderer.reserve(),
                renderer.settings().settle_frames,
                renderer.repack_generation(),
            )
        };

        Self {
            id,
            renderer: renderer.clone(),
            payload,
            desired_size,
            display_size: desired_size.as_vec2(),
            layout: SpriteLayout::default(),
            visible: false,
            paused: false,
            last_tick_ms: None,
            settle_frames,
            settle_frames_left: settle_frames,
            seen_generation,
        }
    }

    pub fn id(&self) -> SpriteId {
        self.id
    }

    /// Advances the payload to `now_ms` and queues it for this frame's flush.
    ///
    /// Paused handles only draw during the settle window that follows
    /// creation, pausing, a size change or a repack.
    pub fn draw(&mut self, now_ms: f64) {
        let advancing = !self.paused;
        if advancing {
            let elapsed_ms = self
                .last_tick_ms
                .map_or(0.0, |last| (now_ms - last).max(0.0));
            self.last_tick_ms = Some(now_ms);
            self.payload.borrow_mut().advance((elapsed_ms / 1000.0) as f32);
        }

        let mut renderer = self.renderer.borrow_mut();
        if renderer.repack_generation() != self.seen_generation {
            self.seen_generation = renderer.repack_generation();
            self.settle_frames_left = self.settle_frames;
        }

        let settling = self.settle_frames_left > 0;
        if settling {
            self.settle_frames_left -= 1;
        }

        if (advancing || settling) && renderer.is_registered(self.id) {
            renderer.mark_for_render(&*self);
        }
    }

    /// Freezes the animation at its rest pose. Repeated calls do nothing.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.last_tick_ms = None;
        self.payload.borrow_mut().reset_to_rest();
        self.settle_frames_left = self.settle_frames;
    }

    /// Continues from the next `draw` without replaying the paused interval.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.last_tick_ms = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn desired_size(&self) -> UVec2 {
        self.desired_size
    }

    pub fn set_desired_size(&mut self, desired_size: UVec2) {
        if desired_size == self.desired_size {
            return;
        }
        self.desired_size = desired_size;
        self.settle_frames_left = self.settle_frames;
        self.renderer.borrow_mut().invalidate_size(&*self);
    }

    pub fn display_size(&self) -> Vec2 {
        self.display_size
    }

    pub fn set_display_size(&mut self, display_size: Vec2) {
        self.display_size = display_size;
    }

    pub fn layout(&self) -> SpriteLayout {
        self.layout
    }

    pub fn set_layout(&mut self, fit: Fit, alignment: Alignment) {
        self.layout = SpriteLayout::new(fit, alignment);
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn register_with_renderer(&mut self) {
        if !self.renderer.borrow_mut().register(&*self) {
            return;
        }
        if !self.visible {
            self.settle_frames_left = self.settle_frames;
        }
        self.visible = true;
    }

    pub fn unregister_from_renderer(&mut self) {
        self.renderer.borrow_mut().unregister(&*self);
        self.visible = false;
    }

    /// Current atlas placement, or `None` before the first repack.
    pub fn texture_frame(&self) -> Option<TextureFrame> {
        self.renderer.borrow().frame(self.id)
    }

    pub fn payload(&self) -> &SharedPayload {
        &self.payload
    }
}

impl Sprite for SpriteHandle {
    fn sprite_id(&self) -> SpriteId {
        self.id
    }

    fn desired_size(&self) -> UVec2 {
        self.desired_size
    }

    fn payload(&self) -> SharedPayload {
        self.payload.clone()
    }

    fn layout(&self) -> SpriteLayout {
        self.layout
    }
}

impl Drop for SpriteHandle {
    fn drop(&mut self) {
        match self.renderer.try_borrow_mut() {
            Ok(mut renderer) => renderer.release(self.id),
            Err(_) => warn!(
                "Sprite {} dropped while the renderer was borrowed; slot not released",
                self.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{PixelSurface, RegionCanvas};
    use crate::renderer::{BatchRenderer, RenderPayload};
    use crate::settings::AtlasSettings;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        advanced: Vec<f32>,
        resets: usize,
    }

    impl Recorder {
        fn total(&self) -> f32 {
            self.advanced.iter().sum()
        }
    }

    impl RenderPayload for Recorder {
        fn intrinsic_size(&self) -> Vec2 {
            Vec2::splat(10.0)
        }
        fn advance(&mut self, elapsed: f32) {
            self.advanced.push(elapsed);
        }
        fn reset_to_rest(&mut self) {
            self.resets += 1;
        }
        fn render(&mut self, _canvas: &mut RegionCanvas<'_>) {}
    }

    fn setup(settle_frames: u32) -> (SharedRenderer, Rc<RefCell<Recorder>>, SpriteHandle) {
        let settings = AtlasSettings {
            settle_frames,
            ..AtlasSettings::default()
        };
        let renderer = BatchRenderer::new(settings, Box::new(PixelSurface::default())).into_shared();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let payload: SharedPayload = recorder.clone();
        let handle = SpriteHandle::new(&renderer, payload, UVec2::new(32, 32));
        (renderer, recorder, handle)
    }

    fn pending(renderer: &SharedRenderer) -> usize {
        renderer.borrow().stats().pending
    }

    #[test]
    fn first_draw_advances_by_zero() {
        let (_renderer, recorder, mut handle) = setup(0);
        handle.draw(1234.0);
        handle.draw(1250.0);
        let advanced = recorder.borrow().advanced.clone();
        assert_eq!(advanced.len(), 2);
        assert_eq!(advanced[0], 0.0);
        assert!((advanced[1] - 0.016).abs() < 1e-6);
    }

    #[test]
    fn paused_time_is_never_replayed() {
        let (_renderer, recorder, mut handle) = setup(0);
        handle.draw(0.0);
        handle.draw(100.0);
        handle.pause();
        handle.draw(500.0);
        handle.draw(900.0);
        handle.resume();
        handle.draw(1000.0);
        handle.draw(1016.0);

        let total = recorder.borrow().total();
        assert!((total - 0.116).abs() < 1e-5, "advanced {total}s");
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let (_renderer, recorder, mut handle) = setup(0);
        handle.pause();
        handle.pause();
        assert_eq!(recorder.borrow().resets, 1);
        assert!(handle.is_paused());

        handle.resume();
        handle.resume();
        assert!(!handle.is_paused());
    }

    #[test]
    fn unregistered_handles_are_never_marked() {
        let (renderer, _recorder, mut handle) = setup(3);
        handle.draw(0.0);
        assert_eq!(pending(&renderer), 0);
    }

    #[test]
    fn paused_handles_draw_only_while_settling() {
        let (renderer, _recorder, mut handle) = setup(2);
        handle.register_with_renderer();
        renderer.borrow_mut().flush().unwrap();
        handle.pause();

        let mut marked = Vec::new();
        for frame in 0..4 {
            handle.draw(frame as f64 * 16.0);
            marked.push(pending(&renderer));
            renderer.borrow_mut().flush().unwrap();
        }
        assert_eq!(marked, vec![1, 1, 0, 0]);
    }

    #[test]
    fn running_handles_draw_every_frame() {
        let (renderer, _recorder, mut handle) = setup(0);
        handle.register_with_renderer();
        for frame in 0..3 {
            handle.draw(frame as f64 * 16.0);
            assert_eq!(pending(&renderer), 1);
            renderer.borrow_mut().flush().unwrap();
        }
        assert_eq!(renderer.borrow().stats().uploads, 3);
    }

    #[test]
    fn registration_toggles_visibility() {
        let (renderer, _recorder, mut handle) = setup(0);
        assert!(!handle.is_visible());

        handle.register_with_renderer();
        handle.register_with_renderer();
        assert!(handle.is_visible());
        assert_eq!(renderer.borrow().stats().registered, 1);

        handle.unregister_from_renderer();
        handle.unregister_from_renderer();
        assert!(!handle.is_visible());
        assert_eq!(renderer.borrow().stats().registered, 0);
    }

    #[test]
    fn rejected_registration_leaves_handle_hidden() {
        let (renderer, _recorder, mut handle) = setup(0);
        renderer.borrow_mut().destroy();

        handle.register_with_renderer();
        assert!(!handle.is_visible());
        handle.draw(0.0);
        assert_eq!(renderer.borrow().stats().pending, 0);
    }

    #[test]
    fn desired_size_is_decoupled_from_display_size() {
        let (renderer, _recorder, mut handle) = setup(0);
        handle.set_display_size(Vec2::new(300.0, 300.0));
        handle.register_with_renderer();
        renderer.borrow_mut().flush().unwrap();
        assert_eq!(handle.texture_frame().unwrap().region.rect.size(), UVec2::splat(32));

        handle.set_desired_size(UVec2::new(64, 16));
        assert!(renderer.borrow().is_dirty());
        renderer.borrow_mut().flush().unwrap();
        assert_eq!(
            handle.texture_frame().unwrap().region.rect.size(),
            UVec2::new(64, 16)
        );
        assert_eq!(handle.display_size(), Vec2::new(300.0, 300.0));
    }

    #[test]
    fn dropping_a_handle_unregisters_it() {
        let (renderer, _recorder, mut handle) = setup(0);
        handle.register_with_renderer();
        let id = handle.id();
        drop(handle);
        assert!(!renderer.borrow().is_registered(id));
        assert_eq!(renderer.borrow().stats().registered, 0);
    }
}
