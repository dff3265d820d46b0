use crate::atlas::RegionCanvas;
use glam::Vec2;
use std::cell::RefCell;
use std::rc::Rc;

/// An externally driven animated artboard that can draw itself into the atlas.
///
/// The renderer never inspects the animation; it only asks the payload to
/// render into a canvas already transformed by the sprite's fit and alignment.
pub trait RenderPayload {
    /// Bounds of the artboard in its own units.
    fn intrinsic_size(&self) -> Vec2;

    /// Advances the animation by `elapsed` seconds.
    fn advance(&mut self, elapsed: f32);

    /// Rebuilds the animation at its deterministic rest frame.
    fn reset_to_rest(&mut self);

    fn render(&mut self, canvas: &mut RegionCanvas<'_>);
}

/// Payload shared between a sprite handle (which animates it) and the
/// renderer (which draws it).
pub type SharedPayload = Rc<RefCell<dyn RenderPayload>>;

pub fn share<P: RenderPayload + 'static>(payload: P) -> SharedPayload {
    Rc::new(RefCell::new(payload))
}
