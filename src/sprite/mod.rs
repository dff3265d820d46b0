pub mod handle;
pub mod layout;

pub use handle::SpriteHandle;
pub use layout::{Alignment, Fit, SpriteLayout};
