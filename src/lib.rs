pub mod atlas;
pub mod error;
pub mod renderer;
pub mod settings;
pub mod sprite;
pub mod time;

pub use atlas::{
    AtlasSurface, BinPackingStrategy, GpuAtlasSurface, MaxRectsPacker, PackError, PackerConfig,
    PixelSurface, Region, RegionCanvas,
};
pub use error::AtlasError;
pub use renderer::{BatchRenderer, RenderPayload, SharedRenderer, Sprite, SpriteId, TextureFrame};
pub use settings::AtlasSettings;
pub use sprite::{Alignment, Fit, SpriteHandle, SpriteLayout};
pub use time::FrameClock;

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    // Set panic hook to get better error messages
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    let _ = console_log::init_with_level(log::Level::Info);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
