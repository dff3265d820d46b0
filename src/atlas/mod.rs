pub mod canvas;
pub mod max_rects;
pub mod packer;
pub mod rect;
pub mod surface;
pub mod texture;

pub use canvas::RegionCanvas;
pub use max_rects::MaxRectsPacker;
pub use packer::{BinPackingStrategy, Heuristic, PackError, PackerConfig, PackerStats, SizeMode};
pub use rect::{Rect, Region};
pub use surface::{AtlasSurface, PixelSurface};
pub use texture::{AtlasTexture, GpuAtlasSurface};
