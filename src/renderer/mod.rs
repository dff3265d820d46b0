pub mod batch;
pub mod payload;
pub mod registry;

pub use batch::{
    BatchRenderer, FlushReport, FrameUniform, RendererStats, SharedRenderer, Sprite, TextureFrame,
};
pub use payload::{share, RenderPayload, SharedPayload};
pub use registry::{Descriptor, SpriteId, SpriteRegistry};
