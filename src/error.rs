use crate::atlas::PackError;

/// Errors surfaced by the batch renderer and its surfaces.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("atlas bound of {requested}px exceeds the device limit of {limit}px")]
    ExceedsDeviceLimit { requested: u32, limit: u32 },
    #[error("gpu unavailable: {0}")]
    Gpu(String),
    #[error("failed to write atlas snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}
