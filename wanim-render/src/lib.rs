//! wanim Render Library
//!
//! A CPU implementation of the wanim raster contracts. Images are PNG
//! encoded, decoded lazily into an LRU cache and drawn with
//! nearest-neighbour sampling under the layer transform.

pub mod blend;
pub mod codec;
pub mod surface;

pub use codec::{decode_png, encode_png};
pub use surface::{CpuBackend, CpuSurface, DEFAULT_CACHE_CAPACITY};

/// Result type for wanim-render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for wanim-render operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wanim core error: {0}")]
    Core(#[from] wanim_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<Error> for wanim_core::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Core(e) => e,
            Error::Io(e) => wanim_core::Error::Io(e),
            Error::Image(e) => wanim_core::Error::Raster(e.to_string()),
        }
    }
}
