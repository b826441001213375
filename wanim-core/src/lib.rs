//! wanim Core Library
//!
//! This library provides the timeline composition engine behind the wanim
//! frame-by-frame animation format: interval-indexed layer content, the
//! layer compositor, the undo/redo command log and the binary container.

pub mod commands;
pub mod compositor;
pub mod container;
pub mod copy;
pub mod document;
pub mod easing;
pub mod frame;
pub mod interval;
pub mod layer;
pub mod log;
pub mod playback;
pub mod raster;
pub mod session;
pub mod settings;
pub mod time;
pub mod transition;
pub mod trim;

#[cfg(test)]
pub(crate) mod testing;

pub use compositor::{Compositor, ExportFrame};
pub use container::{FrameRecord, TransitionRecord, WanimContainer, WanimHeader};
pub use copy::{CopyList, CopyReference, CopySource, ListKind, ResolvedCopy, SegmentCopy};
pub use document::{Document, LayerLookup, NullObserver, TimelineObserver};
pub use easing::{AccelerationMode, Easing, EasingSpec};
pub use frame::{Frame, FrameList};
pub use interval::{Adjustment, IntervalItem, IntervalList, ItemId, Reduration, Resizable};
pub use layer::{Layer, LayerKey, LayerStyle};
pub use log::{Command, CommandLog, GroupCommand};
pub use playback::{CancellationToken, IntervalTicker, Playback, PlaybackOutcome, Ticker};
pub use raster::{BlendMode, Color, ImageHandle, ImageId, RasterBackend, Surface};
pub use session::{FrameEdit, Session};
pub use settings::Settings;
pub use time::Ms;
pub use transition::{BakeRaster, Property, Transition, TransitionList};
pub use trim::TrimmingRect;

/// Result type for wanim-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for wanim-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("\"{0}\" is not a valid property name")]
    InvalidProperty(String),

    #[error("\"{0}\" is an invalid acceleration mode")]
    InvalidAccelerationMode(String),

    #[error("\"{0}\" is not a supported blend mode")]
    InvalidBlendMode(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Copies may not refer to copy lists")]
    CopyOfCopyList,

    #[error("Layer index {0} is out of range")]
    LayerIndex(usize),

    #[error("Layer {0} is not part of the document")]
    LayerMissing(u64),

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Command state error: {0}")]
    CommandState(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Raster error: {0}")]
    Raster(String),

    #[error("Timeline has no finite end")]
    UnboundedTimeline,

    #[error("Truncated chunk '{0}'")]
    TruncatedChunk(char),

    #[error("Container has no header chunk")]
    MissingHeader,

    #[error("Value out of range for {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: f64 },

    #[error("Configuration error: {0}")]
    Config(String),
}
