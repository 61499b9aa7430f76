use thiserror::Error;

mod model;
pub use model::*;
mod state;
pub use state::*;
mod placement;
pub use placement::*;
mod snap;
pub use snap::*;
pub mod editing;
mod history;
pub use history::*;
mod config;
pub use config::*;
mod playback;
pub use playback::*;
mod import;
pub use import::*;
mod thumbnails;
pub use thumbnails::*;
mod timecode;
pub use timecode::*;
mod editor;
pub use editor::*;
mod commands;
pub use commands::*;

pub use media_io::{MediaError, MediaKind, MediaService};

/// Two intervals on one track may overlap by at most this much.
pub const OVERLAP_EPSILON: f64 = 0.01;
/// Absolute end of the timeline, in seconds.
pub const TIMELINE_CEILING: f64 = 7200.0;
pub const MIN_CLIP_DURATION: f64 = 0.1;
pub const DEFAULT_CLIP_SECONDS: f64 = 10.0;
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("{candidates} clips under the playhead; select the one to split")]
    AmbiguousSplit { candidates: usize },
    #[error("no clip under the playhead")]
    NothingUnderPlayhead,
    #[error("selected clip is not under the playhead")]
    SelectionNotUnderPlayhead,
    #[error("clipboard is empty")]
    ClipboardEmpty,
    #[error("clip not found: {0}")]
    ClipNotFound(ClipId),
    #[error("asset not found: {0}")]
    AssetNotFound(String),
    #[error("asset already exists: {0}")]
    AssetExists(String),
    #[error("track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
    #[error("media service failed: {0}")]
    External(#[from] MediaError),
    #[error("invalid operation: {0}")]
    InvalidOp(String),
}
