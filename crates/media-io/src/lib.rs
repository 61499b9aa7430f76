use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod export;
mod ffmpeg;
mod probe;
mod service;

pub use export::{
    build_export_args, parse_progress_line, ExportEvent, ExportJob, ExportReporter, ExportSettings,
    ProgressLine,
};
pub use ffmpeg::FfmpegService;
pub use probe::{probe_media, MediaInfo};
pub use service::MediaService;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found on PATH; please install FFmpeg")]
    ToolMissing(&'static str),
    #[error("{tool} failed: {message}")]
    CommandFailed { tool: &'static str, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("nothing to export")]
    EmptyExport,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "webp"];
    pub const AUDIO_EXTENSIONS: &'static [&'static str] = &["mp3", "wav", "ogg"];
    pub const VIDEO_EXTENSIONS: &'static [&'static str] = &["mp4", "mkv", "avi", "mov"];

    /// Classify a file by extension, case-insensitively. `None` for anything unsupported.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if Self::AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_visual(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Image)
    }
}

/// Folder names inside a project directory.
pub mod layout {
    use std::path::{Path, PathBuf};

    pub const MEDIA_DIR: &str = "videos";
    pub const EXPORT_DIR: &str = "exports";
    pub const THUMBNAIL_DIR: &str = "thumbnails";
    pub const AUDIO_DIR: &str = "extracted_audios";

    pub const ALL: &[&str] = &[MEDIA_DIR, EXPORT_DIR, THUMBNAIL_DIR, AUDIO_DIR];

    pub fn media_path(project: &Path, file_name: &str) -> PathBuf {
        project.join(MEDIA_DIR).join(file_name)
    }

    /// Where the extracted audio track of a video asset lives.
    pub fn extracted_audio_path(project: &Path, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        project.join(AUDIO_DIR).join(format!("{stem}.mp3"))
    }

    pub fn thumbnail_path(project: &Path, file_name: &str, at_seconds: f64) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let millis = (at_seconds.max(0.0) * 1000.0).round() as u64;
        project
            .join(THUMBNAIL_DIR)
            .join(format!("{stem}_{millis}.jpg"))
    }
}

/// A single encoded still returned by `render_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// One entry of the clip list handed to the exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportClip {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub track_id: u32,
    /// Lower renders on top.
    pub layer: u32,
    pub start: f64,
    pub duration: f64,
    pub source_in: f64,
}
