use std::path::{Path, PathBuf};

use crate::{EncodedFrame, ExportClip, ExportJob, MediaError, MediaInfo};

/// Request/response boundary to whatever decodes, probes and encodes media.
///
/// Implementations are treated as pure, possibly slow functions. Callers own
/// all timeline state and only hand over paths and times.
pub trait MediaService: Send + Sync {
    fn probe_metadata(&self, path: &Path) -> Result<MediaInfo, MediaError>;

    /// Writes a still of `file_name` at `at_seconds` into the project's
    /// thumbnail folder and returns its path.
    fn generate_thumbnail(
        &self,
        project: &Path,
        file_name: &str,
        at_seconds: f64,
    ) -> Result<PathBuf, MediaError>;

    fn render_frame(&self, path: &Path, at_millis: u64) -> Result<EncodedFrame, MediaError>;

    fn extract_audio_track(&self, project: &Path, file_name: &str) -> Result<PathBuf, MediaError>;

    /// Copies `file` into the project's media folder and returns the stored file name.
    fn import_asset(&self, project: &Path, file: &Path) -> Result<String, MediaError>;

    fn rename_file(&self, old: &Path, new: &Path) -> Result<(), MediaError>;

    fn delete_file(&self, path: &Path) -> Result<(), MediaError>;

    fn export_video(
        &self,
        project: &Path,
        export_path: &Path,
        clips: Vec<ExportClip>,
    ) -> Result<ExportJob, MediaError>;

    fn list_assets(&self, project: &Path) -> Result<Vec<String>, MediaError>;
}
