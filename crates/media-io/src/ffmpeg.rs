use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::export::{build_export_args, ExportJob, ExportSettings};
use crate::{layout, probe, EncodedFrame, ExportClip, MediaError, MediaInfo, MediaKind, MediaService};

/// `MediaService` backed by the ffmpeg/ffprobe binaries on PATH.
#[derive(Debug, Clone, Default)]
pub struct FfmpegService {
    pub export: ExportSettings,
    pub thumbnail_width: u32,
}

impl FfmpegService {
    pub fn new() -> Self {
        Self {
            export: ExportSettings::default(),
            thumbnail_width: 320,
        }
    }

    /// True when both binaries resolve on PATH.
    pub fn available() -> bool {
        which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
    }

    fn ffmpeg() -> Result<PathBuf, MediaError> {
        which::which("ffmpeg").map_err(|_| MediaError::ToolMissing("ffmpeg"))
    }

    fn run(cmd: &mut Command) -> Result<Vec<u8>, MediaError> {
        let out = cmd.output()?;
        if !out.status.success() {
            return Err(MediaError::CommandFailed {
                tool: "ffmpeg",
                message: String::from_utf8_lossy(&out.stderr).into(),
            });
        }
        Ok(out.stdout)
    }
}

impl MediaService for FfmpegService {
    fn probe_metadata(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        probe::probe_media(path)
    }

    fn generate_thumbnail(
        &self,
        project: &Path,
        file_name: &str,
        at_seconds: f64,
    ) -> Result<PathBuf, MediaError> {
        let input = layout::media_path(project, file_name);
        if !input.exists() {
            return Err(MediaError::NotFound(input));
        }
        let output = layout::thumbnail_path(project, file_name, at_seconds);
        if output.exists() {
            return Ok(output);
        }
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)?;
        }
        let width = if self.thumbnail_width == 0 { 320 } else { self.thumbnail_width };
        Self::run(
            Command::new(Self::ffmpeg()?)
                .arg("-ss")
                .arg(format!("{:.3}", at_seconds.max(0.0)))
                .arg("-i")
                .arg(&input)
                .arg("-vframes")
                .arg("1")
                .arg("-vf")
                .arg(format!("scale={width}:-2"))
                .arg("-y")
                .arg(&output),
        )?;
        debug!("thumbnail {} @{at_seconds}s", file_name);
        Ok(output)
    }

    fn render_frame(&self, path: &Path, at_millis: u64) -> Result<EncodedFrame, MediaError> {
        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }
        let bytes = Self::run(
            Command::new(Self::ffmpeg()?)
                .arg("-loglevel")
                .arg("error")
                .arg("-ss")
                .arg(format!("{:.3}", at_millis as f64 / 1000.0))
                .arg("-i")
                .arg(path)
                .arg("-frames:v")
                .arg("1")
                .arg("-f")
                .arg("image2pipe")
                .arg("-vcodec")
                .arg("mjpeg")
                .arg("-"),
        )?;
        if bytes.is_empty() {
            return Err(MediaError::Parse(format!(
                "no frame at {at_millis}ms in {}",
                path.display()
            )));
        }
        Ok(EncodedFrame {
            mime: "image/jpeg",
            bytes,
        })
    }

    fn extract_audio_track(&self, project: &Path, file_name: &str) -> Result<PathBuf, MediaError> {
        let input = layout::media_path(project, file_name);
        if !input.exists() {
            return Err(MediaError::NotFound(input));
        }
        let output = layout::extracted_audio_path(project, file_name);
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)?;
        }
        Self::run(
            Command::new(Self::ffmpeg()?)
                .arg("-i")
                .arg(&input)
                .arg("-vn")
                .arg("-acodec")
                .arg("libmp3lame")
                .arg("-q:a")
                .arg("2")
                .arg("-y")
                .arg(&output),
        )?;
        Ok(output)
    }

    fn import_asset(&self, project: &Path, file: &Path) -> Result<String, MediaError> {
        if !file.is_file() {
            return Err(MediaError::NotFound(file.to_path_buf()));
        }
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MediaError::NotFound(file.to_path_buf()))?;
        let dest = layout::media_path(project, &name);
        if let Some(dir) = dest.parent() {
            fs::create_dir_all(dir)?;
        }
        if dest != file {
            fs::copy(file, &dest)?;
        }
        info!("imported {} into {}", name, project.display());
        Ok(name)
    }

    fn rename_file(&self, old: &Path, new: &Path) -> Result<(), MediaError> {
        if !old.exists() {
            return Err(MediaError::NotFound(old.to_path_buf()));
        }
        if new.exists() {
            return Err(MediaError::AlreadyExists(new.to_path_buf()));
        }
        fs::rename(old, new)?;
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<(), MediaError> {
        if !path.exists() {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn export_video(
        &self,
        _project: &Path,
        export_path: &Path,
        clips: Vec<ExportClip>,
    ) -> Result<ExportJob, MediaError> {
        let args = build_export_args(&clips, export_path, &self.export)?;
        let total = clips
            .iter()
            .map(|c| c.start + c.duration)
            .fold(0.0f64, f64::max);
        if let Some(dir) = export_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut cmd = Command::new(Self::ffmpeg()?);
        cmd.args(&args);
        info!(
            "exporting {} clips ({total:.2}s) to {}",
            clips.len(),
            export_path.display()
        );
        ExportJob::spawn(cmd, total, export_path.to_path_buf())
    }

    fn list_assets(&self, project: &Path) -> Result<Vec<String>, MediaError> {
        let dir = project.join(layout::MEDIA_DIR);
        if !dir.is_dir() {
            return Err(MediaError::NotFound(dir));
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| MediaKind::from_path(Path::new(name)).is_some())
            .collect();
        names.sort();
        Ok(names)
    }
}
