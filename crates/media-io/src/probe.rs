use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{MediaError, MediaKind};

#[derive(Debug, Clone, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeJson {
    streams: Option<Vec<FfprobeStream>>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<(u32, u32)>,
    pub duration_seconds: Option<f64>,
}

fn parse_rate(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    if s == "0/0" || s == "0" || s.is_empty() {
        return None;
    }
    if let Some((a, b)) = s.split_once('/') {
        let num = a.parse().ok()?;
        let den = b.parse().ok()?;
        if den == 0 {
            return None;
        }
        return Some((num, den));
    }
    let v: u32 = s.parse().ok()?;
    Some((v, 1))
}

pub fn probe_media(path: &Path) -> Result<MediaInfo, MediaError> {
    let ffprobe = which::which("ffprobe").map_err(|_| MediaError::ToolMissing("ffprobe"))?;
    if !path.exists() {
        return Err(MediaError::NotFound(path.to_path_buf()));
    }
    let out = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_format")
        .arg("-show_streams")
        .arg("-print_format")
        .arg("json")
        .arg(path)
        .output()?;
    if !out.status.success() {
        return Err(MediaError::CommandFailed {
            tool: "ffprobe",
            message: String::from_utf8_lossy(&out.stderr).into(),
        });
    }
    parse_probe_output(path, &out.stdout)
}

pub(crate) fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<MediaInfo, MediaError> {
    let parsed: FfprobeJson =
        serde_json::from_slice(stdout).map_err(|e| MediaError::Parse(e.to_string()))?;

    // Extension wins; stream types only decide for unknown containers.
    let mut kind = MediaKind::from_path(path);
    let mut width = None;
    let mut height = None;
    let mut fps = None;
    let mut stream_duration = None;

    for s in parsed.streams.iter().flatten() {
        match s.codec_type.as_deref() {
            Some("video") => {
                kind.get_or_insert(MediaKind::Video);
                width = width.or(s.width);
                height = height.or(s.height);
                fps = fps
                    .or_else(|| s.avg_frame_rate.as_deref().and_then(parse_rate))
                    .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate));
            }
            Some("audio") => {
                kind.get_or_insert(MediaKind::Audio);
            }
            _ => {}
        }
        stream_duration =
            stream_duration.or_else(|| s.duration.as_deref().and_then(|d| d.parse().ok()));
    }

    let duration_seconds = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .or(stream_duration)
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(MediaInfo {
        path: path.to_path_buf(),
        kind: kind.unwrap_or(MediaKind::Video),
        width,
        height,
        fps,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_duration_and_video_stream() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001"},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "30.500000"}
        }"#;
        let info = parse_probe_output(Path::new("a.mp4"), json).unwrap();
        assert_eq!(info.kind, MediaKind::Video);
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.fps, Some((30000, 1001)));
        assert_eq!(info.duration_seconds, Some(30.5));
    }

    #[test]
    fn falls_back_to_stream_duration_and_drops_zero() {
        let json = br#"{"streams": [{"codec_type": "audio", "duration": "12.0"}], "format": {}}"#;
        let info = parse_probe_output(Path::new("song.mp3"), json).unwrap();
        assert_eq!(info.kind, MediaKind::Audio);
        assert_eq!(info.duration_seconds, Some(12.0));

        let json = br#"{"streams": [], "format": {"duration": "0"}}"#;
        let info = parse_probe_output(Path::new("still.png"), json).unwrap();
        assert_eq!(info.kind, MediaKind::Image);
        assert_eq!(info.duration_seconds, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_probe_output(Path::new("a.mp4"), b"not json"),
            Err(MediaError::Parse(_))
        ));
    }

    #[test]
    fn rate_parsing() {
        assert_eq!(parse_rate("25"), Some((25, 1)));
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("30/0"), None);
    }
}
