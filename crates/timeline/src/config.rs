use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{DEFAULT_CLIP_SECONDS, HISTORY_LIMIT, MIN_CLIP_DURATION, OVERLAP_EPSILON, TIMELINE_CEILING};

/// Editing behaviour knobs. Every field has a default so partial JSON works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub snap_enabled: bool,
    pub history_limit: usize,
    /// Quiet period before an untracked change is captured into history.
    pub capture_quiet_ms: u64,
    pub overlap_epsilon: f64,
    pub default_clip_seconds: f64,
    pub image_clip_seconds: f64,
    /// Duration used when metadata is missing.
    pub placeholder_duration: f64,
    pub timeline_ceiling: f64,
    pub min_clip_duration: f64,
    pub playback: PlaybackConfig,
    pub viewport: ViewportConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_enabled: false,
            history_limit: HISTORY_LIMIT,
            capture_quiet_ms: 500,
            overlap_epsilon: OVERLAP_EPSILON,
            default_clip_seconds: DEFAULT_CLIP_SECONDS,
            image_clip_seconds: DEFAULT_CLIP_SECONDS,
            placeholder_duration: DEFAULT_CLIP_SECONDS,
            timeline_ceiling: TIMELINE_CEILING,
            min_clip_duration: MIN_CLIP_DURATION,
            playback: PlaybackConfig::default(),
            viewport: ViewportConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn capture_quiet(&self) -> Duration {
        Duration::from_millis(self.capture_quiet_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How often the visible `current_time` is republished while playing.
    pub publish_interval_ms: u64,
    /// Audio players are only re-seeked past this drift, in seconds.
    pub audio_drift_tolerance: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: 100,
            audio_drift_tolerance: 0.15,
        }
    }
}

impl PlaybackConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub track_height: f64,
    /// Drops farther than this above or below the rows open a new track.
    pub edge_margin: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub pixels_per_second: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            track_height: 80.0,
            edge_margin: 20.0,
            min_zoom: 1.0,
            max_zoom: 200.0,
            pixels_per_second: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: EditorConfig =
            serde_json::from_str(r#"{"snap_enabled": true, "playback": {"publish_interval_ms": 50}}"#)
                .unwrap();
        assert!(cfg.snap_enabled);
        assert_eq!(cfg.history_limit, 100);
        assert_eq!(cfg.playback.publish_interval_ms, 50);
        assert_eq!(cfg.playback.audio_drift_tolerance, 0.15);
        assert_eq!(cfg.viewport.track_height, 80.0);
        assert_eq!(cfg.capture_quiet(), Duration::from_millis(500));
    }
}
