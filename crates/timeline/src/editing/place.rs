use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Edit;
use crate::{Asset, Clip, ClipId, EditorConfig, TimelineError, TimelineState, Track, TrackId, TrackKind};

/// Where a dragged asset was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropTarget {
    Track(TrackId),
    /// Empty area: always open a fresh track.
    NewTrack,
}

/// Length of a freshly placed clip.
pub fn default_duration(asset: &Asset, config: &EditorConfig) -> f64 {
    if asset.is_image() {
        return config.image_clip_seconds;
    }
    if asset.duration > 0.0 && asset.duration.is_finite() {
        asset.duration.min(config.default_clip_seconds)
    } else {
        config.placeholder_duration.min(config.default_clip_seconds)
    }
}

/// Places a new clip of `asset_name` at `start`. A busy or incompatible
/// target lane sends the clip upward through `resolve_track`.
pub fn place_asset(
    state: &TimelineState,
    config: &EditorConfig,
    asset_name: &str,
    target: DropTarget,
    start: f64,
) -> Result<Edit<ClipId>, TimelineError> {
    let asset = state.asset(asset_name)?;
    let required = asset.track_kind();
    let duration = default_duration(asset, config);
    let start = start.max(0.0);
    let eps = config.overlap_epsilon;

    let mut next = state.clone();
    let track = match target {
        DropTarget::NewTrack => {
            let id = next.next_track_id();
            next.tracks.push(Track::new(id, required));
            id
        }
        DropTarget::Track(id) if next.fits(id, start, duration, required, eps) => id,
        DropTarget::Track(id) => next.resolve_track(id, start, duration, required, eps),
    };

    let mut clip = Clip::new(asset_name, track, start, duration);
    clip.source_cap = if asset.is_image() { duration } else { asset.duration.max(duration) };
    let id = clip.id;
    debug!("placing {asset_name} on track {track} at {start:.2}s");
    next.clips.push(clip);
    next.prune_tracks();
    Ok(Edit::new(next, id))
}

/// Explicit "add track": an empty lane above every existing one.
pub fn add_track(state: &TimelineState, kind: TrackKind) -> Edit<TrackId> {
    let mut next = state.clone();
    let id = next.next_track_id();
    next.tracks.push(Track::new(id, kind));
    Edit::new(next, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::fixtures::{clip, state};

    #[test]
    fn test_default_durations() {
        let cfg = EditorConfig::default();
        let long = Asset::new("a.mp4", "/a", 30.0, crate::MediaKind::Video);
        let short = Asset::new("b.mp4", "/b", 4.0, crate::MediaKind::Video);
        let image = Asset::new("c.png", "/c", 99.0, crate::MediaKind::Image);
        let unknown = Asset::new("d.mp3", "/d", 0.0, crate::MediaKind::Audio);
        assert_eq!(default_duration(&long, &cfg), 10.0);
        assert_eq!(default_duration(&short, &cfg), 4.0);
        assert_eq!(default_duration(&image, &cfg), 10.0);
        assert_eq!(default_duration(&unknown, &cfg), 10.0);
    }

    #[test]
    fn test_place_on_free_track() {
        let cfg = EditorConfig::default();
        let edit = place_asset(&state(vec![]), &cfg, "a.mp4", DropTarget::Track(TrackId(0)), 0.0)
            .unwrap();
        let clip = edit.state.find_clip(edit.output).unwrap();
        assert_eq!(clip.track_id, TrackId(0));
        assert_eq!(clip.duration, 10.0);
        assert_eq!(clip.source_in, 0.0);
        assert_eq!(clip.source_cap, 30.0);
        assert!(edit.state.validate(cfg.overlap_epsilon).is_ok());
    }

    #[test]
    fn test_place_collision_opens_next_track() {
        let cfg = EditorConfig::default();
        let s = state(vec![clip("a.mp4", 0, 0.0, 10.0)]);
        let edit = place_asset(&s, &cfg, "b.mp4", DropTarget::Track(TrackId(0)), 5.0).unwrap();
        let placed = edit.state.find_clip(edit.output).unwrap();
        assert_eq!(placed.track_id, TrackId(1));
        assert_eq!(placed.start, 5.0);
        assert_eq!(edit.state.find_track(TrackId(1)).unwrap().kind, TrackKind::Video);
    }

    #[test]
    fn test_place_audio_on_video_lane_moves_up() {
        let cfg = EditorConfig::default();
        let s = state(vec![clip("a.mp4", 0, 0.0, 10.0)]);
        let edit = place_asset(&s, &cfg, "s.mp3", DropTarget::Track(TrackId(0)), 20.0).unwrap();
        let placed = edit.state.find_clip(edit.output).unwrap();
        assert_eq!(placed.track_id, TrackId(1));
        assert_eq!(edit.state.find_track(TrackId(1)).unwrap().kind, TrackKind::Audio);
    }

    #[test]
    fn test_place_in_empty_area() {
        let cfg = EditorConfig::default();
        let s = state(vec![clip("a.mp4", 0, 0.0, 10.0), clip("s.mp3", 3, 0.0, 10.0)]);
        let edit = place_asset(&s, &cfg, "still.png", DropTarget::NewTrack, 2.0).unwrap();
        let placed = edit.state.find_clip(edit.output).unwrap();
        assert_eq!(placed.track_id, TrackId(4));
        assert_eq!(placed.duration, 10.0);
    }

    #[test]
    fn test_place_unknown_asset() {
        let cfg = EditorConfig::default();
        let err = place_asset(&state(vec![]), &cfg, "nope.mp4", DropTarget::NewTrack, 0.0);
        assert!(matches!(err, Err(TimelineError::AssetNotFound(_))));
    }

    #[test]
    fn test_negative_start_clamps_to_zero() {
        let cfg = EditorConfig::default();
        let edit = place_asset(&state(vec![]), &cfg, "a.mp4", DropTarget::Track(TrackId(0)), -3.0)
            .unwrap();
        assert_eq!(edit.state.find_clip(edit.output).unwrap().start, 0.0);
    }

    #[test]
    fn test_add_track_survives_until_pruned() {
        let s = state(vec![clip("a.mp4", 0, 0.0, 10.0)]);
        let edit = add_track(&s, TrackKind::Audio);
        assert_eq!(edit.output, TrackId(1));
        assert_eq!(edit.state.tracks.len(), 2);
        let mut pruned = edit.state.clone();
        pruned.prune_tracks();
        assert_eq!(pruned.tracks.len(), 1);
    }
}
