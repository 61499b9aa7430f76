use serde::{Deserialize, Serialize};

use super::Edit;
use crate::{Clip, ClipId, EditorConfig, TimelineError, TimelineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimSide {
    Left,
    Right,
}

/// How far a clip may grow on its own track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborBounds {
    /// End of the previous clip, or 0.
    pub min_start: f64,
    /// Start of the following clip, or the timeline ceiling.
    pub max_end: f64,
}

pub fn neighbor_bounds(state: &TimelineState, clip: &Clip, ceiling: f64) -> NeighborBounds {
    let mut min_start = 0.0f64;
    let mut max_end = ceiling;
    for other in state
        .clips_on_track(clip.track_id)
        .filter(|c| c.id != clip.id)
    {
        if other.start < clip.start {
            min_start = min_start.max(other.end());
        } else {
            max_end = max_end.min(other.start);
        }
    }
    NeighborBounds { min_start, max_end }
}

/// Trims one edge by `delta` seconds, clamped so the clip stays inside its
/// neighbors and its source media and never gets shorter than the minimum.
/// The track never changes.
pub fn resize_clip(
    state: &TimelineState,
    config: &EditorConfig,
    id: ClipId,
    delta: f64,
    side: TrimSide,
) -> Result<Edit, TimelineError> {
    let clip = state.clip(id)?;
    let is_image = state.clip_is_image(clip);
    let bounds = neighbor_bounds(state, clip, config.timeline_ceiling);
    let min_duration = config.min_clip_duration;

    let mut updated = clip.clone();
    match side {
        TrimSide::Right => {
            let remaining_source = if is_image {
                f64::INFINITY
            } else {
                (clip.source_cap - (clip.source_in + clip.duration)).max(0.0)
            };
            let room = (bounds.max_end - clip.end()).max(0.0);
            // shrinking stops at the minimum, but a clip already below it is not forced to grow
            let floor = (min_duration - clip.duration).min(0.0);
            let added = delta.min(remaining_source.min(room)).max(floor);
            updated.duration += added;
        }
        TrimSide::Left => {
            let timeline_room = (clip.start - bounds.min_start).max(0.0);
            let source_room = if is_image {
                f64::INFINITY
            } else {
                clip.source_in.max(0.0)
            };
            let ceiling = (clip.duration - min_duration).max(0.0);
            let shift = delta.max(-timeline_room.min(source_room)).min(ceiling);
            updated.start += shift;
            updated.duration -= shift;
            if !is_image {
                updated.source_in += shift;
            }
        }
    }

    let mut next = state.clone();
    *next.clip_mut(id)? = updated;
    Ok(Edit::new(next, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::fixtures::{clip, state};

    fn cfg() -> EditorConfig {
        EditorConfig::default()
    }

    fn resized(s: &TimelineState, id: ClipId, delta: f64, side: TrimSide) -> Clip {
        let edit = resize_clip(s, &cfg(), id, delta, side).unwrap();
        assert!(edit.state.validate(0.01).is_ok());
        edit.state.find_clip(id).unwrap().clone()
    }

    #[test]
    fn test_right_trim_clamped_by_neighbor() {
        let c = clip("a.mp4", 0, 0.0, 10.0);
        let s = state(vec![c.clone(), clip("b.mp4", 0, 20.0, 5.0)]);
        assert_eq!(resized(&s, c.id, 20.0, TrimSide::Right).duration, 20.0);
    }

    #[test]
    fn test_right_trim_clamped_by_source() {
        let c = clip("a.mp4", 0, 0.0, 10.0);
        let s = state(vec![c.clone()]);
        // source cap 30 leaves 20 more seconds of media
        assert_eq!(resized(&s, c.id, 50.0, TrimSide::Right).duration, 30.0);
    }

    #[test]
    fn test_right_trim_respects_source_in() {
        let mut c = clip("a.mp4", 0, 0.0, 10.0);
        c.source_in = 15.0;
        let s = state(vec![c.clone()]);
        assert_eq!(resized(&s, c.id, 50.0, TrimSide::Right).duration, 15.0);
    }

    #[test]
    fn test_shrink_stops_at_minimum() {
        let c = clip("a.mp4", 0, 0.0, 10.0);
        let s = state(vec![c.clone()]);
        let right = resized(&s, c.id, -50.0, TrimSide::Right);
        assert!((right.duration - 0.1).abs() < 1e-9);
        let left = resized(&s, c.id, 50.0, TrimSide::Left);
        assert!((left.duration - 0.1).abs() < 1e-9);
        assert!((left.end() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_left_trim_keeps_end_and_moves_source() {
        let c = clip("a.mp4", 0, 5.0, 10.0);
        let s = state(vec![c.clone()]);
        let trimmed = resized(&s, c.id, 2.0, TrimSide::Left);
        assert_eq!(trimmed.start, 7.0);
        assert_eq!(trimmed.duration, 8.0);
        assert_eq!(trimmed.source_in, 2.0);
        assert_eq!(trimmed.end(), 15.0);
    }

    #[test]
    fn test_left_extend_limited_by_source_in() {
        let mut c = clip("a.mp4", 0, 5.0, 10.0);
        c.source_in = 1.5;
        let s = state(vec![c.clone()]);
        let grown = resized(&s, c.id, -4.0, TrimSide::Left);
        assert_eq!(grown.start, 3.5);
        assert_eq!(grown.source_in, 0.0);
        assert_eq!(grown.duration, 11.5);
    }

    #[test]
    fn test_left_extend_limited_by_previous_clip() {
        let mut c = clip("a.mp4", 0, 10.0, 5.0);
        c.source_in = 10.0;
        let s = state(vec![clip("b.mp4", 0, 0.0, 8.0), c.clone()]);
        let grown = resized(&s, c.id, -5.0, TrimSide::Left);
        assert_eq!(grown.start, 8.0);
        assert_eq!(grown.source_in, 8.0);
    }

    #[test]
    fn test_image_trims_ignore_source() {
        let c = clip("still.png", 0, 5.0, 10.0);
        let s = state(vec![c.clone()]);
        let right = resized(&s, c.id, 100.0, TrimSide::Right);
        assert_eq!(right.duration, 110.0);
        let left = resized(&s, c.id, -5.0, TrimSide::Left);
        assert_eq!(left.start, 0.0);
        assert_eq!(left.source_in, 0.0);
        assert_eq!(left.duration, 15.0);
    }

    #[test]
    fn test_right_trim_stops_at_ceiling() {
        let c = clip("still.png", 0, 7190.0, 5.0);
        let s = state(vec![c.clone()]);
        assert_eq!(resized(&s, c.id, 100.0, TrimSide::Right).end(), 7200.0);
    }

    #[test]
    fn test_neighbor_bounds_ignore_other_tracks() {
        let c = clip("a.mp4", 0, 10.0, 5.0);
        let s = state(vec![
            clip("b.mp4", 0, 0.0, 4.0),
            c.clone(),
            clip("b.mp4", 0, 30.0, 4.0),
            clip("b.mp4", 1, 12.0, 1.0),
        ]);
        let bounds = neighbor_bounds(&s, &c, 7200.0);
        assert_eq!(bounds, NeighborBounds { min_start: 4.0, max_end: 30.0 });
    }
}
