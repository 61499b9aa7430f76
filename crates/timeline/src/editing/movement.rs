use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::Edit;
use crate::{is_occupied, Clip, ClipId, EditorConfig, TimelineError, TimelineState, TrackId, TrackKind};

/// Where the grabbed clip was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub anchor: ClipId,
    pub start: f64,
    pub track: TrackId,
}

/// Moves the selection rigidly by the anchor's offset in one commit.
///
/// Unselected clips are kept first; selected clips are then placed one by one
/// against that set plus the ones already placed, so a moved clip never
/// collides with another moved clip's old position. A clip whose target lane
/// is busy or of the wrong kind goes to a brand new track above all others.
pub fn move_clips(
    state: &TimelineState,
    config: &EditorConfig,
    selected: &[ClipId],
    request: MoveRequest,
) -> Result<Edit, TimelineError> {
    let anchor = state.clip(request.anchor)?;
    let time_offset = request.start - anchor.start;
    let track_offset = i64::from(request.track.0) - i64::from(anchor.track_id.0);

    let moving: HashSet<ClipId> = if selected.contains(&request.anchor) {
        selected.iter().copied().collect()
    } else {
        HashSet::from([request.anchor])
    };

    let mut next = state.clone();
    let (moved, mut placed): (Vec<Clip>, Vec<Clip>) = std::mem::take(&mut next.clips)
        .into_iter()
        .partition(|c| moving.contains(&c.id));

    let eps = config.overlap_epsilon;
    let mut max_track = state.max_track_id().unwrap_or_default().max(request.track);
    for mut clip in moved {
        let required = TrackKind::for_media(state.clip_kind(&clip)?);
        let start = (clip.start + time_offset).max(0.0);
        let mut track = clip.track_id.offset(track_offset);

        let compatible = next
            .find_track(track)
            .map_or(true, |t| t.kind.is_compatible(required));
        if !compatible || is_occupied(&placed, track, start, clip.duration, None, eps) {
            max_track = max_track.next();
            track = max_track;
        }
        max_track = max_track.max(track);
        next.ensure_track(track, required);

        clip.start = start;
        clip.track_id = track;
        placed.push(clip);
    }

    next.clips = placed;
    next.prune_tracks();
    Ok(Edit::new(next, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::fixtures::{clip, state};

    fn cfg() -> EditorConfig {
        EditorConfig::default()
    }

    #[test]
    fn test_move_single_clip_within_track() {
        let c = clip("a.mp4", 0, 0.0, 5.0);
        let s = state(vec![c.clone(), clip("b.mp4", 0, 10.0, 5.0)]);
        let req = MoveRequest { anchor: c.id, start: 5.0, track: TrackId(0) };
        let edit = move_clips(&s, &cfg(), &[], req).unwrap();
        let moved = edit.state.find_clip(c.id).unwrap();
        assert_eq!((moved.start, moved.track_id), (5.0, TrackId(0)));
        assert!(edit.state.validate(0.01).is_ok());
    }

    #[test]
    fn test_move_onto_busy_slot_escalates() {
        let c = clip("a.mp4", 0, 0.0, 5.0);
        let s = state(vec![c.clone(), clip("b.mp4", 1, 0.0, 20.0)]);
        let req = MoveRequest { anchor: c.id, start: 3.0, track: TrackId(1) };
        let edit = move_clips(&s, &cfg(), &[c.id], req).unwrap();
        let moved = edit.state.find_clip(c.id).unwrap();
        assert_eq!(moved.track_id, TrackId(2));
        assert_eq!(moved.start, 3.0);
        // track 0 emptied and pruned
        assert!(edit.state.find_track(TrackId(0)).is_none());
    }

    #[test]
    fn test_move_onto_wrong_kind_escalates() {
        let song = clip("s.mp3", 0, 0.0, 5.0);
        let s = state(vec![song.clone(), clip("a.mp4", 1, 20.0, 5.0)]);
        let req = MoveRequest { anchor: song.id, start: 0.0, track: TrackId(1) };
        let edit = move_clips(&s, &cfg(), &[], req).unwrap();
        let moved = edit.state.find_clip(song.id).unwrap();
        assert_eq!(moved.track_id, TrackId(2));
        assert_eq!(edit.state.find_track(TrackId(2)).unwrap().kind, TrackKind::Audio);
        assert!(edit.state.validate(0.01).is_ok());
    }

    #[test]
    fn test_multi_move_shifts_rigidly() {
        let a = clip("a.mp4", 0, 0.0, 5.0);
        let b = clip("b.mp4", 0, 5.0, 5.0);
        let s = state(vec![a.clone(), b.clone()]);
        // moving right by 3: b's new slot overlaps a's old slot, which is moving too
        let req = MoveRequest { anchor: a.id, start: 3.0, track: TrackId(0) };
        let edit = move_clips(&s, &cfg(), &[a.id, b.id], req).unwrap();
        assert_eq!(edit.state.find_clip(a.id).unwrap().start, 3.0);
        assert_eq!(edit.state.find_clip(b.id).unwrap().start, 8.0);
        assert_eq!(edit.state.find_clip(b.id).unwrap().track_id, TrackId(0));
    }

    #[test]
    fn test_multi_move_clamped_clips_do_not_stack() {
        let a = clip("a.mp4", 0, 2.0, 5.0);
        let b = clip("b.mp4", 1, 1.0, 5.0);
        let s = state(vec![a.clone(), b.clone()]);
        // track offset -1 squeezes both onto track 0
        let req = MoveRequest { anchor: b.id, start: 1.0, track: TrackId(0) };
        let edit = move_clips(&s, &cfg(), &[a.id, b.id], req).unwrap();
        assert!(edit.state.validate(0.01).is_ok());
        let tracks: HashSet<TrackId> = edit.state.clips.iter().map(|c| c.track_id).collect();
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_move_clamps_start_at_zero() {
        let a = clip("a.mp4", 0, 2.0, 5.0);
        let b = clip("b.mp4", 1, 6.0, 5.0);
        let s = state(vec![a.clone(), b.clone()]);
        let req = MoveRequest { anchor: b.id, start: 0.0, track: TrackId(1) };
        let edit = move_clips(&s, &cfg(), &[a.id, b.id], req).unwrap();
        assert_eq!(edit.state.find_clip(a.id).unwrap().start, 0.0);
        assert_eq!(edit.state.find_clip(b.id).unwrap().start, 0.0);
    }

    #[test]
    fn test_unselected_anchor_moves_alone() {
        let a = clip("a.mp4", 0, 0.0, 5.0);
        let b = clip("b.mp4", 1, 0.0, 5.0);
        let s = state(vec![a.clone(), b.clone()]);
        let req = MoveRequest { anchor: a.id, start: 10.0, track: TrackId(0) };
        let edit = move_clips(&s, &cfg(), &[b.id], req).unwrap();
        assert_eq!(edit.state.find_clip(a.id).unwrap().start, 10.0);
        assert_eq!(edit.state.find_clip(b.id).unwrap().start, 0.0);
    }

    #[test]
    fn test_move_missing_anchor() {
        let s = state(vec![]);
        let req = MoveRequest { anchor: ClipId::new(), start: 0.0, track: TrackId(0) };
        assert!(matches!(
            move_clips(&s, &cfg(), &[], req),
            Err(TimelineError::ClipNotFound(_))
        ));
    }
}
