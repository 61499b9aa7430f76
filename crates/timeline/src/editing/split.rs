use serde::{Deserialize, Serialize};
use tracing::info;

use super::Edit;
use crate::{Clip, ClipId, Selection, TimelineError, TimelineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    Left,
    Right,
}

/// Cuts `clip` at timeline time `at`. The left child keeps the id; the right
/// child gets a fresh one and continues the source where the left stops.
pub fn split_clip(clip: &Clip, at: f64, is_image: bool) -> (Clip, Clip) {
    let left_duration = at - clip.start;
    let mut left = clip.clone();
    left.duration = left_duration;

    let mut right = clip.duplicate();
    right.start = at;
    right.duration = clip.duration - left_duration;
    right.source_in = if is_image { 0.0 } else { clip.source_in + left_duration };
    (left, right)
}

fn replace_with_halves(state: &mut TimelineState, id: ClipId, at: f64) -> Option<ClipId> {
    let idx = state.clips.iter().position(|c| c.id == id)?;
    let is_image = state.clip_is_image(&state.clips[idx]);
    let (left, right) = split_clip(&state.clips[idx], at, is_image);
    let right_id = right.id;
    state.clips[idx] = left;
    state.clips.insert(idx + 1, right);
    Some(right_id)
}

/// Splits the one clip under the playhead. With a selection the target must
/// be a selected clip; without one exactly one clip may qualify.
pub fn split_at(
    state: &TimelineState,
    selected: &[ClipId],
    playhead: f64,
) -> Result<Edit<ClipId>, TimelineError> {
    let under: Vec<&Clip> = state
        .clips
        .iter()
        .filter(|c| c.strictly_contains(playhead))
        .collect();

    let target = if selected.is_empty() {
        match under.as_slice() {
            [] => return Err(TimelineError::NothingUnderPlayhead),
            [only] => only.id,
            many => {
                return Err(TimelineError::AmbiguousSplit {
                    candidates: many.len(),
                })
            }
        }
    } else {
        under
            .iter()
            .find(|c| selected.contains(&c.id))
            .map(|c| c.id)
            .ok_or(TimelineError::SelectionNotUnderPlayhead)?
    };

    let mut next = state.clone();
    let right = replace_with_halves(&mut next, target, playhead).ok_or(TimelineError::ClipNotFound(target))?;
    info!("clip split at {playhead:.2}s");
    Ok(Edit::new(next, right).with_selection(Selection::Clips(vec![right])))
}

/// Splits every clip under the playhead, then selects everything on one side
/// of it. Boundary comparisons use `eps`.
pub fn split_and_select(
    state: &TimelineState,
    playhead: f64,
    direction: SplitDirection,
    eps: f64,
) -> Edit<Vec<ClipId>> {
    let mut next = state.clone();
    let targets: Vec<ClipId> = state
        .clips
        .iter()
        .filter(|c| c.strictly_contains(playhead))
        .map(|c| c.id)
        .collect();
    for id in &targets {
        replace_with_halves(&mut next, *id, playhead);
    }

    let selected: Vec<ClipId> = next
        .clips
        .iter()
        .filter(|c| match direction {
            SplitDirection::Left => c.end() <= playhead + eps,
            SplitDirection::Right => c.start >= playhead - eps,
        })
        .map(|c| c.id)
        .collect();
    info!(
        "split {} clips, selected {} to the {direction:?}",
        targets.len(),
        selected.len()
    );
    let selection = Selection::from_clips(selected.clone());
    Edit::new(next, selected).with_selection(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::fixtures::{clip, state};

    #[test]
    fn test_split_children_are_contiguous() {
        let mut c = clip("a.mp4", 0, 2.0, 10.0);
        c.source_in = 3.0;
        let (left, right) = split_clip(&c, 6.5, false);
        assert_eq!(left.id, c.id);
        assert_ne!(right.id, c.id);
        assert_eq!(left.duration + right.duration, 10.0);
        assert_eq!(right.source_in, left.source_in + left.duration);
        assert_eq!(right.start, left.end());
        assert_eq!(right.color_tag, c.color_tag);
    }

    #[test]
    fn test_split_image_keeps_zero_source() {
        let c = clip("still.png", 0, 0.0, 10.0);
        let (_, right) = split_clip(&c, 4.0, true);
        assert_eq!(right.source_in, 0.0);
    }

    #[test]
    fn test_split_single_candidate() {
        let c = clip("a.mp4", 0, 0.0, 10.0);
        let s = state(vec![c.clone()]);
        let edit = split_at(&s, &[], 4.0).unwrap();
        let left = edit.state.find_clip(c.id).unwrap();
        let right = edit.state.find_clip(edit.output).unwrap();
        assert_eq!((left.start, left.duration), (0.0, 4.0));
        assert_eq!((right.start, right.duration, right.source_in), (4.0, 6.0, 4.0));
        assert_eq!(edit.selection, Some(Selection::Clips(vec![edit.output])));
    }

    #[test]
    fn test_split_rejects_ambiguity_and_empty() {
        let s = state(vec![clip("a.mp4", 0, 0.0, 10.0), clip("b.mp4", 1, 2.0, 10.0)]);
        assert!(matches!(
            split_at(&s, &[], 5.0),
            Err(TimelineError::AmbiguousSplit { candidates: 2 })
        ));
        assert!(matches!(
            split_at(&s, &[], 20.0),
            Err(TimelineError::NothingUnderPlayhead)
        ));
        // edges are not strictly inside
        assert!(matches!(
            split_at(&s, &[], 12.0),
            Err(TimelineError::NothingUnderPlayhead)
        ));
    }

    #[test]
    fn test_split_uses_selection() {
        let a = clip("a.mp4", 0, 0.0, 10.0);
        let b = clip("b.mp4", 1, 2.0, 10.0);
        let other = clip("b.mp4", 0, 20.0, 5.0);
        let s = state(vec![a.clone(), b.clone(), other.clone()]);
        let edit = split_at(&s, &[b.id], 5.0).unwrap();
        assert_eq!(edit.state.find_clip(b.id).unwrap().duration, 3.0);
        assert_eq!(edit.state.find_clip(a.id).unwrap().duration, 10.0);
        assert!(matches!(
            split_at(&s, &[other.id], 5.0),
            Err(TimelineError::SelectionNotUnderPlayhead)
        ));
    }

    #[test]
    fn test_mass_split_selects_side() {
        let a = clip("a.mp4", 0, 0.0, 10.0);
        let b = clip("s.mp3", 1, 2.0, 10.0);
        let late = clip("b.mp4", 0, 12.0, 3.0);
        let s = state(vec![a.clone(), b.clone(), late.clone()]);

        let edit = split_and_select(&s, 5.0, SplitDirection::Left, 0.01);
        assert_eq!(edit.state.clips.len(), 5);
        assert_eq!(edit.output.len(), 2);
        assert!(edit.output.contains(&a.id) && edit.output.contains(&b.id));
        assert!(edit.state.validate(0.01).is_ok());

        let edit = split_and_select(&s, 5.0, SplitDirection::Right, 0.01);
        assert_eq!(edit.output.len(), 3);
        assert!(edit.output.contains(&late.id));
        assert!(!edit.output.contains(&a.id));
    }

    #[test]
    fn test_mass_split_with_nothing_under_playhead_still_selects() {
        let a = clip("a.mp4", 0, 0.0, 4.0);
        let s = state(vec![a.clone()]);
        let edit = split_and_select(&s, 4.0, SplitDirection::Left, 0.01);
        assert_eq!(edit.output, vec![a.id]);
        assert_eq!(edit.state.clips.len(), 1);
    }
}
