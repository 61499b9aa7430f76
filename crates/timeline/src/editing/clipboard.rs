use tracing::info;

use super::Edit;
use crate::{Clip, ClipId, EditorConfig, Selection, TimelineError, TimelineState};

/// Snapshot of the selected clips, in timeline order.
pub fn copy_clips(state: &TimelineState, ids: &[ClipId]) -> Vec<Clip> {
    let mut copied: Vec<Clip> = state
        .clips
        .iter()
        .filter(|c| ids.contains(&c.id))
        .cloned()
        .collect();
    copied.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.track_id.cmp(&b.track_id)));
    copied
}

/// Pastes the clipboard so the earliest clip lands on the playhead, keeping
/// relative offsets. Each clip starts probing at its original track and moves
/// up past busy or incompatible lanes. Pasted clips get fresh ids and become
/// the selection.
pub fn paste_clips(
    state: &TimelineState,
    config: &EditorConfig,
    clipboard: &[Clip],
    playhead: f64,
) -> Result<Edit<Vec<ClipId>>, TimelineError> {
    let min_start = clipboard
        .iter()
        .map(|c| c.start)
        .min_by(f64::total_cmp)
        .ok_or(TimelineError::ClipboardEmpty)?;

    let eps = config.overlap_epsilon;
    let mut next = state.clone();
    let mut pasted = Vec::with_capacity(clipboard.len());
    for source in clipboard {
        let required = next.asset(&source.asset_name)?.track_kind();
        let start = (playhead + (source.start - min_start)).max(0.0);
        let track = next.resolve_track(source.track_id, start, source.duration, required, eps);

        let mut clip = source.duplicate();
        clip.start = start;
        clip.track_id = track;
        pasted.push(clip.id);
        next.clips.push(clip);
    }
    info!("pasted {} clips at {playhead:.2}s", pasted.len());
    let selection = Selection::Clips(pasted.clone());
    Ok(Edit::new(next, pasted).with_selection(selection))
}
