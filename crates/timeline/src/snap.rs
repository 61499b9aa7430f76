use crate::{Clip, ClipId, TrackId};

/// Magnetic alignment of `candidate` to the nearest clip edge on one track.
///
/// Only the immediate neighbors count: the last clip starting before the
/// candidate (its end) and the first clip starting at or after it (its start).
/// Returns the candidate untouched when disabled, without a track, or when the
/// track has no other clips.
pub fn snap_time(
    clips: &[Clip],
    candidate: f64,
    exclude: Option<ClipId>,
    track: Option<TrackId>,
    enabled: bool,
) -> f64 {
    let Some(track) = track else {
        return candidate;
    };
    if !enabled {
        return candidate;
    }

    let mut left: Option<&Clip> = None;
    let mut right: Option<&Clip> = None;
    for clip in clips
        .iter()
        .filter(|c| c.track_id == track && Some(c.id) != exclude)
    {
        if clip.start < candidate {
            if left.map_or(true, |l| clip.start > l.start) {
                left = Some(clip);
            }
        } else if right.map_or(true, |r| clip.start < r.start) {
            right = Some(clip);
        }
    }

    let points = [left.map(Clip::end), right.map(|c| c.start)];
    points
        .into_iter()
        .flatten()
        .min_by(|a, b| (a - candidate).abs().total_cmp(&(b - candidate).abs()))
        .unwrap_or(candidate)
}
