use std::path::Path;

use crate::{Clip, ClipId, MediaKind, TimelineError, TimelineState, TrackId, TrackKind};

/// Media kind from a file name's extension.
pub fn kind_of(asset_name: &str) -> Result<MediaKind, TimelineError> {
    MediaKind::from_path(Path::new(asset_name))
        .ok_or_else(|| TimelineError::UnsupportedExtension(asset_name.to_string()))
}

/// Lane kind a file needs; images collapse to video.
pub fn track_kind_of(asset_name: &str) -> Result<TrackKind, TimelineError> {
    kind_of(asset_name).map(TrackKind::for_media)
}

/// True iff a clip other than `exclude` on `track` overlaps `[start, start + duration)`
/// by more than `eps`.
pub fn is_occupied(
    clips: &[Clip],
    track: TrackId,
    start: f64,
    duration: f64,
    exclude: Option<ClipId>,
    eps: f64,
) -> bool {
    let end = start + duration;
    clips.iter().any(|c| {
        c.track_id == track && Some(c.id) != exclude && c.overlaps(start, end, eps)
    })
}

impl TimelineState {
    pub fn is_occupied(
        &self,
        track: TrackId,
        start: f64,
        duration: f64,
        exclude: Option<ClipId>,
        eps: f64,
    ) -> bool {
        is_occupied(&self.clips, track, start, duration, exclude, eps)
    }

    /// Whether `track` exists, accepts `required` and is free over the span.
    pub fn fits(&self, track: TrackId, start: f64, duration: f64, required: TrackKind, eps: f64) -> bool {
        self.find_track(track)
            .is_some_and(|t| t.kind.is_compatible(required))
            && !self.is_occupied(track, start, duration, None, eps)
    }

    /// Walks upward from `candidate` until a lane is free and compatible,
    /// creating a track of `required` kind at the first id that has none.
    pub fn resolve_track(
        &mut self,
        candidate: TrackId,
        start: f64,
        duration: f64,
        required: TrackKind,
        eps: f64,
    ) -> TrackId {
        let mut id = candidate;
        loop {
            match self.find_track(id) {
                None => {
                    // A missing lane has no clips of its own, but stale
                    // references could still point at it.
                    if !self.is_occupied(id, start, duration, None, eps) {
                        self.ensure_track(id, required);
                        return id;
                    }
                }
                Some(track) => {
                    if track.kind.is_compatible(required)
                        && !self.is_occupied(id, start, duration, None, eps)
                    {
                        return id;
                    }
                }
            }
            id = id.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Asset, Track};

    fn state_with(clips: Vec<Clip>, tracks: Vec<Track>) -> TimelineState {
        TimelineState {
            assets: vec![
                Asset::new("a.mp4", "/a.mp4", 30.0, MediaKind::Video),
                Asset::new("s.mp3", "/s.mp3", 30.0, MediaKind::Audio),
            ],
            tracks,
            clips,
        }
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(kind_of("shot.MOV").unwrap(), MediaKind::Video);
        assert_eq!(track_kind_of("cover.webp").unwrap(), TrackKind::Video);
        assert_eq!(track_kind_of("beat.wav").unwrap(), TrackKind::Audio);
        assert!(matches!(
            kind_of("notes.txt"),
            Err(TimelineError::UnsupportedExtension(name)) if name == "notes.txt"
        ));
    }

    #[test]
    fn test_is_occupied_excludes_self_and_other_tracks() {
        let c = Clip::new("a.mp4", TrackId(0), 0.0, 10.0);
        let clips = vec![c.clone()];
        assert!(is_occupied(&clips, TrackId(0), 5.0, 10.0, None, 0.01));
        assert!(!is_occupied(&clips, TrackId(0), 5.0, 10.0, Some(c.id), 0.01));
        assert!(!is_occupied(&clips, TrackId(1), 5.0, 10.0, None, 0.01));
        assert!(!is_occupied(&clips, TrackId(0), 10.0, 10.0, None, 0.01));
    }

    #[test]
    fn test_resolve_track_skips_busy_and_incompatible() {
        let mut state = state_with(
            vec![
                Clip::new("a.mp4", TrackId(0), 0.0, 10.0),
                Clip::new("s.mp3", TrackId(1), 0.0, 10.0),
            ],
            vec![
                Track::new(TrackId(0), TrackKind::Video),
                Track::new(TrackId(1), TrackKind::Audio),
            ],
        );
        let id = state.resolve_track(TrackId(0), 5.0, 10.0, TrackKind::Video, 0.01);
        assert_eq!(id, TrackId(2));
        assert_eq!(state.find_track(TrackId(2)).unwrap().kind, TrackKind::Video);

        // free space on the candidate is taken directly
        let id = state.resolve_track(TrackId(0), 10.0, 5.0, TrackKind::Video, 0.01);
        assert_eq!(id, TrackId(0));

        // audio skips the video lanes
        let id = state.resolve_track(TrackId(0), 20.0, 5.0, TrackKind::Audio, 0.01);
        assert_eq!(id, TrackId(1));
    }

    #[test]
    fn test_effects_lane_takes_visual_media() {
        let mut state = state_with(vec![], vec![Track::new(TrackId(0), TrackKind::Effects)]);
        let id = state.resolve_track(TrackId(0), 0.0, 5.0, TrackKind::Video, 0.01);
        assert_eq!(id, TrackId(0));
        assert!(state.fits(TrackId(0), 0.0, 5.0, TrackKind::Video, 0.01));
        assert!(!state.fits(TrackId(0), 0.0, 5.0, TrackKind::Audio, 0.01));
    }
}
