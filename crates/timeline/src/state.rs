use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::{kind_of, Asset, Clip, ClipId, TimelineError, Track, TrackId, TrackKind};

/// Tolerance for floating point drift on bounds that have no ε of their own.
const BOUNDS_SLACK: f64 = 1e-6;

/// The whole editable arrangement. Operations take it by reference and
/// return a replacement; nothing mutates a committed state in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineState {
    pub assets: Vec<Asset>,
    pub tracks: Vec<Track>,
    pub clips: Vec<Clip>,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            tracks: vec![Track::new(TrackId(0), TrackKind::Video)],
            clips: Vec::new(),
        }
    }
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a state from persisted assets and clips. Duplicate clips are
    /// dropped and the track set is derived from what the clips reference.
    pub fn from_parts(assets: Vec<Asset>, clips: Vec<Clip>) -> Self {
        let mut state = Self {
            assets,
            tracks: Vec::new(),
            clips,
        };
        let dropped = state.dedupe_clips();
        if dropped > 0 {
            warn!("dropped {dropped} duplicate clips while loading");
        }
        state.reconcile_tracks();
        state
    }

    pub fn find_clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip(&self, id: ClipId) -> Result<&Clip, TimelineError> {
        self.find_clip(id).ok_or(TimelineError::ClipNotFound(id))
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Result<&mut Clip, TimelineError> {
        self.clips
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(TimelineError::ClipNotFound(id))
    }

    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn asset(&self, name: &str) -> Result<&Asset, TimelineError> {
        self.find_asset(name)
            .ok_or_else(|| TimelineError::AssetNotFound(name.to_string()))
    }

    pub fn asset_for(&self, clip: &Clip) -> Option<&Asset> {
        self.find_asset(&clip.asset_name)
    }

    pub fn find_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Media kind of a clip: the registered asset's kind, else its extension.
    pub fn clip_kind(&self, clip: &Clip) -> Result<crate::MediaKind, TimelineError> {
        match self.asset_for(clip) {
            Some(asset) => Ok(asset.kind),
            None => kind_of(&clip.asset_name),
        }
    }

    pub fn clip_is_image(&self, clip: &Clip) -> bool {
        matches!(self.clip_kind(clip), Ok(crate::MediaKind::Image))
    }

    pub fn clips_on_track(&self, track: TrackId) -> impl Iterator<Item = &Clip> {
        self.clips.iter().filter(move |c| c.track_id == track)
    }

    /// Clips on `track` ordered by start.
    pub fn sorted_track_clips(&self, track: TrackId) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips_on_track(track).collect();
        clips.sort_by(|a, b| a.start.total_cmp(&b.start));
        clips
    }

    pub fn max_track_id(&self) -> Option<TrackId> {
        self.tracks
            .iter()
            .map(|t| t.id)
            .chain(self.clips.iter().map(|c| c.track_id))
            .max()
    }

    /// First id above every existing track.
    pub fn next_track_id(&self) -> TrackId {
        self.max_track_id().map(TrackId::next).unwrap_or_default()
    }

    /// Creates the track when missing. Returns the kind it ends up with.
    pub fn ensure_track(&mut self, id: TrackId, kind: TrackKind) -> TrackKind {
        if let Some(track) = self.find_track(id) {
            return track.kind;
        }
        self.tracks.push(Track::new(id, kind));
        self.tracks.sort_by_key(|t| t.id);
        kind
    }

    /// Tracks holding at least one clip, in render order: video and effects
    /// lanes before audio, then by id. This is also the on-screen row order.
    pub fn ordered_tracks(&self) -> Vec<Track> {
        let used: HashSet<TrackId> = self.clips.iter().map(|c| c.track_id).collect();
        let mut tracks: Vec<Track> = self
            .tracks
            .iter()
            .filter(|t| used.contains(&t.id))
            .copied()
            .collect();
        tracks.sort_by_key(|t| (t.kind.render_priority(), t.id));
        tracks
    }

    /// Render rank of a track; `None` when the track is unknown.
    pub fn render_rank(&self, id: TrackId) -> Option<(u8, TrackId)> {
        self.find_track(id).map(|t| (t.kind.render_priority(), t.id))
    }

    /// Removes tracks without clips. An empty project keeps one video track.
    pub fn prune_tracks(&mut self) {
        let used: HashSet<TrackId> = self.clips.iter().map(|c| c.track_id).collect();
        self.tracks.retain(|t| used.contains(&t.id));
        if self.clips.is_empty() && self.tracks.is_empty() {
            self.tracks.push(Track::new(TrackId(0), TrackKind::Video));
        }
    }

    /// Adds a track for every clip that points at a missing one, then prunes.
    pub fn reconcile_tracks(&mut self) {
        let missing: Vec<(TrackId, TrackKind)> = self
            .clips
            .iter()
            .filter(|c| self.find_track(c.track_id).is_none())
            .map(|c| {
                let kind = self
                    .clip_kind(c)
                    .map(TrackKind::for_media)
                    .unwrap_or(TrackKind::Video);
                (c.track_id, kind)
            })
            .collect();
        for (id, kind) in missing {
            self.ensure_track(id, kind);
        }
        self.prune_tracks();
        self.tracks.sort_by_key(|t| t.id);
    }

    /// Drops clips that repeat an id or a `(track, start)` slot, keeping the
    /// first occurrence. Returns how many were removed.
    pub fn dedupe_clips(&mut self) -> usize {
        let before = self.clips.len();
        let mut ids = HashSet::new();
        let mut slots = HashSet::new();
        self.clips.retain(|c| {
            let slot = (c.track_id, c.start.to_bits());
            ids.insert(c.id) && slots.insert(slot)
        });
        before - self.clips.len()
    }

    /// Checks every placement invariant. Commits refuse states that fail.
    pub fn validate(&self, eps: f64) -> Result<(), TimelineError> {
        let mut ids = HashSet::new();
        for clip in &self.clips {
            if !ids.insert(clip.id) {
                return Err(violation(format!("clip id {} is used twice", clip.id)));
            }
            if !(clip.start >= -BOUNDS_SLACK) || !clip.start.is_finite() {
                return Err(violation(format!("clip {} starts before 0", clip.id)));
            }
            if !(clip.duration > 0.0) || !clip.duration.is_finite() {
                return Err(violation(format!("clip {} has no duration", clip.id)));
            }
            let track = self
                .find_track(clip.track_id)
                .ok_or(TimelineError::TrackNotFound(clip.track_id))?;
            let kind = self.clip_kind(clip)?;
            if !track.kind.accepts(kind) {
                return Err(violation(format!(
                    "clip {} ({kind:?}) sits on {} track {}",
                    clip.id, track.kind, track.id
                )));
            }
            if kind != crate::MediaKind::Image {
                if clip.source_in < -BOUNDS_SLACK {
                    return Err(violation(format!("clip {} has negative source in", clip.id)));
                }
                if clip.source_in + clip.duration > clip.source_cap + BOUNDS_SLACK {
                    return Err(violation(format!(
                        "clip {} runs past the end of {}",
                        clip.id, clip.asset_name
                    )));
                }
            }
        }

        for track in &self.tracks {
            let clips = self.sorted_track_clips(track.id);
            for pair in clips.windows(2) {
                if pair[1].start < pair[0].end() - eps {
                    return Err(violation(format!(
                        "clips {} and {} overlap on track {}",
                        pair[0].id, pair[1].id, track.id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn violation(msg: String) -> TimelineError {
    TimelineError::InvariantViolation(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaKind;

    fn asset(name: &str, kind: MediaKind) -> Asset {
        Asset::new(name, format!("/p/videos/{name}"), 30.0, kind)
    }

    fn clip(name: &str, track: u32, start: f64, duration: f64) -> Clip {
        let mut c = Clip::new(name, TrackId(track), start, duration);
        c.source_cap = 30.0;
        c
    }

    #[test]
    fn test_prune_keeps_reserved_track() {
        let mut state = TimelineState::new();
        state.tracks.push(Track::new(TrackId(3), TrackKind::Audio));
        state.prune_tracks();
        assert_eq!(state.tracks, vec![Track::new(TrackId(0), TrackKind::Video)]);

        state.assets.push(asset("a.mp4", MediaKind::Video));
        state.clips.push(clip("a.mp4", 2, 0.0, 5.0));
        state.reconcile_tracks();
        assert_eq!(state.tracks, vec![Track::new(TrackId(2), TrackKind::Video)]);
    }

    #[test]
    fn test_ordered_tracks_put_audio_last() {
        let state = TimelineState::from_parts(
            vec![asset("a.mp4", MediaKind::Video), asset("s.mp3", MediaKind::Audio)],
            vec![
                clip("s.mp3", 0, 0.0, 5.0),
                clip("a.mp4", 4, 0.0, 5.0),
                clip("a.mp4", 1, 0.0, 5.0),
            ],
        );
        let order: Vec<u32> = state.ordered_tracks().iter().map(|t| t.id.0).collect();
        assert_eq!(order, vec![1, 4, 0]);
    }

    #[test]
    fn test_dedupe_on_load() {
        let a = clip("a.mp4", 0, 0.0, 5.0);
        let mut same_id = clip("a.mp4", 1, 0.0, 5.0);
        same_id.id = a.id;
        let same_slot = clip("a.mp4", 0, 0.0, 3.0);
        let state = TimelineState::from_parts(
            vec![asset("a.mp4", MediaKind::Video)],
            vec![a.clone(), same_id, same_slot],
        );
        assert_eq!(state.clips, vec![a]);
        assert_eq!(state.tracks.len(), 1);
    }

    #[test]
    fn test_validate_catches_each_invariant() {
        let base = TimelineState::from_parts(
            vec![asset("a.mp4", MediaKind::Video), asset("s.mp3", MediaKind::Audio)],
            vec![clip("a.mp4", 0, 0.0, 10.0), clip("s.mp3", 1, 0.0, 10.0)],
        );
        assert!(base.validate(0.01).is_ok());

        let mut overlap = base.clone();
        overlap.clips.push(clip("a.mp4", 0, 9.0, 2.0));
        assert!(matches!(
            overlap.validate(0.01),
            Err(TimelineError::InvariantViolation(_))
        ));

        let mut touching = base.clone();
        touching.clips.push(clip("a.mp4", 0, 10.0, 2.0));
        assert!(touching.validate(0.01).is_ok());

        let mut wrong_lane = base.clone();
        wrong_lane.clips[1].track_id = TrackId(0);
        wrong_lane.clips[1].start = 20.0;
        assert!(wrong_lane.validate(0.01).is_err());

        let mut past_end = base.clone();
        past_end.clips[0].source_in = 25.0;
        assert!(past_end.validate(0.01).is_err());

        let mut orphan = base.clone();
        orphan.clips[0].track_id = TrackId(9);
        assert!(matches!(
            orphan.validate(0.01),
            Err(TimelineError::TrackNotFound(TrackId(9)))
        ));
    }

    #[test]
    fn test_next_track_id() {
        let state = TimelineState::new();
        assert_eq!(state.next_track_id(), TrackId(1));
        let empty = TimelineState {
            assets: vec![],
            tracks: vec![],
            clips: vec![],
        };
        assert_eq!(empty.next_track_id(), TrackId(0));
    }
}
