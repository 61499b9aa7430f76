use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::{Clip, ClipId, MediaKind, PlaybackConfig, TimelineState};
use media_io::{layout, EncodedFrame};

/// One persistent player per audible clip.
pub trait AudioPlayer {
    /// Current position inside the source, in seconds.
    fn position(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    /// Source length once known.
    fn duration(&self) -> Option<f64>;
}

pub trait AudioBackend {
    fn open(&mut self, clip: ClipId, source: &Path) -> Box<dyn AudioPlayer>;
}

/// Backend without output: players only keep time.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioBackend for SilentAudio {
    fn open(&mut self, _clip: ClipId, _source: &Path) -> Box<dyn AudioPlayer> {
        Box::new(SilentPlayer::default())
    }
}

#[derive(Debug, Default)]
pub struct SilentPlayer {
    base: f64,
    started: Option<Instant>,
}

impl AudioPlayer for SilentPlayer {
    fn position(&self) -> f64 {
        self.base + self.started.map_or(0.0, |s| s.elapsed().as_secs_f64())
    }

    fn seek(&mut self, seconds: f64) {
        self.base = seconds;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn play(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.base = self.position();
        self.started = None;
    }

    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn duration(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// Ask the media service for the still of `path` at `at_millis`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    pub clip_id: ClipId,
    pub path: PathBuf,
    pub at_millis: u64,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameResponse {
    pub clip_id: ClipId,
    pub generation: u64,
    pub frame: EncodedFrame,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// New externally visible time, when the throttle let one through.
    pub published: Option<f64>,
    pub frame: Option<FrameRequest>,
}

/// The topmost visual clip at `t`: video lanes outrank audio lanes, then the
/// lower track id wins.
pub fn top_clip_at(state: &TimelineState, t: f64) -> Option<&Clip> {
    state
        .clips
        .iter()
        .filter(|c| c.contains(t))
        .filter(|c| state.clip_kind(c).is_ok_and(MediaKind::is_visual))
        .min_by_key(|c| state.render_rank(c.track_id).unwrap_or((u8::MAX, c.track_id)))
}

/// Every clip with sound at `t`.
pub fn active_audio_at(state: &TimelineState, t: f64) -> Vec<&Clip> {
    state
        .clips
        .iter()
        .filter(|c| c.contains(t))
        .filter(|c| {
            state
                .clip_kind(c)
                .is_ok_and(|k| k != MediaKind::Image)
        })
        .collect()
}

/// Drives the preview: owns the playhead clock, picks what is on screen and
/// keeps one audio player per audible clip in step with it. Reads timeline
/// state but never edits it.
pub struct PlaybackSync {
    config: PlaybackConfig,
    state: PlaybackState,
    clock: f64,
    current_time: f64,
    since_publish: Duration,
    top_clip: Option<ClipId>,
    active_audio: Vec<ClipId>,
    players: HashMap<ClipId, Box<dyn AudioPlayer>>,
    backend: Box<dyn AudioBackend>,
    project_root: Option<PathBuf>,
    generation: u64,
    last_request: Option<(ClipId, u64)>,
    displayed: Option<FrameResponse>,
}

impl PlaybackSync {
    pub fn new(config: PlaybackConfig, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            config,
            state: PlaybackState::Stopped,
            clock: 0.0,
            current_time: 0.0,
            since_publish: Duration::ZERO,
            top_clip: None,
            active_audio: Vec::new(),
            players: HashMap::new(),
            backend,
            project_root: None,
            generation: 0,
            last_request: None,
            displayed: None,
        }
    }

    /// Video clips then play their extracted audio from this project.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// The throttled, externally visible playhead.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn top_clip(&self) -> Option<ClipId> {
        self.top_clip
    }

    pub fn active_audio(&self) -> &[ClipId] {
        &self.active_audio
    }

    pub fn displayed_frame(&self) -> Option<&FrameResponse> {
        self.displayed.as_ref()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Starts accumulating from the current playhead.
    pub fn play(&mut self, timeline: &TimelineState) -> Option<FrameRequest> {
        if self.is_playing() {
            return None;
        }
        self.state = PlaybackState::Playing;
        self.clock = self.current_time;
        self.since_publish = Duration::ZERO;
        debug!("playback started at {:.2}s", self.current_time);
        self.refresh(timeline, false)
    }

    /// Freezes the clock and publishes where it stopped.
    pub fn pause(&mut self, timeline: &TimelineState) -> Option<FrameRequest> {
        if !self.is_playing() {
            return None;
        }
        self.state = PlaybackState::Stopped;
        self.current_time = self.clock;
        debug!("playback stopped at {:.2}s", self.current_time);
        self.refresh(timeline, false)
    }

    pub fn toggle(&mut self, timeline: &TimelineState) -> Option<FrameRequest> {
        if self.is_playing() {
            self.pause(timeline)
        } else {
            self.play(timeline)
        }
    }

    /// Jumps the playhead. Always yields one frame request and reseeks every
    /// player, without changing the play state.
    pub fn seek(&mut self, timeline: &TimelineState, t: f64) -> Option<FrameRequest> {
        let t = t.max(0.0);
        self.clock = t;
        self.current_time = t;
        self.since_publish = Duration::ZERO;
        self.refresh_with(timeline, true, true)
    }

    /// Advances the clock by `elapsed` wall time while playing.
    pub fn tick(&mut self, timeline: &TimelineState, elapsed: Duration) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::default();
        }
        self.clock += elapsed.as_secs_f64();
        self.since_publish += elapsed;

        let mut published = None;
        let interval = self.config.publish_interval();
        if self.since_publish >= interval {
            self.since_publish = (self.since_publish - interval).min(interval);
            self.current_time = self.clock;
            published = Some(self.current_time);
        }
        TickOutcome {
            published,
            frame: self.refresh(timeline, false),
        }
    }

    /// Recomputes top clip and audio after an edit or a tick.
    pub fn refresh(&mut self, timeline: &TimelineState, force_frame: bool) -> Option<FrameRequest> {
        self.refresh_with(timeline, force_frame, false)
    }

    fn refresh_with(
        &mut self,
        timeline: &TimelineState,
        force_frame: bool,
        force_seek: bool,
    ) -> Option<FrameRequest> {
        let t = self.current_time;
        let top = top_clip_at(timeline, t);
        if top.map(|c| c.id) != self.top_clip {
            trace!("top clip now {:?}", top.map(|c| c.id));
        }
        self.top_clip = top.map(|c| c.id);
        if top.is_none() {
            self.displayed = None;
            self.last_request = None;
        }

        let request = top.and_then(|clip| {
            let asset = timeline.asset_for(clip)?;
            let at_millis = (clip.source_time_at(t).max(0.0) * 1000.0).round() as u64;
            let key = (clip.id, at_millis);
            if !force_frame && self.last_request == Some(key) {
                return None;
            }
            self.generation += 1;
            self.last_request = Some(key);
            Some(FrameRequest {
                clip_id: clip.id,
                path: asset.path.clone(),
                at_millis,
                generation: self.generation,
            })
        });

        self.sync_audio(timeline, t, force_seek);
        request
    }

    /// Applies a rendered frame unless it is stale: the clip is gone, no
    /// longer on top, or a newer frame is already shown.
    pub fn accept_frame(&mut self, timeline: &TimelineState, response: FrameResponse) -> bool {
        let live = timeline.find_clip(response.clip_id).is_some()
            && self.top_clip == Some(response.clip_id)
            && self
                .displayed
                .as_ref()
                .map_or(true, |d| response.generation > d.generation);
        if live {
            self.displayed = Some(response);
        } else {
            trace!("discarding stale frame for {}", response.clip_id);
        }
        live
    }

    fn audio_source(&self, timeline: &TimelineState, clip: &Clip) -> Option<PathBuf> {
        let asset = timeline.asset_for(clip)?;
        match (asset.kind, &self.project_root) {
            (MediaKind::Video, Some(root)) => Some(layout::extracted_audio_path(root, &asset.name)),
            _ => Some(asset.path.clone()),
        }
    }

    fn sync_audio(&mut self, timeline: &TimelineState, t: f64, force_seek: bool) {
        let active = active_audio_at(timeline, t);
        let wanted: HashSet<ClipId> = active.iter().map(|c| c.id).collect();
        self.players.retain(|id, player| {
            let keep = wanted.contains(id);
            if !keep {
                player.pause();
            }
            keep
        });

        let playing = self.is_playing();
        let tolerance = self.config.audio_drift_tolerance;
        for clip in &active {
            if !self.players.contains_key(&clip.id) {
                let Some(source) = self.audio_source(timeline, clip) else {
                    continue;
                };
                let player = self.backend.open(clip.id, &source);
                self.players.insert(clip.id, player);
            }
            let Some(player) = self.players.get_mut(&clip.id) else {
                continue;
            };

            let target = clip.source_time_at(t);
            let in_range = target >= 0.0 && player.duration().map_or(true, |d| target < d);
            if !in_range {
                if player.is_playing() {
                    player.pause();
                }
                continue;
            }
            if force_seek || (player.position() - target).abs() > tolerance {
                player.seek(target);
            }
            if playing && !player.is_playing() {
                player.play();
            } else if !playing && player.is_playing() {
                player.pause();
            }
        }
        self.active_audio = active.iter().map(|c| c.id).collect();
    }
}
