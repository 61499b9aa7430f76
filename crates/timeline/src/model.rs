use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use uuid::Uuid;

use crate::MediaKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClipId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Small integer lane id. Stable, not necessarily contiguous.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl TrackId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Shifts by a signed offset, clamping at track 0.
    pub fn offset(self, delta: i64) -> Self {
        Self((i64::from(self.0) + delta).clamp(0, i64::from(u32::MAX)) as u32)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Effects,
}

impl TrackKind {
    /// Images collapse onto video lanes.
    pub fn for_media(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => TrackKind::Audio,
            MediaKind::Video | MediaKind::Image => TrackKind::Video,
        }
    }

    /// Whether a lane of this kind may hold clips that require `required`.
    pub fn is_compatible(self, required: TrackKind) -> bool {
        match required {
            TrackKind::Audio => self == TrackKind::Audio,
            TrackKind::Video | TrackKind::Effects => self != TrackKind::Audio,
        }
    }

    pub fn accepts(self, kind: MediaKind) -> bool {
        self.is_compatible(Self::for_media(kind))
    }

    /// Z-order rank; lower draws on top.
    pub fn render_priority(self) -> u8 {
        match self {
            TrackKind::Video | TrackKind::Effects => 0,
            TrackKind::Audio => 1,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Effects => "effects",
        };
        f.write_str(s)
    }
}

/// A registered media source. `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub path: PathBuf,
    /// Seconds. Images carry a filler value since they have no length.
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(
        rename = "thumbnailUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail: Option<PathBuf>,
}

impl Asset {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, duration: f64, kind: MediaKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            duration,
            kind,
            thumbnail: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    pub fn track_kind(&self) -> TrackKind {
        TrackKind::for_media(self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    #[serde(rename = "type")]
    pub kind: TrackKind,
}

impl Track {
    pub fn new(id: TrackId, kind: TrackKind) -> Self {
        Self { id, kind }
    }
}

/// A placed, time-bounded instance of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    #[serde(rename = "name")]
    pub asset_name: String,
    #[serde(rename = "trackId")]
    pub track_id: TrackId,
    pub start: f64,
    pub duration: f64,
    /// Offset into the asset where this clip's content begins.
    #[serde(rename = "beginmoment", default)]
    pub source_in: f64,
    /// Usable length of the underlying asset.
    #[serde(rename = "maxduration", default)]
    pub source_cap: f64,
    #[serde(rename = "color", default)]
    pub color_tag: String,
}

impl Clip {
    pub fn new(asset_name: impl Into<String>, track_id: TrackId, start: f64, duration: f64) -> Self {
        let id = ClipId::new();
        Self {
            id,
            asset_name: asset_name.into(),
            track_id,
            start,
            duration,
            source_in: 0.0,
            source_cap: duration,
            color_tag: pick_color(id).to_string(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Overlap with `[start, end)` beyond `eps`; touching edges do not count.
    pub fn overlaps(&self, start: f64, end: f64, eps: f64) -> bool {
        start < self.end() - eps && end > self.start + eps
    }

    /// Strictly inside, so a split never produces an empty child.
    pub fn strictly_contains(&self, t: f64) -> bool {
        t > self.start && t < self.end()
    }

    /// Inclusive containment used by playback.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end()
    }

    /// Position inside the asset for a timeline time.
    pub fn source_time_at(&self, t: f64) -> f64 {
        t - self.start + self.source_in
    }

    /// Same content under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: ClipId::new(),
            ..self.clone()
        }
    }
}

pub const CLIP_COLORS: &[&str] = &[
    "#E57373", "#64B5F6", "#81C784", "#FFD54F", "#BA68C8", "#4DB6AC", "#FF8A65", "#A1887F",
];

/// Deterministic palette pick so a clip's color follows its id.
pub fn pick_color(id: ClipId) -> &'static str {
    let idx = id.0.as_bytes()[0] as usize % CLIP_COLORS.len();
    CLIP_COLORS[idx]
}

/// Either clips or assets are selected, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Clips(Vec<ClipId>),
    Assets(Vec<String>),
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::None => true,
            Selection::Clips(ids) => ids.is_empty(),
            Selection::Assets(names) => names.is_empty(),
        }
    }

    pub fn clip_ids(&self) -> &[ClipId] {
        match self {
            Selection::Clips(ids) => ids,
            _ => &[],
        }
    }

    pub fn asset_names(&self) -> &[String] {
        match self {
            Selection::Assets(names) => names,
            _ => &[],
        }
    }

    pub fn contains_clip(&self, id: ClipId) -> bool {
        self.clip_ids().contains(&id)
    }

    /// Click selection. With `additive` the clip is toggled in or out of the
    /// current clip set; otherwise it replaces everything.
    pub fn click_clip(&mut self, id: ClipId, additive: bool) {
        let mut ids = if additive { self.clip_ids().to_vec() } else { Vec::new() };
        if let Some(pos) = ids.iter().position(|c| *c == id) {
            ids.remove(pos);
        } else {
            ids.push(id);
        }
        *self = Selection::from_clips(ids);
    }

    pub fn click_asset(&mut self, name: &str, additive: bool) {
        let mut names = if additive { self.asset_names().to_vec() } else { Vec::new() };
        if let Some(pos) = names.iter().position(|n| n == name) {
            names.remove(pos);
        } else {
            names.push(name.to_string());
        }
        *self = if names.is_empty() {
            Selection::None
        } else {
            Selection::Assets(names)
        };
    }

    pub fn from_clips(ids: Vec<ClipId>) -> Self {
        if ids.is_empty() {
            Selection::None
        } else {
            Selection::Clips(ids)
        }
    }

    /// Drops ids that no longer resolve.
    pub fn retain_clips(&mut self, mut exists: impl FnMut(ClipId) -> bool) {
        if let Selection::Clips(ids) = self {
            ids.retain(|id| exists(*id));
            if ids.is_empty() {
                *self = Selection::None;
            }
        }
    }

    pub fn retain_assets(&mut self, mut exists: impl FnMut(&str) -> bool) {
        if let Selection::Assets(names) = self {
            names.retain(|n| exists(n));
            if names.is_empty() {
                *self = Selection::None;
            }
        }
    }
}
