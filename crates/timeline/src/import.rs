use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::editing::{default_duration, DropTarget};
use crate::{
    kind_of, thumbnail_time, Asset, ClipId, EditorConfig, MediaKind, MediaService, TimelineError,
    TimelineState, TrackId, ViewportConfig,
};
use media_io::layout;

/// Seconds into a video where its library thumbnail is taken.
pub const LIBRARY_THUMBNAIL_AT: f64 = 2.0;

/// Screen geometry of the timeline area. The only place pixels exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Screen x of time 0 when unscrolled.
    pub left: f64,
    /// Screen y of the first row when unscrolled.
    pub top: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub pixels_per_second: f64,
    pub track_height: f64,
    pub edge_margin: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Viewport {
    pub fn new(config: &ViewportConfig) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            pixels_per_second: config
                .pixels_per_second
                .clamp(config.min_zoom, config.max_zoom),
            track_height: config.track_height,
            edge_margin: config.edge_margin,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    pub fn time_at(&self, x: f64) -> f64 {
        ((x - self.left + self.scroll_x) / self.pixels_per_second).max(0.0)
    }

    pub fn x_at(&self, t: f64) -> f64 {
        t * self.pixels_per_second + self.left - self.scroll_x
    }

    /// Fractional row under a screen y; negative above the first row.
    pub fn row_at(&self, y: f64) -> f64 {
        (y - self.top + self.scroll_y) / self.track_height
    }

    pub fn set_zoom(&mut self, pixels_per_second: f64) {
        self.pixels_per_second = pixels_per_second.clamp(self.min_zoom, self.max_zoom);
    }

    pub fn zoom_by(&mut self, factor: f64) {
        self.set_zoom(self.pixels_per_second * factor);
    }

    /// Maps a drop point to a time and a lane. Rows follow render order.
    /// Points beyond the rows by more than the edge margin mean "new track";
    /// points inside the margin stick to the nearest row.
    pub fn hit_test(&self, state: &TimelineState, x: f64, y: f64) -> DropPoint {
        let time = self.time_at(x);
        let rows = state.ordered_tracks();
        if rows.is_empty() {
            return DropPoint {
                time,
                target: DropTarget::NewTrack,
            };
        }
        let row = self.row_at(y);
        let margin = self.edge_margin / self.track_height;
        let last = rows.len() - 1;
        let index = if row < -margin || row >= rows.len() as f64 + margin {
            None
        } else {
            Some((row.floor().max(0.0) as usize).min(last))
        };
        DropPoint {
            time,
            target: index.map_or(DropTarget::NewTrack, |i| DropTarget::Track(rows[i].id)),
        }
    }

    /// Clips whose on-screen box intersects the rectangle spanned by two corners.
    pub fn clips_in_rect(
        &self,
        state: &TimelineState,
        (x0, y0): (f64, f64),
        (x1, y1): (f64, f64),
    ) -> Vec<ClipId> {
        let (t0, t1) = (self.time_at(x0.min(x1)), self.time_at(x0.max(x1)));
        let (r0, r1) = (self.row_at(y0.min(y1)), self.row_at(y0.max(y1)));
        let rows: Vec<TrackId> = state.ordered_tracks().iter().map(|t| t.id).collect();
        state
            .clips
            .iter()
            .filter(|c| {
                let Some(row) = rows.iter().position(|id| *id == c.track_id) else {
                    return false;
                };
                let (top, bottom) = (row as f64, row as f64 + 1.0);
                bottom > r0 && top < r1 && c.end() > t0 && c.start < t1
            })
            .map(|c| c.id)
            .collect()
    }
}

/// Result of hit-testing a drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropPoint {
    pub time: f64,
    pub target: DropTarget,
}

/// Keeps a hit lane only when the asset fits there as-is; otherwise the drop
/// opens a new track sized to the asset's kind.
pub fn plan_drop(
    state: &TimelineState,
    config: &EditorConfig,
    asset: &Asset,
    point: DropPoint,
) -> DropTarget {
    match point.target {
        DropTarget::Track(id)
            if state.fits(
                id,
                point.time,
                default_duration(asset, config),
                asset.track_kind(),
                config.overlap_epsilon,
            ) =>
        {
            DropTarget::Track(id)
        }
        _ => DropTarget::NewTrack,
    }
}

/// Copies `source` into the project and builds its asset record.
///
/// Probing failures fall back to the placeholder duration. Audio extraction
/// and thumbnails are best effort.
pub fn register_asset(
    media: &dyn MediaService,
    config: &EditorConfig,
    project: &Path,
    source: &Path,
) -> Result<Asset, TimelineError> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TimelineError::InvalidOp(format!("not a file: {}", source.display())))?;
    let kind = kind_of(&file_name)?;

    let stored = media.import_asset(project, source)?;
    let path = layout::media_path(project, &stored);
    let duration = match kind {
        MediaKind::Image => config.image_clip_seconds,
        _ => match media.probe_metadata(&path) {
            Ok(info) => info.duration_seconds.unwrap_or_else(|| {
                warn!("{stored} reports no duration, using {}s", config.placeholder_duration);
                config.placeholder_duration
            }),
            Err(e) => {
                warn!("probing {stored} failed ({e}), using {}s", config.placeholder_duration);
                config.placeholder_duration
            }
        },
    };

    let mut asset = Asset::new(stored, path, duration, kind);
    match kind {
        MediaKind::Video => {
            if let Err(e) = media.extract_audio_track(project, &asset.name) {
                warn!("audio extraction for {} failed: {e}", asset.name);
            }
            let at = thumbnail_time(LIBRARY_THUMBNAIL_AT, duration);
            asset.thumbnail = match media.generate_thumbnail(project, &asset.name, at) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("thumbnail for {} failed: {e}", asset.name);
                    None
                }
            };
        }
        MediaKind::Image => asset.thumbnail = Some(asset.path.clone()),
        MediaKind::Audio => {}
    }
    info!("registered {} ({:?}, {:.2}s)", asset.name, asset.kind, asset.duration);
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Clip, TrackKind};

    fn viewport() -> Viewport {
        let mut vp = Viewport::new(&ViewportConfig::default());
        vp.left = 100.0;
        vp.top = 50.0;
        vp
    }

    fn state() -> TimelineState {
        let mut a = Clip::new("a.mp4", TrackId(3), 0.0, 10.0);
        a.source_cap = 30.0;
        let mut s = Clip::new("s.mp3", TrackId(0), 0.0, 10.0);
        s.source_cap = 30.0;
        TimelineState::from_parts(
            vec![
                Asset::new("a.mp4", "/a.mp4", 30.0, MediaKind::Video),
                Asset::new("b.mp4", "/b.mp4", 30.0, MediaKind::Video),
                Asset::new("s.mp3", "/s.mp3", 30.0, MediaKind::Audio),
            ],
            vec![a, s],
        )
    }

    #[test]
    fn test_screen_to_time() {
        let mut vp = viewport();
        assert_eq!(vp.time_at(150.0), 5.0);
        vp.scroll_x = 50.0;
        assert_eq!(vp.time_at(150.0), 10.0);
        assert_eq!(vp.time_at(0.0), 0.0);
        assert_eq!(vp.x_at(10.0), 150.0);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut vp = viewport();
        vp.zoom_by(1000.0);
        assert_eq!(vp.pixels_per_second, 200.0);
        vp.zoom_by(0.0001);
        assert_eq!(vp.pixels_per_second, 1.0);
    }

    #[test]
    fn test_hit_test_uses_render_order() {
        let s = state();
        let vp = viewport();
        // row 0 is video track 3, row 1 is audio track 0
        assert_eq!(vp.hit_test(&s, 150.0, 60.0).target, DropTarget::Track(TrackId(3)));
        assert_eq!(vp.hit_test(&s, 150.0, 140.0).target, DropTarget::Track(TrackId(0)));
        // inside the margin below the rows
        assert_eq!(vp.hit_test(&s, 150.0, 215.0).target, DropTarget::Track(TrackId(0)));
        // well above or below
        assert_eq!(vp.hit_test(&s, 150.0, 0.0).target, DropTarget::NewTrack);
        assert_eq!(vp.hit_test(&s, 150.0, 400.0).target, DropTarget::NewTrack);
    }

    #[test]
    fn test_plan_drop_rejects_busy_or_mismatched_rows() {
        let s = state();
        let cfg = EditorConfig::default();
        let b = s.find_asset("b.mp4").unwrap().clone();
        let free = DropPoint { time: 10.0, target: DropTarget::Track(TrackId(3)) };
        let busy = DropPoint { time: 5.0, target: DropTarget::Track(TrackId(3)) };
        let audio_row = DropPoint { time: 20.0, target: DropTarget::Track(TrackId(0)) };
        assert_eq!(plan_drop(&s, &cfg, &b, free), DropTarget::Track(TrackId(3)));
        assert_eq!(plan_drop(&s, &cfg, &b, busy), DropTarget::NewTrack);
        assert_eq!(plan_drop(&s, &cfg, &b, audio_row), DropTarget::NewTrack);
        assert_eq!(s.find_track(TrackId(0)).unwrap().kind, TrackKind::Audio);
    }

    #[test]
    fn test_box_selection() {
        let s = state();
        let vp = viewport();
        // covers time 5..8 on row 1 only
        let ids = vp.clips_in_rect(&s, (150.0, 140.0), (180.0, 150.0));
        assert_eq!(ids.len(), 1);
        assert_eq!(s.find_clip(ids[0]).unwrap().asset_name, "s.mp3");
        // both rows
        assert_eq!(vp.clips_in_rect(&s, (100.0, 60.0), (300.0, 200.0)).len(), 2);
        // past the clips in time
        assert!(vp.clips_in_rect(&s, (300.0, 60.0), (400.0, 200.0)).is_empty());
    }
}
