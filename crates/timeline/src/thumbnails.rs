use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Asset, Clip, MediaKind, MediaService, TimelineState};

/// Requested times at or past the end of the media fall back to the first frame.
pub fn thumbnail_time(requested: f64, duration: f64) -> f64 {
    if requested < 0.0 || requested >= duration {
        0.0
    } else {
        requested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailSource {
    None,
    /// The asset is its own picture.
    File(PathBuf),
    Generate { file_name: String, at_seconds: f64 },
}

pub fn thumbnail_source(asset: &Asset, at_seconds: f64) -> ThumbnailSource {
    match asset.kind {
        MediaKind::Audio => ThumbnailSource::None,
        MediaKind::Image => ThumbnailSource::File(asset.path.clone()),
        MediaKind::Video => ThumbnailSource::Generate {
            file_name: asset.name.clone(),
            at_seconds: thumbnail_time(at_seconds, asset.duration),
        },
    }
}

/// Trimming changes the key, so stale pictures are never reused.
pub fn clip_thumbnail_key(clip: &Clip) -> String {
    format!("{}-{}-{}", clip.id, clip.source_in, clip.duration)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipThumbnails {
    pub head: Option<PathBuf>,
    pub tail: Option<PathBuf>,
}

/// First and last frame pictures for clips on the timeline.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: HashMap<String, ClipThumbnails>,
}

impl ThumbnailCache {
    pub fn get(&self, clip: &Clip) -> Option<&ClipThumbnails> {
        self.entries.get(&clip_thumbnail_key(clip))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clips with a known asset that have no entry yet.
    pub fn missing<'a>(&self, state: &'a TimelineState) -> Vec<&'a Clip> {
        state
            .clips
            .iter()
            .filter(|c| state.asset_for(c).is_some())
            .filter(|c| !self.entries.contains_key(&clip_thumbnail_key(c)))
            .collect()
    }

    /// Fills every missing entry and forgets entries for clips that changed
    /// or disappeared. Failures are cached as empty so they are not retried
    /// until the clip changes. Returns how many entries were added.
    pub fn refresh(&mut self, state: &TimelineState, media: &dyn MediaService, project: &Path) -> usize {
        let live: std::collections::HashSet<String> =
            state.clips.iter().map(clip_thumbnail_key).collect();
        self.entries.retain(|k, _| live.contains(k));

        let mut added = 0;
        for clip in self.missing(state) {
            let Some(asset) = state.asset_for(clip) else {
                continue;
            };
            let resolve = |at: f64| match thumbnail_source(asset, at) {
                ThumbnailSource::None => None,
                ThumbnailSource::File(p) => Some(p),
                ThumbnailSource::Generate {
                    file_name,
                    at_seconds,
                } => match media.generate_thumbnail(project, &file_name, at_seconds) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!("thumbnail for {file_name} at {at_seconds:.2}s failed: {e}");
                        None
                    }
                },
            };
            let entry = ClipThumbnails {
                head: resolve(clip.source_in),
                tail: resolve(clip.source_in + clip.duration),
            };
            self.entries.insert(clip_thumbnail_key(clip), entry);
            added += 1;
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_rules() {
        let video = Asset::new("a.mp4", "/p/videos/a.mp4", 30.0, MediaKind::Video);
        let image = Asset::new("i.png", "/p/videos/i.png", 10.0, MediaKind::Image);
        let audio = Asset::new("s.mp3", "/p/videos/s.mp3", 30.0, MediaKind::Audio);
        assert_eq!(thumbnail_source(&audio, 1.0), ThumbnailSource::None);
        assert_eq!(
            thumbnail_source(&image, 1.0),
            ThumbnailSource::File(PathBuf::from("/p/videos/i.png"))
        );
        assert_eq!(
            thumbnail_source(&video, 30.0),
            ThumbnailSource::Generate {
                file_name: "a.mp4".into(),
                at_seconds: 0.0
            }
        );
        assert_eq!(thumbnail_time(2.0, 30.0), 2.0);
        assert_eq!(thumbnail_time(2.0, 1.5), 0.0);
    }

    #[test]
    fn test_key_changes_with_trim() {
        let mut clip = Clip::new("a.mp4", crate::TrackId(0), 0.0, 5.0);
        let before = clip_thumbnail_key(&clip);
        clip.duration = 4.0;
        assert_ne!(before, clip_thumbnail_key(&clip));
    }
}
