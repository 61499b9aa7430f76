use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::editing::{self, DropTarget, Edit, MoveRequest, SplitDirection, TrimSide};
use crate::{
    plan_drop, register_asset, snap_time, Asset, CaptureDebouncer, Clip, ClipId, Clock,
    EditorConfig, History, MediaKind, MediaService, Selection, SystemClock, Snapshot,
    TimelineError, TimelineState, TrackId, TrackKind, Viewport,
};
use media_io::{layout, ExportClip};

/// Why the state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Explicit edit, recorded in history before it applied.
    Command,
    /// In-place edit, captured into history once edits go quiet.
    Untracked,
    Undo,
    Redo,
    Load,
    /// An optimistic edit was reverted after the media service failed.
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    pub revision: u64,
    pub origin: ChangeOrigin,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub placed: Vec<ClipId>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Single owner of the timeline state. Every mutation goes through a commit
/// that validates the candidate state, records history first and then swaps
/// the whole state in.
pub struct Editor {
    state: TimelineState,
    selection: Selection,
    clipboard: Vec<Clip>,
    history: History,
    capture: CaptureDebouncer,
    clock: Arc<dyn Clock>,
    config: EditorConfig,
    playhead: f64,
    revision: u64,
    subscribers: Vec<Sender<StateChanged>>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EditorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: TimelineState::new(),
            selection: Selection::None,
            clipboard: Vec::new(),
            history: History::new(config.history_limit),
            capture: CaptureDebouncer::new(config.capture_quiet()),
            clock,
            config,
            playhead: 0.0,
            revision: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &TimelineState {
        &self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clipboard(&self) -> &[Clip] {
        &self.clipboard
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn set_playhead(&mut self, seconds: f64) {
        self.playhead = seconds.clamp(0.0, self.config.timeline_ceiling);
    }

    pub fn set_snap(&mut self, enabled: bool) {
        self.config.snap_enabled = enabled;
    }

    /// State-changed notifications, one per commit.
    pub fn subscribe(&mut self) -> Receiver<StateChanged> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, origin: ChangeOrigin) {
        let event = StateChanged {
            revision: self.revision,
            origin,
        };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Swaps in `next` without validation or history.
    fn install(&mut self, next: TimelineState, origin: ChangeOrigin) {
        self.state = next;
        let state = &self.state;
        self.selection.retain_clips(|id| state.find_clip(id).is_some());
        self.selection.retain_assets(|name| state.find_asset(name).is_some());
        self.revision += 1;
        self.notify(origin);
    }

    /// Validates and applies a candidate state. Returns false for a no-op.
    fn commit(&mut self, next: TimelineState, origin: ChangeOrigin) -> Result<bool, TimelineError> {
        if next == self.state {
            return Ok(false);
        }
        next.validate(self.config.overlap_epsilon)?;

        let before = Snapshot::capture(&self.state);
        match origin {
            ChangeOrigin::Command => {
                if let Some(pending) = self.capture.flush() {
                    if pending != before {
                        self.history.push(pending);
                    }
                }
                self.history.push(before);
            }
            ChangeOrigin::Untracked => {
                self.history.clear_redo();
                self.capture.note_change(&before, self.clock.now());
            }
            ChangeOrigin::Undo | ChangeOrigin::Redo | ChangeOrigin::Load => self.capture.cancel(),
            ChangeOrigin::Rollback => {}
        }
        self.install(next, origin);
        Ok(true)
    }

    fn apply<T>(&mut self, edit: Edit<T>, origin: ChangeOrigin) -> Result<T, TimelineError> {
        let Edit {
            state,
            selection,
            output,
        } = edit;
        self.commit(state, origin)?;
        if let Some(selection) = selection {
            self.selection = selection;
        }
        Ok(output)
    }

    /// Reverts an optimistic edit after an external failure.
    fn rollback(&mut self, before: TimelineState) {
        warn!("rolling back the last change");
        self.install(before, ChangeOrigin::Rollback);
    }

    /// Moves a quiet pending capture into history. Call periodically.
    pub fn tick(&mut self) -> bool {
        let due = self.capture.poll(self.clock.now());
        self.record_capture(due)
    }

    /// Records any pending capture right away, e.g. before saving.
    pub fn flush_pending_capture(&mut self) -> bool {
        let pending = self.capture.flush();
        self.record_capture(pending)
    }

    fn record_capture(&mut self, baseline: Option<Snapshot>) -> bool {
        match baseline {
            Some(baseline) if baseline != Snapshot::capture(&self.state) => {
                debug!("captured untracked edits into history");
                self.history.push(baseline);
                true
            }
            _ => false,
        }
    }

    pub fn undo(&mut self) -> Result<(), TimelineError> {
        self.flush_pending_capture();
        let previous = self.history.undo(Snapshot::capture(&self.state))?;
        self.capture.cancel();
        self.install(previous.restore(), ChangeOrigin::Undo);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), TimelineError> {
        self.flush_pending_capture();
        let next = self.history.redo(Snapshot::capture(&self.state))?;
        self.capture.cancel();
        self.install(next.restore(), ChangeOrigin::Redo);
        Ok(())
    }

    /// Replaces everything, e.g. after opening a project. History starts over.
    pub fn load(&mut self, state: TimelineState) -> Result<(), TimelineError> {
        state.validate(self.config.overlap_epsilon)?;
        self.history.clear();
        self.capture.cancel();
        self.selection = Selection::None;
        self.install(state, ChangeOrigin::Load);
        Ok(())
    }

    // ---- selection ----

    pub fn click_clip(&mut self, id: ClipId, additive: bool) -> Result<(), TimelineError> {
        self.state.clip(id)?;
        self.selection.click_clip(id, additive);
        Ok(())
    }

    pub fn click_asset(&mut self, name: &str, additive: bool) -> Result<(), TimelineError> {
        self.state.asset(name)?;
        self.selection.click_asset(name, additive);
        Ok(())
    }

    pub fn select_clips(&mut self, ids: Vec<ClipId>) -> Result<(), TimelineError> {
        for id in &ids {
            self.state.clip(*id)?;
        }
        self.selection = Selection::from_clips(ids);
        Ok(())
    }

    pub fn select_assets(&mut self, names: Vec<String>) -> Result<(), TimelineError> {
        for name in &names {
            self.state.asset(name)?;
        }
        self.selection = if names.is_empty() {
            Selection::None
        } else {
            Selection::Assets(names)
        };
        Ok(())
    }

    /// Rubber-band selection between two screen corners.
    pub fn select_in_rect(&mut self, viewport: &Viewport, a: (f64, f64), b: (f64, f64)) -> usize {
        let ids = viewport.clips_in_rect(&self.state, a, b);
        let count = ids.len();
        self.selection = Selection::from_clips(ids);
        count
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    // ---- assets ----

    /// Adds or replaces an asset record.
    pub fn register_asset(&mut self, asset: Asset) -> Result<(), TimelineError> {
        let mut next = self.state.clone();
        match next.assets.iter_mut().find(|a| a.name == asset.name) {
            Some(existing) => {
                if existing.kind != asset.kind {
                    return Err(TimelineError::AssetExists(asset.name));
                }
                *existing = asset;
            }
            None => next.assets.push(asset),
        }
        self.commit(next, ChangeOrigin::Command)?;
        Ok(())
    }

    /// Copies a file into the project and registers it. Returns the asset name.
    pub fn import_file(
        &mut self,
        media: &dyn MediaService,
        project: &Path,
        source: &Path,
    ) -> Result<String, TimelineError> {
        let asset = register_asset(media, &self.config, project, source)?;
        let name = asset.name.clone();
        self.register_asset(asset)?;
        Ok(name)
    }

    /// Files dropped onto the timeline at a screen point: each is imported
    /// then placed on the hit lane, or on a new track when that lane cannot
    /// take it. One failing file does not stop the rest.
    pub fn import_drop(
        &mut self,
        media: &dyn MediaService,
        project: &Path,
        viewport: &Viewport,
        point: (f64, f64),
        files: &[PathBuf],
    ) -> ImportReport {
        let mut report = ImportReport::default();
        for file in files {
            let placed = self.import_file(media, project, file).and_then(|name| {
                let hit = viewport.hit_test(&self.state, point.0, point.1);
                let asset = self.state.asset(&name)?.clone();
                let target = plan_drop(&self.state, &self.config, &asset, hit);
                self.place_at(&name, target, hit.time)
            });
            match placed {
                Ok(id) => report.placed.push(id),
                Err(e) => {
                    warn!("dropping {} failed: {e}", file.display());
                    report.failed.push((file.clone(), e.to_string()));
                }
            }
        }
        report
    }

    /// Renames an asset file and every clip that uses it. The state change is
    /// applied first and reverted if the media service refuses.
    pub fn rename_asset(
        &mut self,
        media: &dyn MediaService,
        old: &str,
        new: &str,
    ) -> Result<(), TimelineError> {
        let old_path = self.state.asset(old)?.path.clone();
        let new_path = old_path.with_file_name(new.trim());
        let edit = editing::rename_asset(&self.state, old, new, new_path.clone())?;
        if edit.state == self.state {
            return Ok(());
        }
        let before = self.state.clone();
        let previous_selection = self.selection.clone();
        if let Selection::Assets(names) = &mut self.selection {
            for n in names.iter_mut().filter(|n| n.as_str() == old) {
                *n = new.trim().to_string();
            }
        }
        if let Err(e) = self.commit(edit.state, ChangeOrigin::Untracked) {
            self.selection = previous_selection;
            return Err(e);
        }

        if let Err(e) = media.rename_file(&old_path, &new_path) {
            self.rollback(before);
            self.selection = previous_selection;
            return Err(e.into());
        }
        info!("renamed {old} to {}", new.trim());
        Ok(())
    }

    // ---- clips ----

    /// Drops an asset at `start`, snapping on the target lane when enabled.
    pub fn place_asset(
        &mut self,
        asset_name: &str,
        target: DropTarget,
        start: f64,
    ) -> Result<ClipId, TimelineError> {
        let start = match target {
            DropTarget::Track(track) => snap_time(
                &self.state.clips,
                start,
                None,
                Some(track),
                self.config.snap_enabled,
            ),
            DropTarget::NewTrack => start,
        };
        self.place_at(asset_name, target, start)
    }

    fn place_at(
        &mut self,
        asset_name: &str,
        target: DropTarget,
        start: f64,
    ) -> Result<ClipId, TimelineError> {
        let edit = editing::place_asset(&self.state, &self.config, asset_name, target, start)?;
        self.apply(edit, ChangeOrigin::Command)
    }

    /// Drag-drop of a clip. A grabbed clip outside the selection becomes the
    /// selection; the whole selection then moves with it.
    pub fn move_clip(&mut self, anchor: ClipId, start: f64, track: TrackId) -> Result<(), TimelineError> {
        self.state.clip(anchor)?;
        if !self.selection.contains_clip(anchor) {
            self.selection = Selection::Clips(vec![anchor]);
        }
        let start = snap_time(
            &self.state.clips,
            start,
            Some(anchor),
            Some(track),
            self.config.snap_enabled,
        );
        let request = MoveRequest {
            anchor,
            start,
            track,
        };
        let edit = editing::move_clips(&self.state, &self.config, self.selection.clip_ids(), request)?;
        self.apply(edit, ChangeOrigin::Command)
    }

    pub fn resize_clip(&mut self, id: ClipId, delta: f64, side: TrimSide) -> Result<(), TimelineError> {
        let edit = editing::resize_clip(&self.state, &self.config, id, delta, side)?;
        self.apply(edit, ChangeOrigin::Untracked)
    }

    pub fn set_clip_color(&mut self, id: ClipId, color: &str) -> Result<(), TimelineError> {
        let mut next = self.state.clone();
        next.clip_mut(id)?.color_tag = color.to_string();
        self.commit(next, ChangeOrigin::Untracked)?;
        Ok(())
    }

    pub fn split_at_playhead(&mut self) -> Result<ClipId, TimelineError> {
        let edit = editing::split_at(&self.state, self.selection.clip_ids(), self.playhead)?;
        self.apply(edit, ChangeOrigin::Command)
    }

    pub fn split_and_select(&mut self, direction: SplitDirection) -> Result<Vec<ClipId>, TimelineError> {
        let edit = editing::split_and_select(
            &self.state,
            self.playhead,
            direction,
            self.config.overlap_epsilon,
        );
        self.apply(edit, ChangeOrigin::Command)
    }

    /// Copies the selected clips. Returns how many were copied.
    pub fn copy_selection(&mut self) -> usize {
        self.clipboard = editing::copy_clips(&self.state, self.selection.clip_ids());
        self.clipboard.len()
    }

    pub fn paste(&mut self) -> Result<Vec<ClipId>, TimelineError> {
        let edit = editing::paste_clips(&self.state, &self.config, &self.clipboard, self.playhead)?;
        self.apply(edit, ChangeOrigin::Command)
    }

    pub fn delete_selected_clips(&mut self) -> Result<usize, TimelineError> {
        let ids = self.selection.clip_ids().to_vec();
        if ids.is_empty() {
            return Ok(0);
        }
        let edit = editing::delete_clips(&self.state, &ids);
        self.apply(edit, ChangeOrigin::Command)
    }

    /// Deletes whatever is selected. Each selected asset loses its file first
    /// and then its record and clips. Assets whose file could not be deleted
    /// stay in the project and stay selected; the first failure is returned.
    pub fn delete_selection(&mut self, media: &dyn MediaService) -> Result<usize, TimelineError> {
        let names = match &self.selection {
            Selection::None => return Ok(0),
            Selection::Clips(_) => return self.delete_selected_clips(),
            Selection::Assets(names) => names.clone(),
        };

        let mut deleted = Vec::with_capacity(names.len());
        let mut failure = None;
        for name in &names {
            let Some(asset) = self.state.find_asset(name) else {
                continue;
            };
            match media.delete_file(&asset.path) {
                Ok(()) => deleted.push(name.clone()),
                Err(e) => {
                    warn!("could not delete {name}: {e}");
                    failure.get_or_insert(e);
                }
            }
        }

        let edit = editing::remove_assets(&self.state, &deleted);
        if let Some(e) = failure {
            // no selection override: the kept assets remain selected
            self.commit(edit.state, ChangeOrigin::Command)?;
            return Err(e.into());
        }
        let removed = self.apply(edit, ChangeOrigin::Command)?;
        info!("deleted {} assets and {removed} clips", deleted.len());
        Ok(removed)
    }

    /// Empty lane above every other; pruned by the next clip edit if unused.
    pub fn add_track(&mut self, kind: TrackKind) -> Result<TrackId, TimelineError> {
        let edit = editing::add_track(&self.state, kind);
        self.apply(edit, ChangeOrigin::Command)
    }

    /// Clip list for the exporter. Visual layers follow render order; video
    /// clips contribute their extracted audio when it exists on disk.
    pub fn export_clips(&self, project: Option<&Path>) -> Vec<ExportClip> {
        let order = self.state.ordered_tracks();
        let mut out = Vec::new();
        for clip in &self.state.clips {
            let Some(asset) = self.state.asset_for(clip) else {
                continue;
            };
            let layer = order
                .iter()
                .position(|t| t.id == clip.track_id)
                .unwrap_or(order.len()) as u32;
            let entry = |path: PathBuf, kind: MediaKind| ExportClip {
                path,
                kind,
                track_id: clip.track_id.0,
                layer,
                start: clip.start,
                duration: clip.duration,
                source_in: clip.source_in,
            };
            out.push(entry(asset.path.clone(), asset.kind));
            if asset.kind == MediaKind::Video {
                if let Some(root) = project {
                    let audio = layout::extracted_audio_path(root, &asset.name);
                    if audio.exists() {
                        out.push(entry(audio, MediaKind::Audio));
                    }
                }
            }
        }
        out
    }
}
