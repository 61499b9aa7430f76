use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{Asset, Clip, TimelineError, TimelineState, Track};

/// Immutable copy of the editable parts of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub clips: Vec<Clip>,
    pub assets: Vec<Asset>,
    /// Kept so explicitly added empty lanes come back exactly.
    pub tracks: Vec<Track>,
}

impl Snapshot {
    pub fn capture(state: &TimelineState) -> Self {
        Self {
            clips: state.clips.clone(),
            assets: state.assets.clone(),
            tracks: state.tracks.clone(),
        }
    }

    pub fn restore(self) -> TimelineState {
        let mut state = TimelineState {
            assets: self.assets,
            tracks: self.tracks,
            clips: self.clips,
        };
        let orphaned = state
            .clips
            .iter()
            .any(|c| state.find_track(c.track_id).is_none());
        if orphaned || state.tracks.is_empty() {
            state.reconcile_tracks();
        }
        state
    }
}

/// Bounded undo/redo stacks of pre-edit snapshots.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records the state as it was before an edit. Evicts the oldest entry
    /// past the limit and invalidates redo.
    pub fn push(&mut self, before: Snapshot) {
        self.undo_stack.push_back(before);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    /// Pops the newest entry, parking `current` on the redo stack.
    pub fn undo(&mut self, current: Snapshot) -> Result<Snapshot, TimelineError> {
        let entry = self
            .undo_stack
            .pop_back()
            .ok_or(TimelineError::HistoryEmpty("undo stack"))?;
        self.redo_stack.push(current);
        Ok(entry)
    }

    pub fn redo(&mut self, current: Snapshot) -> Result<Snapshot, TimelineError> {
        let entry = self
            .redo_stack
            .pop()
            .ok_or(TimelineError::HistoryEmpty("redo stack"))?;
        self.undo_stack.push_back(current);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        Ok(entry)
    }

    /// Drops everything that could be redone. Any new edit forks history.
    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Time source for debouncing.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct PendingCapture {
    baseline: Snapshot,
    last_change: Instant,
}

/// Captures untracked edits into history once they go quiet.
///
/// The first untracked change records the state before it as the baseline;
/// further changes only push the deadline back. When `quiet` elapses without
/// another change, the baseline is handed out for the undo stack.
#[derive(Debug, Clone)]
pub struct CaptureDebouncer {
    quiet: Duration,
    pending: Option<PendingCapture>,
}

impl CaptureDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    pub fn note_change(&mut self, before: &Snapshot, now: Instant) {
        match &mut self.pending {
            Some(p) => p.last_change = now,
            None => {
                debug!("history capture armed");
                self.pending = Some(PendingCapture {
                    baseline: before.clone(),
                    last_change: now,
                });
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the baseline once the quiet period has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Snapshot> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.last_change) >= self.quiet);
        if due {
            self.pending.take().map(|p| p.baseline)
        } else {
            None
        }
    }

    /// Returns the baseline immediately, quiet period or not.
    pub fn flush(&mut self) -> Option<Snapshot> {
        self.pending.take().map(|p| p.baseline)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
