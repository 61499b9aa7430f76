use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use timeline::{ChangeOrigin, Editor, StateChanged};
use tracing::debug;

use crate::{ProjectError, ProjectHandle};

/// Saves a snapshot once editor notifications have been quiet for a while.
/// Loads are not edits and never trigger a save.
pub struct AutoSaver {
    events: Receiver<StateChanged>,
    quiet: Duration,
    last_change: Option<Instant>,
    saved_revision: Option<u64>,
}

impl AutoSaver {
    pub const DEFAULT_QUIET: Duration = Duration::from_millis(500);

    pub fn new(events: Receiver<StateChanged>, quiet: Duration) -> Self {
        Self {
            events,
            quiet,
            last_change: None,
            saved_revision: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.last_change.is_some()
    }

    pub fn saved_revision(&self) -> Option<u64> {
        self.saved_revision
    }

    /// Drains notifications. Changes count from the moment they are seen.
    fn drain(&mut self, now: Instant) {
        for event in self.events.try_iter() {
            if event.origin == ChangeOrigin::Load {
                continue;
            }
            self.last_change = Some(now);
        }
    }

    /// True once the quiet period has elapsed since the last seen change.
    pub fn poll(&mut self, now: Instant) -> bool {
        self.drain(now);
        self.last_change
            .is_some_and(|t| now.saturating_duration_since(t) >= self.quiet)
    }

    pub fn save_if_due(
        &mut self,
        now: Instant,
        project: &ProjectHandle,
        editor: &Editor,
    ) -> Result<Option<PathBuf>, ProjectError> {
        if !self.poll(now) {
            return Ok(None);
        }
        self.save(project, editor).map(Some)
    }

    /// Saves pending changes right away, e.g. on exit.
    pub fn flush(&mut self, project: &ProjectHandle, editor: &Editor) -> Result<Option<PathBuf>, ProjectError> {
        self.drain(Instant::now());
        if !self.is_dirty() {
            return Ok(None);
        }
        self.save(project, editor).map(Some)
    }

    fn save(&mut self, project: &ProjectHandle, editor: &Editor) -> Result<PathBuf, ProjectError> {
        let path = project.save(editor.state())?;
        self.last_change = None;
        self.saved_revision = Some(editor.revision());
        debug!("autosaved revision {}", editor.revision());
        Ok(path)
    }
}
