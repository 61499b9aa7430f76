use chrono::{DateTime, Utc};
use media_io::layout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use timeline::TimelineState;
use tracing::{debug, info, warn};

use crate::{ProjectDocument, ProjectError};

const SNAPSHOT_PREFIX: &str = "main";
const SNAPSHOT_EXTENSION: &str = "project";

/// `main{epochMillis}.project`
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("{SNAPSHOT_PREFIX}{}.{SNAPSHOT_EXTENSION}", at.timestamp_millis())
}

/// Timestamp encoded in a snapshot file name.
pub fn snapshot_millis(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_suffix(SNAPSHOT_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
}

/// A folder of project folders.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
    /// Newest snapshots kept per project; `None` keeps all of them.
    snapshot_retention: Option<usize>,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot_retention: None,
        }
    }

    pub fn with_retention(mut self, keep: usize) -> Self {
        self.snapshot_retention = Some(keep.max(1));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>, ProjectError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut projects: Vec<ProjectInfo> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| ProjectInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
            })
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    /// Creates the project folder with its media subfolders and an empty
    /// first snapshot.
    pub fn create(&self, name: &str) -> Result<ProjectHandle, ProjectError> {
        let dir = self.project_dir(name)?;
        if dir.exists() {
            return Err(ProjectError::Exists(dir));
        }
        fs::create_dir_all(&dir)?;
        for sub in layout::ALL {
            fs::create_dir_all(dir.join(sub))?;
        }
        let handle = self.handle(name, dir);
        handle.save(&TimelineState::new())?;
        info!("created project {name} at {}", handle.dir.display());
        Ok(handle)
    }

    pub fn open(&self, name: &str) -> Result<ProjectHandle, ProjectError> {
        let dir = self.project_dir(name)?;
        if !dir.is_dir() {
            return Err(ProjectError::NotFound(dir));
        }
        for sub in layout::ALL {
            fs::create_dir_all(dir.join(sub))?;
        }
        Ok(self.handle(name, dir))
    }

    pub fn delete(&self, name: &str) -> Result<(), ProjectError> {
        let dir = self.project_dir(name)?;
        if !dir.is_dir() {
            return Err(ProjectError::NotFound(dir));
        }
        fs::remove_dir_all(&dir)?;
        info!("deleted project {name}");
        Ok(())
    }

    fn project_dir(&self, name: &str) -> Result<PathBuf, ProjectError> {
        let trimmed = name.trim();
        let bad = trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\']);
        if bad {
            return Err(ProjectError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(trimmed))
    }

    fn handle(&self, name: &str, dir: PathBuf) -> ProjectHandle {
        ProjectHandle {
            name: name.trim().to_string(),
            dir,
            snapshot_retention: self.snapshot_retention,
        }
    }
}

/// One open project folder.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    name: String,
    dir: PathBuf,
    snapshot_retention: Option<usize>,
}

impl ProjectHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.dir.join(layout::EXPORT_DIR)
    }

    /// Snapshot file names, oldest first.
    pub fn list_snapshots(&self) -> Result<Vec<String>, ProjectError> {
        let mut names: Vec<(i64, String)> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter_map(|name| snapshot_millis(&name).map(|ms| (ms, name)))
            .collect();
        names.sort();
        Ok(names.into_iter().map(|(_, name)| name).collect())
    }

    pub fn save(&self, state: &TimelineState) -> Result<PathBuf, ProjectError> {
        self.save_at(state, Utc::now())
    }

    /// Writes a new snapshot stamped `at`. A name clash moves the stamp
    /// forward one millisecond at a time.
    pub fn save_at(&self, state: &TimelineState, at: DateTime<Utc>) -> Result<PathBuf, ProjectError> {
        let mut at = at;
        let mut path = self.dir.join(snapshot_file_name(at));
        while path.exists() {
            at += chrono::Duration::milliseconds(1);
            path = self.dir.join(snapshot_file_name(at));
        }
        let doc = ProjectDocument::from_state(&self.name, state, at);
        fs::write(&path, doc.to_json()?)?;
        debug!("saved {}", path.display());

        if let Some(keep) = self.snapshot_retention {
            self.prune_snapshots(keep)?;
        }
        Ok(path)
    }

    pub fn load_latest(&self) -> Result<ProjectDocument, ProjectError> {
        let latest = self
            .list_snapshots()?
            .pop()
            .ok_or_else(|| ProjectError::NoSnapshot(self.dir.clone()))?;
        self.load_snapshot(&latest)
    }

    pub fn load_snapshot(&self, file_name: &str) -> Result<ProjectDocument, ProjectError> {
        if snapshot_millis(file_name).is_none() {
            return Err(ProjectError::InvalidName(file_name.to_string()));
        }
        let path = self.dir.join(file_name);
        if !path.is_file() {
            return Err(ProjectError::NotFound(path));
        }
        let doc = ProjectDocument::from_json(&fs::read_to_string(&path)?)?;
        if doc.project_name != self.name {
            warn!("{file_name} names project {:?}, folder is {:?}", doc.project_name, self.name);
        }
        Ok(doc)
    }

    /// Deletes all but the newest `keep` snapshots. Returns how many went.
    pub fn prune_snapshots(&self, keep: usize) -> Result<usize, ProjectError> {
        let names = self.list_snapshots()?;
        let excess = names.len().saturating_sub(keep.max(1));
        for name in &names[..excess] {
            fs::remove_file(self.dir.join(name))?;
        }
        if excess > 0 {
            debug!("pruned {excess} old snapshots");
        }
        Ok(excess)
    }
}
