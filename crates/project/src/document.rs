use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use timeline::{Asset, Clip, TimelineState};

use crate::ProjectError;

/// On-disk shape of one project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    pub project_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub clips: Vec<Clip>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub last_modified: i64,
}

impl ProjectDocument {
    pub fn from_state(project_name: impl Into<String>, state: &TimelineState, at: DateTime<Utc>) -> Self {
        Self {
            project_name: project_name.into(),
            assets: state.assets.clone(),
            clips: state.clips.clone(),
            last_modified: at.timestamp_millis(),
        }
    }

    /// Rebuilds the editable state. Duplicate clips are dropped and the
    /// track set is derived from the clips.
    pub fn into_state(self) -> TimelineState {
        TimelineState::from_parts(self.assets, self.clips)
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.last_modified).single()
    }

    pub fn from_json(raw: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string(self)?)
    }
}
