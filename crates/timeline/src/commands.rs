use serde::{Deserialize, Serialize};

use crate::editing::{DropTarget, SplitDirection, TrimSide};
use crate::{ClipId, Editor, TimelineError, TrackId, TrackKind};

/// Serializable form of an editor action, so edits can be scripted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    SelectClips {
        clips: Vec<ClipId>,
    },
    SelectAssets {
        assets: Vec<String>,
    },
    ClearSelection,
    /// Drops an asset; without `track` it lands on a new track.
    Place {
        asset: String,
        #[serde(default)]
        track: Option<TrackId>,
        start: f64,
    },
    Move {
        anchor: ClipId,
        start: f64,
        track: TrackId,
    },
    Resize {
        clip: ClipId,
        side: TrimSide,
        delta: f64,
    },
    SetPlayhead {
        time: f64,
    },
    Split,
    SplitAndSelect {
        direction: SplitDirection,
    },
    Copy,
    Paste,
    DeleteClips,
    AddTrack {
        kind: TrackKind,
    },
    SetColor {
        clip: ClipId,
        color: String,
    },
    SetSnap {
        enabled: bool,
    },
    ToggleSnap,
    Undo,
    Redo,
}

/// What a command produced, for scripts that chain on new ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum CommandOutput {
    Done,
    Clip(ClipId),
    Clips(Vec<ClipId>),
    Track(TrackId),
    Count(usize),
}

impl Editor {
    /// Runs one command. Media-backed actions (import, rename and asset
    /// deletion) need a `MediaService` and are called directly instead.
    pub fn execute(&mut self, command: EditCommand) -> Result<CommandOutput, TimelineError> {
        let output = match command {
            EditCommand::SelectClips { clips } => {
                self.select_clips(clips)?;
                CommandOutput::Done
            }
            EditCommand::SelectAssets { assets } => {
                self.select_assets(assets)?;
                CommandOutput::Done
            }
            EditCommand::ClearSelection => {
                self.clear_selection();
                CommandOutput::Done
            }
            EditCommand::Place {
                asset,
                track,
                start,
            } => {
                let target = track.map_or(DropTarget::NewTrack, DropTarget::Track);
                CommandOutput::Clip(self.place_asset(&asset, target, start)?)
            }
            EditCommand::Move {
                anchor,
                start,
                track,
            } => {
                self.move_clip(anchor, start, track)?;
                CommandOutput::Done
            }
            EditCommand::Resize { clip, side, delta } => {
                self.resize_clip(clip, delta, side)?;
                CommandOutput::Done
            }
            EditCommand::SetPlayhead { time } => {
                self.set_playhead(time);
                CommandOutput::Done
            }
            EditCommand::Split => CommandOutput::Clip(self.split_at_playhead()?),
            EditCommand::SplitAndSelect { direction } => {
                CommandOutput::Clips(self.split_and_select(direction)?)
            }
            EditCommand::Copy => CommandOutput::Count(self.copy_selection()),
            EditCommand::Paste => CommandOutput::Clips(self.paste()?),
            EditCommand::DeleteClips => CommandOutput::Count(self.delete_selected_clips()?),
            EditCommand::AddTrack { kind } => CommandOutput::Track(self.add_track(kind)?),
            EditCommand::SetColor { clip, color } => {
                self.set_clip_color(clip, &color)?;
                CommandOutput::Done
            }
            EditCommand::SetSnap { enabled } => {
                self.set_snap(enabled);
                CommandOutput::Done
            }
            EditCommand::ToggleSnap => {
                self.set_snap(!self.config().snap_enabled);
                CommandOutput::Done
            }
            EditCommand::Undo => {
                self.undo()?;
                CommandOutput::Done
            }
            EditCommand::Redo => {
                self.redo()?;
                CommandOutput::Done
            }
        };
        Ok(output)
    }

    /// Runs commands in order, stopping at the first failure. Earlier
    /// commands stay applied.
    pub fn execute_all(
        &mut self,
        commands: impl IntoIterator<Item = EditCommand>,
    ) -> Result<Vec<CommandOutput>, (usize, TimelineError)> {
        commands
            .into_iter()
            .enumerate()
            .map(|(i, command)| self.execute(command).map_err(|e| (i, e)))
            .collect()
    }
}
