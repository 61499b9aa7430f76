//! Pure editing operations: each takes the current state and returns the
//! replacement. Nothing here touches history or notifies anyone; the
//! `Editor` validates and commits the result.

use crate::{Selection, TimelineState};

mod clipboard;
mod movement;
mod place;
mod remove;
mod split;
mod trim;

pub use clipboard::*;
pub use movement::*;
pub use place::*;
pub use remove::*;
pub use split::*;
pub use trim::*;

/// A computed but uncommitted change.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<T = ()> {
    pub state: TimelineState,
    /// `Some` when the operation decides what ends up selected.
    pub selection: Option<Selection>,
    pub output: T,
}

impl<T> Edit<T> {
    pub fn new(state: TimelineState, output: T) -> Self {
        Self {
            state,
            selection: None,
            output,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }
}
