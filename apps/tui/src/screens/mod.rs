//! TUI screen definitions.
//!
//! The app shows exactly one screen at a time; each owns its state,
//! turns messages into commands, and draws itself.

pub mod builder;
mod list;

use std::fmt;

use ratatui::prelude::*;

use crate::event::{Command, Msg};

pub use builder::PipelineBuilder;
pub use list::ListScreen;

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenId {
    List,
    Builder,
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "Pipelines"),
            Self::Builder => write!(f, "Pipeline Builder"),
        }
    }
}

/// The active screen.
pub enum Screen {
    List(ListScreen),
    Builder(Box<PipelineBuilder>),
}

impl Screen {
    pub fn id(&self) -> ScreenId {
        match self {
            Self::List(_) => ScreenId::List,
            Self::Builder(_) => ScreenId::Builder,
        }
    }

    pub fn update(&mut self, msg: Msg) -> Option<Command> {
        match self {
            Self::List(s) => s.update(msg),
            Self::Builder(b) => b.update(msg),
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        match self {
            Self::List(s) => s.draw(f),
            Self::Builder(b) => b.draw(f),
        }
    }
}
