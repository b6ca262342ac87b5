//! Pluqqy TUI: browse pipelines and build them from prompt, context, and
//! rules components.
//!
//! Built with `ratatui` + `crossterm`. Screens are pure state machines over
//! [`event::Msg`] and [`event::Command`]; [`run`] owns the terminal and the
//! executor that turns commands back into messages.

mod app;
pub mod editors;
pub mod event;
pub mod screens;
pub mod widgets;

use std::path::PathBuf;

use color_eyre::eyre::{Result, eyre};
use pluqqy_shared::load_settings;
use pluqqy_storage::Store;

use event::Project;

/// Run the TUI against the project rooted at `project_root`.
pub fn run(project_root: PathBuf) -> Result<()> {
    let store = Store::new(project_root.clone());
    if !store.is_initialized() {
        return Err(eyre!(
            "no .pluqqy directory in {}; run `pluqqy init` first",
            project_root.display()
        ));
    }
    let settings = load_settings(&project_root)?;
    app::run(Project::new(store, settings))
}
