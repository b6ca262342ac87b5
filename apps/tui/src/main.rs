//! Pluqqy TUI binary: runs against the current directory.

use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    pluqqy_tui::run(std::env::current_dir()?)
}
