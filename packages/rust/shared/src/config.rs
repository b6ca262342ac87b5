//! Project settings for Pluqqy.
//!
//! Settings live at `<project>/.pluqqy/settings.toml`. Every field has a
//! default, so a missing or partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluqqyError, Result};
use crate::types::ComponentType;

/// Name of the per-project data directory.
pub const PLUQQY_DIR: &str = ".pluqqy";

/// Settings file name inside [`PLUQQY_DIR`].
const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Environment variable naming the external editor.
pub const EDITOR_ENV: &str = "EDITOR";

// ---------------------------------------------------------------------------
// Settings structs (matching settings.toml schema)
// ---------------------------------------------------------------------------

/// Top-level settings, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Output file and formatting.
    #[serde(default)]
    pub output: OutputSettings,

    /// Interface defaults.
    #[serde(default)]
    pub ui: UiSettings,
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// File name the composed pipeline is written to.
    #[serde(default = "default_filename")]
    pub default_filename: String,

    /// Directory the composed file is written to, relative to the project root.
    #[serde(default = "default_export_path")]
    pub export_path: String,

    #[serde(default)]
    pub formatting: FormattingSettings,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            default_filename: default_filename(),
            export_path: default_export_path(),
            formatting: FormattingSettings::default(),
        }
    }
}

fn default_filename() -> String {
    "PLUQQY.md".into()
}
fn default_export_path() -> String {
    "./".into()
}

/// `[output.formatting]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattingSettings {
    /// Emit each section's heading before its components.
    #[serde(default = "default_true")]
    pub show_headings: bool,

    /// Composition order; also the builder's display grouping.
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,
}

impl Default for FormattingSettings {
    fn default() -> Self {
        Self {
            show_headings: true,
            sections: default_sections(),
        }
    }
}

/// `[[output.formatting.sections]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub heading: String,
}

fn default_sections() -> Vec<SectionConfig> {
    ComponentType::ALL
        .iter()
        .map(|t| SectionConfig {
            component_type: *t,
            heading: default_heading(*t).to_string(),
        })
        .collect()
}

fn default_heading(t: ComponentType) -> &'static str {
    match t {
        ComponentType::Rules => "## RULES",
        ComponentType::Context => "## CONTEXT",
        ComponentType::Prompt => "## PROMPTS",
    }
}

/// `[ui]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    /// Whether the builder opens with the preview pane visible.
    #[serde(default = "default_true")]
    pub show_preview: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self { show_preview: true }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Section order as a permutation of all three kinds.
    ///
    /// Duplicates are dropped; kinds missing from the file are appended in
    /// default order.
    pub fn section_order(&self) -> Vec<ComponentType> {
        let mut order: Vec<ComponentType> = Vec::with_capacity(3);
        for section in &self.output.formatting.sections {
            if !order.contains(&section.component_type) {
                order.push(section.component_type);
            }
        }
        for t in ComponentType::ALL {
            if !order.contains(&t) {
                order.push(t);
            }
        }
        order
    }

    /// Heading for a section, falling back to the default heading.
    pub fn heading_for(&self, t: ComponentType) -> &str {
        self.output
            .formatting
            .sections
            .iter()
            .find(|s| s.component_type == t)
            .map(|s| s.heading.as_str())
            .unwrap_or_else(|| default_heading(t))
    }

    /// Default output file for composed pipelines, resolved against `project_root`.
    pub fn default_output_path(&self, project_root: &Path) -> PathBuf {
        resolve_path(project_root, &self.output.export_path).join(&self.output.default_filename)
    }
}

/// Resolve a user path: `~/` expands to the home directory, relative paths
/// join onto `base`.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() { p } else { base.join(p) }
}

// ---------------------------------------------------------------------------
// Settings loading
// ---------------------------------------------------------------------------

/// Path to the settings file for the project rooted at `project_root`.
pub fn settings_file_path(project_root: &Path) -> PathBuf {
    project_root.join(PLUQQY_DIR).join(SETTINGS_FILE_NAME)
}

/// Load project settings. Returns defaults if the file does not exist.
pub fn load_settings(project_root: &Path) -> Result<Settings> {
    let path = settings_file_path(project_root);

    if !path.exists() {
        tracing::debug!(?path, "settings file not found, using defaults");
        return Ok(Settings::default());
    }

    load_settings_from(&path)
}

/// Load settings from a specific file path.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| PluqqyError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PluqqyError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write default settings unless a settings file already exists.
/// Returns the path to the settings file.
pub fn init_settings(project_root: &Path) -> Result<PathBuf> {
    let path = settings_file_path(project_root);
    if path.exists() {
        return Ok(path);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| PluqqyError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&Settings::default())
        .map_err(|e| PluqqyError::config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| PluqqyError::io(&path, e))?;
    tracing::info!(?path, "created default settings file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// External editor
// ---------------------------------------------------------------------------

/// Read `$EDITOR` and split it into program and arguments.
pub fn editor_command() -> Result<(String, Vec<String>)> {
    match std::env::var(EDITOR_ENV) {
        Ok(val) if !val.trim().is_empty() => parse_editor_command(&val),
        _ => Err(PluqqyError::Editor(format!(
            "${EDITOR_ENV} is not set; set it to launch an external editor"
        ))),
    }
}

/// Validate an editor command against a conservative allowlist and split it.
///
/// Anything that could be interpreted by a shell (`;`, `|`, `$`, quotes,
/// backticks, redirects, ...) is rejected outright.
pub fn parse_editor_command(raw: &str) -> Result<(String, Vec<String>)> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || " _./+-".contains(c);
    if let Some(bad) = raw.chars().find(|c| !allowed(*c)) {
        return Err(PluqqyError::Editor(format!(
            "${EDITOR_ENV} contains disallowed character '{bad}'"
        )));
    }
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| PluqqyError::Editor(format!("${EDITOR_ENV} is empty")))?;
    Ok((program, parts.collect()))
}
