//! File-backed store for components, pipelines, and the tag registry.
//!
//! Everything lives under `<project>/.pluqqy/`:
//!
//! ```text
//! .pluqqy/
//! ├── settings.toml
//! ├── tags.toml
//! ├── components/{prompts,contexts,rules}/*.md
//! ├── pipelines/*.yaml
//! ├── archive/components/{prompts,contexts,rules}/*.md
//! ├── archive/pipelines/*.yaml
//! └── tmp/diagrams/
//! ```
//!
//! Paths handed out by the store are relative to `.pluqqy/` and use `/`.
//! No locking is done; the last writer wins.

mod components;
pub mod frontmatter;
mod pipelines;
mod registry;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use pluqqy_shared::{ComponentType, PLUQQY_DIR, PluqqyError, Result};

pub use components::ComponentContent;
pub use registry::{TagEntry, TagRegistry, TagUsage};

pub(crate) const COMPONENTS_DIR: &str = "components";
pub(crate) const PIPELINES_DIR: &str = "pipelines";
pub(crate) const ARCHIVE_DIR: &str = "archive";
pub(crate) const DIAGRAMS_DIR: &str = "tmp/diagrams";

/// Handle on a project's `.pluqqy` directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    project_root: PathBuf,
    data_dir: PathBuf,
}

impl Store {
    /// Store for the project rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let data_dir = project_root.join(PLUQQY_DIR);
        Self {
            project_root,
            data_dir,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether `.pluqqy/` exists.
    pub fn is_initialized(&self) -> bool {
        self.data_dir.is_dir()
    }

    /// Create the directory tree. Idempotent.
    pub fn init(&self) -> Result<()> {
        let mut dirs = vec![
            PIPELINES_DIR.to_string(),
            format!("{ARCHIVE_DIR}/{PIPELINES_DIR}"),
            DIAGRAMS_DIR.to_string(),
        ];
        for t in ComponentType::ALL {
            dirs.push(component_dir(t, false));
            dirs.push(component_dir(t, true));
        }
        for rel in dirs {
            let dir = self.abs(&rel);
            std::fs::create_dir_all(&dir).map_err(|e| PluqqyError::io(&dir, e))?;
        }
        tracing::info!(path = %self.data_dir.display(), "initialized project store");
        Ok(())
    }

    /// Directory for generated diagrams.
    pub fn diagrams_dir(&self) -> PathBuf {
        self.abs(DIAGRAMS_DIR)
    }

    /// Absolute path for a store-relative path.
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.data_dir.join(rel)
    }

    pub(crate) fn read_text(&self, rel: &str) -> Result<String> {
        let path = self.abs(rel);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PluqqyError::NotFound(rel.to_string()),
            _ => PluqqyError::io(&path, e),
        })
    }

    pub(crate) fn write_text(&self, rel: &str, text: &str) -> Result<()> {
        let path = self.abs(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PluqqyError::io(parent, e))?;
        }
        std::fs::write(&path, text).map_err(|e| PluqqyError::io(&path, e))
    }

    pub(crate) fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let src = self.abs(from);
        let dst = self.abs(to);
        if !src.exists() {
            return Err(PluqqyError::NotFound(from.to_string()));
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PluqqyError::io(parent, e))?;
        }
        std::fs::rename(&src, &dst).map_err(|e| PluqqyError::io(&dst, e))
    }

    pub(crate) fn remove_file(&self, rel: &str) -> Result<()> {
        let path = self.abs(rel);
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PluqqyError::NotFound(rel.to_string()),
            _ => PluqqyError::io(&path, e),
        })
    }

    /// File names (not paths) in a store directory with the given extension, sorted.
    pub(crate) fn list_files(&self, rel_dir: &str, ext: &str) -> Result<Vec<String>> {
        let dir = self.abs(rel_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| PluqqyError::io(&dir, e))? {
            let entry = entry.map_err(|e| PluqqyError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_file() && name.ends_with(ext) && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub(crate) fn modified(&self, rel: &str) -> DateTime<Utc> {
        std::fs::metadata(self.abs(rel))
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH))
    }
}

/// Store-relative directory holding components of a kind.
pub fn component_dir(t: ComponentType, archived: bool) -> String {
    if archived {
        format!("{ARCHIVE_DIR}/{COMPONENTS_DIR}/{}", t.dir_name())
    } else {
        format!("{COMPONENTS_DIR}/{}", t.dir_name())
    }
}

/// Store-relative directory holding pipelines.
pub fn pipeline_dir(archived: bool) -> String {
    if archived {
        format!("{ARCHIVE_DIR}/{PIPELINES_DIR}")
    } else {
        PIPELINES_DIR.to_string()
    }
}

/// Whether a store-relative path points into the archive tree.
pub fn is_archived_path(rel: &str) -> bool {
    rel.starts_with(&format!("{ARCHIVE_DIR}/"))
}

/// File stem of a store-relative path.
pub(crate) fn stem(rel: &str) -> &str {
    let file = rel.rsplit('/').next().unwrap_or(rel);
    file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file)
}

/// Parent directory of a store-relative path.
pub(crate) fn parent(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}
