//! Project-wide tag registry (`tags.toml`) and tag bookkeeping across files.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use pluqqy_shared::{PluqqyError, Result, normalize_tag};

use crate::Store;

const REGISTRY_FILE: &str = "tags.toml";

/// Colours handed out to new tags, picked deterministically by name.
const PALETTE: &[&str] = &[
    "#e06c75", "#98c379", "#e5c07b", "#61afef", "#c678dd", "#56b6c2", "#d19a66", "#be5046",
    "#7ec699", "#f08d49",
];

/// `[[tags]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The persisted tag catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagRegistry {
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

impl TagRegistry {
    pub fn get(&self, name: &str) -> Option<&TagEntry> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Registered colour, or the palette colour the tag would get.
    pub fn color_for(&self, name: &str) -> String {
        self.get(name)
            .map(|t| t.color.clone())
            .unwrap_or_else(|| palette_color(name).to_string())
    }

    pub fn names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }

    /// Register a tag if absent. Returns whether it was added.
    pub fn ensure(&mut self, name: &str) -> bool {
        let name = normalize_tag(name);
        if name.is_empty() || self.get(&name).is_some() {
            return false;
        }
        self.tags.push(TagEntry {
            color: palette_color(&name).to_string(),
            name,
            description: None,
        });
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.name != name);
        self.tags.len() != before
    }
}

fn palette_color(name: &str) -> &'static str {
    let hash = name
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}

/// Where a tag is currently used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagUsage {
    /// Component paths carrying the tag.
    pub components: Vec<String>,
    /// Pipeline paths carrying the tag.
    pub pipelines: Vec<String>,
}

impl TagUsage {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.pipelines.is_empty()
    }

    pub fn total(&self) -> usize {
        self.components.len() + self.pipelines.len()
    }
}

impl Store {
    /// Load the registry; a missing file is an empty registry.
    pub fn load_tag_registry(&self) -> Result<TagRegistry> {
        match self.read_text(REGISTRY_FILE) {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                PluqqyError::config(format!("failed to parse {REGISTRY_FILE}: {e}"))
            }),
            Err(PluqqyError::NotFound(_)) => Ok(TagRegistry::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save_tag_registry(&self, registry: &TagRegistry) -> Result<()> {
        let text =
            toml::to_string_pretty(registry).map_err(|e| PluqqyError::config(e.to_string()))?;
        self.write_text(REGISTRY_FILE, &text)
    }

    /// Register any tags not yet in the registry.
    pub fn ensure_tags(&self, names: &[String]) -> Result<()> {
        let mut registry = self.load_tag_registry()?;
        let mut changed = false;
        for name in names {
            changed |= registry.ensure(name);
        }
        if changed {
            self.save_tag_registry(&registry)?;
        }
        Ok(())
    }

    /// Every tag known to the project: registered or used by any file.
    pub fn all_tags(&self) -> Result<Vec<String>> {
        let mut set: BTreeSet<String> = self.load_tag_registry()?.names().into_iter().collect();
        set.extend(self.used_tags()?);
        Ok(set.into_iter().collect())
    }

    /// Components and pipelines (active and archived) carrying `name`.
    pub fn tag_usage(&self, name: &str) -> Result<TagUsage> {
        let mut usage = TagUsage::default();
        for path in self.all_component_paths()? {
            if let Ok(c) = self.read_component(&path) {
                if c.tags.iter().any(|t| t == name) {
                    usage.components.push(path);
                }
            }
        }
        for path in self.all_pipeline_paths()? {
            if let Ok(p) = self.read_pipeline(&path) {
                if p.tags.iter().any(|t| t == name) {
                    usage.pipelines.push(path);
                }
            }
        }
        Ok(usage)
    }

    /// Remove a tag from the registry and from every file that carries it.
    #[instrument(skip(self))]
    pub fn delete_tag_everywhere(&self, name: &str) -> Result<TagUsage> {
        let usage = self.tag_usage(name)?;
        for path in &usage.components {
            let c = self.read_component(path)?;
            let tags: Vec<String> = c.tags.into_iter().filter(|t| t != name).collect();
            self.update_component_tags(path, &tags)?;
        }
        for path in &usage.pipelines {
            let mut p = self.read_pipeline(path)?;
            p.tags.retain(|t| t != name);
            self.write_pipeline(&mut p)?;
        }
        let mut registry = self.load_tag_registry()?;
        if registry.remove(name) {
            self.save_tag_registry(&registry)?;
        }
        info!(
            components = usage.components.len(),
            pipelines = usage.pipelines.len(),
            "tag deleted project-wide"
        );
        Ok(usage)
    }

    /// Drop registry entries among `candidates` that no file uses any more.
    /// Returns the removed names.
    #[instrument(skip(self))]
    pub fn cleanup_orphaned_tags(&self, candidates: &[String]) -> Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let used = self.used_tags()?;
        let mut registry = self.load_tag_registry()?;
        let removed: Vec<String> = candidates
            .iter()
            .filter(|c| !used.contains(*c) && registry.get(c).is_some())
            .cloned()
            .collect();
        if !removed.is_empty() {
            for name in &removed {
                registry.remove(name);
            }
            self.save_tag_registry(&registry)?;
            info!(?removed, "removed orphaned tags");
        }
        Ok(removed)
    }

    fn used_tags(&self) -> Result<BTreeSet<String>> {
        let mut set = BTreeSet::new();
        for path in self.all_component_paths()? {
            if let Ok(c) = self.read_component(&path) {
                set.extend(c.tags);
            }
        }
        for path in self.all_pipeline_paths()? {
            if let Ok(p) = self.read_pipeline(&path) {
                set.extend(p.tags);
            }
        }
        Ok(set)
    }

    fn all_pipeline_paths(&self) -> Result<Vec<String>> {
        let mut paths = self.pipeline_paths(false)?;
        paths.extend(self.pipeline_paths(true)?);
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_store;
    use pluqqy_shared::{ComponentType, Pipeline};

    #[test]
    fn registry_ensure_is_idempotent_and_colored() {
        let mut r = TagRegistry::default();
        assert!(r.ensure("Urgent"));
        assert!(!r.ensure("urgent"));
        assert!(!r.ensure("  "));
        assert_eq!(r.names(), vec!["urgent"]);
        assert!(r.color_for("urgent").starts_with('#'));
        assert_eq!(r.color_for("unknown"), r.color_for("unknown"));
    }

    #[test]
    fn registry_persists() {
        let (_tmp, store) = temp_store();
        assert!(store.load_tag_registry().unwrap().tags.is_empty());
        store.ensure_tags(&["a".into(), "b".into()]).unwrap();
        let r = store.load_tag_registry().unwrap();
        assert_eq!(r.names(), vec!["a", "b"]);
    }

    #[test]
    fn usage_and_project_wide_delete() {
        let (_tmp, store) = temp_store();
        let c = store
            .create_component(ComponentType::Prompt, "X", "x", &["shared".into(), "keep".into()])
            .unwrap();
        let mut p = Pipeline::new("P");
        p.tags = vec!["shared".into()];
        store.write_pipeline(&mut p).unwrap();
        store.ensure_tags(&["shared".into(), "keep".into()]).unwrap();

        let usage = store.tag_usage("shared").unwrap();
        assert_eq!(usage.components, vec![c.clone()]);
        assert_eq!(usage.pipelines, vec![p.path.clone()]);
        assert_eq!(usage.total(), 2);

        store.delete_tag_everywhere("shared").unwrap();
        assert_eq!(store.read_component(&c).unwrap().tags, vec!["keep"]);
        assert!(store.read_pipeline(&p.path).unwrap().tags.is_empty());
        assert_eq!(store.load_tag_registry().unwrap().names(), vec!["keep"]);
        assert!(store.tag_usage("shared").unwrap().is_empty());
    }

    #[test]
    fn cleanup_removes_only_unused_candidates() {
        let (_tmp, store) = temp_store();
        let c = store
            .create_component(ComponentType::Rules, "R", "r", &["live".into()])
            .unwrap();
        store
            .ensure_tags(&["live".into(), "dead".into(), "other".into()])
            .unwrap();

        let removed = store
            .cleanup_orphaned_tags(&["live".into(), "dead".into()])
            .unwrap();
        assert_eq!(removed, vec!["dead"]);
        assert_eq!(store.load_tag_registry().unwrap().names(), vec!["live", "other"]);

        store.update_component_tags(&c, &[]).unwrap();
        assert_eq!(store.cleanup_orphaned_tags(&["live".into()]).unwrap(), vec!["live"]);
        assert_eq!(store.all_tags().unwrap(), vec!["other"]);
    }
}
