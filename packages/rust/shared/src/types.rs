//! Core domain types: component kinds, pool entries, and pipelines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PluqqyError;

/// Prefix that makes a component path resolve from the pipelines directory.
pub const REF_PREFIX: &str = "../";

// ---------------------------------------------------------------------------
// ComponentType
// ---------------------------------------------------------------------------

/// The three kinds of composable text fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    #[serde(alias = "prompts")]
    Prompt,
    #[serde(alias = "contexts")]
    Context,
    #[serde(alias = "rule")]
    Rules,
}

impl ComponentType {
    /// Every kind, in the default section order.
    pub const ALL: [ComponentType; 3] = [Self::Rules, Self::Context, Self::Prompt];

    /// Directory name under `components/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Prompt => "prompts",
            Self::Context => "contexts",
            Self::Rules => "rules",
        }
    }

    /// Singular label as written into pipeline files.
    pub fn label(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Context => "context",
            Self::Rules => "rules",
        }
    }

    /// Upper-case group heading used by the builder's right column.
    pub fn group_title(self) -> &'static str {
        match self {
            Self::Prompt => "PROMPTS",
            Self::Context => "CONTEXTS",
            Self::Rules => "RULES",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComponentType {
    type Err = PluqqyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" | "prompts" => Ok(Self::Prompt),
            "context" | "contexts" => Ok(Self::Context),
            "rule" | "rules" => Ok(Self::Rules),
            other => Err(PluqqyError::validation(format!(
                "unknown component type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentItem
// ---------------------------------------------------------------------------

/// A component as cached in the builder's pools.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentItem {
    /// Display name derived from the filename.
    pub name: String,
    /// Canonical path relative to the `.pluqqy` directory.
    pub path: String,
    pub component_type: ComponentType,
    pub modified: DateTime<Utc>,
    /// Estimated token count of the body.
    pub token_count: usize,
    /// Number of active pipelines referencing this component.
    pub usage_count: usize,
    pub tags: Vec<String>,
    pub is_archived: bool,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A reference from a pipeline to a component file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// Component path with the `../` prefix.
    pub path: String,
    pub order: usize,
}

impl ComponentRef {
    /// Build a reference from a canonical component path.
    pub fn new(component_type: ComponentType, canonical_path: &str) -> Self {
        Self {
            component_type,
            path: to_ref_path(canonical_path),
            order: 0,
        }
    }

    /// Path relative to the `.pluqqy` directory.
    pub fn canonical_path(&self) -> &str {
        canonical_path(&self.path)
    }
}

/// Strip the `../` prefix from a stored reference path.
pub fn canonical_path(ref_path: &str) -> &str {
    ref_path.strip_prefix(REF_PREFIX).unwrap_or(ref_path)
}

/// Add the `../` prefix to a canonical component path.
pub fn to_ref_path(canonical: &str) -> String {
    if canonical.starts_with(REF_PREFIX) {
        canonical.to_string()
    } else {
        format!("{REF_PREFIX}{canonical}")
    }
}

/// A pipeline file (`pipelines/*.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Display name as entered by the user.
    pub name: String,
    /// Path relative to `.pluqqy`; empty until the first save.
    #[serde(skip)]
    pub path: String,
    #[serde(default)]
    pub components: Vec<ComponentRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

impl Pipeline {
    /// A fresh, never-saved pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether this pipeline has been written to disk at least once.
    pub fn is_saved(&self) -> bool {
        !self.path.is_empty()
    }

    /// Whether the pipeline references the given canonical component path.
    pub fn references(&self, canonical: &str) -> bool {
        self.components
            .iter()
            .any(|c| c.canonical_path() == canonical)
    }
}

/// Summary row for a pipeline listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineItem {
    pub name: String,
    pub path: String,
    pub component_count: usize,
    pub tags: Vec<String>,
    pub modified: DateTime<Utc>,
    pub is_archived: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_accepts_plural_and_singular() {
        assert_eq!("prompts".parse::<ComponentType>().unwrap(), ComponentType::Prompt);
        assert_eq!("Context".parse::<ComponentType>().unwrap(), ComponentType::Context);
        assert_eq!("rule".parse::<ComponentType>().unwrap(), ComponentType::Rules);
        assert!("pipeline".parse::<ComponentType>().is_err());
    }

    #[test]
    fn ref_paths_carry_prefix() {
        let r = ComponentRef::new(ComponentType::Prompt, "components/prompts/a.md");
        assert_eq!(r.path, "../components/prompts/a.md");
        assert_eq!(r.canonical_path(), "components/prompts/a.md");
        assert_eq!(to_ref_path("../x.md"), "../x.md");
    }

    #[test]
    fn pipeline_yaml_shape() {
        let yaml = r#"
name: Demo
components:
  - type: rules
    path: ../components/rules/r.md
    order: 1
  - type: prompts
    path: ../components/prompts/p.md
    order: 2
tags: [alpha]
"#;
        let p: Pipeline = serde_yaml::from_str(yaml).expect("parse pipeline");
        assert_eq!(p.components.len(), 2);
        assert_eq!(p.components[1].component_type, ComponentType::Prompt);
        assert!(p.references("components/rules/r.md"));
        assert!(!p.is_saved());

        let out = serde_yaml::to_string(&p).expect("serialize");
        assert!(out.contains("type: prompt"));
        assert!(!out.contains("output_path"));
    }
}
