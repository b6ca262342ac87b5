//! Shared types, error model, and settings for Pluqqy.
//!
//! This crate is the foundation depended on by all other Pluqqy crates.
//! It provides:
//! - [`PluqqyError`], the unified error type
//! - Domain types ([`ComponentType`], [`ComponentItem`], [`Pipeline`], [`ComponentRef`])
//! - Settings ([`Settings`], settings loading, external editor validation)
//! - Name sanitization, tag normalization, and token estimation

pub mod config;
pub mod error;
pub mod naming;
pub mod tokens;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    EDITOR_ENV, FormattingSettings, OutputSettings, PLUQQY_DIR, SectionConfig, Settings,
    UiSettings, editor_command, init_settings, load_settings, load_settings_from,
    parse_editor_command, resolve_path, settings_file_path,
};
pub use error::{PluqqyError, Result};
pub use naming::{
    UNTITLED, display_name_from_stem, normalize_tag, normalize_tags, sanitize_file_name,
};
pub use tokens::{estimate_tokens, format_tokens};
pub use types::{
    ComponentItem, ComponentRef, ComponentType, Pipeline, PipelineItem, REF_PREFIX,
    canonical_path, to_ref_path,
};
