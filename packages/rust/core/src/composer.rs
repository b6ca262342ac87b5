//! Pipeline composer: renders a pipeline's components into one document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use pluqqy_shared::{ComponentType, Pipeline, PluqqyError, Result, Settings, resolve_path};
use pluqqy_storage::Store;

/// Render a pipeline.
///
/// Components are bucketed by type and emitted in the configured section
/// order. Within a section they keep pipeline order. Each non-empty section
/// starts with its heading when headings are enabled; bodies are trimmed and
/// separated by one blank line.
#[instrument(skip_all, fields(pipeline = %pipeline.name))]
pub fn compose_pipeline(store: &Store, settings: &Settings, pipeline: &Pipeline) -> Result<String> {
    let mut buckets: HashMap<ComponentType, Vec<String>> = HashMap::new();
    for component in &pipeline.components {
        let path = component.canonical_path();
        let content = store.read_component(path).map_err(|e| match e {
            PluqqyError::NotFound(p) => PluqqyError::Compose(format!("component not found: {p}")),
            other => PluqqyError::Compose(format!("failed to read {path}: {other}")),
        })?;
        buckets
            .entry(component.component_type)
            .or_default()
            .push(content.content.trim().to_string());
    }

    let mut sections: Vec<String> = Vec::new();
    for t in settings.section_order() {
        let Some(bodies) = buckets.remove(&t) else {
            continue;
        };
        let mut parts: Vec<String> = Vec::with_capacity(bodies.len() + 1);
        if settings.output.formatting.show_headings {
            parts.push(settings.heading_for(t).to_string());
        }
        parts.extend(bodies.into_iter().filter(|b| !b.is_empty()));
        sections.push(parts.join("\n\n"));
    }

    if sections.is_empty() {
        return Ok(String::new());
    }
    let out = format!("{}\n", sections.join("\n\n"));
    debug!(bytes = out.len(), "pipeline composed");
    Ok(out)
}

/// Where the composed file for `pipeline` goes.
pub fn output_path_for(store: &Store, settings: &Settings, pipeline: &Pipeline) -> PathBuf {
    match pipeline.output_path.as_deref() {
        Some(p) if !p.trim().is_empty() => resolve_path(store.project_root(), p),
        _ => settings.default_output_path(store.project_root()),
    }
}

/// Write composed text to `path`, creating parent directories.
#[instrument(skip(text))]
pub fn write_output(text: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PluqqyError::io(parent, e))?;
        }
    }
    std::fs::write(path, text).map_err(|e| PluqqyError::io(path, e))?;
    info!(bytes = text.len(), "composed output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pluqqy_shared::ComponentRef;

    fn fixture() -> (tempfile::TempDir, Store, Pipeline) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path());
        store.init().unwrap();
        let p = store
            .create_component(ComponentType::Prompt, "Ask", "Please do X.\n", &[])
            .unwrap();
        let c = store
            .create_component(ComponentType::Context, "Repo", "This repo is Y.", &[])
            .unwrap();
        let r = store
            .create_component(ComponentType::Rules, "Style", "Be terse.", &["x".into()])
            .unwrap();
        let mut pipeline = Pipeline::new("Demo");
        pipeline.components = vec![
            ComponentRef::new(ComponentType::Prompt, &p),
            ComponentRef::new(ComponentType::Context, &c),
            ComponentRef::new(ComponentType::Rules, &r),
        ];
        (tmp, store, pipeline)
    }

    #[test]
    fn composes_in_section_order_with_headings() {
        let (_tmp, store, pipeline) = fixture();
        let out = compose_pipeline(&store, &Settings::default(), &pipeline).unwrap();
        assert_eq!(
            out,
            "## RULES\n\nBe terse.\n\n## CONTEXT\n\nThis repo is Y.\n\n## PROMPTS\n\nPlease do X.\n"
        );
        assert!(!out.contains("tags:"));
    }

    #[test]
    fn composes_without_headings() {
        let (_tmp, store, pipeline) = fixture();
        let mut settings = Settings::default();
        settings.output.formatting.show_headings = false;
        let out = compose_pipeline(&store, &settings, &pipeline).unwrap();
        assert_eq!(out, "Be terse.\n\nThis repo is Y.\n\nPlease do X.\n");
    }

    #[test]
    fn empty_pipeline_composes_to_nothing() {
        let (_tmp, store, _) = fixture();
        let out = compose_pipeline(&store, &Settings::default(), &Pipeline::new("e")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_component_is_compose_error() {
        let (_tmp, store, mut pipeline) = fixture();
        pipeline
            .components
            .push(ComponentRef::new(ComponentType::Prompt, "components/prompts/gone.md"));
        let err = compose_pipeline(&store, &Settings::default(), &pipeline).unwrap_err();
        assert!(matches!(err, PluqqyError::Compose(_)));
        assert!(err.to_string().contains("gone.md"));
    }

    #[test]
    fn output_path_prefers_pipeline_setting() {
        let (tmp, store, mut pipeline) = fixture();
        let settings = Settings::default();
        assert_eq!(
            output_path_for(&store, &settings, &pipeline),
            tmp.path().join("./").join("PLUQQY.md")
        );
        pipeline.output_path = Some("docs/AGENTS.md".into());
        let target = output_path_for(&store, &settings, &pipeline);
        assert_eq!(target, tmp.path().join("docs/AGENTS.md"));

        write_output("hello", &target).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    }
}
