//! Pipeline files and the cross-file reference bookkeeping they need.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use pluqqy_shared::{
    Pipeline, PipelineItem, PluqqyError, Result, canonical_path, normalize_tags,
    sanitize_file_name, to_ref_path,
};

use crate::{ARCHIVE_DIR, Store, is_archived_path, pipeline_dir};

impl Store {
    /// Active pipelines, sorted by file name.
    pub fn list_pipelines(&self) -> Result<Vec<PipelineItem>> {
        self.list_pipelines_in(false)
    }

    /// Archived pipelines.
    pub fn list_archived_pipelines(&self) -> Result<Vec<PipelineItem>> {
        self.list_pipelines_in(true)
    }

    fn list_pipelines_in(&self, archived: bool) -> Result<Vec<PipelineItem>> {
        let mut items = Vec::new();
        for path in self.pipeline_paths(archived)? {
            match self.read_pipeline(&path) {
                Ok(p) => items.push(PipelineItem {
                    name: p.name,
                    component_count: p.components.len(),
                    tags: p.tags,
                    modified: self.modified(&path),
                    is_archived: archived,
                    path,
                }),
                Err(e) => warn!(%path, error = %e, "skipping unreadable pipeline"),
            }
        }
        Ok(items)
    }

    /// Read a pipeline file. The returned pipeline's `path` is set.
    pub fn read_pipeline(&self, path: &str) -> Result<Pipeline> {
        let text = self.read_text(path)?;
        let mut pipeline: Pipeline =
            serde_yaml::from_str(&text).map_err(|e| PluqqyError::yaml(self.abs(path), e))?;
        pipeline.path = path.to_string();
        Ok(pipeline)
    }

    /// Write a pipeline. A never-saved pipeline gets
    /// `pipelines/<sanitized name>.yaml` and must not collide with an existing file.
    #[instrument(skip(self, pipeline), fields(name = %pipeline.name))]
    pub fn write_pipeline(&self, pipeline: &mut Pipeline) -> Result<()> {
        if pipeline.name.trim().is_empty() {
            return Err(PluqqyError::validation("pipeline name must not be empty"));
        }
        if !pipeline.is_saved() {
            if self.pipeline_exists(&pipeline.name)? {
                return Err(PluqqyError::validation(format!(
                    "a pipeline named '{}' already exists",
                    sanitize_file_name(&pipeline.name)
                )));
            }
            pipeline.path = format!(
                "{}/{}.yaml",
                pipeline_dir(false),
                sanitize_file_name(&pipeline.name)
            );
        }
        pipeline.tags = normalize_tags(&pipeline.tags);
        let yaml = serde_yaml::to_string(&*pipeline)
            .map_err(|e| PluqqyError::yaml(self.abs(&pipeline.path), e))?;
        self.write_text(&pipeline.path, &yaml)?;
        info!(path = %pipeline.path, components = pipeline.components.len(), "pipeline written");
        Ok(())
    }

    /// Whether an active pipeline with this (sanitized) name exists, ignoring case.
    pub fn pipeline_exists(&self, display_name: &str) -> Result<bool> {
        let wanted = format!("{}.yaml", sanitize_file_name(display_name));
        Ok(self
            .list_files(&pipeline_dir(false), ".yaml")?
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&wanted)))
    }

    /// Replace a pipeline's tag list.
    pub fn update_pipeline_tags(&self, path: &str, tags: &[String]) -> Result<()> {
        let mut pipeline = self.read_pipeline(path)?;
        pipeline.tags = tags.to_vec();
        self.write_pipeline(&mut pipeline)
    }

    #[instrument(skip(self))]
    pub fn delete_pipeline(&self, path: &str) -> Result<()> {
        self.remove_file(path)?;
        info!("pipeline deleted");
        Ok(())
    }

    /// Move a pipeline into the archive tree. Returns the new path.
    #[instrument(skip(self))]
    pub fn archive_pipeline(&self, path: &str) -> Result<String> {
        if is_archived_path(path) {
            return Err(PluqqyError::validation(format!("{path} is already archived")));
        }
        let target = format!("{ARCHIVE_DIR}/{path}");
        if self.abs(&target).exists() {
            return Err(PluqqyError::validation(format!(
                "cannot archive: {target} already exists"
            )));
        }
        self.move_file(path, &target)?;
        Ok(target)
    }

    /// Move a pipeline back out of the archive. Returns the new path.
    #[instrument(skip(self))]
    pub fn unarchive_pipeline(&self, path: &str) -> Result<String> {
        let target = path
            .strip_prefix(&format!("{ARCHIVE_DIR}/"))
            .ok_or_else(|| PluqqyError::validation(format!("{path} is not archived")))?
            .to_string();
        if self.abs(&target).exists() {
            return Err(PluqqyError::validation(format!(
                "cannot unarchive: {target} already exists"
            )));
        }
        self.move_file(path, &target)?;
        Ok(target)
    }

    /// Copy a pipeline under a new display name.
    #[instrument(skip(self))]
    pub fn clone_pipeline(&self, path: &str, new_name: &str) -> Result<String> {
        let target = self.sibling_path(path, new_name, ".yaml")?;
        let mut pipeline = self.read_pipeline(path)?;
        pipeline.name = new_name.trim().to_string();
        pipeline.path = target.clone();
        self.write_pipeline(&mut pipeline)?;
        Ok(target)
    }

    /// Rename a pipeline: new display name and, if it changes, new file name.
    #[instrument(skip(self))]
    pub fn rename_pipeline(&self, path: &str, new_name: &str) -> Result<String> {
        let mut pipeline = self.read_pipeline(path)?;
        let current_stem = crate::stem(path);
        let target = if sanitize_file_name(new_name) == current_stem {
            path.to_string()
        } else {
            self.sibling_path(path, new_name, ".yaml")?
        };
        pipeline.name = new_name.trim().to_string();
        pipeline.path = target.clone();
        self.write_pipeline(&mut pipeline)?;
        if target != path {
            self.remove_file(path)?;
        }
        Ok(target)
    }

    /// Number of active pipelines referencing each canonical component path.
    pub fn count_component_usage(&self) -> Result<HashMap<String, usize>> {
        let mut usage: HashMap<String, usize> = HashMap::new();
        for path in self.pipeline_paths(false)? {
            let pipeline = match self.read_pipeline(&path) {
                Ok(p) => p,
                Err(e) => {
                    warn!(%path, error = %e, "skipping unreadable pipeline in usage count");
                    continue;
                }
            };
            let mut seen: Vec<&str> = Vec::new();
            for c in &pipeline.components {
                let key = c.canonical_path();
                if !seen.contains(&key) {
                    seen.push(key);
                    *usage.entry(key.to_string()).or_insert(0) += 1;
                }
            }
        }
        Ok(usage)
    }

    /// Store-relative paths of all pipelines in one tree.
    pub(crate) fn pipeline_paths(&self, archived: bool) -> Result<Vec<String>> {
        let dir = pipeline_dir(archived);
        Ok(self
            .list_files(&dir, ".yaml")?
            .into_iter()
            .map(|f| format!("{dir}/{f}"))
            .collect())
    }

    /// Point every reference to `from` at `to`, or drop it when `to` is `None`.
    /// Touches active and archived pipelines. Returns the number rewritten.
    pub(crate) fn rewrite_references(&self, from: &str, to: Option<&str>) -> Result<usize> {
        let from = canonical_path(from);
        let mut touched = 0;
        for path in self
            .pipeline_paths(false)?
            .into_iter()
            .chain(self.pipeline_paths(true)?)
        {
            let Ok(mut pipeline) = self.read_pipeline(&path) else {
                continue;
            };
            if !pipeline.references(from) {
                continue;
            }
            match to {
                Some(target) => {
                    for c in pipeline
                        .components
                        .iter_mut()
                        .filter(|c| c.canonical_path() == from)
                    {
                        c.path = to_ref_path(target);
                    }
                }
                None => {
                    pipeline.components.retain(|c| c.canonical_path() != from);
                    for (i, c) in pipeline.components.iter_mut().enumerate() {
                        c.order = i + 1;
                    }
                }
            }
            self.write_pipeline(&mut pipeline)?;
            touched += 1;
        }
        debug!(from, ?to, touched, "rewrote pipeline references");
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::temp_store;
    use pluqqy_shared::{ComponentRef, ComponentType, Pipeline};

    fn sample(store: &crate::Store, name: &str, paths: &[&str]) -> Pipeline {
        let mut p = Pipeline::new(name);
        for (i, path) in paths.iter().enumerate() {
            let mut r = ComponentRef::new(ComponentType::Prompt, path);
            r.order = i + 1;
            p.components.push(r);
        }
        store.write_pipeline(&mut p).unwrap();
        p
    }

    #[test]
    fn first_save_assigns_sanitized_path() {
        let (_tmp, store) = temp_store();
        let p = sample(&store, "My First Pipeline", &[]);
        assert_eq!(p.path, "pipelines/my-first-pipeline.yaml");
        assert!(store.abs(&p.path).exists());

        let mut dup = Pipeline::new("MY FIRST pipeline");
        assert!(store.write_pipeline(&mut dup).is_err());
        assert!(dup.path.is_empty());
    }

    #[test]
    fn read_back_matches_written() {
        let (_tmp, store) = temp_store();
        let mut p = sample(&store, "Round", &["components/prompts/a.md"]);
        p.tags = vec!["Urgent".into()];
        p.output_path = Some("out/AGENTS.md".into());
        store.write_pipeline(&mut p).unwrap();

        let back = store.read_pipeline(&p.path).unwrap();
        assert_eq!(back.tags, vec!["urgent"]);
        assert_eq!(back.output_path.as_deref(), Some("out/AGENTS.md"));
        assert_eq!(back.components[0].path, "../components/prompts/a.md");
        let text = std::fs::read_to_string(store.abs(&p.path)).unwrap();
        assert!(text.contains("name: Round"));
    }

    #[test]
    fn usage_counts_active_pipelines_once_each() {
        let (_tmp, store) = temp_store();
        sample(&store, "One", &["components/prompts/a.md", "components/prompts/b.md"]);
        let two = sample(&store, "Two", &["components/prompts/a.md"]);
        let usage = store.count_component_usage().unwrap();
        assert_eq!(usage.get("components/prompts/a.md"), Some(&2));
        assert_eq!(usage.get("components/prompts/b.md"), Some(&1));

        store.archive_pipeline(&two.path).unwrap();
        let usage = store.count_component_usage().unwrap();
        assert_eq!(usage.get("components/prompts/a.md"), Some(&1));
        assert_eq!(store.list_archived_pipelines().unwrap().len(), 1);
    }

    #[test]
    fn archive_refuses_to_overwrite_archived_pipeline() {
        let (_tmp, store) = temp_store();
        let old = sample(&store, "Weekly", &["components/prompts/a.md"]);
        let archived = store.archive_pipeline(&old.path).unwrap();

        let new = sample(&store, "Weekly", &["components/prompts/b.md"]);
        assert!(store.archive_pipeline(&new.path).is_err());
        let kept = store.read_pipeline(&archived).unwrap();
        assert_eq!(kept.components[0].path, "../components/prompts/a.md");
        assert!(store.abs(&new.path).exists());
    }

    #[test]
    fn clone_rename_delete() {
        let (_tmp, store) = temp_store();
        let p = sample(&store, "Base", &["components/prompts/a.md"]);
        let copy = store.clone_pipeline(&p.path, "Base Copy").unwrap();
        assert_eq!(store.read_pipeline(&copy).unwrap().name, "Base Copy");

        let renamed = store.rename_pipeline(&copy, "Fancy").unwrap();
        assert_eq!(renamed, "pipelines/fancy.yaml");
        assert!(!store.abs(&copy).exists());
        assert_eq!(store.read_pipeline(&renamed).unwrap().name, "Fancy");

        let same = store.rename_pipeline(&renamed, "FANCY").unwrap();
        assert_eq!(same, renamed);
        assert_eq!(store.read_pipeline(&same).unwrap().name, "FANCY");

        store.delete_pipeline(&p.path).unwrap();
        assert_eq!(store.list_pipelines().unwrap().len(), 1);
    }
}
