//! Component files: listing, reading, writing, archiving, cloning, renaming.

use tracing::{debug, info, instrument, warn};

use pluqqy_shared::{
    ComponentItem, ComponentType, PluqqyError, Result, display_name_from_stem, estimate_tokens,
    normalize_tags, sanitize_file_name,
};

use crate::frontmatter::{self, Document};
use crate::{ARCHIVE_DIR, Store, component_dir, is_archived_path, parent, stem};

/// Body and tags of a component file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentContent {
    /// Composable body, front-matter removed.
    pub content: String,
    pub tags: Vec<String>,
}

impl Store {
    /// Active components of a kind, sorted by file name. Usage counts are zero.
    pub fn list_components(&self, t: ComponentType) -> Result<Vec<ComponentItem>> {
        self.list_components_in(t, false)
    }

    /// Archived components of a kind.
    pub fn list_archived_components(&self, t: ComponentType) -> Result<Vec<ComponentItem>> {
        self.list_components_in(t, true)
    }

    fn list_components_in(&self, t: ComponentType, archived: bool) -> Result<Vec<ComponentItem>> {
        let dir = component_dir(t, archived);
        let mut items = Vec::new();
        for file in self.list_files(&dir, ".md")? {
            let path = format!("{dir}/{file}");
            let text = self.read_text(&path)?;
            let doc = frontmatter::parse(&text, &self.abs(&path)).unwrap_or_else(|e| {
                warn!(%path, error = %e, "unreadable front-matter, treating file as body");
                Document {
                    body: text.clone(),
                    ..Document::default()
                }
            });
            items.push(ComponentItem {
                name: display_name_from_stem(stem(&path)),
                modified: self.modified(&path),
                token_count: estimate_tokens(&doc.body),
                usage_count: 0,
                tags: doc.front.tags,
                is_archived: archived,
                component_type: t,
                path,
            });
        }
        debug!(%dir, count = items.len(), "listed components");
        Ok(items)
    }

    /// Read a component's body and tags.
    pub fn read_component(&self, path: &str) -> Result<ComponentContent> {
        let text = self.read_text(path)?;
        let doc = frontmatter::parse(&text, &self.abs(path))?;
        Ok(ComponentContent {
            content: doc.body,
            tags: doc.front.tags,
        })
    }

    /// Replace a component's body, keeping its front-matter.
    #[instrument(skip(self, content))]
    pub fn write_component(&self, path: &str, content: &str) -> Result<()> {
        let mut doc = self.read_document_or_default(path)?;
        doc.body = content.to_string();
        let text = frontmatter::render(&doc, &self.abs(path))?;
        self.write_text(path, &text)?;
        info!(bytes = content.len(), "component written");
        Ok(())
    }

    /// Create a new component file from a display name. Fails on a
    /// case-insensitive filename collision in the type's directory.
    #[instrument(skip(self, content, tags))]
    pub fn create_component(
        &self,
        t: ComponentType,
        display_name: &str,
        content: &str,
        tags: &[String],
    ) -> Result<String> {
        if display_name.trim().is_empty() {
            return Err(PluqqyError::validation("component name must not be empty"));
        }
        if self.component_exists(t, display_name)? {
            return Err(PluqqyError::validation(format!(
                "a {} named '{}' already exists",
                t.label(),
                sanitize_file_name(display_name)
            )));
        }
        let path = format!("{}/{}.md", component_dir(t, false), sanitize_file_name(display_name));
        let mut doc = Document {
            body: content.to_string(),
            ..Document::default()
        };
        doc.front.tags = normalize_tags(tags);
        self.write_text(&path, &frontmatter::render(&doc, &self.abs(&path))?)?;
        info!(%path, "component created");
        Ok(path)
    }

    /// Whether a component with this (sanitized) name exists in the type's
    /// active directory, ignoring case.
    pub fn component_exists(&self, t: ComponentType, display_name: &str) -> Result<bool> {
        let wanted = format!("{}.md", sanitize_file_name(display_name));
        Ok(self
            .list_files(&component_dir(t, false), ".md")?
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&wanted)))
    }

    /// Replace a component's tag list.
    #[instrument(skip(self, tags))]
    pub fn update_component_tags(&self, path: &str, tags: &[String]) -> Result<()> {
        let mut doc = self.read_document_or_default(path)?;
        doc.front.tags = normalize_tags(tags);
        self.write_text(path, &frontmatter::render(&doc, &self.abs(path))?)
    }

    /// Delete a component file and drop every pipeline reference to it.
    #[instrument(skip(self))]
    pub fn delete_component(&self, path: &str) -> Result<usize> {
        self.remove_file(path)?;
        let touched = self.rewrite_references(path, None)?;
        info!(pipelines = touched, "component deleted");
        Ok(touched)
    }

    /// Move a component into the archive tree. Returns the new path.
    #[instrument(skip(self))]
    pub fn archive_component(&self, path: &str) -> Result<String> {
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
        self.rewrite_references(path, Some(&target))?;
        Ok(target)
    }

    /// Move a component back out of the archive tree. Returns the new path.
    #[instrument(skip(self))]
    pub fn unarchive_component(&self, path: &str) -> Result<String> {
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
        self.rewrite_references(path, Some(&target))?;
        Ok(target)
    }

    /// Copy a component under a new display name in the same directory.
    #[instrument(skip(self))]
    pub fn clone_component(&self, path: &str, new_name: &str) -> Result<String> {
        let target = self.sibling_path(path, new_name, ".md")?;
        let text = self.read_text(path)?;
        self.write_text(&target, &text)?;
        info!(%target, "component cloned");
        Ok(target)
    }

    /// Rename a component file and rewrite every pipeline reference to it.
    #[instrument(skip(self))]
    pub fn rename_component(&self, path: &str, new_name: &str) -> Result<String> {
        let new_stem = sanitize_file_name(new_name);
        if new_stem == stem(path) {
            return Ok(path.to_string());
        }
        let target = self.sibling_path(path, new_name, ".md")?;
        self.move_file(path, &target)?;
        let touched = self.rewrite_references(path, Some(&target))?;
        info!(%target, pipelines = touched, "component renamed");
        Ok(target)
    }

    /// Every component path, active and archived.
    pub(crate) fn all_component_paths(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for archived in [false, true] {
            for t in ComponentType::ALL {
                let dir = component_dir(t, archived);
                for f in self.list_files(&dir, ".md")? {
                    paths.push(format!("{dir}/{f}"));
                }
            }
        }
        Ok(paths)
    }

    /// `<dir of path>/<sanitized new_name><ext>`, refusing collisions.
    pub(crate) fn sibling_path(&self, path: &str, new_name: &str, ext: &str) -> Result<String> {
        if new_name.trim().is_empty() {
            return Err(PluqqyError::validation("name must not be empty"));
        }
        let dir = parent(path);
        let file = format!("{}{ext}", sanitize_file_name(new_name));
        let taken = self
            .list_files(dir, ext)?
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&file));
        if taken {
            return Err(PluqqyError::validation(format!("'{file}' already exists")));
        }
        Ok(format!("{dir}/{file}"))
    }

    fn read_document_or_default(&self, path: &str) -> Result<Document> {
        match self.read_text(path) {
            Ok(text) => frontmatter::parse(&text, &self.abs(path)),
            Err(PluqqyError::NotFound(_)) => Ok(Document::default()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::temp_store;
    use pluqqy_shared::{ComponentType, Pipeline, ComponentRef};

    #[test]
    fn create_list_and_read() {
        let (_tmp, store) = temp_store();
        let path = store
            .create_component(ComponentType::Prompt, "Write Tests", "Do it well.", &["QA".into()])
            .unwrap();
        assert_eq!(path, "components/prompts/write-tests.md");

        let items = store.list_components(ComponentType::Prompt).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Write Tests");
        assert_eq!(items[0].tags, vec!["qa"]);
        assert_eq!(items[0].token_count, 3);
        assert!(!items[0].is_archived);

        let c = store.read_component(&path).unwrap();
        assert_eq!(c.content, "Do it well.");
        assert_eq!(c.tags, vec!["qa"]);
    }

    #[test]
    fn create_rejects_case_insensitive_collision() {
        let (_tmp, store) = temp_store();
        store
            .create_component(ComponentType::Rules, "Be Nice", "x", &[])
            .unwrap();
        assert!(store.component_exists(ComponentType::Rules, "BE NICE").unwrap());
        assert!(!store.component_exists(ComponentType::Prompt, "Be Nice").unwrap());
        let err = store
            .create_component(ComponentType::Rules, "be nice", "y", &[])
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn write_preserves_tags() {
        let (_tmp, store) = temp_store();
        let path = store
            .create_component(ComponentType::Context, "Repo", "old", &["a".into()])
            .unwrap();
        store.write_component(&path, "new body").unwrap();
        let c = store.read_component(&path).unwrap();
        assert_eq!(c.content, "new body");
        assert_eq!(c.tags, vec!["a"]);

        store.update_component_tags(&path, &["B".into(), "c".into()]).unwrap();
        assert_eq!(store.read_component(&path).unwrap().tags, vec!["b", "c"]);
        assert_eq!(store.read_component(&path).unwrap().content, "new body");
    }

    #[test]
    fn archive_roundtrip_rewrites_references() {
        let (_tmp, store) = temp_store();
        let path = store
            .create_component(ComponentType::Prompt, "P", "body", &[])
            .unwrap();
        let mut pipeline = Pipeline::new("Uses P");
        pipeline.components.push(ComponentRef::new(ComponentType::Prompt, &path));
        store.write_pipeline(&mut pipeline).unwrap();

        let archived = store.archive_component(&path).unwrap();
        assert_eq!(archived, "archive/components/prompts/p.md");
        assert!(store.list_components(ComponentType::Prompt).unwrap().is_empty());
        let listed = store.list_archived_components(ComponentType::Prompt).unwrap();
        assert!(listed[0].is_archived);
        assert!(store.read_pipeline(&pipeline.path).unwrap().references(&archived));

        let back = store.unarchive_component(&archived).unwrap();
        assert_eq!(back, path);
        assert!(store.read_pipeline(&pipeline.path).unwrap().references(&path));
    }

    #[test]
    fn archive_refuses_to_overwrite_archived_copy() {
        let (_tmp, store) = temp_store();
        let first = store
            .create_component(ComponentType::Prompt, "A", "first body", &[])
            .unwrap();
        let archived = store.archive_component(&first).unwrap();

        let second = store
            .create_component(ComponentType::Prompt, "A", "second body", &[])
            .unwrap();
        let mut pipeline = Pipeline::new("Uses A");
        pipeline.components.push(ComponentRef::new(ComponentType::Prompt, &second));
        store.write_pipeline(&mut pipeline).unwrap();

        let err = store.archive_component(&second).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(store.read_component(&archived).unwrap().content, "first body");
        assert_eq!(store.read_component(&second).unwrap().content, "second body");
        assert!(store.read_pipeline(&pipeline.path).unwrap().references(&second));
    }

    #[test]
    fn delete_strips_references() {
        let (_tmp, store) = temp_store();
        let a = store.create_component(ComponentType::Rules, "A", "a", &[]).unwrap();
        let b = store.create_component(ComponentType::Rules, "B", "b", &[]).unwrap();
        let mut pipeline = Pipeline::new("Both");
        pipeline.components.push(ComponentRef::new(ComponentType::Rules, &a));
        pipeline.components.push(ComponentRef::new(ComponentType::Rules, &b));
        store.write_pipeline(&mut pipeline).unwrap();

        assert_eq!(store.delete_component(&a).unwrap(), 1);
        let reloaded = store.read_pipeline(&pipeline.path).unwrap();
        assert_eq!(reloaded.components.len(), 1);
        assert_eq!(reloaded.components[0].order, 1);
        assert!(reloaded.references(&b));
    }

    #[test]
    fn clone_and_rename() {
        let (_tmp, store) = temp_store();
        let path = store
            .create_component(ComponentType::Prompt, "Orig", "text", &["t".into()])
            .unwrap();
        let copy = store.clone_component(&path, "Orig (copy)").unwrap();
        assert_eq!(copy, "components/prompts/orig-copy.md");
        assert_eq!(store.read_component(&copy).unwrap().tags, vec!["t"]);
        assert!(store.clone_component(&path, "ORIG").is_err());

        let mut pipeline = Pipeline::new("R");
        pipeline.components.push(ComponentRef::new(ComponentType::Prompt, &path));
        store.write_pipeline(&mut pipeline).unwrap();

        let renamed = store.rename_component(&path, "Better Name").unwrap();
        assert_eq!(renamed, "components/prompts/better-name.md");
        assert!(store.read_pipeline(&pipeline.path).unwrap().references(&renamed));
        assert_eq!(store.rename_component(&renamed, "better name").unwrap(), renamed);
    }
}
