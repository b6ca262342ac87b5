//! Pipeline builder: pick components into a pipeline, edit them, preview the result.
//!
//! The builder is a plain state machine. [`PipelineBuilder::update`] takes one
//! [`Msg`], mutates state, and returns at most one [`Command`] describing the
//! I/O it wants done. Every mutation is followed by [`PipelineBuilder::restore`],
//! which regroups the selection, clamps cursors, refreshes the preview, and
//! scrolls the viewports so the cursors stay visible.

mod data;
mod preview;
mod render;
mod search;
mod viewport;

#[cfg(test)]
mod tests;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use tracing::{debug, info, warn};

use pluqqy_core::compose_pipeline;
use pluqqy_shared::{
    ComponentItem, ComponentRef, ComponentType, Pipeline, display_name_from_stem,
};
use pluqqy_storage::TagUsage;

use crate::editors::{
    ComponentCreator, ComponentEditor, CreatorOutcome, DialogOutcome, EditorEvent, NameAction,
    NameDialog, TagEditor, TagEvent,
};
use crate::event::{Command, Msg, Pools, Project, Target, View};
use crate::widgets::{Confirm, wrap_text};

pub use data::{DataStore, Direction, Toggle};
pub use viewport::Viewport;

/// Which part of the builder has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Search,
    Left,
    Right,
    Preview,
}

#[derive(Debug, Clone, PartialEq)]
enum ConfirmKind {
    Exit,
    Delete(Target),
    Archive(Target),
    Unarchive(Target),
}

/// The one overlay that currently owns input.
#[derive(Debug, Clone)]
enum Modal {
    Confirm(Confirm<ConfirmKind>),
    Name(NameDialog),
    Creator(ComponentCreator),
    Editor(ComponentEditor),
    Tags(TagEditor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Banner {
    id: u64,
    text: String,
}

/// A row of the right column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RightRow {
    Header(ComponentType, usize),
    Blank,
    Item(usize),
}

pub struct PipelineBuilder {
    project: Project,
    data: DataStore,
    viewport: Viewport,
    search: search::SearchBar,
    active: Column,
    left_cursor: usize,
    right_cursor: usize,
    show_preview: bool,
    preview_lines: Vec<String>,
    preview_tokens: usize,
    /// What the preview is showing, so the scroll resets when it changes.
    preview_source: String,
    modal: Option<Modal>,
    show_help: bool,
    status: Option<Banner>,
    next_banner: u64,
    /// `include_archived` value of an in-flight pool reload.
    reload_pending: Option<bool>,
    /// Component to put the left cursor on once the next reload lands.
    focus_after_reload: Option<String>,
}

impl PipelineBuilder {
    /// Open the builder on `pipeline`. A never-saved pipeline with no name
    /// starts in name entry.
    pub fn new(project: Project, pipeline: Pipeline, pools: Pools, width: u16, height: u16) -> Self {
        let show_preview = project.settings.ui.show_preview;
        let needs_name = !pipeline.is_saved() && pipeline.name.trim().is_empty();
        let mut data = DataStore::new(pipeline, project.settings.section_order());
        data.set_pools(pools);
        let mut builder = Self {
            project,
            data,
            viewport: Viewport::new(width, height),
            search: search::SearchBar::default(),
            active: Column::Left,
            left_cursor: 0,
            right_cursor: 0,
            show_preview,
            preview_lines: Vec::new(),
            preview_tokens: 0,
            preview_source: String::new(),
            modal: None,
            show_help: false,
            status: None,
            next_banner: 0,
            reload_pending: None,
            focus_after_reload: None,
        };
        if needs_name {
            builder.modal = Some(Modal::Name(NameDialog::new(
                NameAction::NewPipeline,
                "New pipeline name",
                "",
            )));
        }
        builder.filter_pass();
        builder.restore();
        info!(pipeline = %builder.data.pipeline.name, "builder opened");
        builder
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn active(&self) -> Column {
        self.active
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|b| b.text.as_str())
    }

    pub fn is_dirty(&self) -> bool {
        self.data.is_dirty()
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub fn update(&mut self, msg: Msg) -> Option<Command> {
        match msg {
            Msg::Resize(w, h) => {
                self.resize(w, h);
                None
            }
            Msg::Key(key) => self.handle_key(key),
            Msg::Paste(text) => self.handle_paste(&text),
            Msg::ClearBanner(id) => {
                if self.status.as_ref().is_some_and(|b| b.id == id) {
                    self.status = None;
                }
                None
            }
            Msg::Status(text) => {
                self.set_status(text);
                None
            }
            Msg::PoolsLoaded(result) => self.on_pools_loaded(result),
            Msg::PipelinesLoaded(_) => None,
            Msg::PipelineSaved { pipeline, output } => self.on_pipeline_saved(pipeline, output),
            Msg::Copied(result) => match result {
                Ok(tokens) => self.banner(format!("✓ Copied pipeline ({tokens} tokens) to clipboard")),
                Err(e) => {
                    self.set_status(format!("✗ Copy failed: {e}"));
                    None
                }
            },
            Msg::ComponentSaved {
                path,
                content,
                result,
            } => self.on_component_saved(&path, &content, result),
            Msg::ComponentCreated(result) => self.on_component_created(result),
            Msg::TagsSaved {
                target,
                tags,
                removed,
                result,
            } => self.on_tags_saved(target, tags, removed, result),
            Msg::TagsCleaned(result) => match result {
                Ok(removed) if removed.is_empty() => None,
                Ok(removed) => Command::batch([
                    self.banner(format!("✓ Removed unused tags: {}", removed.join(", "))),
                    Some(self.reload()),
                ]),
                Err(e) => {
                    warn!(error = %e, "tag cleanup failed");
                    self.set_status(format!("✗ Tag cleanup failed: {e}"));
                    None
                }
            },
            Msg::TagUsageLoaded { tag, result } => {
                self.on_tag_usage(&tag, result);
                None
            }
            Msg::TagDeleted { tag, result } => self.on_tag_deleted(&tag, result),
            Msg::Deleted { target, result } => self.on_deleted(target, result),
            Msg::Moved {
                target,
                archived,
                result,
            } => self.on_moved(target, archived, result),
            Msg::Cloned { target, result } => self.on_cloned(target, result),
            Msg::Renamed {
                target,
                name,
                result,
            } => self.on_renamed(target, name, result),
            Msg::DiagramWritten(result) => match result {
                Ok(path) => Command::batch([
                    self.banner(format!("✓ Diagram written to {}", path.display())),
                    Some(Command::OpenExternal(path)),
                ]),
                Err(e) => {
                    self.set_status(format!("✗ Diagram failed: {e}"));
                    None
                }
            },
            Msg::ExternalEditFinished(result) => {
                if let Err(e) = result {
                    self.set_status(format!("✗ {e}"));
                }
                Some(self.reload())
            }
        }
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.viewport.resize(width, height);
        match self.modal.as_mut() {
            Some(Modal::Editor(e)) => e.set_height(height),
            Some(Modal::Creator(c)) => c.set_height(height),
            _ => {}
        }
        self.restore();
    }

    fn handle_paste(&mut self, text: &str) -> Option<Command> {
        match self.modal.as_mut() {
            Some(Modal::Editor(e)) => e.handle_paste(text),
            Some(Modal::Creator(c)) => c.handle_paste(text),
            Some(Modal::Name(d)) => d.handle_paste(text),
            Some(_) => {}
            None if self.active == Column::Search => {
                if self.search.paste(text) == search::SearchOutcome::Changed {
                    return self.apply_search();
                }
            }
            None => {}
        }
        None
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Some(Command::Quit);
        }
        if self.show_help {
            self.show_help = false;
            return None;
        }
        if let Some(modal) = self.modal.take() {
            return self.route_modal(modal, key);
        }
        if self.active == Column::Search {
            match self.search.handle_key(&key) {
                search::SearchOutcome::Ignored => {}
                search::SearchOutcome::Unchanged => return None,
                search::SearchOutcome::Changed => return self.apply_search(),
                search::SearchOutcome::Exit => {
                    self.active = Column::Left;
                    let cmd = self.apply_search();
                    self.restore();
                    return cmd;
                }
            }
        }
        self.handle_normal(key)
    }

    /// Give `modal` the key. It is put back unless it closed.
    fn route_modal(&mut self, modal: Modal, key: KeyEvent) -> Option<Command> {
        match modal {
            Modal::Confirm(confirm) => match confirm.handle_key(&key) {
                None => {
                    self.modal = Some(Modal::Confirm(confirm));
                    None
                }
                Some(false) => None,
                Some(true) => self.confirmed(confirm.kind),
            },
            Modal::Name(mut dialog) => match dialog.handle_key(&key) {
                DialogOutcome::Pending => {
                    self.modal = Some(Modal::Name(dialog));
                    None
                }
                DialogOutcome::Cancel => match dialog.action {
                    NameAction::NewPipeline => Some(Command::SwitchView(View::List)),
                    _ => None,
                },
                DialogOutcome::Submit(name) => self.submit_name(dialog, name),
            },
            Modal::Creator(mut creator) => {
                let width = self.viewport.width;
                match creator.handle_key(&key, width, &self.project.store) {
                    CreatorOutcome::Pending => {
                        self.modal = Some(Modal::Creator(creator));
                        None
                    }
                    CreatorOutcome::Cancel => {
                        self.restore();
                        None
                    }
                    CreatorOutcome::Create {
                        component_type,
                        name,
                        content,
                    } => {
                        self.modal = Some(Modal::Creator(creator));
                        Some(Command::CreateComponent {
                            component_type,
                            name,
                            content,
                        })
                    }
                }
            }
            Modal::Editor(mut editor) => {
                let (_, event) = editor.handle_key(&key, self.viewport.width);
                match event {
                    None => {
                        self.modal = Some(Modal::Editor(editor));
                        None
                    }
                    Some(EditorEvent::Save(content)) => {
                        let path = editor.path.clone();
                        self.modal = Some(Modal::Editor(editor));
                        Some(Command::WriteComponent { path, content })
                    }
                    Some(EditorEvent::Close) => {
                        self.restore();
                        None
                    }
                }
            }
            Modal::Tags(mut tags) => match tags.handle_key(&key) {
                None => {
                    self.modal = Some(Modal::Tags(tags));
                    None
                }
                Some(TagEvent::Close) => None,
                Some(TagEvent::Save { tags: list, removed }) => {
                    self.save_tags(tags.target.clone(), list, removed)
                }
                Some(TagEvent::RequestUsage(tag)) => {
                    self.modal = Some(Modal::Tags(tags));
                    Some(Command::LoadTagUsage(tag))
                }
                Some(TagEvent::DeleteTag(tag)) => {
                    self.modal = Some(Modal::Tags(tags));
                    Some(Command::DeleteTag(tag))
                }
            },
        }
    }

    fn confirmed(&mut self, kind: ConfirmKind) -> Option<Command> {
        match kind {
            ConfirmKind::Exit => Some(Command::SwitchView(View::List)),
            ConfirmKind::Delete(target) => Some(Command::Delete(target)),
            ConfirmKind::Archive(target) => Some(Command::Archive(target)),
            ConfirmKind::Unarchive(target) => Some(Command::Unarchive(target)),
        }
    }

    fn submit_name(&mut self, mut dialog: NameDialog, name: String) -> Option<Command> {
        match dialog.action.clone() {
            NameAction::NewPipeline => match self.project.store.pipeline_exists(&name) {
                Ok(true) => {
                    dialog.warning = Some(format!("A pipeline named '{name}' already exists"));
                    self.modal = Some(Modal::Name(dialog));
                    None
                }
                Ok(false) | Err(_) => {
                    self.data.pipeline.name = name;
                    None
                }
            },
            NameAction::Rename(Target::Pipeline(path)) if path.is_empty() => {
                self.data.pipeline.name = name;
                None
            }
            // Clone and rename stay open until the store answers.
            NameAction::Clone(target) => {
                self.modal = Some(Modal::Name(dialog));
                Some(Command::Clone { target, name })
            }
            NameAction::Rename(target) => {
                self.modal = Some(Modal::Name(dialog));
                Some(Command::Rename { target, name })
            }
        }
    }

    fn save_tags(&mut self, target: Target, tags: Vec<String>, removed: Vec<String>) -> Option<Command> {
        match &target {
            Target::Pipeline(path) if path.is_empty() => {
                self.data.pipeline.tags = tags;
                None
            }
            _ => Some(Command::SaveTags {
                target,
                tags,
                removed,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Normal mode
    // -----------------------------------------------------------------------

    fn handle_normal(&mut self, key: KeyEvent) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Tab => self.cycle(true),
            KeyCode::BackTab => self.cycle(false),
            KeyCode::Up if shift => self.reorder(Direction::Up),
            KeyCode::Down if shift => self.reorder(Direction::Down),
            KeyCode::Char('K') => self.reorder(Direction::Up),
            KeyCode::Char('J') => self.reorder(Direction::Down),
            KeyCode::Up | KeyCode::Char('k') => self.move_by(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_by(1),
            KeyCode::PageUp => self.page(-1),
            KeyCode::PageDown => self.page(1),
            KeyCode::Home | KeyCode::Char('g') => self.jump(false),
            KeyCode::End | KeyCode::Char('G') => self.jump(true),
            KeyCode::Enter => self.activate(),
            KeyCode::Char('p') => self.toggle_preview(),
            KeyCode::Char('s') if ctrl => return self.save(false),
            KeyCode::Char('S') => return self.save(true),
            KeyCode::Char('y') => {
                return Some(Command::CopyRendered(self.data.to_pipeline()));
            }
            KeyCode::Char('n') => {
                let mut creator = ComponentCreator::new();
                creator.set_height(self.viewport.height);
                self.modal = Some(Modal::Creator(creator));
            }
            KeyCode::Char('e') => self.open_editor(),
            KeyCode::Char('E') => {
                return self.current_component_path().map(Command::ExternalEdit);
            }
            KeyCode::Char('d') => self.confirm_delete(),
            KeyCode::Char('a') => self.confirm_archive(),
            KeyCode::Char('C') => self.open_clone(),
            KeyCode::Char('R') => self.open_rename(),
            KeyCode::Char('M') => return self.diagram(),
            KeyCode::Char('t') => self.open_tags(),
            KeyCode::Char('/') => self.active = Column::Search,
            KeyCode::Esc => return self.back(),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
        None
    }

    fn cycle(&mut self, forward: bool) {
        use Column::*;
        let after_right = if self.show_preview { Preview } else { Left };
        let before_left = if self.show_preview { Preview } else { Right };
        let next = match (self.active, forward) {
            (Search, true) => Left,
            (Search, false) => before_left,
            (Left, true) => Right,
            (Left, false) => before_left,
            (Right, true) => after_right,
            (Right, false) => Left,
            (Preview, true) => Left,
            (Preview, false) => Right,
        };
        if next == Right && self.active != Right {
            self.right_cursor = 0;
            self.viewport.right_offset = 0;
        }
        self.active = next;
        self.restore();
    }

    fn move_by(&mut self, delta: isize) {
        match self.active {
            Column::Preview => {
                let total = self.preview_lines.len();
                self.viewport.scroll_preview(delta, total, self.show_preview);
                return;
            }
            Column::Left => {
                let len = self.data.available().len();
                self.left_cursor = step(self.left_cursor, delta, len);
            }
            Column::Right => {
                let len = self.data.selected.len();
                self.right_cursor = step(self.right_cursor, delta, len);
            }
            Column::Search => return,
        }
        self.restore();
    }

    fn page(&mut self, dir: isize) {
        let rows = match self.active {
            Column::Preview => self.viewport.preview_rows(self.show_preview),
            Column::Left => self.viewport.left_rows(self.show_preview),
            Column::Right => self.viewport.right_rows(self.show_preview),
            Column::Search => return,
        };
        self.move_by(dir * rows as isize);
    }

    fn jump(&mut self, to_end: bool) {
        match self.active {
            Column::Preview => {
                let total = self.preview_lines.len();
                let delta = if to_end { isize::MAX / 2 } else { isize::MIN / 2 };
                self.viewport.scroll_preview(delta, total, self.show_preview);
                return;
            }
            Column::Left => {
                let len = self.data.available().len();
                self.left_cursor = if to_end { len.saturating_sub(1) } else { 0 };
            }
            Column::Right => {
                let len = self.data.selected.len();
                self.right_cursor = if to_end { len.saturating_sub(1) } else { 0 };
            }
            Column::Search => return,
        }
        self.restore();
    }

    fn activate(&mut self) {
        match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                let r = ComponentRef::new(item.component_type, &item.path);
                match self.data.insert_if_absent(r) {
                    Toggle::Added(i) => self.right_cursor = i,
                    Toggle::Removed(i) => {
                        self.right_cursor = i.min(self.data.selected.len().saturating_sub(1));
                    }
                }
            }
            Column::Right => {
                self.data.remove_at(self.right_cursor);
            }
            _ => return,
        }
        self.restore();
    }

    fn reorder(&mut self, dir: Direction) {
        if self.active != Column::Right {
            return;
        }
        if let Some(j) = self.data.swap_with_neighbor(self.right_cursor, dir) {
            self.right_cursor = j;
            self.restore();
        }
    }

    fn toggle_preview(&mut self) {
        self.show_preview = !self.show_preview;
        self.preview_source.clear();
        self.restore();
    }

    fn save(&mut self, set_output: bool) -> Option<Command> {
        if self.data.pipeline.name.trim().is_empty() {
            self.set_status("✗ Pipeline needs a name before saving".to_string());
            return None;
        }
        self.set_status("Saving…".to_string());
        Some(Command::SavePipeline {
            pipeline: self.data.to_pipeline(),
            set_output,
        })
    }

    fn back(&mut self) -> Option<Command> {
        if self.data.is_dirty() {
            self.modal = Some(Modal::Confirm(Confirm::new(
                ConfirmKind::Exit,
                "Unsaved changes",
                vec![
                    format!("'{}' has unsaved changes.", self.data.pipeline.name),
                    "Leave without saving?".to_string(),
                ],
            )));
            return None;
        }
        Some(Command::SwitchView(View::List))
    }

    fn diagram(&mut self) -> Option<Command> {
        if self.data.selected.is_empty() {
            self.set_status("Nothing to diagram: the pipeline is empty".to_string());
            return None;
        }
        Some(Command::Diagram(self.data.to_pipeline()))
    }

    // -----------------------------------------------------------------------
    // Overlay openers
    // -----------------------------------------------------------------------

    fn left_item(&self) -> Option<ComponentItem> {
        self.data.available().get(self.left_cursor).map(|i| (*i).clone())
    }

    /// Canonical path of the component under the active cursor.
    fn current_component_path(&self) -> Option<String> {
        match self.active {
            Column::Left => self.left_item().map(|i| i.path),
            Column::Right => self
                .data
                .selected
                .get(self.right_cursor)
                .map(|r| r.canonical_path().to_string()),
            _ => None,
        }
    }

    fn open_editor(&mut self) {
        let Some(path) = self.current_component_path() else {
            return;
        };
        let (name, component_type) = match self.data.find(&path) {
            Some(item) => (item.name.clone(), item.component_type),
            None => match self.data.selected.get(self.right_cursor) {
                Some(r) if self.active == Column::Right => (name_from_path(&path), r.component_type),
                _ => return,
            },
        };
        match self.project.store.read_component(&path) {
            Ok(content) => {
                let mut editor = ComponentEditor::start(
                    path,
                    name,
                    component_type,
                    &content.content,
                    content.tags,
                    self.project.store.project_root(),
                );
                editor.set_height(self.viewport.height);
                self.modal = Some(Modal::Editor(editor));
            }
            Err(e) => {
                self.set_status(format!("✗ Cannot open {path}: {e}"));
            }
        }
    }

    fn confirm_delete(&mut self) {
        match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                let mut lines = vec![format!("Delete {} '{}'?", item.component_type.label(), item.name)];
                if item.usage_count > 0 {
                    lines.push(format!(
                        "It is used by {} pipeline(s); those references will be removed.",
                        item.usage_count
                    ));
                }
                self.modal = Some(Modal::Confirm(Confirm::new(
                    ConfirmKind::Delete(Target::Component(item.path)),
                    "Delete component",
                    lines,
                )));
            }
            Column::Right => {
                let Some(path) = self.saved_pipeline_path() else {
                    return;
                };
                self.modal = Some(Modal::Confirm(Confirm::new(
                    ConfirmKind::Delete(Target::Pipeline(path)),
                    "Delete pipeline",
                    vec![format!("Delete pipeline '{}'?", self.data.pipeline.name)],
                )));
            }
            _ => {}
        }
    }

    fn confirm_archive(&mut self) {
        match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                let target = Target::Component(item.path.clone());
                let (kind, title, verb) = if item.is_archived {
                    (ConfirmKind::Unarchive(target), "Unarchive component", "Restore")
                } else {
                    (ConfirmKind::Archive(target), "Archive component", "Archive")
                };
                self.modal = Some(Modal::Confirm(Confirm::new(
                    kind,
                    title,
                    vec![format!("{verb} {} '{}'?", item.component_type.label(), item.name)],
                )));
            }
            Column::Right => {
                let Some(path) = self.saved_pipeline_path() else {
                    return;
                };
                self.modal = Some(Modal::Confirm(Confirm::new(
                    ConfirmKind::Archive(Target::Pipeline(path)),
                    "Archive pipeline",
                    vec![format!("Archive pipeline '{}'?", self.data.pipeline.name)],
                )));
            }
            _ => {}
        }
    }

    fn open_clone(&mut self) {
        let dialog = match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                NameDialog::new(
                    NameAction::Clone(Target::Component(item.path)),
                    "Clone component",
                    &format!("{} (copy)", item.name),
                )
            }
            Column::Right => {
                let Some(path) = self.saved_pipeline_path() else {
                    return;
                };
                NameDialog::new(
                    NameAction::Clone(Target::Pipeline(path)),
                    "Clone pipeline",
                    &format!("{} (copy)", self.data.pipeline.name),
                )
            }
            _ => return,
        };
        self.modal = Some(Modal::Name(dialog));
    }

    fn open_rename(&mut self) {
        let dialog = match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                NameDialog::new(
                    NameAction::Rename(Target::Component(item.path)),
                    "Rename component",
                    &item.name,
                )
            }
            Column::Right => NameDialog::new(
                NameAction::Rename(Target::Pipeline(self.data.pipeline.path.clone())),
                "Rename pipeline",
                &self.data.pipeline.name,
            ),
            _ => return,
        };
        self.modal = Some(Modal::Name(dialog));
    }

    fn open_tags(&mut self) {
        let editor = match self.active {
            Column::Left => {
                let Some(item) = self.left_item() else {
                    return;
                };
                TagEditor::start(
                    Target::Component(item.path),
                    item.name,
                    item.tags,
                    self.data.all_tags.clone(),
                    &self.data.registry,
                )
            }
            Column::Right => TagEditor::start(
                Target::Pipeline(self.data.pipeline.path.clone()),
                self.data.pipeline.name.clone(),
                self.data.pipeline.tags.clone(),
                self.data.all_tags.clone(),
                &self.data.registry,
            ),
            _ => return,
        };
        self.modal = Some(Modal::Tags(editor));
    }

    fn saved_pipeline_path(&mut self) -> Option<String> {
        if self.data.pipeline.is_saved() {
            Some(self.data.pipeline.path.clone())
        } else {
            self.set_status("Pipeline has not been saved yet".to_string());
            None
        }
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Reload pools if the archived policy changed, otherwise filter now.
    fn apply_search(&mut self) -> Option<Command> {
        let wants = self.search.parsed().includes_archived();
        if wants != self.data.includes_archived {
            if self.reload_pending == Some(wants) {
                return None;
            }
            debug!(include_archived = wants, "search needs a pool reload");
            self.reload_pending = Some(wants);
            return Some(Command::LoadPools {
                include_archived: wants,
            });
        }
        self.filter_pass();
        self.restore();
        None
    }

    fn filter_pass(&mut self) {
        let prompts = self.search.filter(&self.data.prompts);
        let contexts = self.search.filter(&self.data.contexts);
        let rules = self.search.filter(&self.data.rules);
        self.data.set_filtered_views(prompts, contexts, rules);
        if self.left_cursor >= self.data.available().len() {
            self.left_cursor = 0;
            self.viewport.left_offset = 0;
        }
    }

    fn reload(&mut self) -> Command {
        let include_archived = self.search.parsed().includes_archived();
        self.reload_pending = Some(include_archived);
        Command::LoadPools { include_archived }
    }

    // -----------------------------------------------------------------------
    // Invariants and preview
    // -----------------------------------------------------------------------

    /// Regroup, clamp, refresh the preview, and keep cursors in view.
    fn restore(&mut self) {
        self.data.regroup();
        let left_len = self.data.available().len();
        let right_len = self.data.selected.len();
        self.left_cursor = self.left_cursor.min(left_len.saturating_sub(1));
        self.right_cursor = self.right_cursor.min(right_len.saturating_sub(1));

        self.refresh_preview();
        self.viewport.follow_left(self.left_cursor, self.show_preview);
        let line = self.right_line(self.right_cursor);
        self.viewport.follow_right(line, self.show_preview);
        if self.active == Column::Right && self.show_preview {
            self.sync_preview();
        }
    }

    fn refresh_preview(&mut self) {
        if !self.show_preview {
            return;
        }
        let (source, text) = if self.active == Column::Left {
            match self.left_item() {
                Some(item) => {
                    let text = match self.project.store.read_component(&item.path) {
                        Ok(c) => c.content,
                        Err(e) => format!("Error: {e}"),
                    };
                    (format!("component:{}", item.path), text)
                }
                None => ("component:".to_string(), "No component selected.".to_string()),
            }
        } else {
            let pipeline = self.data.to_pipeline();
            let text = if pipeline.components.is_empty() {
                "No components selected yet. Add some from the left column.".to_string()
            } else {
                compose_pipeline(&self.project.store, &self.project.settings, &pipeline)
                    .unwrap_or_else(|e| format!("Error: {e}"))
            };
            ("pipeline".to_string(), text)
        };
        self.preview_tokens = pluqqy_shared::estimate_tokens(&text);
        self.preview_lines = wrap_text(&text, self.viewport.preview_width());
        if source != self.preview_source {
            self.preview_source = source;
            self.viewport.preview_offset = 0;
        }
        self.viewport
            .clamp_preview(self.preview_lines.len(), self.show_preview);
    }

    /// Scroll the preview to the component under the right cursor.
    fn sync_preview(&mut self) {
        let store = &self.project.store;
        let target = preview::target_line(
            &self.preview_lines,
            self.viewport.preview_width(),
            &self.data.selected,
            self.right_cursor,
            |path| store.read_component(path).ok().map(|c| c.content),
        );
        let rows = self.viewport.preview_rows(self.show_preview);
        self.viewport.preview_offset = preview::scroll_for(target, rows, self.preview_lines.len());
    }

    /// Right column rows: a header per type group, blank lines between groups.
    fn right_rows(&self) -> Vec<RightRow> {
        let mut rows = Vec::new();
        let mut i = 0;
        let selected = &self.data.selected;
        while i < selected.len() {
            let t = selected[i].component_type;
            let count = selected[i..]
                .iter()
                .take_while(|r| r.component_type == t)
                .count();
            if !rows.is_empty() {
                rows.push(RightRow::Blank);
            }
            rows.push(RightRow::Header(t, count));
            rows.extend((i..i + count).map(RightRow::Item));
            i += count;
        }
        rows
    }

    fn right_line(&self, cursor: usize) -> usize {
        self.right_rows()
            .iter()
            .position(|r| *r == RightRow::Item(cursor))
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Async results
    // -----------------------------------------------------------------------

    fn on_pools_loaded(&mut self, result: Result<Pools, String>) -> Option<Command> {
        self.reload_pending = None;
        match result {
            Ok(pools) => {
                self.data.set_pools(pools);
                let cmd = self.apply_search();
                if let Some(path) = self.focus_after_reload.take() {
                    if let Some(i) = self.data.available().iter().position(|i| i.path == path) {
                        self.left_cursor = i;
                    }
                }
                self.restore();
                cmd
            }
            Err(e) => {
                self.set_status(format!("✗ Failed to load components: {e}"));
                None
            }
        }
    }

    fn on_pipeline_saved(
        &mut self,
        pipeline: Result<Pipeline, String>,
        output: Option<Result<std::path::PathBuf, String>>,
    ) -> Option<Command> {
        let saved = match pipeline {
            Ok(p) => p,
            Err(e) => {
                self.set_status(format!("✗ Failed to save pipeline: {e}"));
                return None;
            }
        };
        self.data.pipeline.path = saved.path.clone();
        self.data.pipeline.tags = saved.tags.clone();
        self.data.snapshot_from(&saved.components);
        let banner = match output {
            None => self.banner(format!("✓ Saved {}", saved.name)),
            Some(Ok(path)) => {
                self.banner(format!("✓ Saved {} and wrote {}", saved.name, path.display()))
            }
            Some(Err(e)) => {
                self.set_status(format!("✗ Saved {} but could not write output: {e}", saved.name));
                None
            }
        };
        Command::batch([banner, Some(self.reload())])
    }

    fn on_component_saved(
        &mut self,
        path: &str,
        content: &str,
        result: Result<(), String>,
    ) -> Option<Command> {
        if let Err(e) = result {
            self.set_status(format!("✗ Failed to save component: {e}"));
            return None;
        }
        if let Some(Modal::Editor(editor)) = self.modal.as_mut() {
            if editor.path == path {
                editor.mark_saved(content);
            }
        }
        self.refresh_preview();
        Command::batch([
            self.banner(format!("✓ Saved {}", name_from_path(path))),
            Some(self.reload()),
        ])
    }

    fn on_component_created(&mut self, result: Result<String, String>) -> Option<Command> {
        match result {
            Ok(path) => {
                if matches!(self.modal, Some(Modal::Creator(_))) {
                    self.modal = None;
                }
                self.active = Column::Left;
                let banner = self.banner(format!("✓ Created {}", name_from_path(&path)));
                self.focus_after_reload = Some(path);
                Command::batch([banner, Some(self.reload())])
            }
            Err(e) => {
                if let Some(Modal::Creator(creator)) = self.modal.as_mut() {
                    creator.fail(e.clone());
                }
                self.set_status(format!("✗ Failed to create component: {e}"));
                None
            }
        }
    }

    fn on_tags_saved(
        &mut self,
        target: Target,
        tags: Vec<String>,
        removed: Vec<String>,
        result: Result<(), String>,
    ) -> Option<Command> {
        if let Err(e) = result {
            self.set_status(format!("✗ Failed to save tags: {e}"));
            return None;
        }
        if let Target::Pipeline(path) = &target {
            if *path == self.data.pipeline.path {
                self.data.pipeline.tags = tags;
            }
        }
        let cleanup = (!removed.is_empty()).then(|| Command::CleanupTags(removed));
        Command::batch([
            self.banner(format!("✓ Tags saved for {}", name_from_path(target.path()))),
            cleanup,
            Some(self.reload()),
        ])
    }

    fn on_tag_usage(&mut self, tag: &str, result: Result<TagUsage, String>) {
        if let Some(Modal::Tags(editor)) = self.modal.as_mut() {
            match result {
                Ok(usage) => editor.show_delete_confirm(tag, &usage),
                Err(e) => editor.fail(format!("✗ {e}")),
            }
        }
    }

    fn on_tag_deleted(&mut self, tag: &str, result: Result<TagUsage, String>) -> Option<Command> {
        match result {
            Ok(usage) => {
                if let Some(Modal::Tags(editor)) = self.modal.as_mut() {
                    editor.tag_deleted(tag);
                }
                self.data.pipeline.tags.retain(|t| t != tag);
                Command::batch([
                    self.banner(format!(
                        "✓ Deleted tag '{tag}' from {} file(s)",
                        usage.total()
                    )),
                    Some(self.reload()),
                ])
            }
            Err(e) => {
                if let Some(Modal::Tags(editor)) = self.modal.as_mut() {
                    editor.fail(format!("✗ {e}"));
                }
                None
            }
        }
    }

    fn on_deleted(&mut self, target: Target, result: Result<(), String>) -> Option<Command> {
        if let Err(e) = result {
            self.set_status(format!("✗ Failed to delete {}: {e}", target.noun()));
            return None;
        }
        match target {
            Target::Pipeline(_) => Some(Command::SwitchView(View::List)),
            Target::Component(path) => {
                self.data.drop_path(&path);
                self.restore();
                Command::batch([
                    self.banner(format!("✓ Deleted {}", name_from_path(&path))),
                    Some(self.reload()),
                ])
            }
        }
    }

    fn on_moved(
        &mut self,
        target: Target,
        archived: bool,
        result: Result<String, String>,
    ) -> Option<Command> {
        let verb = if archived { "archive" } else { "unarchive" };
        let new_path = match result {
            Ok(p) => p,
            Err(e) => {
                self.set_status(format!("✗ Failed to {verb} {}: {e}", target.noun()));
                return None;
            }
        };
        match target {
            Target::Pipeline(_) => Some(Command::SwitchView(View::List)),
            Target::Component(old) => {
                self.data.replace_path(&old, &new_path);
                Command::batch([
                    self.banner(format!("✓ {}d {}", capitalize(verb), name_from_path(&old))),
                    Some(self.reload()),
                ])
            }
        }
    }

    /// Close a clone or rename dialog once the store has answered.
    fn close_name_dialog(&mut self, error: Option<String>) {
        if let Some(Modal::Name(dialog)) = self.modal.as_mut() {
            if matches!(dialog.action, NameAction::Clone(_) | NameAction::Rename(_)) {
                match error {
                    Some(e) => dialog.warning = Some(e),
                    None => self.modal = None,
                }
            }
        }
    }

    fn on_cloned(&mut self, target: Target, result: Result<String, String>) -> Option<Command> {
        match result {
            Ok(path) => {
                self.close_name_dialog(None);
                if let Target::Component(_) = target {
                    self.focus_after_reload = Some(path.clone());
                }
                Command::batch([
                    self.banner(format!("✓ Cloned {} to {path}", target.noun())),
                    Some(self.reload()),
                ])
            }
            Err(e) => {
                self.close_name_dialog(Some(e));
                None
            }
        }
    }

    fn on_renamed(
        &mut self,
        target: Target,
        name: String,
        result: Result<String, String>,
    ) -> Option<Command> {
        let new_path = match result {
            Ok(p) => p,
            Err(e) => {
                self.close_name_dialog(Some(e));
                return None;
            }
        };
        self.close_name_dialog(None);
        match &target {
            Target::Component(old) => {
                self.data.replace_path(old, &new_path);
                self.focus_after_reload = Some(new_path);
            }
            Target::Pipeline(_) => {
                self.data.pipeline.path = new_path;
                self.data.pipeline.name = name.clone();
            }
        }
        Command::batch([
            self.banner(format!("✓ Renamed {} to {name}", target.noun())),
            Some(self.reload()),
        ])
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Show a message that clears itself after the banner timeout.
    fn banner(&mut self, text: String) -> Option<Command> {
        let id = self.set_status(text);
        Some(Command::clear_banner_later(id))
    }

    /// Show a message until something replaces it.
    fn set_status(&mut self, text: String) -> u64 {
        self.next_banner += 1;
        self.status = Some(Banner {
            id: self.next_banner,
            text,
        });
        self.next_banner
    }

    pub fn draw(&self, f: &mut Frame) {
        render::draw(self, f);
    }
}

/// Move `cursor` by `delta` within `[0, len)`.
fn step(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    cursor.saturating_add_signed(delta).min(len - 1)
}

fn name_from_path(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
    display_name_from_stem(stem)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
