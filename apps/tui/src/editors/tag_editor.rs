//! Two-pane tag editor: current tags with suggestions, and the project tag cloud.

use std::collections::{BTreeSet, HashMap};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph, Wrap};

use pluqqy_shared::normalize_tag;
use pluqqy_storage::{TagRegistry, TagUsage};

use super::input::TextInput;
use crate::event::Target;
use crate::widgets::{Confirm, centered_rect, hint_bar, pane, tag_chip};

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Input,
    Cloud,
}

#[derive(Debug, Clone)]
enum Mode {
    Editing,
    ExitConfirm(Confirm<()>),
    /// Waiting for usage of this tag before asking.
    LoadingUsage(String),
    DeleteConfirm(Confirm<String>),
}

/// What the tag editor asks its owner to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Save {
        tags: Vec<String>,
        /// Tags present when the editor opened but gone now.
        removed: Vec<String>,
    },
    Close,
    /// Look up where a tag is used before confirming its deletion.
    RequestUsage(String),
    /// Remove a tag from the registry and every file.
    DeleteTag(String),
}

#[derive(Debug, Clone)]
pub struct TagEditor {
    pub target: Target,
    pub title: String,
    tags: Vec<String>,
    original: Vec<String>,
    input: TextInput,
    /// Insertion point among `tags`.
    cursor: usize,
    available: Vec<String>,
    colors: HashMap<String, String>,
    pane: Pane,
    suggestion: Option<usize>,
    cloud_cursor: usize,
    mode: Mode,
    pub message: Option<String>,
}

impl TagEditor {
    pub fn start(
        target: Target,
        title: impl Into<String>,
        tags: Vec<String>,
        available: Vec<String>,
        registry: &TagRegistry,
    ) -> Self {
        let mut all: BTreeSet<String> = available.into_iter().collect();
        all.extend(tags.iter().cloned());
        let available: Vec<String> = all.into_iter().collect();
        let colors = available
            .iter()
            .map(|t| (t.clone(), registry.color_for(t)))
            .collect();
        Self {
            target,
            title: title.into(),
            cursor: tags.len(),
            original: tags.clone(),
            tags,
            input: TextInput::default(),
            available,
            colors,
            pane: Pane::Input,
            suggestion: None,
            cloud_cursor: 0,
            mode: Mode::Editing,
            message: None,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn is_dirty(&self) -> bool {
        let now: BTreeSet<&String> = self.tags.iter().collect();
        let then: BTreeSet<&String> = self.original.iter().collect();
        now != then
    }

    /// Prefix matches first, then substring matches, skipping tags already set.
    pub fn suggestions(&self) -> Vec<&str> {
        let typed = normalize_tag(self.input.value());
        if typed.is_empty() {
            return Vec::new();
        }
        let candidates = self.available.iter().filter(|t| !self.tags.contains(t));
        let (prefix, rest): (Vec<&String>, Vec<&String>) =
            candidates.partition(|t| t.starts_with(&typed));
        prefix
            .into_iter()
            .chain(rest.into_iter().filter(|t| t.contains(&typed)))
            .take(MAX_SUGGESTIONS)
            .map(String::as_str)
            .collect()
    }

    /// Usage for a pending deletion arrived.
    pub fn show_delete_confirm(&mut self, tag: &str, usage: &TagUsage) {
        if !matches!(&self.mode, Mode::LoadingUsage(t) if t == tag) {
            return;
        }
        let mut lines = vec![format!("Delete tag '{tag}' from the project?")];
        if usage.is_empty() {
            lines.push("It is not used anywhere.".to_string());
        } else {
            lines.push(format!("It will be removed from {} file(s):", usage.total()));
            lines.extend(
                usage
                    .components
                    .iter()
                    .chain(usage.pipelines.iter())
                    .take(8)
                    .map(|p| format!("  {p}")),
            );
            if usage.total() > 8 {
                lines.push(format!("  … and {} more", usage.total() - 8));
            }
        }
        self.mode = Mode::DeleteConfirm(Confirm::new(tag.to_string(), "Delete tag", lines));
    }

    /// A project-wide deletion finished.
    pub fn tag_deleted(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
        self.original.retain(|t| t != tag);
        self.available.retain(|t| t != tag);
        self.cursor = self.cursor.min(self.tags.len());
        self.cloud_cursor = self.cloud_cursor.min(self.available.len().saturating_sub(1));
        self.mode = Mode::Editing;
    }

    /// Usage lookup or deletion failed.
    pub fn fail(&mut self, message: String) {
        self.mode = Mode::Editing;
        self.message = Some(message);
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<TagEvent> {
        match &self.mode {
            Mode::ExitConfirm(confirm) => {
                return match confirm.handle_key(key) {
                    Some(true) => Some(TagEvent::Close),
                    Some(false) => {
                        self.mode = Mode::Editing;
                        None
                    }
                    None => None,
                };
            }
            Mode::DeleteConfirm(confirm) => {
                let tag = confirm.kind.clone();
                return match confirm.handle_key(key) {
                    Some(true) => {
                        self.mode = Mode::Editing;
                        Some(TagEvent::DeleteTag(tag))
                    }
                    Some(false) => {
                        self.mode = Mode::Editing;
                        None
                    }
                    None => None,
                };
            }
            Mode::LoadingUsage(_) => {
                if key.code == KeyCode::Esc {
                    self.mode = Mode::Editing;
                }
                return None;
            }
            Mode::Editing => {}
        }

        self.message = None;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => {
                return Some(TagEvent::Save {
                    tags: self.tags.clone(),
                    removed: self
                        .original
                        .iter()
                        .filter(|t| !self.tags.contains(t))
                        .cloned()
                        .collect(),
                });
            }
            KeyCode::Esc => {
                if !self.is_dirty() {
                    return Some(TagEvent::Close);
                }
                self.mode = Mode::ExitConfirm(Confirm::new(
                    (),
                    "Unsaved changes",
                    vec!["Discard tag changes?".to_string()],
                ));
                return None;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.pane = match self.pane {
                    Pane::Input => Pane::Cloud,
                    Pane::Cloud => Pane::Input,
                };
                return None;
            }
            _ => {}
        }
        match self.pane {
            Pane::Input => self.handle_input(key),
            Pane::Cloud => self.handle_cloud(key),
        }
    }

    fn handle_input(&mut self, key: &KeyEvent) -> Option<TagEvent> {
        match key.code {
            KeyCode::Enter | KeyCode::Char(',') => {
                let chosen = match self.suggestion {
                    Some(i) => self.suggestions().get(i).map(|s| s.to_string()),
                    None => Some(normalize_tag(self.input.value())),
                };
                if let Some(tag) = chosen {
                    self.commit(tag);
                }
            }
            KeyCode::Up => {
                self.suggestion = match self.suggestion {
                    Some(i) if i > 0 => Some(i - 1),
                    _ => None,
                };
            }
            KeyCode::Down => {
                let count = self.suggestions().len();
                let next = self.suggestion.map(|i| i + 1).unwrap_or(0);
                if next < count {
                    self.suggestion = Some(next);
                }
            }
            KeyCode::Backspace => {
                if self.input.is_empty() {
                    if self.cursor > 0 {
                        self.cursor -= 1;
                        self.tags.remove(self.cursor);
                    }
                } else {
                    self.input.backspace();
                    self.suggestion = None;
                }
            }
            KeyCode::Left if self.input.is_empty() => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right if self.input.is_empty() => {
                self.cursor = (self.cursor + 1).min(self.tags.len());
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.insert(c);
                self.suggestion = None;
            }
            _ => {}
        }
        None
    }

    fn handle_cloud(&mut self, key: &KeyEvent) -> Option<TagEvent> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let last = self.available.len().saturating_sub(1);
        match key.code {
            KeyCode::Left | KeyCode::Up => self.cloud_cursor = self.cloud_cursor.saturating_sub(1),
            KeyCode::Right | KeyCode::Down => self.cloud_cursor = (self.cloud_cursor + 1).min(last),
            KeyCode::Enter => {
                if let Some(tag) = self.available.get(self.cloud_cursor).cloned() {
                    if let Some(pos) = self.tags.iter().position(|t| *t == tag) {
                        self.tags.remove(pos);
                        self.cursor = self.cursor.min(self.tags.len());
                    } else {
                        self.commit(tag);
                    }
                }
            }
            KeyCode::Char('d') if ctrl => {
                if let Some(tag) = self.available.get(self.cloud_cursor).cloned() {
                    self.mode = Mode::LoadingUsage(tag.clone());
                    return Some(TagEvent::RequestUsage(tag));
                }
            }
            _ => {}
        }
        None
    }

    fn commit(&mut self, tag: String) {
        self.input.clear();
        self.suggestion = None;
        if tag.is_empty() {
            return;
        }
        if self.tags.contains(&tag) {
            self.message = Some(format!("'{tag}' is already set"));
            return;
        }
        self.tags.insert(self.cursor, tag.clone());
        self.cursor += 1;
        if !self.available.contains(&tag) {
            self.available.push(tag);
            self.available.sort();
        }
    }

    fn color(&self, tag: &str) -> &str {
        self.colors.get(tag).map(String::as_str).unwrap_or("#808080")
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(70, 70, area);
        f.render_widget(Clear, area);
        let dirty = if self.is_dirty() { " ●" } else { "" };
        let title = format!("Tags: {}{dirty}", self.title);
        let block = pane(&title, true);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        // Current tags with the insertion cursor, then the partial tag.
        let mut spans: Vec<Span> = Vec::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if i == self.cursor {
                spans.push(Span::styled("│", Style::default().fg(Color::Yellow)));
            }
            spans.push(tag_chip(tag, self.color(tag)));
            spans.push(Span::raw(" "));
        }
        if self.cursor == self.tags.len() {
            spans.push(Span::styled("│", Style::default().fg(Color::Yellow)));
        }
        spans.push(Span::styled(
            self.input.value().to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        let mut lines = vec![Line::from(spans)];
        for (i, s) in self.suggestions().iter().enumerate() {
            let style = if self.suggestion == Some(i) {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            lines.push(Line::from(Span::styled(format!("  {s}"), style)));
        }
        f.render_widget(
            Paragraph::new(lines).block(pane("Current", self.pane == Pane::Input)),
            chunks[0],
        );

        let cloud: Vec<Span> = self
            .available
            .iter()
            .enumerate()
            .flat_map(|(i, tag)| {
                let mut chip = tag_chip(tag, self.color(tag));
                if self.pane == Pane::Cloud && i == self.cloud_cursor {
                    chip = chip.add_modifier(Modifier::REVERSED | Modifier::BOLD);
                }
                [chip, Span::raw(" ")]
            })
            .collect();
        f.render_widget(
            Paragraph::new(Line::from(cloud))
                .wrap(Wrap { trim: false })
                .block(pane("Available", self.pane == Pane::Cloud)),
            chunks[1],
        );

        if let Some(msg) = &self.message {
            f.render_widget(
                Paragraph::new(msg.as_str()).style(Style::default().fg(Color::Yellow)),
                chunks[2],
            );
        }
        f.render_widget(
            hint_bar("Enter add · ↑↓ suggestions · Tab switch pane · Ctrl+D delete (cloud) · Ctrl+S save · Esc close"),
            chunks[3],
        );

        match &self.mode {
            Mode::ExitConfirm(c) => c.draw(f, area),
            Mode::DeleteConfirm(c) => c.draw(f, area),
            Mode::LoadingUsage(_) | Mode::Editing => {}
        }
    }
}
