//! File picker overlay for inserting `@path` references into a component.

use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, List, ListItem, ListState, Paragraph};
use walkdir::WalkDir;

use crate::widgets::{centered_rect, pane};

const MAX_DEPTH: usize = 6;
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// What a key did to the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Pending,
    Cancel,
    /// Project-relative path of the chosen file.
    Pick(String),
}

#[derive(Debug, Clone)]
pub struct FilePicker {
    files: Vec<String>,
    filter: String,
    cursor: usize,
}

impl FilePicker {
    /// Walk the project tree, skipping hidden and build directories.
    pub fn new(root: &Path) -> Self {
        let mut files: Vec<String> = WalkDir::new(root)
            .max_depth(MAX_DEPTH)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                e.depth() == 0 || !(name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()))
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        files.sort();
        Self::with_files(files)
    }

    pub fn with_files(files: Vec<String>) -> Self {
        Self {
            files,
            filter: String::new(),
            cursor: 0,
        }
    }

    pub fn matches(&self) -> Vec<&str> {
        let needle = self.filter.to_lowercase();
        self.files
            .iter()
            .filter(|f| f.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> PickerOutcome {
        match key.code {
            KeyCode::Esc => return PickerOutcome::Cancel,
            KeyCode::Enter => {
                return match self.matches().get(self.cursor) {
                    Some(f) => PickerOutcome::Pick(f.to_string()),
                    None => PickerOutcome::Pending,
                };
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                let len = self.matches().len();
                if self.cursor + 1 < len {
                    self.cursor += 1;
                }
            }
            KeyCode::Backspace => {
                self.filter.pop();
                self.cursor = 0;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.filter.push(c);
                self.cursor = 0;
            }
            _ => {}
        }
        PickerOutcome::Pending
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = centered_rect(70, 70, area);
        f.render_widget(Clear, area);
        let block = pane("Insert file reference", true);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);
        f.render_widget(
            Paragraph::new(format!("Filter: {}▏", self.filter))
                .style(Style::default().fg(Color::Yellow)),
            chunks[0],
        );

        let matches = self.matches();
        let items: Vec<ListItem> = matches.iter().map(|m| ListItem::new(*m)).collect();
        let list = List::new(items)
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
        let mut state = ListState::default();
        if !matches.is_empty() {
            state.select(Some(self.cursor));
        }
        f.render_stateful_widget(list, chunks[1], &mut state);
    }
}
