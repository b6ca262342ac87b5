//! Pipeline list: the screen the app opens on.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, Paragraph};

use pluqqy_shared::PipelineItem;

use crate::event::{Command, Msg, View};
use crate::widgets::{hint_bar, pane, status_bar};

pub struct ListScreen {
    entries: Vec<PipelineItem>,
    selected: usize,
    status: String,
}

impl Default for ListScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl ListScreen {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            selected: 0,
            status: "Loading pipelines…".to_string(),
        }
    }

    pub fn entries(&self) -> &[PipelineItem] {
        &self.entries
    }

    /// Command that fills the list.
    pub fn load() -> Command {
        Command::LoadPipelines
    }

    pub fn update(&mut self, msg: Msg) -> Option<Command> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::PipelinesLoaded(Ok(entries)) => {
                self.status = format!("{} pipeline(s)", entries.len());
                self.entries = entries;
                self.selected = self.selected.min(self.entries.len().saturating_sub(1));
                None
            }
            Msg::PipelinesLoaded(Err(e)) => {
                self.status = format!("✗ Failed to load pipelines: {e}");
                None
            }
            Msg::Status(text) => {
                self.status = text;
                None
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => Some(Command::Quit),
            KeyCode::Char('q') => Some(Command::Quit),
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.entries.len() {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Enter => self
                .entries
                .get(self.selected)
                .map(|p| Command::SwitchView(View::Builder(Some(p.path.clone())))),
            KeyCode::Char('n') => Some(Command::SwitchView(View::Builder(None))),
            KeyCode::Char('r') => {
                self.status = "Reloading…".to_string();
                Some(Self::load())
            }
            _ => None,
        }
    }

    pub fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(f.area());

        let block = pane("Pipelines", true);
        if self.entries.is_empty() {
            let empty = Paragraph::new("No pipelines yet.\n\nPress 'n' to build your first one.")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, chunks[0]);
        } else {
            let items: Vec<ListItem> = self
                .entries
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let style = if i == self.selected {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    let prefix = if i == self.selected { "▸ " } else { "  " };
                    let tags = if p.tags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", p.tags.join(", "))
                    };
                    ListItem::new(format!(
                        "{prefix}{}  ({} components){tags}",
                        p.name, p.component_count
                    ))
                    .style(style)
                })
                .collect();
            f.render_widget(List::new(items).block(block), chunks[0]);
        }

        f.render_widget(
            hint_bar("↑↓ move • Enter open • n new • r reload • q quit"),
            chunks[1],
        );
        f.render_widget(status_bar(&self.status), chunks[2]);
    }
}
