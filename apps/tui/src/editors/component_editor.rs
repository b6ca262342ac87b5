//! Full-screen component editor with a file-reference picker.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph};

use pluqqy_shared::ComponentType;

use super::buffer::TextBuffer;
use super::file_picker::{FilePicker, PickerOutcome};
use crate::widgets::{Confirm, hint_bar, pane};

const TAB: &str = "    ";

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    /// `literal_at` is set when the picker was opened by typing `@`.
    FilePicking {
        picker: FilePicker,
        literal_at: bool,
    },
    ExitConfirm(Confirm<()>),
}

/// What the editor asks its owner to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// Persist this text. The editor stays open.
    Save(String),
    /// Close without saving.
    Close,
}

#[derive(Debug, Clone)]
pub struct ComponentEditor {
    pub path: String,
    pub name: String,
    pub component_type: ComponentType,
    pub tags: Vec<String>,
    buffer: TextBuffer,
    original: String,
    mode: Mode,
    project_root: PathBuf,
    scroll: usize,
    height: usize,
}

impl ComponentEditor {
    pub fn start(
        path: impl Into<String>,
        name: impl Into<String>,
        component_type: ComponentType,
        content: &str,
        tags: Vec<String>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            component_type,
            tags,
            buffer: TextBuffer::new(content),
            original: content.to_string(),
            mode: Mode::Normal,
            project_root: project_root.into(),
            scroll: 0,
            height: 10,
        }
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn is_dirty(&self) -> bool {
        self.buffer.text() != self.original
    }

    pub fn is_confirming_exit(&self) -> bool {
        matches!(self.mode, Mode::ExitConfirm(_))
    }

    pub fn is_picking(&self) -> bool {
        matches!(self.mode, Mode::FilePicking { .. })
    }

    /// Record `content` as persisted. Only the snapshot changes, never the buffer.
    pub fn mark_saved(&mut self, content: &str) {
        self.original = content.to_string();
    }

    /// Text rows available inside the editor frame.
    pub fn set_height(&mut self, total_height: u16) {
        self.height = usize::from(total_height.saturating_sub(3)).max(1);
    }

    pub fn handle_paste(&mut self, text: &str) {
        if let Mode::Normal = self.mode {
            self.buffer.insert_str(text);
        }
    }

    /// Route one key. Returns whether it was consumed and an optional follow-up.
    pub fn handle_key(&mut self, key: &KeyEvent, width: u16) -> (bool, Option<EditorEvent>) {
        let event = match &mut self.mode {
            Mode::ExitConfirm(confirm) => match confirm.handle_key(key) {
                Some(true) => Some(EditorEvent::Close),
                Some(false) => {
                    self.mode = Mode::Normal;
                    None
                }
                None => None,
            },
            Mode::FilePicking { picker, literal_at } => {
                let literal_at = *literal_at;
                match picker.handle_key(key) {
                    PickerOutcome::Pending => {}
                    PickerOutcome::Cancel => {
                        if literal_at {
                            self.buffer.insert_char('@');
                        }
                        self.mode = Mode::Normal;
                    }
                    PickerOutcome::Pick(file) => {
                        self.buffer.insert_str(&format!("@{file}"));
                        self.mode = Mode::Normal;
                    }
                }
                None
            }
            Mode::Normal => self.handle_normal(key),
        };
        self.follow_cursor(width);
        (true, event)
    }

    fn handle_normal(&mut self, key: &KeyEvent) -> Option<EditorEvent> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => return Some(EditorEvent::Save(self.buffer.text())),
            KeyCode::Char('o') if ctrl => self.open_picker(false),
            KeyCode::Char('@') => self.open_picker(true),
            KeyCode::Esc => {
                if !self.is_dirty() {
                    return Some(EditorEvent::Close);
                }
                self.mode = Mode::ExitConfirm(Confirm::new(
                    (),
                    "Unsaved changes",
                    vec![format!("Discard changes to {}?", self.display_name())],
                ));
            }
            KeyCode::Char(c) if !ctrl => self.buffer.insert_char(c),
            KeyCode::Tab => self.buffer.insert_str(TAB),
            KeyCode::Enter => self.buffer.newline(),
            KeyCode::Backspace => self.buffer.backspace(),
            KeyCode::Delete => self.buffer.delete(),
            KeyCode::Left => self.buffer.left(),
            KeyCode::Right => self.buffer.right(),
            KeyCode::Up => self.buffer.up(1),
            KeyCode::Down => self.buffer.down(1),
            KeyCode::Home => self.buffer.home(),
            KeyCode::End => self.buffer.end(),
            KeyCode::PageUp => self.buffer.up(self.height),
            KeyCode::PageDown => self.buffer.down(self.height),
            _ => {}
        }
        None
    }

    fn open_picker(&mut self, literal_at: bool) {
        self.mode = Mode::FilePicking {
            picker: FilePicker::new(&self.project_root),
            literal_at,
        };
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "this component"
        } else {
            &self.name
        }
    }

    fn follow_cursor(&mut self, width: u16) {
        let (_, (line, _)) = self.buffer.display(text_width(width));
        if line < self.scroll {
            self.scroll = line;
        } else if line >= self.scroll + self.height {
            self.scroll = line + 1 - self.height;
        }
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        f.render_widget(Clear, area);
        let dirty = if self.is_dirty() { " ●" } else { "" };
        let title = format!(
            "Editing {}: {}{dirty}",
            self.component_type.label(),
            self.display_name()
        );
        let block = pane(&title, true);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let (lines, (cur_line, cur_col)) = self.buffer.display(usize::from(chunks[0].width));
        let visible: Vec<Line> = lines
            .iter()
            .skip(self.scroll)
            .take(usize::from(chunks[0].height))
            .map(|l| Line::from(l.as_str()))
            .collect();
        f.render_widget(Paragraph::new(visible), chunks[0]);
        f.render_widget(
            hint_bar("Ctrl+S save · Ctrl+O or @ insert file · Esc close"),
            chunks[1],
        );

        match &self.mode {
            Mode::Normal => {
                if cur_line >= self.scroll && cur_line < self.scroll + usize::from(chunks[0].height)
                {
                    f.set_cursor_position(Position::new(
                        chunks[0].x + cur_col as u16,
                        chunks[0].y + (cur_line - self.scroll) as u16,
                    ));
                }
            }
            Mode::FilePicking { picker, .. } => picker.draw(f, area),
            Mode::ExitConfirm(confirm) => confirm.draw(f, area),
        }
    }
}

/// Content width for a full-width editor frame.
fn text_width(width: u16) -> usize {
    usize::from(width.saturating_sub(2)).max(1)
}
