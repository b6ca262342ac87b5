//! Single-field naming dialog shared by pipeline naming, clone, and rename.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph};

use super::input::TextInput;
use crate::event::Target;
use crate::widgets::{centered_box, hint_bar, pane};

/// What the dialog is naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameAction {
    /// A new, never-saved pipeline.
    NewPipeline,
    Clone(Target),
    Rename(Target),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Pending,
    Cancel,
    /// Trimmed, non-empty name.
    Submit(String),
}

#[derive(Debug, Clone)]
pub struct NameDialog {
    pub action: NameAction,
    pub title: String,
    pub input: TextInput,
    pub warning: Option<String>,
}

impl NameDialog {
    pub fn new(action: NameAction, title: impl Into<String>, initial: &str) -> Self {
        Self {
            action,
            title: title.into(),
            input: TextInput::new(initial),
            warning: None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.input.insert_str(text);
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> DialogOutcome {
        match key.code {
            KeyCode::Esc => DialogOutcome::Cancel,
            KeyCode::Enter => {
                let name = self.input.value().trim();
                if name.is_empty() {
                    self.warning = Some("Name must not be empty".to_string());
                    DialogOutcome::Pending
                } else {
                    DialogOutcome::Submit(name.to_string())
                }
            }
            _ => {
                if self.input.handle_key(key) {
                    self.warning = None;
                }
                DialogOutcome::Pending
            }
        }
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        let area = centered_box(50, 7, area);
        f.render_widget(Clear, area);
        let block = pane(&self.title, true);
        let inner = block.inner(area);
        f.render_widget(block, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        f.render_widget(
            Paragraph::new(format!("> {}", self.input.value()))
                .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
            chunks[0],
        );
        f.set_cursor_position(Position::new(
            chunks[0].x + 2 + self.input.cursor_column(),
            chunks[0].y,
        ));
        if let Some(w) = &self.warning {
            f.render_widget(
                Paragraph::new(format!("⚠ {w}")).style(Style::default().fg(Color::Yellow)),
                chunks[2],
            );
        }
        f.render_widget(hint_bar("Enter confirm · Esc cancel"), chunks[3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn prefilled_and_trimmed() {
        let mut d = NameDialog::new(
            NameAction::Clone(Target::Pipeline("pipelines/a.yaml".into())),
            "Clone",
            "A (copy)",
        );
        d.handle_key(&key(KeyCode::Char(' ')));
        assert_eq!(
            d.handle_key(&key(KeyCode::Enter)),
            DialogOutcome::Submit("A (copy)".into())
        );
    }

    #[test]
    fn empty_name_warns_and_stays() {
        let mut d = NameDialog::new(NameAction::NewPipeline, "Name", "");
        assert_eq!(d.handle_key(&key(KeyCode::Enter)), DialogOutcome::Pending);
        assert!(d.warning.is_some());
        d.handle_key(&key(KeyCode::Char('x')));
        assert!(d.warning.is_none());
        assert_eq!(d.handle_key(&key(KeyCode::Esc)), DialogOutcome::Cancel);
    }
}
