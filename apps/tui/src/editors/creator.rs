//! Three-step component creation wizard: type, name, content.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, List, ListItem, ListState, Paragraph};

use pluqqy_shared::{ComponentType, sanitize_file_name};
use pluqqy_storage::Store;

use super::component_editor::{ComponentEditor, EditorEvent};
use super::input::TextInput;
use crate::widgets::{centered_box, hint_bar, pane};

const TYPES: [ComponentType; 3] = [
    ComponentType::Prompt,
    ComponentType::Context,
    ComponentType::Rules,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Type,
    Name,
    Content,
}

/// What a key did to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorOutcome {
    Pending,
    Cancel,
    Create {
        component_type: ComponentType,
        name: String,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub struct ComponentCreator {
    step: Step,
    type_cursor: usize,
    name: TextInput,
    editor: Option<ComponentEditor>,
    pub warning: Option<String>,
}

impl Default for ComponentCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentCreator {
    pub fn new() -> Self {
        Self {
            step: Step::Type,
            type_cursor: 0,
            name: TextInput::default(),
            editor: None,
            warning: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn component_type(&self) -> ComponentType {
        TYPES[self.type_cursor]
    }

    pub fn editor_mut(&mut self) -> Option<&mut ComponentEditor> {
        self.editor.as_mut()
    }

    pub fn handle_paste(&mut self, text: &str) {
        match self.step {
            Step::Name => self.name.insert_str(text),
            Step::Content => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.handle_paste(text);
                }
            }
            Step::Type => {}
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent, width: u16, store: &Store) -> CreatorOutcome {
        match self.step {
            Step::Type => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.type_cursor = self.type_cursor.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.type_cursor = (self.type_cursor + 1).min(TYPES.len() - 1);
                }
                KeyCode::Enter => self.step = Step::Name,
                KeyCode::Esc => return CreatorOutcome::Cancel,
                _ => {}
            },
            Step::Name => match key.code {
                KeyCode::Enter => self.submit_name(store),
                KeyCode::Esc => {
                    self.warning = None;
                    self.step = Step::Type;
                }
                _ => {
                    if self.name.handle_key(key) {
                        self.warning = None;
                    }
                }
            },
            Step::Content => {
                let Some(editor) = self.editor.as_mut() else {
                    self.step = Step::Name;
                    return CreatorOutcome::Pending;
                };
                let was_confirming = editor.is_confirming_exit();
                match editor.handle_key(key, width).1 {
                    Some(EditorEvent::Save(content)) => {
                        return CreatorOutcome::Create {
                            component_type: self.component_type(),
                            name: self.name.value().trim().to_string(),
                            content,
                        };
                    }
                    // Confirmed discard closes the wizard; a clean Esc steps back.
                    Some(EditorEvent::Close) if was_confirming => return CreatorOutcome::Cancel,
                    Some(EditorEvent::Close) => {
                        self.editor = None;
                        self.step = Step::Name;
                    }
                    None => {}
                }
            }
        }
        CreatorOutcome::Pending
    }

    fn submit_name(&mut self, store: &Store) {
        let name = self.name.value().trim().to_string();
        if name.is_empty() {
            self.warning = Some("Name must not be empty".to_string());
            return;
        }
        let t = self.component_type();
        match store.component_exists(t, &name) {
            Ok(true) => {
                self.warning = Some(format!(
                    "A {} named '{}' already exists",
                    t.label(),
                    sanitize_file_name(&name)
                ));
            }
            Ok(false) | Err(_) => {
                self.warning = None;
                self.editor = Some(ComponentEditor::start(
                    String::new(),
                    name,
                    t,
                    "",
                    Vec::new(),
                    store.project_root(),
                ));
                self.step = Step::Content;
            }
        }
    }

    /// Creation failed on disk: stay on the content step and say why.
    pub fn fail(&mut self, message: String) {
        self.warning = Some(message);
    }

    pub fn set_height(&mut self, height: u16) {
        if let Some(editor) = self.editor.as_mut() {
            editor.set_height(height);
        }
    }

    pub fn draw(&self, f: &mut Frame, area: Rect) {
        if let (Step::Content, Some(editor)) = (self.step, &self.editor) {
            editor.draw(f, area);
            if let Some(w) = &self.warning {
                let line = Rect::new(area.x + 1, area.bottom().saturating_sub(2), area.width.saturating_sub(2), 1);
                f.render_widget(
                    Paragraph::new(format!("✗ {w}")).style(Style::default().fg(Color::LightRed)),
                    line,
                );
            }
            return;
        }

        let area = centered_box(50, 11, area);
        f.render_widget(Clear, area);
        let block = pane("New component", true);
        let inner = block.inner(area);
        f.render_widget(block, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        match self.step {
            Step::Type => {
                f.render_widget(Paragraph::new("Step 1 of 3: choose a type"), chunks[0]);
                let items: Vec<ListItem> = TYPES
                    .iter()
                    .map(|t| ListItem::new(format!("  {}", t.group_title())))
                    .collect();
                let mut state = ListState::default();
                state.select(Some(self.type_cursor));
                f.render_stateful_widget(
                    List::new(items)
                        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan)),
                    chunks[1],
                    &mut state,
                );
                f.render_widget(hint_bar("↑↓ choose · Enter next · Esc cancel"), chunks[3]);
            }
            Step::Name | Step::Content => {
                f.render_widget(
                    Paragraph::new(format!(
                        "Step 2 of 3: name the new {}",
                        self.component_type().label()
                    )),
                    chunks[0],
                );
                f.render_widget(
                    Paragraph::new(self.name.value()).block(pane("Name", true)),
                    chunks[1],
                );
                let x = chunks[1].x + 1 + self.name.cursor_column();
                f.set_cursor_position(Position::new(x, chunks[1].y + 1));
                f.render_widget(hint_bar("Enter next · Esc back"), chunks[3]);
            }
        }
        if let Some(w) = &self.warning {
            f.render_widget(
                Paragraph::new(format!("⚠ {w}")).style(Style::default().fg(Color::Yellow)),
                chunks[2],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn store() -> (tempfile::TempDir, Store) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path());
        store.init().unwrap();
        (tmp, store)
    }

    fn type_name(c: &mut ComponentCreator, store: &Store, name: &str) {
        for ch in name.chars() {
            c.handle_key(&key(KeyCode::Char(ch)), 80, store);
        }
    }

    #[test]
    fn walks_all_steps_and_creates() {
        let (_tmp, store) = store();
        let mut c = ComponentCreator::new();
        c.handle_key(&key(KeyCode::Down), 80, &store);
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        assert_eq!(c.step(), Step::Name);
        assert_eq!(c.component_type(), ComponentType::Context);

        c.handle_key(&key(KeyCode::Enter), 80, &store);
        assert_eq!(c.step(), Step::Name);
        assert!(c.warning.is_some());

        type_name(&mut c, &store, "Repo Facts");
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        assert_eq!(c.step(), Step::Content);

        type_name(&mut c, &store, "It is big.");
        let out = c.handle_key(
            &KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL),
            80,
            &store,
        );
        assert_eq!(
            out,
            CreatorOutcome::Create {
                component_type: ComponentType::Context,
                name: "Repo Facts".into(),
                content: "It is big.".into(),
            }
        );
    }

    #[test]
    fn collision_blocks_name_step() {
        let (_tmp, store) = store();
        store
            .create_component(ComponentType::Prompt, "Ask", "x", &[])
            .unwrap();
        let mut c = ComponentCreator::new();
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        type_name(&mut c, &store, "ASK");
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        assert_eq!(c.step(), Step::Name);
        assert!(c.warning.as_deref().unwrap().contains("already exists"));
    }

    #[test]
    fn cancel_steps_back_or_confirms_discard() {
        let (_tmp, store) = store();
        let mut c = ComponentCreator::new();
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        type_name(&mut c, &store, "N");
        c.handle_key(&key(KeyCode::Enter), 80, &store);

        // Empty content: Esc goes back to the name step.
        assert_eq!(c.handle_key(&key(KeyCode::Esc), 80, &store), CreatorOutcome::Pending);
        assert_eq!(c.step(), Step::Name);
        c.handle_key(&key(KeyCode::Enter), 80, &store);

        // Non-empty content: Esc asks, y discards the whole wizard.
        type_name(&mut c, &store, "draft");
        assert_eq!(c.handle_key(&key(KeyCode::Esc), 80, &store), CreatorOutcome::Pending);
        assert_eq!(c.step(), Step::Content);
        assert_eq!(
            c.handle_key(&key(KeyCode::Char('y')), 80, &store),
            CreatorOutcome::Cancel
        );
    }

    #[test]
    fn esc_from_first_steps() {
        let (_tmp, store) = store();
        let mut c = ComponentCreator::new();
        c.handle_key(&key(KeyCode::Enter), 80, &store);
        c.handle_key(&key(KeyCode::Esc), 80, &store);
        assert_eq!(c.step(), Step::Type);
        assert_eq!(c.handle_key(&key(KeyCode::Esc), 80, &store), CreatorOutcome::Cancel);
    }
}
