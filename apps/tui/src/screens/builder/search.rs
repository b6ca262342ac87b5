//! Builder search bar state.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use pluqqy_core::{Query, cycle_type, toggle_archived};
use pluqqy_shared::ComponentItem;

/// What a key did to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Not a search key; let navigation handle it.
    Ignored,
    Unchanged,
    Changed,
    /// Leave search focus.
    Exit,
}

#[derive(Debug, Clone, Default)]
pub struct SearchBar {
    pub query: String,
}

impl SearchBar {
    pub fn parsed(&self) -> Query {
        Query::parse(&self.query)
    }

    pub fn filter(&self, items: &[ComponentItem]) -> Vec<ComponentItem> {
        self.parsed().filter(items)
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> SearchOutcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => {
                self.query = toggle_archived(&self.query);
                SearchOutcome::Changed
            }
            KeyCode::Char('t') if ctrl => {
                self.query = cycle_type(&self.query);
                SearchOutcome::Changed
            }
            KeyCode::Tab | KeyCode::BackTab => SearchOutcome::Ignored,
            KeyCode::Esc => {
                if self.query.trim().is_empty() {
                    self.query.clear();
                }
                SearchOutcome::Exit
            }
            KeyCode::Enter => SearchOutcome::Exit,
            KeyCode::Backspace => {
                if self.query.pop().is_some() {
                    SearchOutcome::Changed
                } else {
                    SearchOutcome::Unchanged
                }
            }
            KeyCode::Char(c) if !ctrl => {
                self.query.push(c);
                SearchOutcome::Changed
            }
            _ => SearchOutcome::Unchanged,
        }
    }

    pub fn paste(&mut self, text: &str) -> SearchOutcome {
        let cleaned: String = text.chars().filter(|c| !c.is_control()).collect();
        if cleaned.is_empty() {
            return SearchOutcome::Unchanged;
        }
        self.query.push_str(&cleaned);
        SearchOutcome::Changed
    }
}
