//! Reusable TUI widgets.

pub mod wrap;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};

pub use wrap::{wrap_line, wrap_text};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    let fg = if msg.starts_with('✗') {
        Color::LightRed
    } else if msg.starts_with('✓') {
        Color::LightGreen
    } else {
        Color::White
    };
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(fg))
}

/// Dimmed key hints.
pub(crate) fn hint_bar(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true })
}

/// Create a centered rectangle with percentage width and height.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// A centered box of fixed height, `percent_x` wide.
pub(crate) fn centered_box(percent_x: u16, height: u16, r: Rect) -> Rect {
    let height = height.min(r.height);
    let y = r.y + (r.height - height) / 2;
    let horizontal = centered_rect(percent_x, 100, r);
    Rect::new(horizontal.x, y, horizontal.width, height)
}

/// Rounded, titled block used by every pane and overlay.
pub(crate) fn pane(title: &str, focused: bool) -> Block<'_> {
    let color = if focused { Color::Cyan } else { Color::Gray };
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
}

/// `#rrggbb` to a terminal colour; anything else is gray.
pub(crate) fn hex_color(hex: &str) -> Color {
    let h = hex.trim_start_matches('#');
    if h.len() != 6 {
        return Color::Gray;
    }
    let channel = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

/// A tag rendered as a coloured chip.
pub(crate) fn tag_chip(name: &str, hex: &str) -> Span<'static> {
    Span::styled(
        format!(" {name} "),
        Style::default().fg(Color::Black).bg(hex_color(hex)),
    )
}

// ---------------------------------------------------------------------------
// Confirmation dialog
// ---------------------------------------------------------------------------

/// A yes/no dialog carrying what it is confirming.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Confirm<K> {
    pub kind: K,
    pub title: String,
    pub lines: Vec<String>,
}

impl<K> Confirm<K> {
    pub(crate) fn new(kind: K, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            lines,
        }
    }

    /// `Some(true)` on y/Enter, `Some(false)` on n/Esc; other keys are swallowed.
    pub(crate) fn handle_key(&self, key: &KeyEvent) -> Option<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
            _ => None,
        }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let height = self.lines.len() as u16 + 5;
        let area = centered_box(50, height, area);
        let mut text: Vec<Line> = self.lines.iter().map(|l| Line::from(l.as_str())).collect();
        text.push(Line::from(""));
        text.push(Line::from(vec![
            Span::styled("[y]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" confirm   "),
            Span::styled("[n]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));
        let dialog = Paragraph::new(text)
            .block(pane(&self.title, true).border_style(Style::default().fg(Color::Yellow)))
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center);
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

/// Full-screen help overlay listing `(keys, action)` pairs.
pub(crate) fn help_overlay(f: &mut Frame, entries: &[(&str, &str)]) {
    let area = centered_rect(60, 80, f.area());
    let mut text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
    ];
    for (keys, action) in entries {
        text.push(Line::from(vec![
            Span::styled(format!("  {keys:<16}"), Style::default().fg(Color::Cyan)),
            Span::raw(*action),
        ]));
    }
    let help = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help (press any key to close) ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn hex_colors_parse() {
        assert_eq!(hex_color("#ff0080"), Color::Rgb(255, 0, 128));
        assert_eq!(hex_color("nope"), Color::Gray);
        assert_eq!(hex_color("#zz0000"), Color::Gray);
    }

    #[test]
    fn confirm_keys() {
        let c = Confirm::new((), "Sure?", vec![]);
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(c.handle_key(&key(KeyCode::Char('y'))), Some(true));
        assert_eq!(c.handle_key(&key(KeyCode::Enter)), Some(true));
        assert_eq!(c.handle_key(&key(KeyCode::Esc)), Some(false));
        assert_eq!(c.handle_key(&key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn centered_box_fits() {
        let r = Rect::new(0, 0, 100, 40);
        let b = centered_box(50, 10, r);
        assert_eq!(b.height, 10);
        assert_eq!(b.y, 15);
        assert_eq!(b.width, 50);
        assert_eq!(centered_box(50, 99, r).height, 40);
    }
}
