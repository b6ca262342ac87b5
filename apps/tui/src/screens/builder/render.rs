//! Drawing the builder. Pure reads of [`PipelineBuilder`] state.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use pluqqy_shared::{ComponentItem, format_tokens};

use super::viewport::Viewport;
use super::{Column, Modal, PipelineBuilder, RightRow};
use crate::widgets::wrap::{pad_right, truncate};
use crate::widgets::{help_overlay, hint_bar, pane, status_bar, tag_chip};

const HELP: &[(&str, &str)] = &[
    ("Tab / Shift+Tab", "Cycle columns"),
    ("↑ k / ↓ j", "Move or scroll"),
    ("PgUp / PgDn", "Page"),
    ("Home g / End G", "First / last"),
    ("Enter", "Add or remove component"),
    ("K / J", "Reorder selected component"),
    ("p", "Toggle preview"),
    ("Ctrl+S", "Save pipeline"),
    ("S", "Save and write output"),
    ("y", "Copy rendered pipeline"),
    ("n", "New component"),
    ("e / E", "Edit component (TUI / external)"),
    ("d / a", "Delete / archive"),
    ("C / R", "Clone / rename"),
    ("t", "Edit tags"),
    ("M", "Mermaid diagram"),
    ("/", "Search"),
    ("Esc", "Back to pipelines"),
    ("Ctrl+C", "Quit"),
];

pub(super) fn draw(b: &PipelineBuilder, f: &mut Frame) {
    let bands = b.viewport.bands(b.show_preview);
    let mut constraints = vec![
        Constraint::Length(bands.search),
        Constraint::Length(bands.columns),
    ];
    if b.show_preview {
        constraints.push(Constraint::Length(bands.preview));
    }
    constraints.push(Constraint::Min(bands.help));
    constraints.push(Constraint::Length(bands.status));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    draw_search(b, f, chunks[0]);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    draw_left(b, f, columns[0]);
    draw_right(b, f, columns[1]);

    let mut next = 2;
    if b.show_preview {
        draw_preview(b, f, chunks[next]);
        next += 1;
    }
    f.render_widget(hint_bar(hints(b)), chunks[next]);
    f.render_widget(status_bar(&status_text(b)), chunks[next + 1]);

    let area = f.area();
    match &b.modal {
        Some(Modal::Confirm(c)) => c.draw(f, area),
        Some(Modal::Name(d)) => d.draw(f, area),
        Some(Modal::Creator(c)) => c.draw(f, area),
        Some(Modal::Editor(e)) => e.draw(f, area),
        Some(Modal::Tags(t)) => t.draw(f, area),
        None => {}
    }
    if b.show_help {
        help_overlay(f, HELP);
    }
}

fn draw_search(b: &PipelineBuilder, f: &mut Frame, area: Rect) {
    let focused = b.active == Column::Search;
    let label_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![Span::styled(" Search: ", label_style)];
    if b.search.query.is_empty() && !focused {
        spans.push(Span::styled(
            "press / (tag:x type:prompts status:archived)",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        spans.push(Span::raw(b.search.query.as_str()));
        if focused {
            spans.push(Span::styled("█", Style::default().fg(Color::Cyan)));
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_left(b: &PipelineBuilder, f: &mut Frame, area: Rect) {
    let focused = b.active == Column::Left;
    let block = pane("Available Components", focused);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let available = b.data.available();
    let width = usize::from(inner.width);
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} components", available.len()),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            left_header(width),
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
    ];

    if available.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No components match.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let rows = b.viewport.left_rows(b.show_preview);
    for (i, item) in available
        .iter()
        .enumerate()
        .skip(b.viewport.left_offset)
        .take(rows)
    {
        let cursor = focused && i == b.left_cursor;
        lines.push(left_row(b, item, width, cursor));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

/// Widths of the name, type, tokens, and usage columns.
fn left_columns(width: usize) -> (usize, usize, usize, usize) {
    let fixed = 2 + 8 + 7 + 6;
    let name = width.saturating_sub(fixed).clamp(8, 40);
    (name, 8, 7, 6)
}

fn left_header(width: usize) -> String {
    let (name, ty, tokens, usage) = left_columns(width);
    format!(
        "  {:<name$}{:<ty$}{:>tokens$}{:>usage$}",
        "Name", "Type", "Tokens", "Used"
    )
}

fn left_row(b: &PipelineBuilder, item: &ComponentItem, width: usize, cursor: bool) -> Line<'static> {
    let (name_w, ty, tokens, usage) = left_columns(width);
    let mark = if b.data.is_selected(&item.path) { "✓ " } else { "  " };
    let mut name = truncate(&item.name, name_w.saturating_sub(1));
    if item.is_archived {
        name = truncate(&format!("{name} ⌫"), name_w.saturating_sub(1));
    }
    let mut style = Style::default();
    if item.is_archived {
        style = style.fg(Color::DarkGray);
    }
    if cursor {
        style = style.bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD);
    }
    let mut spans = vec![
        Span::styled(mark.to_string(), Style::default().fg(Color::Green)),
        Span::styled(
            format!(
                "{}{:<ty$}{:>tokens$}{:>usage$}",
                pad_right(&name, name_w),
                item.component_type.label(),
                format_tokens(item.token_count),
                item.usage_count,
            ),
            style,
        ),
    ];
    for tag in item.tags.iter().take(3) {
        spans.push(Span::raw(" "));
        spans.push(tag_chip(tag, &b.data.registry.color_for(tag)));
    }
    Line::from(spans)
}

fn draw_right(b: &PipelineBuilder, f: &mut Frame, area: Rect) {
    let focused = b.active == Column::Right;
    let dirty = if b.data.is_dirty() { " ●" } else { "" };
    let block = pane("Pipeline Components", focused);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let name = if b.data.pipeline.name.is_empty() {
        "(unnamed)".to_string()
    } else {
        b.data.pipeline.name.clone()
    };
    let tokens: usize = b
        .data
        .selected
        .iter()
        .filter_map(|r| b.data.find(r.canonical_path()))
        .map(|i| i.token_count)
        .sum();

    let mut tag_spans = vec![Span::styled("Tags: ", Style::default().fg(Color::DarkGray))];
    if b.data.pipeline.tags.is_empty() {
        tag_spans.push(Span::styled("none", Style::default().fg(Color::DarkGray)));
    }
    for tag in &b.data.pipeline.tags {
        tag_spans.push(tag_chip(tag, &b.data.registry.color_for(tag)));
        tag_spans.push(Span::raw(" "));
    }

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} selected", b.data.selected.len()),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(vec![
            Span::styled(name, Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(dirty, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(tag_spans),
        Line::from(Span::styled(
            format!("~{} tokens", format_tokens(tokens)),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];

    let rows = b.right_rows();
    if rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "  Press Enter on a component to add it.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let visible = b.viewport.right_rows(b.show_preview);
    let width = usize::from(inner.width).saturating_sub(6);
    for row in rows.iter().skip(b.viewport.right_offset).take(visible) {
        lines.push(match *row {
            RightRow::Blank => Line::from(""),
            RightRow::Header(t, count) => Line::from(Span::styled(
                format!("{} ({count})", t.group_title()),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            RightRow::Item(i) => {
                let r = &b.data.selected[i];
                let label = b
                    .data
                    .find(r.canonical_path())
                    .map(|item| item.name.clone())
                    .unwrap_or_else(|| format!("{} (missing)", super::name_from_path(&r.path)));
                let style = if focused && i == b.right_cursor {
                    Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(
                    format!("  {:>2}. {}", r.order, truncate(&label, width)),
                    style,
                ))
            }
        });
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_preview(b: &PipelineBuilder, f: &mut Frame, area: Rect) {
    let title = format!(
        "Preview{} (~{} tokens)",
        if b.active == Column::Left { ": component" } else { "" },
        format_tokens(b.preview_tokens)
    );
    let block = pane(&title, b.active == Column::Preview);
    let rows = b.viewport.preview_rows(b.show_preview);
    let lines: Vec<Line> = b
        .preview_lines
        .iter()
        .skip(b.viewport.preview_offset)
        .take(rows)
        .map(|l| {
            if l.starts_with("Error:") {
                Line::from(Span::styled(l.as_str(), Style::default().fg(Color::LightRed)))
            } else if l.starts_with('#') {
                Line::from(Span::styled(
                    l.as_str(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(l.as_str())
            }
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn hints(b: &PipelineBuilder) -> &'static str {
    match (b.active, wide(&b.viewport)) {
        (Column::Search, _) => {
            "Type to filter • Ctrl+A archived • Ctrl+T type • Tab columns • Enter/Esc done"
        }
        (Column::Preview, _) => "↑↓ scroll • PgUp/PgDn page • Tab columns • p hide • Esc back • ? help",
        (Column::Right, true) => {
            "Enter remove • K/J reorder • e edit • t tags • Ctrl+S save • S save+set • y copy • M diagram • d delete • a archive • C clone • R rename • / search • Esc back • ? help"
        }
        (Column::Right, false) => {
            "Enter remove • K/J reorder • e edit • t tags • Ctrl+S save • S set • y copy • / search • Esc back • ? help"
        }
        (Column::Left, true) => {
            "Enter add/remove • n new • e edit • E external • t tags • d delete • a archive • C clone • R rename • p preview • Ctrl+S save • / search • Esc back • ? help"
        }
        (Column::Left, false) => {
            "Enter add • n new • e edit • t tags • d delete • Ctrl+S save • / search • Esc back • ? help"
        }
    }
}

fn wide(v: &Viewport) -> bool {
    v.help_lines() < 3
}

fn status_text(b: &PipelineBuilder) -> String {
    match b.status() {
        Some(text) => text.to_string(),
        None if b.data.is_dirty() => "Unsaved changes".to_string(),
        None => String::new(),
    }
}
