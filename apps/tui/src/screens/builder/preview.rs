//! Aligning the composed preview with the selected component.

use pluqqy_shared::ComponentRef;

use crate::widgets::wrap_text;

/// Lines of context kept above a located component.
const CONTEXT_PADDING: usize = 2;
/// Lines kept below an estimated target.
const BOTTOM_PADDING: usize = 10;

/// First non-empty line that is not a heading or front-matter delimiter.
pub fn first_content_line(content: &str) -> Option<&str> {
    content.lines().find(|l| {
        let t = l.trim();
        !t.is_empty() && t != "---" && !t.starts_with('#')
    })
}

/// Line of the preview where `selected[cursor]` starts.
///
/// `preview` holds display lines wrapped at `width`; `content_of` returns a
/// component's body by canonical path. Falls back to a proportional estimate
/// when the body cannot be found in the preview.
pub fn target_line(
    preview: &[String],
    width: usize,
    selected: &[ComponentRef],
    cursor: usize,
    content_of: impl Fn(&str) -> Option<String>,
) -> usize {
    let Some(current) = selected.get(cursor) else {
        return 0;
    };
    let path = current.canonical_path();
    let occurrence = selected[..cursor]
        .iter()
        .filter(|r| r.canonical_path() == path)
        .count();

    let found = content_of(path).and_then(|body| {
        let line = first_content_line(&body)?;
        let needle = wrap_text(line, width).into_iter().next()?;
        let needle = needle.trim();
        preview
            .iter()
            .enumerate()
            .filter(|(_, l)| l.trim() == needle)
            .nth(occurrence)
            .map(|(i, _)| i)
    });
    match found {
        Some(line) => line.saturating_sub(CONTEXT_PADDING),
        None => {
            let per = preview.len() / selected.len().max(1);
            (per * cursor).min(preview.len().saturating_sub(BOTTOM_PADDING))
        }
    }
}

/// Scroll offset that shows `target`: centred once it passes the midline.
pub fn scroll_for(target: usize, rows: usize, total: usize) -> usize {
    let half = rows / 2;
    let offset = if target > half { target - half } else { 0 };
    offset.min(total.saturating_sub(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pluqqy_shared::ComponentType;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn refs(paths: &[&str]) -> Vec<ComponentRef> {
        paths
            .iter()
            .map(|p| ComponentRef::new(ComponentType::Prompt, p))
            .collect()
    }

    #[test]
    fn first_line_skips_headings_and_blanks() {
        assert_eq!(
            first_content_line("\n# Title\n---\n  body here \nmore"),
            Some("  body here ")
        );
        assert_eq!(first_content_line("\n\n"), None);
    }

    #[test]
    fn locates_body_with_padding() {
        let mut text = String::from("## PROMPTS\n\n");
        for i in 0..20 {
            text.push_str(&format!("filler {i}\n"));
        }
        text.push_str("\nsecond body\n");
        let preview = lines(&text);
        let selected = refs(&["a.md", "b.md"]);
        let content = |p: &str| match p {
            "a.md" => Some("filler 0".to_string()),
            _ => Some("# heading\nsecond body".to_string()),
        };
        assert_eq!(target_line(&preview, 80, &selected, 0, content), 0);
        assert_eq!(target_line(&preview, 80, &selected, 1, content), 21);
    }

    #[test]
    fn falls_back_to_estimate() {
        let preview = lines(&"x\n".repeat(40));
        let selected = refs(&["a.md", "b.md", "c.md", "d.md"]);
        let none = |_: &str| None;
        assert_eq!(target_line(&preview, 80, &selected, 1, none), 10);
        assert_eq!(target_line(&preview, 80, &selected, 3, none), 30);
        let short = lines(&"x\n".repeat(12));
        assert_eq!(target_line(&short, 80, &selected, 3, none), 2);
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let preview = lines("a\nb\nc\nd\ne\nf");
        let selected = refs(&["x.md", "y.md"]);
        let content = |p: &str| (p == "y.md").then(|| "e".to_string());
        let first = target_line(&preview, 80, &selected, 1, content);
        for _ in 0..5 {
            assert_eq!(target_line(&preview, 80, &selected, 1, content), first);
        }
    }

    #[test]
    fn centring_only_past_midline() {
        assert_eq!(scroll_for(3, 10, 100), 0);
        assert_eq!(scroll_for(30, 10, 100), 25);
        assert_eq!(scroll_for(98, 10, 100), 90);
    }
}
