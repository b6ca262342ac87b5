//! Word wrapping by terminal display width.

use std::ops::Range;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Split one logical line into display segments of at most `width` columns.
///
/// Breaks at the last space that fits, dropping that space; words wider
/// than `width` are split hard. Ranges are char indices into `line`. An
/// empty line yields one empty segment.
pub fn wrap_line(line: &str, width: usize) -> Vec<Range<usize>> {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    if width == 0 || line.width() <= width {
        return vec![0..len];
    }
    let mut out = Vec::new();
    let mut start = 0;
    let mut used = 0;
    let mut last_space = None;
    let mut i = start;
    while i < len {
        let c = chars[i];
        let w = c.width().unwrap_or(0);
        if used + w > width && i > start {
            if c == ' ' {
                out.push(start..i);
                start = i + 1;
                i = start;
            } else if let Some(sp) = last_space.filter(|&sp| sp > start) {
                out.push(start..sp);
                start = sp + 1;
                i = start;
            } else {
                out.push(start..i);
                start = i;
            }
            used = 0;
            last_space = None;
            continue;
        }
        if c == ' ' {
            last_space = Some(i);
        }
        used += w;
        i += 1;
    }
    out.push(start..len);
    out
}

/// Wrap a multi-line text into display lines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let chars: Vec<char> = line.chars().collect();
        for r in wrap_line(line, width) {
            lines.push(chars[r].iter().collect());
        }
    }
    lines
}

/// Map a char column in a logical line to `(segment, column)` in its wrap.
pub fn locate(segments: &[Range<usize>], col: usize) -> (usize, usize) {
    for (i, seg) in segments.iter().enumerate() {
        let owned_until = segments.get(i + 1).map(|n| n.start).unwrap_or(usize::MAX);
        if col < owned_until {
            return (i, col.saturating_sub(seg.start).min(seg.len()));
        }
    }
    let last = segments.len().saturating_sub(1);
    (last, segments.get(last).map(|s| s.len()).unwrap_or(0))
}

/// Display columns taken by the first `chars` characters of `s`.
pub fn width_of_prefix(s: &str, chars: usize) -> usize {
    s.chars().take(chars).filter_map(UnicodeWidthChar::width).sum()
}

/// Cut `s` to at most `max` columns, ending in `…` when shortened.
pub fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let budget = max.saturating_sub(1);
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    if max > 0 {
        out.push('…');
    }
    out
}

/// Left-align `s` in a field `width` columns wide.
pub fn pad_right(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(s.width());
    format!("{s}{}", " ".repeat(fill))
}
