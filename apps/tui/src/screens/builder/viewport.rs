//! Builder layout arithmetic and scroll offsets.

/// Header rows inside the left table border: heading, spacer, table header, spacer.
pub const LEFT_HEADER_LINES: usize = 4;
/// Header rows inside the right column border: heading, name, tags, tokens, spacer.
pub const RIGHT_HEADER_LINES: usize = 5;
pub const MIN_COLUMN_HEIGHT: u16 = 10;
pub const MIN_PREVIEW_HEIGHT: u16 = 5;

/// Computed heights of each horizontal band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bands {
    pub search: u16,
    pub columns: u16,
    pub preview: u16,
    pub help: u16,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
    pub left_offset: usize,
    pub right_offset: usize,
    pub preview_offset: usize,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            left_offset: 0,
            right_offset: 0,
            preview_offset: 0,
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    /// Help rows needed at this width.
    pub fn help_lines(&self) -> u16 {
        match self.width {
            w if w >= 140 => 1,
            w if w >= 80 => 2,
            _ => 3,
        }
    }

    pub fn bands(&self, show_preview: bool) -> Bands {
        let help = self.help_lines();
        let available = self.height.saturating_sub(1 + help + 1);
        let (columns, preview) = if show_preview {
            let columns = (available / 2).max(MIN_COLUMN_HEIGHT);
            (columns, available.saturating_sub(columns).max(MIN_PREVIEW_HEIGHT))
        } else {
            (available.max(MIN_COLUMN_HEIGHT), 0)
        };
        Bands {
            search: 1,
            columns,
            preview,
            help,
            status: 1,
        }
    }

    /// Width of one column including its border.
    pub fn column_width(&self) -> u16 {
        self.width / 2
    }

    /// Rows of left-table content visible under its header.
    pub fn left_rows(&self, show_preview: bool) -> usize {
        usize::from(self.bands(show_preview).columns)
            .saturating_sub(2 + LEFT_HEADER_LINES)
            .max(1)
    }

    pub fn right_rows(&self, show_preview: bool) -> usize {
        usize::from(self.bands(show_preview).columns)
            .saturating_sub(2 + RIGHT_HEADER_LINES)
            .max(1)
    }

    pub fn preview_rows(&self, show_preview: bool) -> usize {
        usize::from(self.bands(show_preview).preview)
            .saturating_sub(2)
            .max(1)
    }

    /// Text width inside the preview border.
    pub fn preview_width(&self) -> usize {
        usize::from(self.width.saturating_sub(2)).max(1)
    }

    pub fn follow_left(&mut self, line: usize, show_preview: bool) {
        let rows = self.left_rows(show_preview);
        follow(&mut self.left_offset, line, rows);
    }

    pub fn follow_right(&mut self, line: usize, show_preview: bool) {
        let rows = self.right_rows(show_preview);
        follow(&mut self.right_offset, line, rows);
    }

    /// Scroll the preview by `delta` lines within `[0, total - rows]`.
    pub fn scroll_preview(&mut self, delta: isize, total: usize, show_preview: bool) {
        let max = total.saturating_sub(self.preview_rows(show_preview));
        self.preview_offset = self.preview_offset.saturating_add_signed(delta).min(max);
    }

    pub fn clamp_preview(&mut self, total: usize, show_preview: bool) {
        self.scroll_preview(0, total, show_preview);
    }
}

/// Keep `line` inside `[offset, offset + height)`.
pub fn follow(offset: &mut usize, line: usize, height: usize) {
    if line < *offset {
        *offset = line;
    } else if line >= *offset + height {
        *offset = line + 1 - height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_moves_window_minimally() {
        let mut off = 0;
        follow(&mut off, 3, 5);
        assert_eq!(off, 0);
        follow(&mut off, 7, 5);
        assert_eq!(off, 3);
        follow(&mut off, 2, 5);
        assert_eq!(off, 2);
    }

    #[test]
    fn preview_halves_columns() {
        let v = Viewport::new(100, 44);
        let with = v.bands(true);
        let without = v.bands(false);
        assert_eq!(with.help, 2);
        assert_eq!(without.columns, 40);
        assert_eq!(with.columns, 20);
        assert_eq!(with.preview, 20);
        assert_eq!(with.search + with.columns + with.preview + with.help + with.status, 44);
    }

    #[test]
    fn minimums_hold_on_tiny_terminals() {
        let v = Viewport::new(60, 12);
        let b = v.bands(true);
        assert_eq!(b.columns, MIN_COLUMN_HEIGHT);
        assert_eq!(b.preview, MIN_PREVIEW_HEIGHT);
        assert_eq!(v.left_rows(true), 4);
        assert_eq!(v.right_rows(true), 3);
    }

    #[test]
    fn preview_scroll_is_clamped() {
        let mut v = Viewport::new(100, 44);
        v.scroll_preview(100, 30, true);
        assert_eq!(v.preview_offset, 12);
        v.scroll_preview(-50, 30, true);
        assert_eq!(v.preview_offset, 0);
    }
}
