//! View state for the TUI: the script list, the add-script input line and
//! the output pane scroll position.

/// Lines moved by one PgUp/PgDn press.
pub const OUTPUT_PAGE: usize = 10;

/// Ordered list of script references with an optional selection.
#[derive(Debug, Clone, Default)]
pub struct ScriptList {
    scripts: Vec<String>,
    selected: Option<usize>,
}

impl ScriptList {
    /// Creates a list, selecting the first entry if there is one.
    #[must_use]
    pub fn new(scripts: Vec<String>) -> Self {
        let selected = (!scripts.is_empty()).then_some(0);
        Self { scripts, selected }
    }

    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Appends a reference and selects it.
    pub fn add(&mut self, reference: String) {
        self.scripts.push(reference);
        self.selected = Some(self.scripts.len() - 1);
    }

    /// Removes the selected reference, returning it.
    ///
    /// The selection moves to the entry that took its place, or to the new
    /// last entry.
    pub fn remove_selected(&mut self) -> Option<String> {
        let index = self.selected?;
        let removed = self.scripts.remove(index);
        self.selected = if self.scripts.is_empty() {
            None
        } else {
            Some(index.min(self.scripts.len() - 1))
        };
        Some(removed)
    }

    pub fn select_previous(&mut self) {
        if let Some(index) = self.selected {
            self.selected = Some(index.saturating_sub(1));
        } else if !self.scripts.is_empty() {
            self.selected = Some(self.scripts.len() - 1);
        }
    }

    pub fn select_next(&mut self) {
        if self.scripts.is_empty() {
            return;
        }
        let last = self.scripts.len() - 1;
        self.selected = Some(self.selected.map_or(0, |index| (index + 1).min(last)));
    }
}

/// Short label for a script reference: its last `/` segment.
#[must_use]
pub fn display_name(reference: &str) -> &str {
    match reference.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => reference,
    }
}

/// Single-line text input used when adding a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptInput {
    text: String,
    /// Cursor position as a byte offset.
    cursor: usize,
}

impl ScriptInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor position in characters.
    #[must_use]
    pub fn cursor_display_pos(&self) -> usize {
        self.text[..self.cursor].chars().count()
    }

    pub fn insert(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some((index, _)) = self.text[..self.cursor].char_indices().last() {
            self.text.remove(index);
            self.cursor = index;
        }
    }

    pub fn move_left(&mut self) {
        if let Some((index, _)) = self.text[..self.cursor].char_indices().last() {
            self.cursor = index;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    /// The trimmed text, or `None` if it is blank.
    #[must_use]
    pub fn submission(&self) -> Option<String> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Scroll position of the output pane, counted in lines up from the tail.
///
/// Zero means the pane follows new output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputScroll {
    back: usize,
}

impl OutputScroll {
    #[must_use]
    pub fn is_following(self) -> bool {
        self.back == 0
    }

    pub fn page_up(&mut self, total_lines: usize) {
        self.back = (self.back + OUTPUT_PAGE).min(total_lines.saturating_sub(1));
    }

    pub fn page_down(&mut self) {
        self.back = self.back.saturating_sub(OUTPUT_PAGE);
    }

    pub fn follow(&mut self) {
        self.back = 0;
    }

    /// First visible line for a pane `height` lines tall.
    #[must_use]
    pub fn top_line(self, total_lines: usize, height: usize) -> usize {
        total_lines.saturating_sub(height).saturating_sub(self.back)
    }
}
