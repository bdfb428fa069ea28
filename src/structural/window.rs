//! Function location and the bounded scan window that stands in for its body.
//!
//! The window is a fixed count of lines after the declaration, not a parsed
//! function boundary. It may include lines of the next function when the target
//! is short; markers are chosen so that does not matter for this audit.
use serde::Serialize;

/// Source file split into lines, with line terminators (`\n` or `\r\n`) removed.
#[derive(Debug, Clone, Default)]
pub struct SourceLines {
    lines: Vec<String>,
}

impl SourceLines {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// 1-based line number of the first line containing `locator`.
    pub fn locate(&self, locator: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.contains(locator))
            .map(|idx| idx + 1)
    }

    /// Window of up to `size` lines starting right after `start_line` (1-based).
    ///
    /// Truncated at end of file; empty when the declaration is the last line.
    pub fn window_after(&self, start_line: usize, size: usize) -> ScanWindow<'_> {
        let begin = start_line.min(self.lines.len());
        let end = begin.saturating_add(size).min(self.lines.len());
        ScanWindow {
            first_line: begin + 1,
            lines: &self.lines[begin..end],
        }
    }
}

/// A borrowed run of consecutive source lines.
#[derive(Debug, Clone, Copy)]
pub struct ScanWindow<'a> {
    first_line: usize,
    lines: &'a [String],
}

/// Inclusive 1-based line range covered by a window, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSpan {
    pub first_line: usize,
    pub last_line: usize,
    pub line_count: usize,
}

impl<'a> ScanWindow<'a> {
    pub fn lines(&self) -> &'a [String] {
        self.lines
    }

    pub fn span(&self) -> WindowSpan {
        WindowSpan {
            first_line: self.first_line,
            last_line: (self.first_line + self.lines.len()).saturating_sub(1),
            line_count: self.lines.len(),
        }
    }

    /// Window lines joined with `\n`; this is what presence checks match against.
    pub fn text(&self) -> String {
        self.lines().join("\n")
    }

    /// Absolute line numbers of window lines containing `needle`.
    pub fn lines_containing(&self, needle: &str) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(needle))
            .map(|(idx, _)| self.first_line + idx)
            .collect()
    }
}
