//! Text formatting helpers for IR dumps.

use std::fmt::Display;

/// Line-oriented text buffer that tracks `{ }` nesting.
#[derive(Debug)]
pub struct CodeFormatter {
    lines: Vec<String>,
    depth: usize,
    unit: &'static str,
}

impl Default for CodeFormatter {
    fn default() -> Self {
        Self::with_unit("  ")
    }
}

impl CodeFormatter {
    pub fn with_unit(unit: &'static str) -> Self {
        Self { lines: Vec::new(), depth: 0, unit }
    }

    /// Append one line at the current nesting depth.
    pub fn line(&mut self, text: impl Display) {
        let text = text.to_string();
        if text.is_empty() {
            self.lines.push(text);
        } else {
            self.lines.push(format!("{}{}", self.unit.repeat(self.depth), text));
        }
    }

    /// `header {` and one level deeper.
    pub fn open(&mut self, header: impl Display) {
        self.line(format_args!("{} {{", header));
        self.depth += 1;
    }

    /// One level out and `}`. Unbalanced closes stay at column zero.
    pub fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Join displayable items with `sep`.
pub fn format_list<T: Display>(items: &[T], sep: &str) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting() {
        let mut fmt = CodeFormatter::default();
        fmt.open("loop 1");
        fmt.line("i = phi(0, latch i.next)");
        fmt.open("loop 2");
        fmt.line("A[i] = 0");
        fmt.close();
        fmt.close();
        let output = fmt.finish();
        assert!(output.starts_with("loop 1 {\n  i = phi"));
        assert!(output.contains("\n    A[i] = 0\n  }\n}\n"));
    }

    #[test]
    fn test_unbalanced_close() {
        let mut fmt = CodeFormatter::with_unit("\t");
        fmt.close();
        assert_eq!(fmt.finish(), "}\n");
    }

    #[test]
    fn test_format_list() {
        assert_eq!(format_list(&[1, 2, 3], ", "), "1, 2, 3");
        assert_eq!(format_list::<i64>(&[], ", "), "");
    }
}
