use serde::Serialize;

use crate::module_graph::ModuleId;

/// A position in an Etude source file: the owning module plus a
/// zero-indexed line and column.
///
/// Positions are tracked as line/column pairs from the lexer onward;
/// byte offsets are recovered on demand via [`LineIndex`] when a renderer
/// needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub module: ModuleId,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Create a location inside the given module.
    pub fn new(module: ModuleId, line: u32, column: u32) -> Self {
        Self { module, line, column }
    }

    /// Whether this location textually precedes or equals `other`,
    /// comparing (line, column) lexicographically.
    ///
    /// The module is deliberately not compared: usage-aware symbol lookup
    /// only ever compares positions within one module's scope tree.
    pub fn precedes_or_eq(&self, other: &Location) -> bool {
        (self.line, self.column) <= (other.line, other.column)
    }
}

impl std::fmt::Display for Location {
    /// Renders 1-indexed, the form every diagnostic line uses.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line = {}, column = {}", self.line + 1, self.column + 1)
    }
}

/// Pre-computed index of line start offsets for line/column → byte-offset
/// conversion.
///
/// Constructed once per source file when a renderer (the `--pretty` path)
/// needs byte offsets for labeled spans.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newlines.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Byte offset of a zero-indexed (line, column) position.
    ///
    /// Positions past the end of the line index clamp to the last line;
    /// the column is taken as a byte count from the line start.
    pub fn offset(&self, line: u32, column: u32) -> u32 {
        let idx = (line as usize).min(self.line_starts.len() - 1);
        self.line_starts[idx] + column
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> Location {
        Location::new(ModuleId(0), line, column)
    }

    #[test]
    fn display_is_one_indexed() {
        assert_eq!(loc(0, 0).to_string(), "line = 1, column = 1");
        assert_eq!(loc(4, 11).to_string(), "line = 5, column = 12");
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(loc(1, 5).precedes_or_eq(&loc(1, 5)));
        assert!(loc(1, 5).precedes_or_eq(&loc(1, 6)));
        assert!(loc(1, 9).precedes_or_eq(&loc(2, 0)));
        assert!(!loc(2, 0).precedes_or_eq(&loc(1, 9)));
    }

    #[test]
    fn line_index_offsets() {
        let idx = LineIndex::new("ab\ncde\nf");
        assert_eq!(idx.offset(0, 0), 0);
        assert_eq!(idx.offset(0, 1), 1);
        assert_eq!(idx.offset(1, 0), 3);
        assert_eq!(idx.offset(2, 0), 7);
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn line_index_clamps_past_last_line() {
        let idx = LineIndex::new("ab");
        assert_eq!(idx.offset(5, 1), 1);
    }
}
