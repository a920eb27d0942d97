// SPDX-License-Identifier: AGPL-3.0

//! Byte offset to line number resolution

use soloptic_constants::UNMAPPED_LINE;

/// Precomputed newline positions of a source text
#[derive(Debug, Clone, Default)]
pub struct SourceLineIndex {
    newlines: Vec<usize>,
    len: usize,
}

impl SourceLineIndex {
    pub fn new(source: &str) -> Self {
        let newlines = source
            .bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i)
            .collect();
        Self {
            newlines,
            len: source.len(),
        }
    }

    /// 1-based line containing `offset`: newlines strictly before it, plus one.
    /// Offsets past the end resolve to the last line.
    pub fn line_at(&self, offset: usize) -> i64 {
        let offset = offset.min(self.len);
        self.newlines.partition_point(|&nl| nl < offset) as i64 + 1
    }

    /// Like [`line_at`](Self::line_at), returning the unmapped sentinel for a
    /// missing or negative offset.
    pub fn line_of(&self, offset: Option<i64>) -> i64 {
        match offset {
            Some(o) if o >= 0 => self.line_at(o as usize),
            _ => UNMAPPED_LINE,
        }
    }

    /// Number of lines as produced by splitting on '\n'
    pub fn line_count(&self) -> usize {
        self.newlines.len() + 1
    }
}

/// One-off lookup without building an index
pub fn offset_to_line(source: &str, offset: Option<i64>) -> i64 {
    match offset {
        Some(o) if o >= 0 => {
            let end = (o as usize).min(source.len());
            source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() as i64 + 1
        }
        _ => UNMAPPED_LINE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_at() {
        let index = SourceLineIndex::new("A\nB\nC\n");
        assert_eq!(index.line_at(0), 1);
        assert_eq!(index.line_at(1), 1); // the newline itself
        assert_eq!(index.line_at(2), 2);
        assert_eq!(index.line_at(4), 3);
        assert_eq!(index.line_at(6), 4);
        assert_eq!(index.line_at(1000), 4);
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_unmapped_offsets() {
        let index = SourceLineIndex::new("x");
        assert_eq!(index.line_of(None), UNMAPPED_LINE);
        assert_eq!(index.line_of(Some(-1)), UNMAPPED_LINE);
        assert_eq!(offset_to_line("x", None), UNMAPPED_LINE);
        assert_eq!(offset_to_line("x", Some(-5)), UNMAPPED_LINE);
    }

    #[test]
    fn test_index_agrees_with_scan() {
        let source = "pragma solidity ^0.8.0;\n\ncontract C {\n    uint x;\n}\n";
        let index = SourceLineIndex::new(source);
        for offset in 0..source.len() as i64 + 3 {
            assert_eq!(index.line_of(Some(offset)), offset_to_line(source, Some(offset)));
        }
    }

    #[test]
    fn test_empty_source() {
        let index = SourceLineIndex::new("");
        assert_eq!(index.line_at(0), 1);
        assert_eq!(index.line_count(), 1);
    }
}
