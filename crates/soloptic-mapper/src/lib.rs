// SPDX-License-Identifier: AGPL-3.0

//! Program counter to source line mapping
//!
//! Composes the instruction decoder, the position-map decoder and the offset
//! resolver. The Nth position record belongs to the Nth decoded instruction.

pub mod lines;
pub mod source_map;

pub use lines::{offset_to_line, SourceLineIndex};
pub use source_map::{parse_source_map, EmptyFieldPolicy, JumpType, PositionRecord};

use soloptic_bytecode::{decode_hex_instructions, Instruction};
use soloptic_constants::UNMAPPED_LINE;
use soloptic_exceptions::SolopticResult;
use std::collections::BTreeMap;

/// Lookup from program counter to 1-based source line.
///
/// Values `<= 0` mean the instruction has no source line. Program counters that
/// are not instruction starts are unmapped as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcLineMap {
    lines: BTreeMap<usize, i64>,
}

impl PcLineMap {
    /// Map every instruction through its position record
    pub fn from_parts(
        instructions: &[Instruction],
        records: &[PositionRecord],
        index: &SourceLineIndex,
    ) -> Self {
        let lines = instructions
            .iter()
            .map(|insn| {
                let line = records
                    .get(insn.index)
                    .map(|record| index.line_of(record.start))
                    .filter(|line| *line > 0)
                    .unwrap_or(UNMAPPED_LINE);
                (insn.pc, line)
            })
            .collect();

        Self { lines }
    }

    pub fn line_for(&self, pc: usize) -> i64 {
        self.lines.get(&pc).copied().unwrap_or(UNMAPPED_LINE)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn mapped_count(&self) -> usize {
        self.lines.values().filter(|line| **line > 0).count()
    }

    pub fn unmapped_count(&self) -> usize {
        self.len() - self.mapped_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.lines.iter().map(|(pc, line)| (*pc, *line))
    }
}

fn is_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Bytecode with no bytes after the `0x` prefix counts as missing
fn non_empty_code(s: Option<&str>) -> Option<&str> {
    is_blank(s).filter(|code| {
        let code = code.trim();
        let digits = code
            .strip_prefix("0x")
            .or_else(|| code.strip_prefix("0X"))
            .unwrap_or(code);
        !digits.is_empty()
    })
}

/// Build the map for one compiled program.
///
/// A missing position map or bytecode yields an empty map, so every lookup is
/// unmapped. Malformed bytecode or map fields are errors.
pub fn build_pc_line_map(
    source_map: Option<&str>,
    bytecode: Option<&str>,
    source: &str,
    policy: EmptyFieldPolicy,
) -> SolopticResult<PcLineMap> {
    let (Some(source_map), Some(bytecode)) = (is_blank(source_map), non_empty_code(bytecode)) else {
        return Ok(PcLineMap::default());
    };

    let instructions = decode_hex_instructions(bytecode)?;
    let records = parse_source_map(source_map, policy)?;
    let index = SourceLineIndex::new(source);

    Ok(PcLineMap::from_parts(&instructions, &records, &index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use soloptic_exceptions::{DecodeError, SolopticException};

    #[test]
    fn test_missing_inputs_give_empty_map() {
        let policy = EmptyFieldPolicy::Absent;
        assert!(build_pc_line_map(None, Some("6000"), "x", policy).unwrap().is_empty());
        assert!(build_pc_line_map(Some("0:1:0"), None, "x", policy).unwrap().is_empty());
        assert!(build_pc_line_map(Some(""), Some("6000"), "x", policy).unwrap().is_empty());
        assert!(build_pc_line_map(Some("0:1:0"), Some("0x"), "x", policy)
            .unwrap()
            .is_empty());

        let empty = PcLineMap::default();
        assert_eq!(empty.line_for(0), UNMAPPED_LINE);
    }

    #[test]
    fn test_prefix_only_bytecode_is_missing() {
        let policy = EmptyFieldPolicy::Absent;
        for code in ["0x", "0X", " 0x "] {
            let map = build_pc_line_map(Some("0:1:0"), Some(code), "x", policy).unwrap();
            assert!(map.is_empty(), "{:?}", code);
        }
        assert!(build_pc_line_map(Some("0:1:0"), Some("0x60"), "x", policy).is_ok());
    }

    #[test]
    fn test_three_instructions() {
        // PUSH1 0x01, PUSH1 0x02, ADD
        let source = "A\nB\nC\n";
        let map = build_pc_line_map(
            Some("0:1:0:-;0:1;2:1"),
            Some("6001600201"),
            source,
            EmptyFieldPolicy::Absent,
        )
        .unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.line_for(0), 1);
        assert_eq!(map.line_for(2), 1);
        assert_eq!(map.line_for(4), 2);
        // immediate byte is not an instruction start
        assert_eq!(map.line_for(1), UNMAPPED_LINE);
    }

    #[test]
    fn test_absent_start_and_missing_record() {
        let map = build_pc_line_map(
            Some("0:1:0;:2:0"),
            Some("000000"),
            "a\nb",
            EmptyFieldPolicy::Absent,
        )
        .unwrap();

        assert_eq!(map.line_for(0), 1);
        assert_eq!(map.line_for(1), UNMAPPED_LINE);
        assert_eq!(map.line_for(2), UNMAPPED_LINE);
        assert_eq!(map.mapped_count(), 1);
        assert_eq!(map.unmapped_count(), 2);
    }

    #[test]
    fn test_inherit_policy_maps_more() {
        let absent =
            build_pc_line_map(Some("2:1:0;"), Some("0000"), "a\nb", EmptyFieldPolicy::Absent)
                .unwrap();
        let inherit = build_pc_line_map(
            Some("2:1:0;"),
            Some("0000"),
            "a\nb",
            EmptyFieldPolicy::InheritPrevious,
        )
        .unwrap();

        assert_eq!(absent.line_for(1), UNMAPPED_LINE);
        assert_eq!(inherit.line_for(1), 2);
    }

    #[test]
    fn test_bad_bytecode_is_error() {
        let err = build_pc_line_map(Some("0:1:0"), Some("0x600"), "", EmptyFieldPolicy::Absent)
            .unwrap_err();
        assert_eq!(err, SolopticException::Decode(DecodeError::OddLength(3)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_positive_line_iff_start_present() {
        let records = parse_source_map("0:1;;4:1;:1;-1:1", EmptyFieldPolicy::Absent).unwrap();
        let instructions = soloptic_bytecode::decode_instructions(&[0; 5]).unwrap();
        let map = PcLineMap::from_parts(&instructions, &records, &SourceLineIndex::new("ab\ncd\n"));

        for (pc, line) in map.iter() {
            let start = records[pc].start;
            if line > 0 {
                assert!(start.is_some());
            } else {
                assert_eq!(line, UNMAPPED_LINE);
            }
        }
        assert_eq!(map.line_for(2), 2);
        assert_eq!(map.line_for(4), UNMAPPED_LINE);
    }
}
