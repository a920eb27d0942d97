// SPDX-License-Identifier: AGPL-3.0

//! Compiler position-map decoding
//!
//! The map is a `;`-separated list of `s:l:f:j:m` records, one per instruction
//! in decode order.

use serde::{Deserialize, Serialize};
use soloptic_exceptions::MapFormatError;

/// How an empty field in a record is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyFieldPolicy {
    /// Empty means no value present
    #[default]
    Absent,
    /// Empty repeats the previous record's value
    InheritPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpType {
    #[serde(rename = "i")]
    Into,
    #[serde(rename = "o")]
    Out,
    #[serde(rename = "-")]
    Regular,
}

impl JumpType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "i" => Some(JumpType::Into),
            "o" => Some(JumpType::Out),
            "-" => Some(JumpType::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub start: Option<i64>,
    pub length: Option<i64>,
    pub file_index: Option<i64>,
    pub jump: Option<JumpType>,
    pub modifier_depth: Option<i64>,
}

fn parse_int(
    record: usize,
    field: &'static str,
    value: &str,
) -> Result<Option<i64>, MapFormatError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| MapFormatError::new(record, field, value))
}

fn parse_jump(record: usize, value: &str) -> Result<Option<JumpType>, MapFormatError> {
    if value.is_empty() {
        return Ok(None);
    }
    JumpType::parse(value)
        .map(Some)
        .ok_or_else(|| MapFormatError::new(record, "jump", value))
}

fn parse_record(index: usize, raw: &str) -> Result<PositionRecord, MapFormatError> {
    let mut fields = raw.split(':');
    let mut next = || fields.next().unwrap_or("");

    Ok(PositionRecord {
        start: parse_int(index, "start", next())?,
        length: parse_int(index, "length", next())?,
        file_index: parse_int(index, "file", next())?,
        jump: parse_jump(index, next())?,
        modifier_depth: parse_int(index, "modifier", next())?,
    })
}

/// Decode a position map into one record per instruction.
///
/// An absent field is never an error; a present field that does not parse is.
pub fn parse_source_map(
    map: &str,
    policy: EmptyFieldPolicy,
) -> Result<Vec<PositionRecord>, MapFormatError> {
    let mut records: Vec<PositionRecord> = Vec::new();

    for (index, raw) in map.split(';').enumerate() {
        let mut record = parse_record(index, raw)?;

        if policy == EmptyFieldPolicy::InheritPrevious {
            if let Some(prev) = records.last() {
                record.start = record.start.or(prev.start);
                record.length = record.length.or(prev.length);
                record.file_index = record.file_index.or(prev.file_index);
                record.jump = record.jump.or(prev.jump);
                record.modifier_depth = record.modifier_depth.or(prev.modifier_depth);
            }
        }

        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_records() {
        let records = parse_source_map("0:10:0:-:0;12:3:0:i;15:1:-1:o:1", EmptyFieldPolicy::Absent).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            PositionRecord {
                start: Some(0),
                length: Some(10),
                file_index: Some(0),
                jump: Some(JumpType::Regular),
                modifier_depth: Some(0),
            }
        );
        assert_eq!(records[1].jump, Some(JumpType::Into));
        assert_eq!(records[1].modifier_depth, None);
        assert_eq!(records[2].file_index, Some(-1));
        assert_eq!(records[2].jump, Some(JumpType::Out));
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let records = parse_source_map("5:2:0:-;;:3;::1", EmptyFieldPolicy::Absent).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1], PositionRecord::default());
        assert_eq!(records[2].start, None);
        assert_eq!(records[2].length, Some(3));
        assert_eq!(records[3].start, None);
        assert_eq!(records[3].file_index, Some(1));
    }

    #[test]
    fn test_inherit_previous() {
        let records =
            parse_source_map("5:2:0:-;;:3;9", EmptyFieldPolicy::InheritPrevious).unwrap();
        assert_eq!(records[1].start, Some(5));
        assert_eq!(records[1].jump, Some(JumpType::Regular));
        assert_eq!(records[2].start, Some(5));
        assert_eq!(records[2].length, Some(3));
        assert_eq!(records[3].start, Some(9));
        assert_eq!(records[3].length, Some(3));
        assert_eq!(records[3].file_index, Some(0));
    }

    #[test]
    fn test_malformed_fields() {
        let err = parse_source_map("0:1:0;x:1:0", EmptyFieldPolicy::Absent).unwrap_err();
        assert_eq!(err, MapFormatError::new(1, "start", "x"));

        let err = parse_source_map("0:1:0:q", EmptyFieldPolicy::Absent).unwrap_err();
        assert_eq!(err.field, "jump");
        assert_eq!(err.record, 0);
    }

    #[test]
    fn test_empty_map_is_one_absent_record() {
        let records = parse_source_map("", EmptyFieldPolicy::Absent).unwrap();
        assert_eq!(records, vec![PositionRecord::default()]);
    }
}
