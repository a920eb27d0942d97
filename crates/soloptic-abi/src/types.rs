// SPDX-License-Identifier: AGPL-3.0

//! ABI parameter types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use soloptic_exceptions::SolopticResult;

/// A declared parameter as it appears in the interface description
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AbiParam>,
}

impl AbiParam {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            components: Vec::new(),
        }
    }

    pub fn param_type(&self) -> SolopticResult<ParamType> {
        parse_type(&self.kind, &self.components)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint(usize),
    Int(usize),
    Address,
    Bool,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
    /// Anything we do not synthesize (function pointers, fixed-point, ...)
    Unsupported(String),
}

impl ParamType {
    /// Type as written in a canonical function signature
    pub fn canonical(&self) -> String {
        match self {
            ParamType::Uint(bits) => format!("uint{}", bits),
            ParamType::Int(bits) => format!("int{}", bits),
            ParamType::Address => "address".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::FixedBytes(n) => format!("bytes{}", n),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Array(inner) => format!("{}[]", inner.canonical()),
            ParamType::FixedArray(inner, n) => format!("{}[{}]", inner.canonical(), n),
            ParamType::Tuple(items) => format!(
                "({})",
                items.iter().map(|t| t.canonical()).collect::<Vec<_>>().join(",")
            ),
            ParamType::Unsupported(name) => name.clone(),
        }
    }

    pub fn is_unsigned_int(&self) -> bool {
        matches!(self, ParamType::Uint(_))
    }
}

static ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\[([0-9]*)\]$").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(u?)int([0-9]*)$").unwrap());
static BYTES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^bytes([0-9]+)$").unwrap());

fn int_width(digits: &str) -> Option<usize> {
    if digits.is_empty() {
        return Some(256);
    }
    let bits = digits.parse::<usize>().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// Parse an ABI type string. Unknown types become [`ParamType::Unsupported`].
pub fn parse_type(typ: &str, components: &[AbiParam]) -> SolopticResult<ParamType> {
    if let Some(caps) = ARRAY_RE.captures(typ) {
        let base = parse_type(&caps[1], components)?;
        let len = &caps[2];
        if len.is_empty() {
            return Ok(ParamType::Array(Box::new(base)));
        }
        return match len.parse::<usize>() {
            Ok(n) => Ok(ParamType::FixedArray(Box::new(base), n)),
            Err(_) => Ok(ParamType::Unsupported(typ.to_string())),
        };
    }

    if typ == "tuple" {
        let items = components
            .iter()
            .map(|c| c.param_type())
            .collect::<SolopticResult<Vec<_>>>()?;
        return Ok(ParamType::Tuple(items));
    }

    if let Some(caps) = INT_RE.captures(typ) {
        return Ok(match (caps[1].is_empty(), int_width(&caps[2])) {
            (false, Some(bits)) => ParamType::Uint(bits),
            (true, Some(bits)) => ParamType::Int(bits),
            _ => ParamType::Unsupported(typ.to_string()),
        });
    }

    if let Some(caps) = BYTES_RE.captures(typ) {
        return Ok(match caps[1].parse::<usize>() {
            Ok(n) if (1..=32).contains(&n) => ParamType::FixedBytes(n),
            _ => ParamType::Unsupported(typ.to_string()),
        });
    }

    Ok(match typ {
        "address" => ParamType::Address,
        "bool" => ParamType::Bool,
        "bytes" => ParamType::Bytes,
        "string" => ParamType::String,
        other => ParamType::Unsupported(other.to_string()),
    })
}
