// SPDX-License-Identifier: AGPL-3.0

//! Execution traces and their rendering
//!
//! Traces arrive in the `debug_traceTransaction` struct-logger shape. They are
//! validated once at this boundary; everything downstream works on
//! [`ExecutionTrace`].

use colored::*;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soloptic_exceptions::InvalidTraceError;
use std::io::{self, Write};

/// Steps costing at least this much are highlighted when rendered
pub const EXPENSIVE_STEP_COST: u64 = 2_000;

/// One executed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub pc: usize,
    #[serde(default = "unknown_op")]
    pub op: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub gas_cost: u64,
    #[serde(default = "top_depth")]
    pub depth: usize,
}

impl TraceStep {
    pub fn new(pc: usize, op: &str, gas_cost: u64, depth: usize) -> Self {
        Self {
            pc,
            op: op.to_string(),
            gas_cost,
            depth,
        }
    }
}

fn unknown_op() -> String {
    "UNKNOWN".to_string()
}

fn top_depth() -> usize {
    1
}

/// Accept a JSON number, a decimal string, a `0x` hex string or null
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| de::Error::custom(format!("negative cost {}", n))),
        Value::String(s) => {
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => s.parse::<u64>(),
            };
            parsed.map_err(|_| de::Error::custom(format!("invalid cost {:?}", s)))
        }
        other => Err(de::Error::custom(format!("invalid cost {}", other))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrace {
    #[serde(default, deserialize_with = "lenient_u64")]
    gas: u64,
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    return_value: String,
    struct_logs: Option<Vec<TraceStep>>,
}

/// Validated trace of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub gas: u64,
    pub failed: bool,
    pub return_value: String,
    pub steps: Vec<TraceStep>,
}

impl ExecutionTrace {
    pub fn new(steps: Vec<TraceStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// Validate a raw struct-logger trace
    pub fn from_json(value: &Value) -> Result<Self, InvalidTraceError> {
        if !value.is_object() {
            return Err(InvalidTraceError::new("trace is not an object"));
        }
        let raw: RawTrace = serde_json::from_value(value.clone())
            .map_err(|e| InvalidTraceError::new(e.to_string()))?;
        let steps = raw
            .struct_logs
            .ok_or_else(|| InvalidTraceError::new("missing structLogs"))?;

        Ok(Self {
            gas: raw.gas,
            failed: raw.failed,
            return_value: raw.return_value,
            steps,
        })
    }

    pub fn parse(json: &str) -> Result<Self, InvalidTraceError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| InvalidTraceError::new(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Sum of every step's cost
    pub fn total_cost(&self) -> u64 {
        self.steps.iter().map(|s| s.gas_cost).sum()
    }
}

fn rendered_line(line: i64) -> ColoredString {
    if line > 0 {
        format!("L{}", line).magenta()
    } else {
        "-".dimmed()
    }
}

fn rendered_cost(cost: u64) -> ColoredString {
    if cost >= EXPENSIVE_STEP_COST {
        cost.to_string().red()
    } else {
        cost.to_string().green()
    }
}

/// Render every step with its source line, indented by call depth
pub fn render_steps(
    trace: &ExecutionTrace,
    line_of: &dyn Fn(usize) -> i64,
    writer: &mut dyn Write,
) -> io::Result<()> {
    for step in &trace.steps {
        let indent = "    ".repeat(step.depth.saturating_sub(1));
        writeln!(
            writer,
            "{}{:>6} {:<14} {:>7} {}",
            indent,
            step.pc,
            step.op.cyan(),
            rendered_cost(step.gas_cost),
            rendered_line(line_of(step.pc)),
        )?;
    }

    let symbol = if trace.failed { "↩ ".red() } else { "↩ ".green() };
    let ret = if trace.return_value.is_empty() {
        "0x".to_string()
    } else if trace.return_value.starts_with("0x") {
        trace.return_value.clone()
    } else {
        format!("0x{}", trace.return_value)
    };
    let ret = if trace.failed { ret.red() } else { ret.green() };

    writeln!(
        writer,
        "{}{} (gas: {}, steps: {})",
        symbol,
        ret,
        trace.gas,
        trace.steps.len()
    )
}
