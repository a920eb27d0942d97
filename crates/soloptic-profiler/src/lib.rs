// SPDX-License-Identifier: AGPL-3.0

//! Per-line cost attribution for one execution trace
//!
//! Steps whose program counter has no source line count toward the total and the
//! opcode histogram, never toward a line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use soloptic_constants::TOP_LINES_LIMIT;
use soloptic_exceptions::InvalidTraceError;
use soloptic_mapper::PcLineMap;
use soloptic_traces::ExecutionTrace;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCost {
    pub line: i64,
    pub cost: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCostProfile {
    pub total_cost: u64,
    pub cost_by_line: BTreeMap<i64, u64>,
    pub opcode_counts: BTreeMap<String, u64>,
    /// Most expensive lines, descending by cost. Summary view only.
    pub top_lines: Vec<LineCost>,
    pub mapped_steps: u64,
    pub unmapped_steps: u64,
}

impl LineCostProfile {
    /// Cost attributed to source lines
    pub fn mapped_cost(&self) -> u64 {
        self.cost_by_line.values().sum()
    }

    pub fn cost_of_line(&self, line: i64) -> u64 {
        self.cost_by_line.get(&line).copied().unwrap_or(0)
    }
}

/// Entries sorted by descending cost, ties by ascending line, truncated to `limit`
pub fn top_lines(cost_by_line: &BTreeMap<i64, u64>, limit: usize) -> Vec<LineCost> {
    let mut lines: Vec<LineCost> = cost_by_line
        .iter()
        .map(|(line, cost)| LineCost {
            line: *line,
            cost: *cost,
        })
        .collect();
    lines.sort_by(|a, b| b.cost.cmp(&a.cost).then(a.line.cmp(&b.line)));
    lines.truncate(limit);
    lines
}

/// Replay a trace through a program counter map
pub fn profile_trace(trace: &ExecutionTrace, map: &PcLineMap) -> LineCostProfile {
    let mut profile = LineCostProfile::default();

    for step in &trace.steps {
        profile.total_cost += step.gas_cost;
        *profile.opcode_counts.entry(step.op.clone()).or_insert(0) += 1;

        let line = map.line_for(step.pc);
        if line > 0 {
            *profile.cost_by_line.entry(line).or_insert(0) += step.gas_cost;
            profile.mapped_steps += 1;
        } else {
            profile.unmapped_steps += 1;
        }
    }

    profile.top_lines = top_lines(&profile.cost_by_line, TOP_LINES_LIMIT);
    profile
}

/// Validate a raw trace and profile it
pub fn profile_trace_json(
    trace: &Value,
    map: &PcLineMap,
) -> Result<LineCostProfile, InvalidTraceError> {
    let trace = ExecutionTrace::from_json(trace)?;
    Ok(profile_trace(&trace, map))
}
