// SPDX-License-Identifier: AGPL-3.0

//! Fuzz results and their canonical JSON schema

use serde::{Deserialize, Serialize};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_profiler::LineCostProfile;
use std::collections::BTreeMap;

/// Cost of one recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvocationSample {
    pub cost: u64,
    pub reverted: bool,
}

/// Statistics for one entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FunctionReport {
    pub name: String,
    pub samples: Vec<InvocationSample>,
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub p95: u64,
    pub cost_by_line: BTreeMap<i64, u64>,
    #[serde(default)]
    pub skipped_iterations: u64,
    #[serde(default)]
    pub traced_iterations: u64,
}

impl FunctionReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            samples: Vec::new(),
            min: 0,
            max: 0,
            avg: 0.0,
            p95: 0,
            cost_by_line: BTreeMap::new(),
            skipped_iterations: 0,
            traced_iterations: 0,
        }
    }

    pub fn record(&mut self, sample: InvocationSample) {
        self.samples.push(sample);
    }

    /// Add one trace's per-line costs. Non-positive lines are ignored.
    pub fn accumulate(&mut self, profile: &LineCostProfile) {
        for (line, cost) in &profile.cost_by_line {
            if *line > 0 {
                *self.cost_by_line.entry(*line).or_insert(0) += cost;
            }
        }
        self.traced_iterations += 1;
    }

    /// Sort samples and compute min, max, mean and the 95th percentile
    pub fn finalize(&mut self) {
        self.samples.sort_by_key(|s| s.cost);

        let n = self.samples.len();
        if n == 0 {
            self.min = 0;
            self.max = 0;
            self.avg = 0.0;
            self.p95 = 0;
            return;
        }

        self.min = self.samples[0].cost;
        self.max = self.samples[n - 1].cost;
        let total: u128 = self.samples.iter().map(|s| s.cost as u128).sum();
        self.avg = total as f64 / n as f64;
        let rank = (n as f64 * 0.95).floor() as usize;
        self.p95 = self.samples.get(rank).map_or(self.max, |s| s.cost);
    }

    pub fn reverted_count(&self) -> usize {
        self.samples.iter().filter(|s| s.reverted).count()
    }

    /// Distinct positive lines with recorded cost, ascending
    pub fn lines(&self) -> Vec<i64> {
        self.cost_by_line
            .iter()
            .filter(|(line, cost)| **line > 0 && **cost > 0)
            .map(|(line, _)| *line)
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let name = &self.name;
        if self.samples.windows(2).any(|w| w[0].cost > w[1].cost) {
            return Err(format!("{}: samples are not sorted", name));
        }

        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => {
                if self.min != first.cost || self.max != last.cost {
                    return Err(format!("{}: min/max disagree with samples", name));
                }
                if !(self.avg.is_finite()
                    && self.min as f64 <= self.avg + 1e-9
                    && self.avg <= self.max as f64 + 1e-9)
                {
                    return Err(format!("{}: avg {} outside [min, max]", name, self.avg));
                }
                if !self.samples.iter().any(|s| s.cost == self.p95) {
                    return Err(format!("{}: p95 {} is not a sample", name, self.p95));
                }
            }
            _ => {
                if self.min != 0 || self.max != 0 || self.p95 != 0 || self.avg != 0.0 {
                    return Err(format!("{}: statistics without samples", name));
                }
            }
        }

        if self.cost_by_line.keys().any(|line| *line <= 0) {
            return Err(format!("{}: non-positive line key", name));
        }
        if self.traced_iterations > self.samples.len() as u64 {
            return Err(format!("{}: more traced iterations than samples", name));
        }
        Ok(())
    }
}

/// Output of one fuzz run over a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContractReport {
    pub name: String,
    pub iterations_per_function: usize,
    pub functions: Vec<FunctionReport>,
}

impl ContractReport {
    /// Parse and validate a report produced elsewhere
    pub fn from_json(json: &str) -> SolopticResult<Self> {
        let report: ContractReport = serde_json::from_str(json)
            .map_err(|e| SolopticException::InvalidReport(e.to_string()))?;
        report.validate()?;
        Ok(report)
    }

    pub fn to_json(&self) -> SolopticResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SolopticException::Internal(e.to_string()))
    }

    pub fn validate(&self) -> SolopticResult<()> {
        for function in &self.functions {
            function.validate().map_err(SolopticException::InvalidReport)?;

            let attempted = function.samples.len() as u64 + function.skipped_iterations;
            if attempted > self.iterations_per_function as u64 {
                return Err(SolopticException::InvalidReport(format!(
                    "{}: {} iterations recorded, {} requested",
                    function.name, attempted, self.iterations_per_function
                )));
            }
        }
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.name == name)
    }
}
