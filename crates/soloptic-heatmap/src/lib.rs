// SPDX-License-Identifier: AGPL-3.0

//! Per-source-line cost heatmap merged across every fuzzed entry point

use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use soloptic_constants::{SEVERITY_HIGH_SHARE, SEVERITY_MEDIUM_SHARE, SHARE_DECIMALS};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_fuzzer::{ContractReport, FunctionReport};
use std::collections::BTreeMap;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Boilerplate,
}

impl Severity {
    /// Classify a share of the total cost
    pub fn from_share(share: f64) -> Self {
        if share > SEVERITY_HIGH_SHARE {
            Severity::High
        } else if share > SEVERITY_MEDIUM_SHARE {
            Severity::Medium
        } else if share > 0.0 {
            Severity::Low
        } else {
            Severity::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Boilerplate => "boilerplate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapLine {
    pub line_number: usize,
    pub text: String,
    pub cost: u64,
    pub share_of_total: f64,
    pub severity: Severity,
    pub is_boilerplate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSummary {
    pub total_cost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub name: String,
    pub avg_cost: f64,
    pub min: u64,
    pub max: u64,
    pub p95: u64,
    pub lines: Vec<i64>,
}

impl From<&FunctionReport> for FunctionSummary {
    fn from(report: &FunctionReport) -> Self {
        Self {
            name: report.name.clone(),
            avg_cost: report.avg,
            min: report.min,
            max: report.max,
            p95: report.p95,
            lines: report.lines(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub contract_name: String,
    pub summary: HeatmapSummary,
    pub lines: Vec<HeatmapLine>,
    pub functions: Vec<FunctionSummary>,
}

impl Heatmap {
    pub fn to_json(&self) -> SolopticResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SolopticException::Internal(e.to_string()))
    }
}

/// Whether a line carries no executable code
fn is_non_executable(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with("*")
}

fn round_share(share: f64) -> f64 {
    let scale = 10f64.powi(SHARE_DECIMALS);
    (share * scale).round() / scale
}

/// Merge every entry point's per-line costs and classify each source line.
///
/// The final line of the source never counts as a hot spot: compiler-appended
/// code lands there, so a costly final line is shown as boilerplate with zero
/// cost while its cost stays in the total.
pub fn build_heatmap(report: &ContractReport, source: &str) -> Heatmap {
    let texts: Vec<&str> = source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    let last_line = texts.len();

    let mut cost_per_line: BTreeMap<usize, u64> = BTreeMap::new();
    for function in &report.functions {
        for (&line, &cost) in &function.cost_by_line {
            if line <= 0 {
                continue;
            }
            let line = line as usize;
            let counted = match texts.get(line - 1) {
                Some(_) if line == last_line => true,
                Some(text) => !is_non_executable(text),
                None => false,
            };
            if counted {
                *cost_per_line.entry(line).or_insert(0) += cost;
            }
        }
    }

    let total_cost: u64 = cost_per_line.values().sum();

    let lines = texts
        .iter()
        .enumerate()
        .map(|(idx, text)| {
            let line_number = idx + 1;
            let cost = cost_per_line.get(&line_number).copied().unwrap_or(0);
            let is_boilerplate = line_number == last_line && cost > 0;

            if is_boilerplate {
                return HeatmapLine {
                    line_number,
                    text: text.to_string(),
                    cost: 0,
                    share_of_total: 0.0,
                    severity: Severity::Boilerplate,
                    is_boilerplate,
                };
            }

            let share = if total_cost == 0 {
                0.0
            } else {
                cost as f64 / total_cost as f64
            };
            HeatmapLine {
                line_number,
                text: text.to_string(),
                cost,
                share_of_total: round_share(share),
                severity: Severity::from_share(share),
                is_boilerplate,
            }
        })
        .collect();

    Heatmap {
        contract_name: report.name.clone(),
        summary: HeatmapSummary { total_cost },
        lines,
        functions: report.functions.iter().map(FunctionSummary::from).collect(),
    }
}

fn paint(text: &str, severity: Severity) -> ColoredString {
    match severity {
        Severity::High => text.red().bold(),
        Severity::Medium => text.yellow(),
        Severity::Low => text.green(),
        Severity::Boilerplate => text.dimmed().italic(),
        Severity::None => text.normal(),
    }
}

/// Annotated source listing followed by the per-function table
pub fn render_heatmap(heatmap: &Heatmap, writer: &mut dyn Write) -> io::Result<()> {
    writeln!(
        writer,
        "{} {} (total gas: {})",
        "Heatmap".bold(),
        heatmap.contract_name.cyan(),
        heatmap.summary.total_cost
    )?;

    let width = heatmap.lines.len().to_string().len();
    for line in &heatmap.lines {
        let annotation = match line.severity {
            Severity::None => String::new(),
            Severity::Boilerplate => "boilerplate".to_string(),
            _ => format!("{} ({:.1}%)", line.cost, line.share_of_total * 100.0),
        };
        writeln!(
            writer,
            "{:>width$} | {:<60} {}",
            line.line_number,
            paint(&line.text, line.severity),
            paint(&annotation, line.severity),
            width = width
        )?;
    }

    if heatmap.functions.is_empty() {
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{:<24} {:>10} {:>10} {:>10} {:>10}  {}",
        "function".bold(),
        "avg",
        "min",
        "max",
        "p95",
        "lines"
    )?;
    for function in &heatmap.functions {
        let lines = function
            .lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            writer,
            "{:<24} {:>10.0} {:>10} {:>10} {:>10}  {}",
            function.name, function.avg_cost, function.min, function.max, function.p95, lines
        )?;
    }
    Ok(())
}
