// SPDX-License-Identifier: AGPL-3.0

//! Run outcome reporting

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exitcode {
    Success = 0,
    /// Fatal error; the message was printed to stderr
    Error = 1,
    /// The run finished but no entry point produced a cost sample
    NoSamples = 2,
}

/// Outcome of one invocation of the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainResult {
    pub exitcode: i32,
    pub contract: Option<String>,
    pub functions: usize,
    pub samples: usize,
    pub total_cost: u64,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl MainResult {
    pub fn empty() -> Self {
        Self {
            exitcode: Exitcode::Success as i32,
            contract: None,
            functions: 0,
            samples: 0,
            total_cost: 0,
            duration: Duration::from_secs(0),
        }
    }

    pub fn for_contract(name: &str) -> Self {
        Self {
            contract: Some(name.to_string()),
            ..Self::empty()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exitcode == Exitcode::Success as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exitcode_values() {
        assert_eq!(Exitcode::Success as i32, 0);
        assert_eq!(Exitcode::Error as i32, 1);
        assert_eq!(Exitcode::NoSamples as i32, 2);
    }

    #[test]
    fn test_main_result() {
        let result = MainResult::for_contract("Vault");
        assert!(result.succeeded());
        assert_eq!(result.contract.as_deref(), Some("Vault"));
    }

    #[test]
    fn test_duration_serializes_human_readable() {
        let mut result = MainResult::empty();
        result.duration = Duration::from_millis(1500);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], "1s 500ms");
        assert_eq!(json["totalCost"], 0);
    }
}
