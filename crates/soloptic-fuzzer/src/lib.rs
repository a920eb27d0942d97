// SPDX-License-Identifier: AGPL-3.0

//! Randomized invocation of every entry point of a deployed contract
//!
//! Entry points run one after another from a single account. Per-iteration
//! failures (no receipt, failed send, missing trace) are absorbed and counted;
//! only compile, map and deploy failures abort a run.

pub mod report;
pub mod retry;

pub use report::{ContractReport, FunctionReport, InvocationSample};
pub use retry::{fetch_trace, TraceRetryPolicy};

use rand::Rng;
use soloptic_abi::{
    encode_call, find_seed_deposit, payable_value, synthesize_call_args, AbiFunction,
};
use soloptic_build::CompiledContract;
use soloptic_chain::{DeployedContract, ExecutionEnvironment, InvokeOverrides};
use soloptic_constants::{
    DEFAULT_GAS_LIMIT, FUZZ_DEFAULT_RUNS, RECEIPT_TIMEOUT_MS, SEED_DEPOSIT_WEI,
};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_logs::{ErrorCode, Logger};
use soloptic_mapper::{EmptyFieldPolicy, PcLineMap};
use soloptic_profiler::profile_trace;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzConfig {
    pub runs_per_function: usize,
    pub gas_limit: u64,
    pub receipt_timeout: Duration,
    pub seed_deposit_wei: u128,
    pub trace_policy: TraceRetryPolicy,
    pub source_map_policy: EmptyFieldPolicy,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            runs_per_function: FUZZ_DEFAULT_RUNS,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: Duration::from_millis(RECEIPT_TIMEOUT_MS),
            seed_deposit_wei: SEED_DEPOSIT_WEI,
            trace_policy: TraceRetryPolicy::default(),
            source_map_policy: EmptyFieldPolicy::Absent,
        }
    }
}

pub struct FuzzDriver<E> {
    env: E,
    config: FuzzConfig,
    logger: Logger,
}

impl<E: ExecutionEnvironment> FuzzDriver<E> {
    pub fn new(env: E, config: FuzzConfig, logger: Logger) -> Self {
        Self {
            env,
            config,
            logger,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    fn overrides(&self, value_wei: u128) -> InvokeOverrides {
        InvokeOverrides {
            gas_limit: self.config.gas_limit,
            value_wei,
            receipt_timeout: self.config.receipt_timeout,
        }
    }

    /// Deploy, seed and fuzz every entry point of a compiled contract
    pub async fn fuzz_contract<R: Rng>(
        &self,
        contract: &CompiledContract,
        rng: &mut R,
    ) -> SolopticResult<ContractReport> {
        let pc_map = contract.pc_line_map(self.config.source_map_policy)?;
        if pc_map.mapped_count() == 0 {
            self.logger.warn_code(
                ErrorCode::UnmappedBytecode,
                &format!(
                    "{}: no runtime instruction maps to a source line; line costs will be empty",
                    contract.contract_name
                ),
                false,
            );
        } else {
            self.logger.debug(&format!(
                "{}: {} of {} instructions mapped",
                contract.contract_name,
                pc_map.mapped_count(),
                pc_map.len()
            ));
        }

        let functions = contract.functions()?;
        let deployed = self.env.deploy(contract, &self.overrides(0)).await?;

        self.seed_state(&deployed, &functions).await;

        let mut reports = Vec::with_capacity(functions.len());
        for function in &functions {
            reports.push(self.fuzz_function(&deployed, function, &pc_map, rng).await);
        }

        Ok(ContractReport {
            name: contract.contract_name.clone(),
            iterations_per_function: self.config.runs_per_function,
            functions: reports,
        })
    }

    /// Call a payable zero-argument `deposit()` once, ignoring the outcome
    pub async fn seed_state(&self, deployed: &DeployedContract, functions: &[AbiFunction]) {
        let Some(deposit) = find_seed_deposit(functions) else {
            return;
        };

        let outcome = match encode_call(deposit, &[]) {
            Ok(calldata) => {
                self.env
                    .invoke(deployed, calldata, &self.overrides(self.config.seed_deposit_wei))
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Some(receipt)) if !receipt.reverted() => {
                self.logger.info("seeded contract state with deposit()");
            }
            Ok(Some(_)) => {
                self.logger
                    .warn_code(ErrorCode::SeedFailed, "seed deposit() reverted", false);
            }
            Ok(None) => {
                self.logger
                    .warn_code(ErrorCode::SeedFailed, "seed deposit() got no receipt", false);
            }
            Err(e) => {
                self.logger.warn_code(
                    ErrorCode::SeedFailed,
                    &format!("seed deposit() failed: {}", e),
                    false,
                );
            }
        }
    }

    /// Run the configured number of iterations against one entry point.
    ///
    /// Never fails: every problem is absorbed into the report's counters.
    pub async fn fuzz_function<R: Rng>(
        &self,
        deployed: &DeployedContract,
        function: &AbiFunction,
        pc_map: &PcLineMap,
        rng: &mut R,
    ) -> FunctionReport {
        let mut report = FunctionReport::new(&function.name);
        let logger = self.logger.child("fuzz");

        for iteration in 0..self.config.runs_per_function {
            let calldata = synthesize_call_args(function, deployed.caller, rng)
                .and_then(|args| encode_call(function, &args));
            let calldata = match calldata {
                Ok(calldata) => calldata,
                Err(e) => {
                    logger.warn_code(
                        ErrorCode::InvocationFailed,
                        &format!("{}: cannot build calldata: {}", function.name, e),
                        false,
                    );
                    report.skipped_iterations += 1;
                    continue;
                }
            };

            let value = if function.is_payable() {
                payable_value(rng)
            } else {
                0
            };

            let receipt = match self
                .env
                .invoke(deployed, calldata, &self.overrides(value))
                .await
            {
                Ok(Some(receipt)) => receipt,
                Ok(None) => {
                    let missing = SolopticException::NoReceipt {
                        function: function.name.clone(),
                        timeout_ms: self.config.receipt_timeout.as_millis() as u64,
                    };
                    logger.warn_code(ErrorCode::NoReceipt, &missing.to_string(), false);
                    logger.debug(&format!("No receipt: {} iter {}", function.name, iteration));
                    report.skipped_iterations += 1;
                    continue;
                }
                Err(e) => {
                    logger.warn_code(
                        ErrorCode::InvocationFailed,
                        &format!("{}: {}", function.name, e),
                        false,
                    );
                    report.skipped_iterations += 1;
                    continue;
                }
            };

            logger.debug(&format!(
                "{}() iter {}: gas={}, status={}",
                function.name,
                iteration,
                receipt.cost,
                if receipt.reverted() { "reverted" } else { "ok" }
            ));

            if receipt.cost == 0 {
                logger.debug(&format!(
                    "{}() iter {}: zero-cost receipt {} ignored",
                    function.name, iteration, receipt.transaction_id
                ));
                continue;
            }
            report.record(InvocationSample {
                cost: receipt.cost,
                reverted: receipt.reverted(),
            });

            match fetch_trace(
                &self.env,
                &receipt.transaction_id,
                &self.config.trace_policy,
                &logger,
            )
            .await
            {
                Ok(trace) => report.accumulate(&profile_trace(&trace, pc_map)),
                Err(e) => {
                    let code = match &e {
                        SolopticException::InvalidTrace(_) => ErrorCode::InvalidTrace,
                        _ => ErrorCode::TraceUnavailable,
                    };
                    logger.warn_code(
                        code,
                        &format!("{}: line profile skipped", function.name),
                        false,
                    );
                    logger.debug(&e.to_string());
                }
            }
        }

        report.finalize();
        self.logger.info(&format!(
            "{}: {} samples ({} reverted), {} skipped, {} traced, avg {:.0}",
            report.name,
            report.samples.len(),
            report.reverted_count(),
            report.skipped_iterations,
            report.traced_iterations,
            report.avg
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FuzzConfig::default();
        assert_eq!(config.runs_per_function, 200);
        assert_eq!(config.gas_limit, 10_000_000);
        assert_eq!(config.receipt_timeout, Duration::from_secs(10));
        assert_eq!(config.seed_deposit_wei, 10_000_000_000_000_000_000);
        assert_eq!(config.source_map_policy, EmptyFieldPolicy::Absent);
    }
}
