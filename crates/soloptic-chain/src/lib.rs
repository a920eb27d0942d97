// SPDX-License-Identifier: AGPL-3.0

//! Execution environment: deploys programs, sends invocations, fetches traces
//!
//! [`ExecutionEnvironment`] is the seam the fuzz driver runs against;
//! [`RpcEnvironment`] implements it over an Ethereum JSON-RPC node.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, TransactionReceipt, TransactionRequest, H256, U256};
use serde_json::json;
use soloptic_build::CompiledContract;
use soloptic_constants::{DEFAULT_GAS_LIMIT, RECEIPT_TIMEOUT_MS};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_logs::Logger;
use soloptic_traces::ExecutionTrace;
use std::time::Duration;

/// Receipt polling interval
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 100;

/// A deployed program and the account that talks to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: [u8; 20],
    pub caller: [u8; 20],
    pub transaction_id: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReceipt {
    pub status: InvocationStatus,
    pub cost: u64,
    /// `0x`-prefixed transaction hash
    pub transaction_id: String,
}

impl InvocationReceipt {
    pub fn reverted(&self) -> bool {
        self.status == InvocationStatus::Reverted
    }
}

/// Per-invocation overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOverrides {
    pub gas_limit: u64,
    pub value_wei: u128,
    pub receipt_timeout: Duration,
}

impl Default for InvokeOverrides {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            value_wei: 0,
            receipt_timeout: Duration::from_millis(RECEIPT_TIMEOUT_MS),
        }
    }
}

#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Deploy a compiled program from the first available account
    async fn deploy(
        &self,
        contract: &CompiledContract,
        overrides: &InvokeOverrides,
    ) -> SolopticResult<DeployedContract>;

    /// Send one transaction. `Ok(None)` means no receipt arrived in time.
    async fn invoke(
        &self,
        target: &DeployedContract,
        calldata: Vec<u8>,
        overrides: &InvokeOverrides,
    ) -> SolopticResult<Option<InvocationReceipt>>;

    /// Struct-logger trace of a mined transaction
    async fn trace(&self, transaction_id: &str) -> SolopticResult<ExecutionTrace>;
}

/// Parse a `0x`-prefixed transaction hash
pub fn parse_tx_hash(transaction_id: &str) -> SolopticResult<H256> {
    let digits = transaction_id.strip_prefix("0x").unwrap_or(transaction_id);
    let bytes = hex::decode(digits)
        .map_err(|e| SolopticException::Internal(format!("bad transaction id {}: {}", transaction_id, e)))?;
    if bytes.len() != 32 {
        return Err(SolopticException::Internal(format!(
            "bad transaction id {}: expected 32 bytes",
            transaction_id
        )));
    }
    Ok(H256::from_slice(&bytes))
}

pub fn format_tx_hash(hash: &H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

fn rpc_error(e: impl std::fmt::Display) -> SolopticException {
    SolopticException::Rpc(e.to_string())
}

/// JSON-RPC backed environment (anvil, hardhat, geth --dev)
pub struct RpcEnvironment {
    provider: Provider<Http>,
    rpc_url: String,
    logger: Logger,
}

impl RpcEnvironment {
    pub fn new(rpc_url: &str, logger: Logger) -> SolopticResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| SolopticException::Rpc(format!("invalid RPC url {}: {}", rpc_url, e)))?
            .interval(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS));
        Ok(Self {
            provider,
            rpc_url: rpc_url.to_string(),
            logger,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn first_account(&self) -> SolopticResult<Address> {
        let accounts = self
            .provider
            .get_accounts()
            .await
            .map_err(|e| SolopticException::Deploy(format!("eth_accounts failed: {}", e)))?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| SolopticException::Deploy("no accounts available on node".to_string()))
    }

    async fn wait_for_receipt(
        &self,
        hash: H256,
        timeout: Duration,
    ) -> SolopticResult<Option<TransactionReceipt>> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {}
                    Err(e) => return Err(rpc_error(e)),
                }
                tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(Ok(receipt)) => Ok(Some(receipt)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn send(&self, tx: TransactionRequest) -> SolopticResult<H256> {
        let pending = self
            .provider
            .send_transaction(tx, None)
            .await
            .map_err(rpc_error)?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl ExecutionEnvironment for RpcEnvironment {
    async fn deploy(
        &self,
        contract: &CompiledContract,
        overrides: &InvokeOverrides,
    ) -> SolopticResult<DeployedContract> {
        let caller = self.first_account().await?;
        let code = contract.creation_code()?;

        let tx = TransactionRequest::new()
            .from(caller)
            .data(code)
            .gas(overrides.gas_limit)
            .value(U256::from(overrides.value_wei));
        let hash = self
            .send(tx)
            .await
            .map_err(|e| SolopticException::Deploy(e.to_string()))?;

        let receipt = self
            .wait_for_receipt(hash, overrides.receipt_timeout)
            .await
            .map_err(|e| SolopticException::Deploy(e.to_string()))?
            .ok_or_else(|| SolopticException::Deploy("no deployment receipt".to_string()))?;

        if receipt.status.map(|s| s.as_u64()) == Some(0) {
            return Err(SolopticException::Deploy(format!(
                "constructor of {} reverted",
                contract.contract_name
            )));
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| SolopticException::Deploy("receipt has no contract address".to_string()))?;

        self.logger.info(&format!(
            "deployed {} at {:?} from {:?}",
            contract.contract_name, address, caller
        ));

        Ok(DeployedContract {
            address: address.0,
            caller: caller.0,
            transaction_id: hash.0,
        })
    }

    async fn invoke(
        &self,
        target: &DeployedContract,
        calldata: Vec<u8>,
        overrides: &InvokeOverrides,
    ) -> SolopticResult<Option<InvocationReceipt>> {
        let tx = TransactionRequest::new()
            .from(Address::from(target.caller))
            .to(Address::from(target.address))
            .data(calldata)
            .gas(overrides.gas_limit)
            .value(U256::from(overrides.value_wei));

        let hash = self.send(tx).await?;
        let Some(receipt) = self.wait_for_receipt(hash, overrides.receipt_timeout).await? else {
            return Ok(None);
        };

        let status = match receipt.status.map(|s| s.as_u64()) {
            Some(0) => InvocationStatus::Reverted,
            _ => InvocationStatus::Success,
        };
        let cost = receipt.gas_used.map(|g| g.low_u64()).unwrap_or(0);

        Ok(Some(InvocationReceipt {
            status,
            cost,
            transaction_id: format_tx_hash(&hash),
        }))
    }

    async fn trace(&self, transaction_id: &str) -> SolopticResult<ExecutionTrace> {
        let hash = parse_tx_hash(transaction_id)?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| SolopticException::TraceUnavailable {
                tx_id: transaction_id.to_string(),
                reason: e.to_string(),
            })?;
        if receipt.is_none() {
            return Err(SolopticException::TraceNotMined {
                tx_id: transaction_id.to_string(),
            });
        }

        let options = json!({
            "disableStorage": true,
            "disableStack": true,
            "enableMemory": false,
        });
        let raw: serde_json::Value = self
            .provider
            .request("debug_traceTransaction", (hash, options))
            .await
            .map_err(|e| SolopticException::TraceUnavailable {
                tx_id: transaction_id.to_string(),
                reason: e.to_string(),
            })?;

        if raw.is_null() {
            return Err(SolopticException::TraceUnavailable {
                tx_id: transaction_id.to_string(),
                reason: "debug_traceTransaction returned null".to_string(),
            });
        }

        let trace = ExecutionTrace::from_json(&raw)?;
        self.logger
            .debug(&format!("trace {}: {} steps", transaction_id, trace.steps.len()));
        Ok(trace)
    }
}
