// SPDX-License-Identifier: AGPL-3.0

/// First and last push-immediate opcodes (PUSH1..PUSH32)
pub const PUSH1: u8 = 0x60;
pub const PUSH32: u8 = 0x7f;

/// Line value for a program counter with no source position
pub const UNMAPPED_LINE: i64 = -1;

/// Number of entries kept in a profile's top-lines summary
pub const TOP_LINES_LIMIT: usize = 20;

/// Fuzzing defaults
pub const FUZZ_DEFAULT_RUNS: usize = 200;
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;
pub const RECEIPT_TIMEOUT_MS: u64 = 10_000;

/// Trace retrieval
pub const TRACE_MAX_ATTEMPTS: u32 = 3;
pub const TRACE_SETTLE_DELAY_MS: u64 = 50;
pub const TRACE_PENDING_DELAY_MS: u64 = 500;
pub const TRACE_RETRY_DELAY_MS: u64 = 1_000;

/// Heatmap severity thresholds, evaluated on share of total cost
pub const SEVERITY_HIGH_SHARE: f64 = 0.40;
pub const SEVERITY_MEDIUM_SHARE: f64 = 0.10;

/// Decimal places kept for a displayed share
pub const SHARE_DECIMALS: i32 = 5;

/// Wei amounts
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
pub const SEED_DEPOSIT_WEI: u128 = 10 * WEI_PER_ETHER;
pub const MAX_PAYABLE_WEI: u128 = WEI_PER_ETHER;
/// Payable values are drawn in steps of 10^-4 ether
pub const PAYABLE_STEP_WEI: u128 = WEI_PER_ETHER / 10_000;

/// Argument synthesis
pub const RANDOM_UINT_BOUND: u64 = 1000;
pub const RANDOM_BYTES_LEN: usize = 4;
pub const RANDOM_STRING_PREFIX: &str = "s_";
pub const RANDOM_STRING_LEN: usize = 8;

/// Name fragments for the state-seeding and withdrawal heuristics
pub const SEED_FUNCTION_NAME: &str = "deposit";
pub const WITHDRAW_NAME_FRAGMENT: &str = "withdraw";

/// Compilation
pub const SOURCE_UNIT_NAME: &str = "UserContract.sol";
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;
pub const DEFAULT_SOLC: &str = "solc";

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
