// SPDX-License-Identifier: AGPL-3.0

//! Configuration management for SolOptic
//!
//! Values come from the command line, an optional `soloptic.toml` and the
//! environment (after `.env` loading). The command line wins over the file.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use soloptic_constants::{
    DEFAULT_GAS_LIMIT, DEFAULT_OPTIMIZER_RUNS, DEFAULT_RPC_URL, DEFAULT_SOLC,
    FUZZ_DEFAULT_RUNS, SEED_DEPOSIT_WEI, TRACE_MAX_ATTEMPTS,
};
use soloptic_fuzzer::{FuzzConfig, TraceRetryPolicy};
use soloptic_mapper::EmptyFieldPolicy;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the config file looked up next to the working directory
pub const CONFIG_FILE_NAME: &str = "soloptic.toml";

/// What a run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Compile, deploy, fuzz every entry point and build the heatmap
    Fuzz,
    CompileOnly,
    /// Profile one existing transaction against the compiled source
    ProfileTx(String),
    /// Build the heatmap from a saved report
    FromReport(PathBuf),
}

#[derive(Debug, Clone, Parser, Serialize)]
#[clap(
    name = "soloptic",
    version,
    about = "Per-line gas profiler for Solidity contracts",
    after_help = "Values from soloptic.toml are replaced only by command-line values that \
differ from the built-in defaults. Passing a default value explicitly keeps the file's value."
)]
pub struct Config {
    /// Solidity source file
    pub source: Option<PathBuf>,

    /// Path to the config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Profile the named contract instead of the first deployable one
    #[clap(long)]
    pub contract: Option<String>,

    // === Chain ===
    /// JSON-RPC endpoint of a development node with debug tracing enabled
    #[clap(long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Gas ceiling sent with every invocation
    #[clap(long, default_value_t = DEFAULT_GAS_LIMIT)]
    pub gas_limit: u64,

    /// How long to wait for a receipt (e.g. 500ms, 10s)
    #[clap(long, default_value = "10s")]
    pub receipt_timeout: String,

    // === Fuzzing ===
    #[clap(long, default_value_t = FUZZ_DEFAULT_RUNS)]
    pub runs_per_function: usize,

    /// Seed for argument synthesis; runs with the same seed send the same calls
    #[clap(long)]
    pub seed: Option<u64>,

    #[clap(long, default_value_t = TRACE_MAX_ATTEMPTS)]
    pub trace_attempts: u32,

    #[clap(long, default_value = "50ms")]
    pub trace_settle_delay: String,

    #[clap(long, default_value = "500ms")]
    pub trace_pending_delay: String,

    #[clap(long, default_value = "1s")]
    pub trace_retry_delay: String,

    // === Compiler ===
    /// solc binary
    #[clap(long, env = "SOLC", default_value = DEFAULT_SOLC)]
    pub solc: String,

    #[clap(long)]
    pub optimize: bool,

    #[clap(long, default_value_t = DEFAULT_OPTIMIZER_RUNS)]
    pub optimizer_runs: u32,

    /// Empty source map fields inherit the previous record's value
    #[clap(long)]
    pub source_map_inherit: bool,

    // === Modes ===
    /// Compile and print the artifact summary, without touching a node
    #[clap(long, conflicts_with_all = ["profile_tx", "from_report"])]
    pub compile_only: bool,

    /// Profile one mined transaction
    #[clap(long, value_name = "HASH", conflicts_with = "from_report")]
    pub profile_tx: Option<String>,

    /// Build the heatmap from a saved contract report
    #[clap(long, value_name = "PATH")]
    pub from_report: Option<PathBuf>,

    // === Outputs ===
    /// Write the heatmap as JSON
    #[clap(long)]
    pub json_output: Option<PathBuf>,

    /// Write the raw contract report as JSON
    #[clap(long)]
    pub report_output: Option<PathBuf>,

    /// Print every replayed step in --profile-tx mode, or the runtime
    /// disassembly in --compile-only mode
    #[clap(long)]
    pub print_steps: bool,

    // === Diagnostics ===
    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[clap(long)]
    pub log_json: bool,

    /// Disable the progress spinner
    #[clap(long)]
    pub no_status: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            config: None,
            contract: None,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: "10s".to_string(),
            runs_per_function: FUZZ_DEFAULT_RUNS,
            seed: None,
            trace_attempts: TRACE_MAX_ATTEMPTS,
            trace_settle_delay: "50ms".to_string(),
            trace_pending_delay: "500ms".to_string(),
            trace_retry_delay: "1s".to_string(),
            solc: DEFAULT_SOLC.to_string(),
            optimize: false,
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            source_map_inherit: false,
            compile_only: false,
            profile_tx: None,
            from_report: None,
            json_output: None,
            report_output: None,
            print_steps: false,
            verbose: 0,
            log_json: false,
            no_status: false,
        }
    }
}

impl Config {
    /// Parse the process arguments and fold in the config file
    pub fn load() -> Result<Self> {
        Self::load_from(env::args_os())
    }

    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Config::try_parse_from(args)?;
        let cwd = env::current_dir().context("Failed to read current directory")?;

        match cli.resolve_config_path(&cwd) {
            Some(path) => {
                let mut config = Config::from_file(&path)?;
                config.merge(cli);
                Ok(config)
            }
            None => Ok(cli),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let parsed: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        parsed.to_config()
    }

    /// Explicit `--config`, else `soloptic.toml` in `base` if present
    pub fn resolve_config_path(&self, base: &Path) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            return Some(config.clone());
        }
        let default_path = base.join(CONFIG_FILE_NAME);
        default_path.is_file().then_some(default_path)
    }

    /// Merge with another configuration (its non-default values win)
    pub fn merge(&mut self, other: Self) {
        let defaults = Config::default();

        if other.source.is_some() {
            self.source = other.source;
        }
        if other.config.is_some() {
            self.config = other.config;
        }
        if other.contract.is_some() {
            self.contract = other.contract;
        }
        if other.rpc_url != defaults.rpc_url {
            self.rpc_url = other.rpc_url;
        }
        if other.gas_limit != defaults.gas_limit {
            self.gas_limit = other.gas_limit;
        }
        if other.receipt_timeout != defaults.receipt_timeout {
            self.receipt_timeout = other.receipt_timeout;
        }
        if other.runs_per_function != defaults.runs_per_function {
            self.runs_per_function = other.runs_per_function;
        }
        if other.seed.is_some() {
            self.seed = other.seed;
        }
        if other.trace_attempts != defaults.trace_attempts {
            self.trace_attempts = other.trace_attempts;
        }
        if other.trace_settle_delay != defaults.trace_settle_delay {
            self.trace_settle_delay = other.trace_settle_delay;
        }
        if other.trace_pending_delay != defaults.trace_pending_delay {
            self.trace_pending_delay = other.trace_pending_delay;
        }
        if other.trace_retry_delay != defaults.trace_retry_delay {
            self.trace_retry_delay = other.trace_retry_delay;
        }
        if other.solc != defaults.solc {
            self.solc = other.solc;
        }
        if other.optimizer_runs != defaults.optimizer_runs {
            self.optimizer_runs = other.optimizer_runs;
        }
        if other.profile_tx.is_some() {
            self.profile_tx = other.profile_tx;
        }
        if other.from_report.is_some() {
            self.from_report = other.from_report;
        }
        if other.json_output.is_some() {
            self.json_output = other.json_output;
        }
        if other.report_output.is_some() {
            self.report_output = other.report_output;
        }
        if other.verbose > 0 {
            self.verbose = other.verbose;
        }

        self.optimize |= other.optimize;
        self.source_map_inherit |= other.source_map_inherit;
        self.compile_only |= other.compile_only;
        self.print_steps |= other.print_steps;
        self.log_json |= other.log_json;
        self.no_status |= other.no_status;
    }

    pub fn mode(&self) -> Result<Mode> {
        let selected = [
            self.compile_only,
            self.profile_tx.is_some(),
            self.from_report.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if selected > 1 {
            anyhow::bail!("--compile-only, --profile-tx and --from-report are mutually exclusive");
        }

        if let Some(tx) = &self.profile_tx {
            return Ok(Mode::ProfileTx(tx.clone()));
        }
        if let Some(path) = &self.from_report {
            return Ok(Mode::FromReport(path.clone()));
        }
        if self.compile_only {
            return Ok(Mode::CompileOnly);
        }
        Ok(Mode::Fuzz)
    }

    /// The Solidity source; every mode needs one
    pub fn source_path(&self) -> Result<&Path> {
        self.source
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No Solidity source file given"))
    }

    pub fn source_map_policy(&self) -> EmptyFieldPolicy {
        if self.source_map_inherit {
            EmptyFieldPolicy::InheritPrevious
        } else {
            EmptyFieldPolicy::Absent
        }
    }

    pub fn receipt_timeout(&self) -> Result<Duration> {
        parse_duration(&self.receipt_timeout, "receipt-timeout")
    }

    pub fn trace_policy(&self) -> Result<TraceRetryPolicy> {
        Ok(TraceRetryPolicy {
            max_attempts: self.trace_attempts.max(1),
            settle_delay: parse_duration(&self.trace_settle_delay, "trace-settle-delay")?,
            pending_delay: parse_duration(&self.trace_pending_delay, "trace-pending-delay")?,
            retry_delay: parse_duration(&self.trace_retry_delay, "trace-retry-delay")?,
        })
    }

    pub fn fuzz_config(&self) -> Result<FuzzConfig> {
        Ok(FuzzConfig {
            runs_per_function: self.runs_per_function,
            gas_limit: self.gas_limit,
            receipt_timeout: self.receipt_timeout()?,
            seed_deposit_wei: SEED_DEPOSIT_WEI,
            trace_policy: self.trace_policy()?,
            source_map_policy: self.source_map_policy(),
        })
    }
}

fn parse_duration(value: &str, option: &str) -> Result<Duration> {
    let ms = parse_time(value, "ms").with_context(|| format!("Invalid --{}: {:?}", option, value))?;
    Ok(Duration::from_millis(ms))
}

/// TOML configuration structure (for parsing from file)
#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    global: HashMap<String, toml::Value>,
}

impl TomlConfig {
    fn to_config(self) -> Result<Config> {
        let mut config = Config::default();

        for (key, value) in self.global {
            let key = key.replace('-', "_");

            match key.as_str() {
                "source" => config.source = Some(parse_toml_path(&value)?),
                "contract" => config.contract = Some(parse_toml_string(&value)?),
                "rpc_url" => config.rpc_url = parse_toml_string(&value)?,
                "gas_limit" => config.gas_limit = parse_toml_u64(&value)?,
                "receipt_timeout" => config.receipt_timeout = parse_toml_time(&value)?,
                "runs_per_function" | "runs" => {
                    config.runs_per_function = parse_toml_u64(&value)? as usize
                }
                "seed" => config.seed = Some(parse_toml_u64(&value)?),
                "trace_attempts" => {
                    config.trace_attempts = u32::try_from(parse_toml_u64(&value)?)
                        .context("trace-attempts out of range")?
                }
                "trace_settle_delay" => config.trace_settle_delay = parse_toml_time(&value)?,
                "trace_pending_delay" => config.trace_pending_delay = parse_toml_time(&value)?,
                "trace_retry_delay" => config.trace_retry_delay = parse_toml_time(&value)?,
                "solc" => config.solc = parse_toml_string(&value)?,
                "optimize" => config.optimize = parse_toml_bool(&value)?,
                "optimizer_runs" => {
                    config.optimizer_runs = u32::try_from(parse_toml_u64(&value)?)
                        .context("optimizer-runs out of range")?
                }
                "source_map_inherit" => config.source_map_inherit = parse_toml_bool(&value)?,
                "json_output" => config.json_output = Some(parse_toml_path(&value)?),
                "report_output" => config.report_output = Some(parse_toml_path(&value)?),
                "print_steps" => config.print_steps = parse_toml_bool(&value)?,
                "verbose" => {
                    config.verbose =
                        u8::try_from(parse_toml_u64(&value)?).context("verbose out of range")?
                }
                "log_json" => config.log_json = parse_toml_bool(&value)?,
                "no_status" => config.no_status = parse_toml_bool(&value)?,
                _ => {
                    // Ignore unknown fields (allows forward compatibility)
                }
            }
        }

        Ok(config)
    }
}

// TOML parsing helpers
fn parse_toml_string(value: &toml::Value) -> Result<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Expected string, got {:?}", value))
}

fn parse_toml_bool(value: &toml::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow::anyhow!("Expected bool, got {:?}", value))
}

fn parse_toml_u64(value: &toml::Value) -> Result<u64> {
    value
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| anyhow::anyhow!("Expected unsigned integer, got {:?}", value))
}

fn parse_toml_path(value: &toml::Value) -> Result<PathBuf> {
    parse_toml_string(value).map(PathBuf::from)
}

/// Durations may be written as strings ("500ms") or bare milliseconds
fn parse_toml_time(value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::Integer(ms) if *ms >= 0 => Ok(format!("{}ms", ms)),
        toml::Value::String(s) => {
            parse_time(s, "ms")?;
            Ok(s.clone())
        }
        _ => Err(anyhow::anyhow!("Expected duration, got {:?}", value)),
    }
}

/// Parse time string with unit support
/// Supports: "100ms", "5s", "2m", "1h", or plain numbers (default_unit)
pub fn parse_time(time_str: &str, default_unit: &str) -> Result<u64> {
    let time_str = time_str.trim();

    if let Some(num_str) = time_str.strip_suffix("ms") {
        return Ok(num_str.trim().parse::<u64>()?);
    }
    if let Some(num_str) = time_str.strip_suffix('s') {
        return Ok(num_str.trim().parse::<u64>()? * 1000);
    }
    if let Some(num_str) = time_str.strip_suffix('m') {
        return Ok(num_str.trim().parse::<u64>()? * 60 * 1000);
    }
    if let Some(num_str) = time_str.strip_suffix('h') {
        return Ok(num_str.trim().parse::<u64>()? * 60 * 60 * 1000);
    }

    let value = time_str.parse::<u64>()?;
    match default_unit {
        "ms" => Ok(value),
        "s" => Ok(value * 1000),
        "m" => Ok(value * 60 * 1000),
        "h" => Ok(value * 60 * 60 * 1000),
        _ => Err(anyhow::anyhow!("Invalid default unit: {}", default_unit)),
    }
}

/// Load a `.env` file into the process environment.
///
/// Without an explicit path the working directory and its parents are searched.
/// Returns the file that was loaded, if any.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let env_file = match path {
        Some(p) if p.is_dir() => p.join(".env"),
        Some(p) => p.to_path_buf(),
        None => match find_dotenv() {
            Some(found) => found,
            None => return Ok(None),
        },
    };

    if !env_file.is_file() {
        return Ok(None);
    }

    dotenv::from_path(&env_file)
        .with_context(|| format!("error loading {}", env_file.display()))?;
    Ok(Some(env_file))
}

/// Find .env file by walking up directory tree
fn find_dotenv() -> Option<PathBuf> {
    let mut current = env::current_dir().ok()?;

    loop {
        let candidate = current.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("soloptic").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runs_per_function, 200);
        assert_eq!(config.gas_limit, 10_000_000);
        assert_eq!(config.mode().unwrap(), Mode::Fuzz);
        assert_eq!(config.source_map_policy(), EmptyFieldPolicy::Absent);
    }

    #[test]
    fn test_cli_defaults_match_default() {
        let config = parse(&["Vault.sol"]);
        let defaults = Config::default();
        assert_eq!(config.source, Some(PathBuf::from("Vault.sol")));
        assert_eq!(config.gas_limit, defaults.gas_limit);
        assert_eq!(config.receipt_timeout, defaults.receipt_timeout);
        assert_eq!(config.trace_retry_delay, defaults.trace_retry_delay);
        assert_eq!(config.optimizer_runs, defaults.optimizer_runs);
    }

    #[test]
    fn test_help_describes_file_precedence() {
        use clap::CommandFactory;

        let rendered = Config::command().render_long_help().to_string();
        let help = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(help.contains(CONFIG_FILE_NAME));
        assert!(help.contains("built-in defaults"));
    }

    #[test]
    fn test_cli_options() {
        let config = parse(&[
            "Vault.sol",
            "--runs-per-function",
            "5",
            "--seed",
            "42",
            "--source-map-inherit",
            "-vv",
            "--profile-tx",
            "0xabc",
        ]);
        assert_eq!(config.runs_per_function, 5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.verbose, 2);
        assert_eq!(config.source_map_policy(), EmptyFieldPolicy::InheritPrevious);
        assert_eq!(config.mode().unwrap(), Mode::ProfileTx("0xabc".to_string()));
    }

    #[test]
    fn test_conflicting_modes_rejected() {
        let result = Config::try_parse_from([
            "soloptic",
            "Vault.sol",
            "--compile-only",
            "--from-report",
            "r.json",
        ]);
        assert!(result.is_err());

        let mut config = Config::default();
        config.compile_only = true;
        config.profile_tx = Some("0x1".into());
        assert!(config.mode().is_err());
    }

    #[test]
    fn test_fuzz_config() {
        let config = parse(&[
            "Vault.sol",
            "--receipt-timeout",
            "2s",
            "--trace-attempts",
            "0",
            "--trace-retry-delay",
            "250",
        ]);
        let fuzz = config.fuzz_config().unwrap();
        assert_eq!(fuzz.receipt_timeout, Duration::from_secs(2));
        assert_eq!(fuzz.trace_policy.max_attempts, 1);
        assert_eq!(fuzz.trace_policy.retry_delay, Duration::from_millis(250));
        assert_eq!(fuzz.trace_policy.settle_delay, Duration::from_millis(50));
        assert_eq!(fuzz.seed_deposit_wei, SEED_DEPOSIT_WEI);
    }

    #[test]
    fn test_invalid_duration() {
        let config = parse(&["Vault.sol", "--receipt-timeout", "soon"]);
        let err = config.fuzz_config().unwrap_err();
        assert!(err.to_string().contains("receipt-timeout"));
    }

    #[test]
    fn test_from_file_and_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[global]\nrpc-url = \"http://node:8545\"\nruns_per_function = 50\nsolc = \"solc-0.8.24\"\ntrace-retry-delay = 2000\noptimize = true\nunknown-key = 1"
        )
        .unwrap();

        let mut config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.runs_per_function, 50);
        assert_eq!(config.trace_retry_delay, "2000ms");
        assert!(config.optimize);

        config.merge(parse(&["Vault.sol", "--runs-per-function", "7"]));
        assert_eq!(config.runs_per_function, 7);
        assert_eq!(config.solc, "solc-0.8.24");
        assert_eq!(config.rpc_url, "http://node:8545");
        assert_eq!(config.source, Some(PathBuf::from("Vault.sol")));
        assert!(config.optimize);
    }

    #[test]
    fn test_from_file_rejects_bad_types() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[global]\nruns-per-function = \"many\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_resolve_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        assert_eq!(config.resolve_config_path(dir.path()), None);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[global]\n").unwrap();
        assert_eq!(
            config.resolve_config_path(dir.path()),
            Some(dir.path().join(CONFIG_FILE_NAME))
        );
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("100ms", "ms").unwrap(), 100);
        assert_eq!(parse_time("5s", "ms").unwrap(), 5000);
        assert_eq!(parse_time("2m", "ms").unwrap(), 120000);
        assert_eq!(parse_time("1h", "ms").unwrap(), 3600000);
        assert_eq!(parse_time("100", "ms").unwrap(), 100);
        assert_eq!(parse_time("5", "s").unwrap(), 5000);
        assert!(parse_time("fast", "ms").is_err());
    }

    #[test]
    fn test_load_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "SOLOPTIC_TEST_DOTENV=loaded\n").unwrap();

        let loaded = load_dotenv(Some(dir.path())).unwrap();
        assert_eq!(loaded, Some(dir.path().join(".env")));
        assert_eq!(env::var("SOLOPTIC_TEST_DOTENV").unwrap(), "loaded");

        let missing = load_dotenv(Some(&dir.path().join("nope.env"))).unwrap();
        assert_eq!(missing, None);
    }
}
