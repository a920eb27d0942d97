// SPDX-License-Identifier: AGPL-3.0

//! Solidity compilation and artifact loading
//!
//! Drives `solc --standard-json` for a single source unit and turns its output
//! into a [`CompiledContract`].

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use soloptic_abi::{parse_abi, AbiFunction};
use soloptic_bytecode::decode_hex;
use soloptic_constants::{DEFAULT_OPTIMIZER_RUNS, DEFAULT_SOLC, SOURCE_UNIT_NAME};
use soloptic_exceptions::{CompilationError, DecodeError, SolopticException, SolopticResult};
use soloptic_logs::{ErrorCode, Logger};
use soloptic_mapper::{build_pc_line_map, EmptyFieldPolicy, PcLineMap};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Standard JSON output, restricted to what we read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolcOutput {
    #[serde(default)]
    pub errors: Vec<SolcDiagnostic>,
    /// source unit -> contract name -> contract
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, SolcContract>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcDiagnostic {
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl SolcDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    pub fn text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolcContract {
    #[serde(default)]
    pub abi: JsonValue,
    #[serde(default)]
    pub evm: EvmOutput,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmOutput {
    #[serde(default)]
    pub bytecode: BytecodeInfo,
    #[serde(default)]
    pub deployed_bytecode: BytecodeInfo,
    #[serde(default)]
    pub method_identifiers: BTreeMap<String, String>,
}

/// Bytecode information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BytecodeInfo {
    #[serde(default)]
    pub object: String,
    #[serde(rename = "sourceMap")]
    pub source_map: Option<String>,
    #[serde(rename = "linkReferences")]
    pub link_references: Option<HashMap<String, HashMap<String, Vec<LinkReference>>>>,
}

impl BytecodeInfo {
    pub fn has_unlinked_libraries(&self) -> bool {
        self.link_references
            .as_ref()
            .is_some_and(|refs| refs.values().any(|libs| !libs.is_empty()))
    }
}

/// Link reference for library linking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkReference {
    pub start: usize,
    pub length: usize,
}

/// One compiled contract, ready to deploy and map
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledContract {
    pub contract_name: String,
    pub abi: JsonValue,
    /// Creation code, hex without prefix
    pub bytecode: String,
    /// Runtime code, hex without prefix
    pub deployed_bytecode: String,
    pub runtime_source_map: Option<String>,
    pub method_identifiers: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    /// Source text every position-map offset refers to
    #[serde(skip)]
    pub source: String,
}

impl CompiledContract {
    pub fn functions(&self) -> SolopticResult<Vec<AbiFunction>> {
        parse_abi(&self.abi)
    }

    pub fn creation_code(&self) -> Result<Vec<u8>, DecodeError> {
        decode_hex(&self.bytecode)
    }

    /// Program counter to line map of the runtime code
    pub fn pc_line_map(&self, policy: EmptyFieldPolicy) -> SolopticResult<PcLineMap> {
        build_pc_line_map(
            self.runtime_source_map.as_deref(),
            Some(&self.deployed_bytecode),
            &self.source,
            policy,
        )
    }
}

/// Source-to-bytecode compiler
pub trait Compiler {
    /// Compile one source text. `contract` selects a contract by name.
    fn compile(&self, source: &str, contract: Option<&str>) -> SolopticResult<CompiledContract>;
}

/// Remove markdown code fences around pasted source
pub fn strip_markdown_fences(source: &str) -> String {
    source.replace("```solidity", "").replace("```", "")
}

/// Standard JSON input for a single source unit
pub fn standard_json_input(source: &str, optimize: bool, runs: u32) -> JsonValue {
    json!({
        "language": "Solidity",
        "sources": {
            SOURCE_UNIT_NAME: { "content": source }
        },
        "settings": {
            "optimizer": { "enabled": optimize, "runs": runs },
            "outputSelection": {
                "*": {
                    "*": [
                        "abi",
                        "evm.bytecode",
                        "evm.deployedBytecode",
                        "evm.methodIdentifiers",
                        "metadata"
                    ]
                }
            }
        }
    })
}

fn is_deployable(contract: &SolcContract) -> bool {
    !contract.evm.deployed_bytecode.object.trim().is_empty()
}

/// Turn standard JSON output into a compiled contract.
///
/// Diagnostics with severity `error` become a [`CompilationError`] with every
/// message verbatim. Without `contract`, the first contract with runtime code
/// is selected.
pub fn parse_standard_json_output(
    output: &str,
    source: &str,
    contract: Option<&str>,
) -> SolopticResult<CompiledContract> {
    let output: SolcOutput = serde_json::from_str(output)
        .map_err(|e| CompilationError::new(format!("unreadable compiler output: {}", e)))?;

    let errors: Vec<&str> = output
        .errors
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.text())
        .collect();
    if !errors.is_empty() {
        return Err(CompilationError::new(errors.join("\n")).into());
    }

    let warnings: Vec<String> = output
        .errors
        .iter()
        .filter(|d| !d.is_error())
        .map(|d| d.text().to_string())
        .collect();

    let unit = output
        .contracts
        .get(SOURCE_UNIT_NAME)
        .ok_or_else(|| CompilationError::new(format!("no contracts in {}", SOURCE_UNIT_NAME)))?;

    let (name, selected) = match contract {
        Some(wanted) => unit.get_key_value(wanted).ok_or_else(|| {
            CompilationError::new(format!("contract {} not found in {}", wanted, SOURCE_UNIT_NAME))
        })?,
        None => unit.iter().find(|(_, c)| is_deployable(c)).ok_or_else(|| {
            CompilationError::new(format!("no deployable contract in {}", SOURCE_UNIT_NAME))
        })?,
    };

    if selected.evm.bytecode.has_unlinked_libraries()
        || selected.evm.deployed_bytecode.has_unlinked_libraries()
    {
        return Err(SolopticException::Unsupported(format!(
            "{} links external libraries\n(see {})",
            name,
            ErrorCode::LibraryPlaceholder.url()
        )));
    }

    Ok(CompiledContract {
        contract_name: name.clone(),
        abi: selected.abi.clone(),
        bytecode: selected.evm.bytecode.object.clone(),
        deployed_bytecode: selected.evm.deployed_bytecode.object.clone(),
        runtime_source_map: selected.evm.deployed_bytecode.source_map.clone(),
        method_identifiers: selected.evm.method_identifiers.clone(),
        warnings,
        source: source.to_string(),
    })
}

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Version: ([0-9]+\.[0-9]+\.[0-9]+)").unwrap());

/// Compiler version reported by `solc --version`
pub fn parse_solc_version(output: &str) -> Option<String> {
    VERSION_RE.captures(output).map(|caps| caps[1].to_string())
}

/// `solc` binary driven through standard JSON on stdin
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    pub binary: String,
    pub optimize: bool,
    pub optimizer_runs: u32,
    logger: Logger,
}

impl SolcCompiler {
    pub fn new(binary: &str, logger: Logger) -> Self {
        Self {
            binary: binary.to_string(),
            optimize: false,
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            logger,
        }
    }

    pub fn with_optimizer(mut self, enabled: bool, runs: u32) -> Self {
        self.optimize = enabled;
        self.optimizer_runs = runs;
        self
    }

    pub fn version(&self) -> SolopticResult<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| SolopticException::Internal(format!("failed to run {}: {}", self.binary, e)))?;
        let text = String::from_utf8_lossy(&output.stdout);
        parse_solc_version(&text).ok_or_else(|| {
            SolopticException::Internal(format!("unrecognized {} --version output", self.binary))
        })
    }

    fn run_standard_json(&self, input: &JsonValue) -> SolopticResult<String> {
        let mut child = Command::new(&self.binary)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SolopticException::Internal(format!("failed to run {}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.to_string().as_bytes())
                .map_err(|e| SolopticException::Internal(format!("failed to write to solc: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| SolopticException::Internal(format!("solc did not finish: {}", e)))?;

        if !output.status.success() && output.stdout.is_empty() {
            return Err(CompilationError::new(String::from_utf8_lossy(&output.stderr).trim()).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for SolcCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_SOLC, Logger::new("compiler"))
    }
}

impl Compiler for SolcCompiler {
    fn compile(&self, source: &str, contract: Option<&str>) -> SolopticResult<CompiledContract> {
        let source = strip_markdown_fences(source);
        let input = standard_json_input(&source, self.optimize, self.optimizer_runs);

        self.logger.debug(&format!(
            "compiling {} ({} bytes) with {}",
            SOURCE_UNIT_NAME,
            source.len(),
            self.binary
        ));
        let output = self.run_standard_json(&input)?;
        let compiled = parse_standard_json_output(&output, &source, contract)?;

        if !compiled.warnings.is_empty() {
            self.logger.warn_code(
                ErrorCode::CompilerWarning,
                &format!("Compiler warnings:\n{}", compiled.warnings.join("\n")),
                false,
            );
        }
        self.logger.info(&format!(
            "compiled {}: {} runtime bytes, {} source map records",
            compiled.contract_name,
            compiled.deployed_bytecode.len() / 2,
            compiled
                .runtime_source_map
                .as_deref()
                .map_or(0, |m| m.split(';').count())
        ));

        Ok(compiled)
    }
}

/// Read a source file from disk
pub fn read_source_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file {}", path.display()))
}
