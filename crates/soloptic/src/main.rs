// SPDX-License-Identifier: AGPL-3.0

//! SolOptic - per-line gas profiling for Solidity contracts

use anyhow::{Context, Result};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use soloptic_build::{read_source_file, strip_markdown_fences, CompiledContract, Compiler, SolcCompiler};
use soloptic_bytecode::{decode_hex, disassemble};
use soloptic_chain::RpcEnvironment;
use soloptic_config::{load_dotenv, Config, Mode};
use soloptic_fuzzer::{fetch_trace, ContractReport, FuzzDriver};
use soloptic_hashes::selector_hex;
use soloptic_heatmap::{build_heatmap, render_heatmap, Heatmap};
use soloptic_logs::{init_tracing, Logger};
use soloptic_mapper::PcLineMap;
use soloptic_profiler::{profile_trace, LineCostProfile};
use soloptic_traces::render_steps;
use soloptic_ui::{Tone, UI};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

mod report;

use report::{Exitcode, MainResult};

#[tokio::main]
async fn main() {
    match _main().await {
        Ok(result) => std::process::exit(result.exitcode),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(Exitcode::Error as i32)
        }
    }
}

async fn _main() -> Result<MainResult> {
    let start_time = Instant::now();

    let dotenv = load_dotenv(None);
    let config = Config::load()?;

    init_tracing(config.verbose, config.log_json);
    let logger = Logger::new("soloptic");
    match dotenv {
        Ok(Some(path)) => logger.debug(&format!("loaded {}", path.display())),
        Ok(None) => {}
        Err(e) => logger.warn(&format!("{:#}", e)),
    }

    let ui = UI::new(!config.no_status && !config.log_json);

    let mut result = match config.mode()? {
        Mode::CompileOnly => run_compile_only(&config, &logger, &ui)?,
        Mode::ProfileTx(hash) => run_profile_tx(&config, &hash, &logger, &ui).await?,
        Mode::FromReport(path) => run_from_report(&config, &path, &ui)?,
        Mode::Fuzz => run_fuzz(&config, &logger, &ui).await?,
    };

    ui.stop_status();
    result.duration = start_time.elapsed();
    logger.debug(&format!(
        "finished in {}ms with exit code {}",
        result.duration.as_millis(),
        result.exitcode
    ));
    Ok(result)
}

/// Read the source and strip markdown fences; offsets refer to the stripped text
fn load_source(config: &Config) -> Result<String> {
    let raw = read_source_file(config.source_path()?)?;
    Ok(strip_markdown_fences(&raw))
}

fn compile(config: &Config, logger: &Logger, ui: &UI) -> Result<CompiledContract> {
    let source = load_source(config)?;
    ui.start_status(&format!("Compiling with {}...", config.solc));

    let compiler = SolcCompiler::new(&config.solc, logger.child("build"))
        .with_optimizer(config.optimize, config.optimizer_runs);
    match compiler.version() {
        Ok(version) => logger.info(&format!("using solc {}", version)),
        Err(e) => logger.warn(&e.to_string()),
    }
    let compiled = compiler.compile(&source, config.contract.as_deref());
    ui.stop_status();

    compiled.context("Compilation failed")
}

fn pc_line_map(config: &Config, compiled: &CompiledContract) -> Result<PcLineMap> {
    compiled
        .pc_line_map(config.source_map_policy())
        .with_context(|| format!("Cannot map bytecode of {}", compiled.contract_name))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn run_compile_only(config: &Config, logger: &Logger, ui: &UI) -> Result<MainResult> {
    let compiled = compile(config, logger, ui)?;
    let map = pc_line_map(config, &compiled)?;
    let functions = compiled.functions()?;

    ui.print(&format!(
        "{} {} ({} runtime bytes)",
        "Compiled".green().bold(),
        compiled.contract_name.cyan(),
        compiled.deployed_bytecode.len() / 2
    ));
    ui.print(&format!(
        "  {} instructions, {} mapped, {} unmapped",
        map.len(),
        map.mapped_count(),
        map.unmapped_count()
    ));
    for function in &functions {
        let signature = function.signature()?;
        ui.print(&format!(
            "  0x{}  {}{}",
            selector_hex(&signature),
            signature,
            if function.is_payable() { " payable" } else { "" }
        ));
    }
    for warning in &compiled.warnings {
        ui.print_styled(warning, Tone::Warning);
    }
    if config.print_steps {
        let code = decode_hex(&compiled.deployed_bytecode)?;
        ui.print(disassemble(&code)?.trim_end());
    }

    if let Some(path) = &config.json_output {
        write_json(path, &compiled)?;
    }

    let mut result = MainResult::for_contract(&compiled.contract_name);
    result.functions = functions.len();
    Ok(result)
}

async fn run_profile_tx(
    config: &Config,
    tx_hash: &str,
    logger: &Logger,
    ui: &UI,
) -> Result<MainResult> {
    let compiled = compile(config, logger, ui)?;
    let map = pc_line_map(config, &compiled)?;
    let env = RpcEnvironment::new(&config.rpc_url, logger.child("chain"))?;

    ui.start_status(&format!("Tracing {}...", tx_hash));
    let trace = fetch_trace(&env, tx_hash, &config.trace_policy()?, logger).await;
    ui.stop_status();
    let trace = trace.with_context(|| format!("Cannot trace {}", tx_hash))?;

    if config.print_steps {
        let mut stdout = io::stdout();
        render_steps(&trace, &|pc| map.line_for(pc), &mut stdout)?;
    }

    let profile = profile_trace(&trace, &map);
    logger.info(&format!(
        "{} steps: {} mapped, {} unmapped",
        trace.steps.len(),
        profile.mapped_steps,
        profile.unmapped_steps
    ));
    print_profile(&compiled, &profile, ui);

    if let Some(path) = &config.json_output {
        write_json(path, &profile)?;
    }

    let mut result = MainResult::for_contract(&compiled.contract_name);
    result.samples = 1;
    result.total_cost = profile.total_cost;
    Ok(result)
}

fn print_profile(compiled: &CompiledContract, profile: &LineCostProfile, ui: &UI) {
    let lines: Vec<&str> = compiled.source.split('\n').collect();

    ui.print(&format!(
        "{} {} (gas: {}, attributed: {})",
        "Profile".bold(),
        compiled.contract_name.cyan(),
        profile.total_cost,
        profile.mapped_cost()
    ));
    for entry in &profile.top_lines {
        let text = usize::try_from(entry.line)
            .ok()
            .and_then(|line| line.checked_sub(1))
            .and_then(|idx| lines.get(idx))
            .map_or("", |text| text.trim());
        ui.print(&format!("{:>6} {:>10}  {}", entry.line, entry.cost, text));
    }
}

fn run_from_report(config: &Config, report_path: &Path, ui: &UI) -> Result<MainResult> {
    let json = fs::read_to_string(report_path)
        .with_context(|| format!("Failed to read report {}", report_path.display()))?;
    let report = ContractReport::from_json(&json)
        .with_context(|| format!("Rejected report {}", report_path.display()))?;
    let source = load_source(config)?;

    let heatmap = build_heatmap(&report, &source);
    finish_heatmap(config, &report, &heatmap, ui)
}

async fn run_fuzz(config: &Config, logger: &Logger, ui: &UI) -> Result<MainResult> {
    let compiled = compile(config, logger, ui)?;
    let env = RpcEnvironment::new(&config.rpc_url, logger.child("chain"))?;
    let driver = FuzzDriver::new(env, config.fuzz_config()?, logger.child("fuzzer"));

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    ui.start_status(&format!(
        "Fuzzing {} ({} runs per function) on {}...",
        compiled.contract_name, config.runs_per_function, config.rpc_url
    ));
    let report = driver.fuzz_contract(&compiled, &mut rng).await;
    ui.stop_status();
    let report = report.with_context(|| format!("Fuzzing {} failed", compiled.contract_name))?;

    if let Some(path) = &config.report_output {
        write_json(path, &report)?;
    }

    let heatmap = build_heatmap(&report, &compiled.source);
    finish_heatmap(config, &report, &heatmap, ui)
}

fn finish_heatmap(
    config: &Config,
    report: &ContractReport,
    heatmap: &Heatmap,
    ui: &UI,
) -> Result<MainResult> {
    let mut rendered = Vec::new();
    render_heatmap(heatmap, &mut rendered)?;
    ui.print(String::from_utf8_lossy(&rendered).trim_end());

    if let Some(path) = &config.json_output {
        write_json(path, heatmap)?;
    }

    let samples: usize = report.functions.iter().map(|f| f.samples.len()).sum();
    let mut result = MainResult::for_contract(&report.name);
    result.functions = report.functions.len();
    result.samples = samples;
    result.total_cost = heatmap.summary.total_cost;

    if samples == 0 && !report.functions.is_empty() {
        ui.print_styled("No entry point produced a cost sample", Tone::Warning);
        result.exitcode = Exitcode::NoSamples as i32;
    }
    Ok(result)
}
