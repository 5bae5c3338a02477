//! Delegating party command handlers

use super::{bench, print_vector, with_engine};
use crate::ClientAction;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tracing::info;
use veil_engine::ConfidentialityEngine;
use veil_protocol::{check_domain, result_to_linear, DelegatingParty, DelegationConfig, FsHandoff, Tolerance};
use veil_types::{ComputationRequest, OperandSlot, Operation};

const PREVIEW: usize = 10;

pub fn handle(action: ClientAction, config: &DelegationConfig) -> Result<()> {
    match action {
        ClientAction::Prepare { request, strict, run_id } => {
            let request = load_request(&request)?;
            if strict {
                check_domain(request.operation, &request.vector_a, &request.vector_b)?;
            }
            with_engine!(config, |engine| prepare(engine, config, request, run_id))
        }
        ClientAction::Verify { request, abs, digits, linear } => {
            let request = load_request(&request)?;
            with_engine!(config, |engine| {
                let tolerance = match (digits, abs) {
                    (Some(digits), _) => Tolerance::SignificantDigits(digits),
                    (None, Some(eps)) => Tolerance::Absolute(eps),
                    (None, None) => Tolerance::Absolute(engine.info().tolerance.max(1e-9)),
                };
                verify(engine, config, request, tolerance, linear)
            })
        }
        ClientAction::Bench { files } => {
            with_engine!(config, |engine| bench::client_bench(engine, config.batch_size, &files))
        }
    }
}

fn load_request(path: &Path) -> Result<ComputationRequest> {
    ComputationRequest::load(path)
        .with_context(|| format!("Failed to load request {}", path.display()))
}

fn prepare<E: ConfidentialityEngine>(
    engine: E,
    config: &DelegationConfig,
    request: ComputationRequest,
    run_id: Option<String>,
) -> Result<()> {
    let info = engine.info();
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                 Veil Client: Prepare                       ║");
    info!("╠════════════════════════════════════════════════════════════╣");
    info!("║  Backend:    {:^44} ║", info.backend.to_string());
    info!("║  Operation:  {:^44} ║", request.operation.to_string());
    info!("║  Length:     {:^44} ║", request.declared_length);
    info!("║  Base path:  {:^44} ║", config.paths.base_path);
    info!("╚════════════════════════════════════════════════════════════╝");
    if info.is_simulated {
        info!("⚠ Simulated backend: shares are not exchanged over a network");
    }

    println!("{} Preparing delegation...", "→".cyan().bold());
    let mut party = DelegatingParty::new(engine, FsHandoff::new(), config.paths.clone(), request)
        .with_load_context(config.load_context);
    if let Some(run_id) = run_id {
        party = party.with_run_id(run_id);
    }

    let descriptor = party.prepare_and_transfer()?.clone();
    if let Some(role) = party.role() {
        println!("  Role:       {}", role.to_string().cyan());
    }
    println!("  Run ID:     {}", party.run_id().cyan());
    println!("  Primitive:  {}", descriptor.primitive_operation.to_string().cyan());
    if let Some(location) = descriptor.operand_location(OperandSlot::A) {
        println!("  Operand A:  {}", location.cyan());
    }
    if let Some(location) = descriptor.operand_location(OperandSlot::B) {
        println!("  Operand B:  {}", location.cyan());
    }
    println!("  Descriptor: {}", config.paths.descriptor.cyan());
    println!("{} Operands handed off", "✓".green().bold());
    Ok(())
}

fn verify<E: ConfidentialityEngine>(
    engine: E,
    config: &DelegationConfig,
    request: ComputationRequest,
    tolerance: Tolerance,
    linear: bool,
) -> Result<()> {
    let operation = request.operation;
    println!("{} Retrieving result...", "→".cyan().bold());
    let mut party = DelegatingParty::resume(engine, FsHandoff::new(), config.paths.clone(), request)?;
    let result = party.retrieve()?.to_vec();
    let report = party.verify()?;

    print_vector("Result", &result, PREVIEW);
    if linear && operation == Operation::Exp {
        print_vector("Result (lin)", &result_to_linear(operation, &result), PREVIEW);
    }

    if report.is_empty() {
        println!("{} Result retrieved, no reference to compare", "✓".green().bold());
        return Ok(());
    }

    let reference = party
        .translation()
        .map(|t| t.reference.clone())
        .unwrap_or_default();
    let flagged = tolerance.flagged(&result, &reference);

    println!();
    println!("  {:>6}  {:>18}  {:>18}  {:>12}", "index", "result", "reference", "difference");
    for (i, diff) in report.differences.iter().enumerate().take(PREVIEW) {
        let line = format!(
            "  {:>6}  {:>18.9}  {:>18.9}  {:>12.3e}",
            i, result[i], reference[i], diff
        );
        if flagged.contains(&i) {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
    if report.len() > PREVIEW {
        println!("  ... {} more", report.len() - PREVIEW);
    }
    println!();

    if let (Some(max), Some(mean)) = (report.max_difference(), report.mean_difference()) {
        println!("  Max difference:  {}", format!("{max:.3e}").cyan());
        println!("  Mean difference: {}", format!("{mean:.3e}").cyan());
    }
    if flagged.is_empty() {
        println!(
            "{} All {} elements within {:?}",
            "✓".green().bold(),
            report.len(),
            tolerance
        );
    } else {
        println!(
            "{} {} of {} elements outside {:?}",
            "✗".red().bold(),
            flagged.len(),
            report.len(),
            tolerance
        );
    }
    Ok(())
}
