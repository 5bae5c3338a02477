//! Computing party command handlers

use super::{bench, with_engine};
use crate::ServerAction;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use veil_engine::ConfidentialityEngine;
use veil_protocol::{ComputingParty, DelegationConfig, FsHandoff};
use veil_types::ComputationRequest;

pub fn handle(action: ServerAction, config: &DelegationConfig) -> Result<()> {
    match action {
        ServerAction::Compute { descriptor, local } => {
            let descriptor = descriptor.unwrap_or_else(|| config.paths.descriptor.clone());
            let local = local.map(load_local).transpose()?;
            with_engine!(config, |engine| compute(engine, &descriptor, local))
        }
        ServerAction::Bench { lhs, rhs } => {
            with_engine!(config, |engine| bench::server_bench(engine, config.batch_size, &lhs, &rhs))
        }
    }
}

fn load_local(path: PathBuf) -> Result<ComputationRequest> {
    ComputationRequest::load(&path)
        .with_context(|| format!("Failed to load local input {}", path.display()))
}

fn compute<E: ConfidentialityEngine>(
    engine: E,
    descriptor: &str,
    local: Option<ComputationRequest>,
) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                 Veil Server: Compute                       ║");
    info!("╠════════════════════════════════════════════════════════════╣");
    info!("║  Backend:    {:^44} ║", engine.info().backend.to_string());
    info!("║  Descriptor: {:^44} ║", descriptor);
    info!(
        "║  Local data: {:^44} ║",
        if local.is_some() { "yes" } else { "placeholder" }
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    println!("{} Reading descriptor {}...", "→".cyan().bold(), descriptor.cyan());
    let mut party = ComputingParty::from_descriptor(engine, FsHandoff::new(), descriptor)?;
    if let Some(local) = local {
        party = party.with_local_input(local);
    }

    let primitive = party.descriptor().primitive_operation;
    if let Some(op) = party.descriptor().requested_operation {
        println!("  Requested:  {}", op.to_string().cyan());
    }
    println!("  Primitive:  {}", primitive.to_string().cyan());

    let location = party.compute()?;
    println!("{} Result written to {}", "✓".green().bold(), location.cyan());
    Ok(())
}
