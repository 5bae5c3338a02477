//! Context generation

use super::with_engine;
use anyhow::Result;
use colored::Colorize;
use sha2::{Digest, Sha256};
use veil_engine::ConfidentialityEngine;
use veil_protocol::context::persist_context;
use veil_protocol::{DelegationConfig, FsHandoff, HandoffMedium};

pub fn handle(force: bool, config: &DelegationConfig) -> Result<()> {
    with_engine!(config, |engine| generate(engine, config, force))
}

fn generate<E: ConfidentialityEngine>(engine: E, config: &DelegationConfig, force: bool) -> Result<()> {
    let medium = FsHandoff::new();
    let paths = &config.paths;
    if medium.exists(&paths.context_location()) && !force {
        anyhow::bail!(
            "Context already exists at {} (use --force to overwrite)",
            paths.context_location()
        );
    }

    println!(
        "{} Generating {} context...",
        "→".cyan().bold(),
        engine.info().backend.to_string().cyan()
    );
    let ctx = engine.keygen()?;
    persist_context(&engine, &medium, paths, &ctx)?;

    let bundle = engine.export_context(&ctx)?;
    let fingerprint = hex::encode(&Sha256::digest(&bundle.public_material)[..8]);

    println!("{} Context generated", "✓".green().bold());
    println!("  Context:     {}", paths.context_location().cyan());
    println!("  Public:      {}", paths.public_material_location().cyan());
    if bundle.has_secret() {
        println!("  Secret:      {}", paths.secret_key_location().cyan());
    }
    println!("  Fingerprint: {}", fingerprint.cyan());
    println!(
        "  Set {} in the configuration to reuse it",
        "load_context = true".yellow()
    );
    Ok(())
}
