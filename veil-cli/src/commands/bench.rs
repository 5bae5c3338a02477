//! Throughput benchmarks over line-oriented data files.
//!
//! Each non-empty line holds one whitespace-separated vector. Vectors longer
//! than the batch size are split into batch-sized chunks before encoding.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use veil_engine::ConfidentialityEngine;
use veil_types::PrimitiveOperation;

/// Parse a data file into vectors, one per non-empty line
pub fn load_vectors(path: &Path) -> Result<Vec<Vec<f64>>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    parse_vectors(&content).with_context(|| format!("Malformed data file {}", path.display()))
}

fn parse_vectors(content: &str) -> Result<Vec<Vec<f64>>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            line.split_whitespace()
                .map(|token| {
                    token
                        .parse::<f64>()
                        .with_context(|| format!("line {}: invalid number {:?}", n + 1, token))
                })
                .collect()
        })
        .collect()
}

/// Split every vector into chunks of at most `batch_size` values
pub fn chunked(vectors: &[Vec<f64>], batch_size: usize) -> Vec<Vec<f64>> {
    vectors
        .iter()
        .flat_map(|v| v.chunks(batch_size.max(1)).map(|c| c.to_vec()))
        .collect()
}

/// Pair vectors by index, dropping pairs whose lengths differ
fn matched_pairs(left: Vec<Vec<f64>>, right: Vec<Vec<f64>>) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    left.into_iter()
        .zip(right)
        .enumerate()
        .filter(|(i, (a, b))| {
            if a.len() != b.len() {
                tracing::warn!(pair = i, lhs = a.len(), rhs = b.len(), "Skipping vectors of different lengths");
            }
            a.len() == b.len()
        })
        .map(|(_, pair)| pair)
        .unzip()
}

fn progress(len: usize, label: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg:>8} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(label.to_string());
    Ok(pb)
}

fn encode_all<E: ConfidentialityEngine>(
    engine: &E,
    ctx: &E::Context,
    chunks: &[Vec<f64>],
) -> Result<(Vec<E::Handle>, Duration)> {
    let pb = progress(chunks.len(), "encode")?;
    let start = Instant::now();
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        handles.push(engine.encode(ctx, chunk)?);
        pb.inc(1);
    }
    let elapsed = start.elapsed();
    pb.finish_with_message("encoded");
    Ok((handles, elapsed))
}

fn report(stage: &str, file: &Path, elapsed: Duration, items: usize) {
    let ms = elapsed.as_secs_f64() * 1e3;
    let per_item = if items == 0 { 0.0 } else { ms / items as f64 };
    println!(
        "  [{} {} on {}] {} ({} per vector)",
        "Benchmark".bold(),
        stage.yellow(),
        file.display().to_string().cyan(),
        format!("{ms:.3} ms").green(),
        format!("{per_item:.3} ms").green()
    );
}

/// Time encode and decode for every vector in each file
pub fn client_bench<E: ConfidentialityEngine>(
    engine: E,
    batch_size: usize,
    files: &[PathBuf],
) -> Result<()> {
    println!(
        "{} Client benchmark on {} backend",
        "→".cyan().bold(),
        engine.info().backend.to_string().cyan()
    );
    let ctx = engine.keygen()?;

    for file in files {
        let chunks = chunked(&load_vectors(file)?, batch_size);
        info!(file = %file.display(), vectors = chunks.len(), "Benchmarking file");

        let (handles, encode_time) = encode_all(&engine, &ctx, &chunks)?;

        let pb = progress(handles.len(), "decode")?;
        let start = Instant::now();
        for handle in &handles {
            engine.decode(&ctx, handle)?;
            pb.inc(1);
        }
        let decode_time = start.elapsed();
        pb.finish_with_message("decoded");

        report("ENC", file, encode_time, chunks.len());
        report("DEC", file, decode_time, chunks.len());
    }

    println!("{} Client benchmark complete", "✓".green().bold());
    Ok(())
}

/// Time ADD and MUL over pairs of encoded vectors from two files
pub fn server_bench<E: ConfidentialityEngine>(
    engine: E,
    batch_size: usize,
    lhs: &Path,
    rhs: &Path,
) -> Result<()> {
    println!(
        "{} Server benchmark on {} backend",
        "→".cyan().bold(),
        engine.info().backend.to_string().cyan()
    );
    let ctx = engine.keygen()?;

    let left = chunked(&load_vectors(lhs)?, batch_size);
    let right = chunked(&load_vectors(rhs)?, batch_size);
    if left.len() != right.len() {
        tracing::warn!(
            lhs = left.len(),
            rhs = right.len(),
            "Data files hold different vector counts, using the first {}",
            left.len().min(right.len())
        );
    }
    let (left, right) = matched_pairs(left, right);
    let pairs = left.len();

    let (left, _) = encode_all(&engine, &ctx, &left)?;
    let (right, _) = encode_all(&engine, &ctx, &right)?;

    for op in [PrimitiveOperation::Add, PrimitiveOperation::Mul] {
        let label = op.to_string().to_uppercase();
        let pb = progress(pairs, &label)?;
        let start = Instant::now();
        for (a, b) in left.iter().zip(&right) {
            engine.evaluate(&ctx, op, a, b)?;
            pb.inc(1);
        }
        let elapsed = start.elapsed();
        pb.finish_with_message("done");
        report(&label, lhs, elapsed, pairs);
    }

    println!("{} Server benchmark complete", "✓".green().bold());
    Ok(())
}
