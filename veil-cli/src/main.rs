//! veil: delegate private vector arithmetic to a computing party
//!
//! The two parties are separate invocations coordinated through the
//! locations named in the configuration:
//!
//! ```text
//! veil client prepare --request data_to_client.json
//! veil server compute
//! veil client verify  --request data_to_client.json
//! ```

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use veil_engine::Backend;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Delegated arithmetic over private vectors", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./veil.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured backend (mock, masking, sharing)
    #[arg(short, long, global = true)]
    backend: Option<Backend>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delegating party actions
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
    /// Computing party actions
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Generate and persist a fresh context
    Keygen {
        /// Overwrite an existing context
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Resolve roles, translate, encode and hand off the operands
    Prepare {
        /// Request file
        #[arg(short, long, default_value = "data_to_client.json")]
        request: PathBuf,

        /// Reject inputs outside the operation's domain (B = 0 for div, A <= 0 for exp)
        #[arg(long)]
        strict: bool,

        /// Run identifier written to the descriptor
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Retrieve the result and compare it with the reference
    Verify {
        /// Request file used for prepare
        #[arg(short, long, default_value = "data_to_client.json")]
        request: PathBuf,

        /// Flag elements whose absolute deviation exceeds this value
        #[arg(long, conflicts_with = "digits")]
        abs: Option<f64>,

        /// Flag elements that disagree within this many significant digits
        #[arg(long)]
        digits: Option<u32>,

        /// Also print exponentiation results converted back from log2 space
        #[arg(long)]
        linear: bool,
    },
    /// Encode/decode throughput over line-oriented data files
    Bench {
        /// Data files, one whitespace-separated vector per line
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ServerAction {
    /// Evaluate the delegated operation and write the encoded result
    Compute {
        /// Descriptor location (default from configuration)
        #[arg(short, long)]
        descriptor: Option<String>,

        /// The computing party's own request, used for operands it owns
        #[arg(short, long)]
        local: Option<PathBuf>,
    },
    /// Time ADD and MUL evaluation over two data files
    Bench {
        /// Left operand data file
        #[arg(long)]
        lhs: PathBuf,

        /// Right operand data file
        #[arg(long)]
        rhs: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = config::load(cli.config.as_deref(), cli.backend)?;

    match cli.command {
        Commands::Client { action } => commands::client::handle(action, &config),
        Commands::Server { action } => commands::server::handle(action, &config),
        Commands::Keygen { force } => commands::keygen::handle(force, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_client_verify() {
        let cli = Cli::try_parse_from([
            "veil", "--backend", "fhe", "client", "verify", "--digits", "4",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(Backend::Masking));
        match cli.command {
            Commands::Client {
                action: ClientAction::Verify { digits, abs, request, .. },
            } => {
                assert_eq!(digits, Some(4));
                assert_eq!(abs, None);
                assert_eq!(request, PathBuf::from("data_to_client.json"));
            }
            _ => panic!("expected client verify"),
        }
    }

    #[test]
    fn test_abs_and_digits_conflict() {
        assert!(Cli::try_parse_from([
            "veil", "client", "verify", "--abs", "0.1", "--digits", "3",
        ])
        .is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["veil", "--backend", "paillier", "keygen"]).is_err());
    }
}
