//! Command handlers

/// Build the configured backend and bind it to `$engine` for `$body`.
///
/// The engine trait has associated types, so each arm monomorphizes `$body`.
macro_rules! with_engine {
    ($config:expr, |$engine:ident| $body:expr) => {{
        let engine_config = $config.engine_config();
        match $config.backend {
            veil_engine::Backend::Mock => {
                let $engine = veil_engine::MockEngine::new(engine_config);
                $body
            }
            veil_engine::Backend::Masking => {
                let $engine = veil_engine::MaskingEngine::new(engine_config);
                $body
            }
            veil_engine::Backend::Sharing => {
                let $engine = veil_engine::SharingEngine::new(engine_config);
                $body
            }
        }
    }};
}

pub(crate) use with_engine;

pub mod bench;
pub mod client;
pub mod keygen;
pub mod server;

use colored::Colorize;

/// Print at most `limit` leading values of a vector on one line
pub(crate) fn print_vector(label: &str, values: &[f64], limit: usize) {
    let shown: Vec<String> = values.iter().take(limit).map(|v| format!("{v:.6}")).collect();
    let more = if values.len() > limit {
        format!(" ... ({} total)", values.len())
    } else {
        String::new()
    };
    println!("  {:<12}[{}]{}", label, shown.join(", ").cyan(), more);
}
