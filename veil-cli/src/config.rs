//! Configuration file discovery for the CLI

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use veil_engine::Backend;
use veil_protocol::config::DEFAULT_CONFIG_FILE;
use veil_protocol::DelegationConfig;

/// Pick the configuration file: explicit flag, then `./veil.toml`, then
/// `<config dir>/veil/veil.toml`. Falls back to `./veil.toml` when none exists.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join("veil").join(DEFAULT_CONFIG_FILE))
        .filter(|path| path.exists())
        .unwrap_or(local)
}

/// Load, apply the backend flag, and validate
pub fn load(explicit: Option<&Path>, backend: Option<Backend>) -> Result<DelegationConfig> {
    let path = resolve_path(explicit);
    if explicit.is_some() && !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    let mut config = DelegationConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(backend) = backend {
        config.backend = backend;
    }
    config.validate()?;

    debug!(
        path = %path.display(),
        backend = %config.backend,
        batch_size = config.batch_size,
        base_path = %config.paths.base_path,
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/nonexistent/custom.toml");
        assert_eq!(resolve_path(Some(path)), path);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = load(Some(Path::new("/nonexistent/custom.toml")), None).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_backend_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("veil.toml");
        fs::write(&path, "backend = \"masking\"\nbatch_size = 16\n").unwrap();

        let config = load(Some(&path), Some(Backend::Sharing)).unwrap();
        assert_eq!(config.backend, Backend::Sharing);
        assert_eq!(config.batch_size, 16);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("veil.toml");
        fs::write(&path, "batch_size = 0\n").unwrap();

        assert!(load(Some(&path), None).is_err());
    }
}
