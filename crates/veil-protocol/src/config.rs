//! Delegation configuration.
//!
//! Loaded from a TOML file (default `veil.toml`), then overridden by
//! environment variables:
//!
//! | Variable            | Field          |
//! |---------------------|----------------|
//! | `VEIL_BACKEND`      | `backend`      |
//! | `VEIL_BATCH_SIZE`   | `batch_size`   |
//! | `VEIL_MULT_DEPTH`   | `mult_depth`   |
//! | `VEIL_LOAD_CONTEXT` | `load_context` |
//! | `VEIL_BASE_PATH`    | `paths.base_path` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use veil_engine::{Backend, EngineConfig};

pub const DEFAULT_CONFIG_FILE: &str = "veil.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Named locations on the handoff medium.
///
/// Every entry except `descriptor` is relative to `base_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locations {
    pub base_path: String,
    pub context: String,
    pub public_material: String,
    pub secret_key: String,
    pub operand_a: String,
    pub operand_b: String,
    pub result: String,
    pub descriptor: String,
}

impl Default for Locations {
    fn default() -> Self {
        Self {
            base_path: "data".to_string(),
            context: "context.bin".to_string(),
            public_material: "key-public.bin".to_string(),
            secret_key: "key-secret.bin".to_string(),
            operand_a: "operand-a.bin".to_string(),
            operand_b: "operand-b.bin".to_string(),
            result: "result.bin".to_string(),
            descriptor: "data_to_server.json".to_string(),
        }
    }
}

impl Locations {
    /// Full location of an entry relative to `base_path`
    pub fn resolve(&self, name: &str) -> String {
        join_location(&self.base_path, name)
    }

    pub fn context_location(&self) -> String {
        self.resolve(&self.context)
    }

    pub fn public_material_location(&self) -> String {
        self.resolve(&self.public_material)
    }

    pub fn secret_key_location(&self) -> String {
        self.resolve(&self.secret_key)
    }
}

/// Join a base path and a relative location
pub fn join_location(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Delegation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Confidentiality backend
    pub backend: Backend,

    /// Engine slot count
    pub batch_size: usize,

    /// Multiplicative depth (masking backend)
    pub mult_depth: u32,

    /// Reuse a persisted context instead of running keygen
    pub load_context: bool,

    /// Handoff locations
    pub paths: Locations,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Masking,
            batch_size: 4096,
            mult_depth: 1,
            load_context: false,
            paths: Locations::default(),
        }
    }
}

impl DelegationConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if it exists, else defaults; then apply environment overrides
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.with_env_overrides()
    }

    /// Apply `VEIL_*` environment variables
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        fn invalid(key: &str, value: &str) -> ConfigError {
            ConfigError::InvalidOverride {
                key: key.to_string(),
                value: value.to_string(),
            }
        }

        if let Some(value) = lookup("VEIL_BACKEND") {
            self.backend = value.parse().map_err(|_| invalid("VEIL_BACKEND", &value))?;
        }
        if let Some(value) = lookup("VEIL_BATCH_SIZE") {
            self.batch_size = value
                .parse()
                .map_err(|_| invalid("VEIL_BATCH_SIZE", &value))?;
        }
        if let Some(value) = lookup("VEIL_MULT_DEPTH") {
            self.mult_depth = value
                .parse()
                .map_err(|_| invalid("VEIL_MULT_DEPTH", &value))?;
        }
        if let Some(value) = lookup("VEIL_LOAD_CONTEXT") {
            self.load_context = value
                .parse()
                .map_err(|_| invalid("VEIL_LOAD_CONTEXT", &value))?;
        }
        if let Some(value) = lookup("VEIL_BASE_PATH") {
            self.paths.base_path = value;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        if self.backend == Backend::Masking && self.mult_depth == 0 {
            return Err(ConfigError::Invalid(
                "masking backend needs mult_depth >= 1".into(),
            ));
        }

        let paths = &self.paths;
        let named = [
            ("context", &paths.context),
            ("public_material", &paths.public_material),
            ("secret_key", &paths.secret_key),
            ("operand_a", &paths.operand_a),
            ("operand_b", &paths.operand_b),
            ("result", &paths.result),
            ("descriptor", &paths.descriptor),
        ];
        for (key, value) in named {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("paths.{key} must not be empty")));
            }
        }
        for (i, (key, value)) in named.iter().enumerate() {
            if let Some((other, _)) = named[i + 1..].iter().find(|(_, v)| v == value) {
                return Err(ConfigError::Invalid(format!(
                    "paths.{key} and paths.{other} name the same location"
                )));
            }
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_batch_size(self.batch_size)
            .with_mult_depth(self.mult_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults_validate() {
        let config = DelegationConfig::default();
        assert_eq!(config.backend, Backend::Masking);
        assert_eq!(config.batch_size, 4096);
        config.validate().unwrap();
        assert_eq!(config.paths.context_location(), "data/context.bin");
    }

    #[test]
    fn test_config_partial_toml() {
        let config = DelegationConfig::from_toml_str(
            r#"
            backend = "sharing"
            load_context = true

            [paths]
            base_path = "shared/"
            result = "out.bin"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Sharing);
        assert!(config.load_context);
        assert_eq!(config.mult_depth, 1);
        assert_eq!(config.paths.resolve(&config.paths.result), "shared/out.bin");
        assert_eq!(config.paths.operand_a, "operand-a.bin");
    }

    #[test]
    fn test_config_overrides() {
        let env: HashMap<&str, &str> = [
            ("VEIL_BACKEND", "mock"),
            ("VEIL_BATCH_SIZE", "16"),
            ("VEIL_BASE_PATH", "/tmp/run"),
        ]
        .into_iter()
        .collect();

        let config = DelegationConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.backend, Backend::Mock);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.paths.base_path, "/tmp/run");

        let bad = DelegationConfig::default()
            .with_overrides(|k| (k == "VEIL_MULT_DEPTH").then(|| "deep".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidOverride { .. })));
    }

    #[test]
    fn test_config_validate_rejects() {
        let mut config = DelegationConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = DelegationConfig::default();
        config.paths.result = config.paths.operand_a.clone();
        assert!(config.validate().is_err());

        let mut config = DelegationConfig::default();
        config.mult_depth = 0;
        assert!(config.validate().is_err());
        config.backend = Backend::Sharing;
        config.validate().unwrap();
    }

    #[test]
    fn test_config_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("veil.toml");
        std::fs::write(&path, "batch_size = 64\n").unwrap();

        assert_eq!(DelegationConfig::load(&path).unwrap().batch_size, 64);
        assert!(matches!(
            DelegationConfig::load(dir.path().join("nope.toml")),
            Err(ConfigError::Io { .. })
        ));
        assert!(matches!(
            DelegationConfig::from_toml_str("batch_size = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
