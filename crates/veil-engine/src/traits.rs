//! Core trait definitions for confidentiality engines.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use veil_types::PrimitiveOperation;

/// Confidentiality engine capability set.
///
/// Implementations hide plaintext vectors behind opaque handles and evaluate
/// the three primitive operations on them. The protocol layer only ever sees
/// `Context` and `Handle` through this trait, so it cannot tell backends apart.
///
/// Every call is blocking and runs to completion.
pub trait ConfidentialityEngine {
    /// Key/parameter context. May or may not hold secret material.
    type Context: Clone;

    /// Encoded vector (ciphertext or share record).
    type Handle: Clone;

    /// Static information about this backend
    fn info(&self) -> EngineInfo;

    /// Generate a fresh context including secret material
    fn keygen(&self) -> EngineResult<Self::Context>;

    /// Encode a plaintext vector
    fn encode(&self, ctx: &Self::Context, values: &[f64]) -> EngineResult<Self::Handle>;

    /// Reveal a handle.
    ///
    /// The returned vector may be longer than what was encoded (slot padding);
    /// callers truncate to the length they expect.
    fn decode(&self, ctx: &Self::Context, handle: &Self::Handle) -> EngineResult<Vec<f64>>;

    /// Evaluate `lhs <op> rhs` element-wise without revealing either operand
    fn evaluate(
        &self,
        ctx: &Self::Context,
        op: PrimitiveOperation,
        lhs: &Self::Handle,
        rhs: &Self::Handle,
    ) -> EngineResult<Self::Handle>;

    /// Split a context into its persistable parts
    fn export_context(&self, ctx: &Self::Context) -> EngineResult<ContextBundle>;

    /// Rebuild a context from persisted parts.
    ///
    /// A bundle without a secret yields an evaluation-only context.
    fn import_context(&self, bundle: &ContextBundle) -> EngineResult<Self::Context>;

    /// Wire form of a handle
    fn handle_to_bytes(&self, handle: &Self::Handle) -> EngineResult<Vec<u8>>;

    /// Parse a handle from its wire form
    fn handle_from_bytes(&self, bytes: &[u8]) -> EngineResult<Self::Handle>;
}

/// Persistable parts of an engine context.
///
/// `params` and `public_material` may be handed to the computing party;
/// `secret` never leaves the delegating party.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    pub params: Vec<u8>,
    pub public_material: Vec<u8>,
    pub secret: Option<Vec<u8>>,
}

impl ContextBundle {
    /// Copy without secret material, as shipped to the computing party
    pub fn public_only(&self) -> Self {
        Self {
            params: self.params.clone(),
            public_material: self.public_material.clone(),
            secret: None,
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

/// Engine construction parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Slot count; longer vectors are rejected
    pub batch_size: usize,
    /// Multiplicative depth supported by the masking backend
    pub mult_depth: u32,
    /// Fixed key seed (deterministic keygen, tests and benchmarks only)
    pub seed: Option<[u8; 32]>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 4096,
            mult_depth: 1,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_mult_depth(mut self, mult_depth: u32) -> Self {
        self.mult_depth = mult_depth;
        self
    }

    pub fn with_seed(mut self, seed: [u8; 32]) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Seed for keygen: configured or freshly random
    pub(crate) fn key_seed(&self) -> [u8; 32] {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Engine information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    pub backend: Backend,
    pub version: String,
    /// Backend only simulates the confidentiality primitive
    pub is_simulated: bool,
    /// Documented absolute round-trip tolerance for values of order one
    pub tolerance: f64,
}

/// Available backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Plaintext passthrough
    Mock,
    /// Encryption-based
    Masking,
    /// Share-based
    Sharing,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Mock => write!(f, "mock"),
            Backend::Masking => write!(f, "masking"),
            Backend::Sharing => write!(f, "sharing"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "masking" | "fhe" => Ok(Backend::Masking),
            "sharing" | "shr" => Ok(Backend::Sharing),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}
