//! Mock engine implementation for development and testing.
//!
//! The MockEngine keeps values in the clear. It provides:
//! - Exact round trips (tolerance 0)
//! - Per-capability call counters so tests can assert what the protocol did
//! - Deterministic behavior for testing

use crate::{
    error::{EngineError, EngineResult},
    traits::{Backend, ConfidentialityEngine, ContextBundle, EngineConfig, EngineInfo},
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use veil_types::PrimitiveOperation;

/// Mock context: only the slot count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockContext {
    pub batch_size: usize,
}

/// Plaintext "encoded" vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockHandle {
    pub values: Vec<f64>,
}

#[derive(Debug, Default)]
struct CallCounters {
    keygen: AtomicU64,
    encode: AtomicU64,
    decode: AtomicU64,
    evaluate: AtomicU64,
}

/// Mock engine for development and testing
#[derive(Debug, Clone)]
pub struct MockEngine {
    config: EngineConfig,
    counters: Arc<CallCounters>,
}

impl MockEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            counters: Arc::new(CallCounters::default()),
        }
    }

    pub fn keygen_count(&self) -> u64 {
        self.counters.keygen.load(Ordering::Relaxed)
    }

    pub fn encode_count(&self) -> u64 {
        self.counters.encode.load(Ordering::Relaxed)
    }

    pub fn decode_count(&self) -> u64 {
        self.counters.decode.load(Ordering::Relaxed)
    }

    pub fn evaluate_count(&self) -> u64 {
        self.counters.evaluate.load(Ordering::Relaxed)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ConfidentialityEngine for MockEngine {
    type Context = MockContext;
    type Handle = MockHandle;

    fn info(&self) -> EngineInfo {
        EngineInfo {
            backend: Backend::Mock,
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_simulated: true,
            tolerance: 0.0,
        }
    }

    fn keygen(&self) -> EngineResult<MockContext> {
        self.counters.keygen.fetch_add(1, Ordering::Relaxed);
        Ok(MockContext {
            batch_size: self.config.batch_size,
        })
    }

    fn encode(&self, ctx: &MockContext, values: &[f64]) -> EngineResult<MockHandle> {
        self.counters.encode.fetch_add(1, Ordering::Relaxed);
        if values.len() > ctx.batch_size {
            return Err(EngineError::CapacityExceeded {
                len: values.len(),
                capacity: ctx.batch_size,
            });
        }
        Ok(MockHandle {
            values: values.to_vec(),
        })
    }

    fn decode(&self, _ctx: &MockContext, handle: &MockHandle) -> EngineResult<Vec<f64>> {
        self.counters.decode.fetch_add(1, Ordering::Relaxed);
        Ok(handle.values.clone())
    }

    fn evaluate(
        &self,
        _ctx: &MockContext,
        op: PrimitiveOperation,
        lhs: &MockHandle,
        rhs: &MockHandle,
    ) -> EngineResult<MockHandle> {
        self.counters.evaluate.fetch_add(1, Ordering::Relaxed);
        if lhs.values.len() != rhs.values.len() {
            return Err(EngineError::LengthMismatch {
                lhs: lhs.values.len(),
                rhs: rhs.values.len(),
            });
        }
        debug!(op = %op, len = lhs.values.len(), "Mock evaluate");
        let values = lhs
            .values
            .iter()
            .zip(&rhs.values)
            .map(|(l, r)| op.apply(*l, *r))
            .collect();
        Ok(MockHandle { values })
    }

    fn export_context(&self, ctx: &MockContext) -> EngineResult<ContextBundle> {
        Ok(ContextBundle {
            params: bincode::serialize(ctx)?,
            public_material: Vec::new(),
            secret: None,
        })
    }

    fn import_context(&self, bundle: &ContextBundle) -> EngineResult<MockContext> {
        Ok(bincode::deserialize(&bundle.params)?)
    }

    fn handle_to_bytes(&self, handle: &MockHandle) -> EngineResult<Vec<u8>> {
        Ok(bincode::serialize(handle)?)
    }

    fn handle_from_bytes(&self, bytes: &[u8]) -> EngineResult<MockHandle> {
        Ok(bincode::deserialize(bytes)?)
    }
}
