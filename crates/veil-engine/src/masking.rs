//! Encryption-based backend.
//!
//! Every slot `i` carries a secret key `k_i` in `[1, 2)` derived from the key
//! seed. A fresh ciphertext stores `k_i * (m_i + e_i)` where `e_i` is a small
//! encoding noise term, at degree 1:
//!
//! ```text
//!   encode:   c_i = k_i * (m_i + e_i)            degree 1
//!   add/sub:  c_i = a_i ± b_i                    degrees must match
//!   mul:      c_i = a_i * b_i                    degree = deg(a) + deg(b)
//!   decode:   m_i = c_i / k_i^degree
//! ```
//!
//! Evaluation only needs the public evaluation key (key id and degree bound),
//! so the computing party works without the seed. Encoding and decoding need
//! the seed. Vectors are padded to the slot count with zeros.

use crate::{
    error::{EngineError, EngineResult},
    traits::{Backend, ConfidentialityEngine, ContextBundle, EngineConfig, EngineInfo},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use veil_types::PrimitiveOperation;

/// Magnitude of the per-slot encoding noise
const ENCODING_NOISE: f64 = 1.0 / (1u64 << 40) as f64;

/// Round-trip tolerance advertised for values of order one
const MASKING_TOLERANCE: f64 = 1e-9;

const KEY_ID_DOMAIN: &[u8] = b"veil-masking-key";
const SLOT_KEY_DOMAIN: &[u8] = b"veil-masking-slot";

/// Public scheme parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskingParams {
    pub batch_size: usize,
    pub mult_depth: u32,
}

impl MaskingParams {
    /// Highest ciphertext degree that can still be decoded
    pub fn max_degree(&self) -> u32 {
        self.mult_depth + 1
    }
}

/// Public evaluation key handed to the computing party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EvaluationKey {
    key_id: [u8; 32],
    max_degree: u32,
}

#[derive(Debug, Clone)]
struct SlotKeys {
    seed: [u8; 32],
    keys: Vec<f64>,
}

/// Masking engine context
#[derive(Debug, Clone)]
pub struct MaskingContext {
    params: MaskingParams,
    key_id: [u8; 32],
    secret: Option<SlotKeys>,
}

impl MaskingContext {
    pub fn params(&self) -> &MaskingParams {
        &self.params
    }

    pub fn key_id_hex(&self) -> String {
        hex::encode(self.key_id)
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    fn slot_keys(&self, op: &'static str) -> EngineResult<&[f64]> {
        self.secret
            .as_ref()
            .map(|s| s.keys.as_slice())
            .ok_or(EngineError::MissingSecret(op))
    }

    fn check_key(&self, handle: &MaskedVector) -> EngineResult<()> {
        if handle.key_id != self.key_id {
            return Err(EngineError::KeyMismatch {
                expected: hex::encode(self.key_id),
                actual: hex::encode(handle.key_id),
            });
        }
        Ok(())
    }
}

/// Ciphertext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedVector {
    pub key_id: [u8; 32],
    pub degree: u32,
    pub slots: Vec<f64>,
}

/// Encryption-based confidentiality engine
#[derive(Debug, Clone)]
pub struct MaskingEngine {
    config: EngineConfig,
}

impl MaskingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn key_id(seed: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(KEY_ID_DOMAIN);
        hasher.update(seed);
        hasher.finalize().into()
    }

    fn derive_slot_keys(seed: &[u8; 32], batch_size: usize) -> Vec<f64> {
        (0..batch_size as u64)
            .map(|i| {
                let mut hasher = Sha256::new();
                hasher.update(SLOT_KEY_DOMAIN);
                hasher.update(seed);
                hasher.update(i.to_le_bytes());
                let digest = hasher.finalize();

                let mut word = [0u8; 8];
                word.copy_from_slice(&digest[..8]);
                // 53 random bits -> [0, 1), shifted into [1, 2)
                let unit = (u64::from_le_bytes(word) >> 11) as f64 / (1u64 << 53) as f64;
                1.0 + unit
            })
            .collect()
    }

    fn context_from_seed(params: MaskingParams, seed: [u8; 32]) -> MaskingContext {
        let keys = Self::derive_slot_keys(&seed, params.batch_size);
        MaskingContext {
            params,
            key_id: Self::key_id(&seed),
            secret: Some(SlotKeys { seed, keys }),
        }
    }
}

impl Default for MaskingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ConfidentialityEngine for MaskingEngine {
    type Context = MaskingContext;
    type Handle = MaskedVector;

    fn info(&self) -> EngineInfo {
        EngineInfo {
            backend: Backend::Masking,
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_simulated: false,
            tolerance: MASKING_TOLERANCE,
        }
    }

    fn keygen(&self) -> EngineResult<MaskingContext> {
        let params = MaskingParams {
            batch_size: self.config.batch_size,
            mult_depth: self.config.mult_depth,
        };
        let ctx = Self::context_from_seed(params, self.config.key_seed());
        info!(
            key_id = %ctx.key_id_hex(),
            batch_size = ctx.params.batch_size,
            mult_depth = ctx.params.mult_depth,
            "Generated masking context"
        );
        Ok(ctx)
    }

    fn encode(&self, ctx: &MaskingContext, values: &[f64]) -> EngineResult<MaskedVector> {
        let keys = ctx.slot_keys("encode")?;
        if values.len() > ctx.params.batch_size {
            return Err(EngineError::CapacityExceeded {
                len: values.len(),
                capacity: ctx.params.batch_size,
            });
        }

        let mut rng = rand::thread_rng();
        let slots = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let m = values.get(i).copied().unwrap_or(0.0);
                let e = rng.gen_range(-ENCODING_NOISE..=ENCODING_NOISE);
                k * (m + e)
            })
            .collect();

        Ok(MaskedVector {
            key_id: ctx.key_id,
            degree: 1,
            slots,
        })
    }

    fn decode(&self, ctx: &MaskingContext, handle: &MaskedVector) -> EngineResult<Vec<f64>> {
        let keys = ctx.slot_keys("decode")?;
        ctx.check_key(handle)?;
        if handle.slots.len() != keys.len() {
            return Err(EngineError::LengthMismatch {
                lhs: handle.slots.len(),
                rhs: keys.len(),
            });
        }

        let exponent = handle.degree as i32;
        Ok(handle
            .slots
            .iter()
            .zip(keys)
            .map(|(c, k)| c / k.powi(exponent))
            .collect())
    }

    fn evaluate(
        &self,
        ctx: &MaskingContext,
        op: PrimitiveOperation,
        lhs: &MaskedVector,
        rhs: &MaskedVector,
    ) -> EngineResult<MaskedVector> {
        ctx.check_key(lhs)?;
        ctx.check_key(rhs)?;
        if lhs.slots.len() != rhs.slots.len() {
            return Err(EngineError::LengthMismatch {
                lhs: lhs.slots.len(),
                rhs: rhs.slots.len(),
            });
        }

        let degree = match op {
            PrimitiveOperation::Add | PrimitiveOperation::Sub => {
                if lhs.degree != rhs.degree {
                    return Err(EngineError::DegreeMismatch {
                        lhs: lhs.degree,
                        rhs: rhs.degree,
                    });
                }
                lhs.degree
            }
            PrimitiveOperation::Mul => {
                let degree = lhs.degree + rhs.degree;
                let max = ctx.params.max_degree();
                if degree > max {
                    return Err(EngineError::DepthExhausted { degree, max });
                }
                degree
            }
        };

        debug!(op = %op, degree, slots = lhs.slots.len(), "Masking evaluate");

        let slots = lhs
            .slots
            .iter()
            .zip(&rhs.slots)
            .map(|(a, b)| op.apply(*a, *b))
            .collect();

        Ok(MaskedVector {
            key_id: ctx.key_id,
            degree,
            slots,
        })
    }

    fn export_context(&self, ctx: &MaskingContext) -> EngineResult<ContextBundle> {
        let evaluation_key = EvaluationKey {
            key_id: ctx.key_id,
            max_degree: ctx.params.max_degree(),
        };
        Ok(ContextBundle {
            params: bincode::serialize(&ctx.params)?,
            public_material: bincode::serialize(&evaluation_key)?,
            secret: ctx.secret.as_ref().map(|s| s.seed.to_vec()),
        })
    }

    fn import_context(&self, bundle: &ContextBundle) -> EngineResult<MaskingContext> {
        let params: MaskingParams = bincode::deserialize(&bundle.params)?;
        let evaluation_key: EvaluationKey = bincode::deserialize(&bundle.public_material)?;
        if evaluation_key.max_degree != params.max_degree() {
            return Err(EngineError::Malformed(format!(
                "evaluation key degree bound {} does not match parameters ({})",
                evaluation_key.max_degree,
                params.max_degree()
            )));
        }

        let Some(secret) = &bundle.secret else {
            return Ok(MaskingContext {
                params,
                key_id: evaluation_key.key_id,
                secret: None,
            });
        };

        let seed: [u8; 32] = secret.as_slice().try_into().map_err(|_| {
            EngineError::Malformed(format!("secret key must be 32 bytes, got {}", secret.len()))
        })?;
        let ctx = Self::context_from_seed(params, seed);
        if ctx.key_id != evaluation_key.key_id {
            return Err(EngineError::KeyMismatch {
                expected: hex::encode(evaluation_key.key_id),
                actual: ctx.key_id_hex(),
            });
        }
        Ok(ctx)
    }

    fn handle_to_bytes(&self, handle: &MaskedVector) -> EngineResult<Vec<u8>> {
        Ok(bincode::serialize(handle)?)
    }

    fn handle_from_bytes(&self, bytes: &[u8]) -> EngineResult<MaskedVector> {
        Ok(bincode::deserialize(bytes)?)
    }
}
