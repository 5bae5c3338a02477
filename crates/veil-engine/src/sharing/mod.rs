//! Share-based backend.
//!
//! Each value is split into floating point components the way secure
//! floating point protocols represent them:
//!
//! ```text
//!   v = (-1)^sign * mantissa * 2^exponent        (zero flag set for ±0)
//! ```
//!
//! The components are masked with a per-slot stream derived from the session
//! seed (XOR for the bit components, wrapping addition for mantissa and
//! exponent). The counterpart mask stands in for the peer share that a
//! networked exchange would hold, so evaluation reconstructs both operands,
//! applies the primitive and reshares the result. The backend is therefore
//! simulated; it reproduces the share record format and data flow, not the
//! security of two-party computation.

pub mod layout;

pub use layout::ShareComponents;

use crate::{
    error::{EngineError, EngineResult},
    traits::{Backend, ConfidentialityEngine, ContextBundle, EngineConfig, EngineInfo},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use veil_types::PrimitiveOperation;

const MASK_DOMAIN: &[u8] = b"veil-share-mask";

/// Exponent sentinel for infinities and NaN
const NON_FINITE_EXPONENT: i64 = i64::MAX;

const MANTISSA_BITS: u32 = 52;
const FRACTION_MASK: u64 = (1 << MANTISSA_BITS) - 1;
const EXPONENT_BIAS: i64 = 1023;
/// Exponent of the least significant mantissa bit for subnormals
const MIN_EXPONENT: i64 = -1074;

/// Public sharing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharingParams {
    pub batch_size: usize,
}

/// Sharing session context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingContext {
    params: SharingParams,
    session_seed: [u8; 32],
}

impl SharingContext {
    pub fn params(&self) -> &SharingParams {
        &self.params
    }

    pub fn session_id(&self) -> String {
        hex::encode(&self.session_seed[..8])
    }

    fn slot_mask(&self, index: usize) -> SlotMask {
        let mut hasher = Sha256::new();
        hasher.update(MASK_DOMAIN);
        hasher.update(self.session_seed);
        hasher.update((index as u64).to_le_bytes());
        let digest = hasher.finalize();

        let mut mantissa = [0u8; 8];
        mantissa.copy_from_slice(&digest[0..8]);
        let mut exponent = [0u8; 8];
        exponent.copy_from_slice(&digest[8..16]);

        SlotMask {
            sign: digest[16] & 1,
            zero: digest[17] & 1,
            mantissa: u64::from_le_bytes(mantissa),
            exponent: u64::from_le_bytes(exponent),
        }
    }

    fn share(&self, values: &[f64]) -> ShareComponents {
        let mut shares = ShareComponents::with_capacity(values.len());
        for (i, v) in values.iter().enumerate() {
            let c = decompose(*v);
            let mask = self.slot_mask(i);
            shares.push(
                c.sign ^ mask.sign,
                c.zero ^ mask.zero,
                c.mantissa.wrapping_add(mask.mantissa),
                (c.exponent as u64).wrapping_add(mask.exponent),
            );
        }
        shares
    }

    fn reconstruct(&self, shares: &ShareComponents) -> Vec<f64> {
        (0..shares.len())
            .map(|i| {
                let mask = self.slot_mask(i);
                recompose(FloatComponents {
                    sign: (shares.sign[i] ^ mask.sign) & 1,
                    zero: (shares.zero[i] ^ mask.zero) & 1,
                    mantissa: shares.mantissa[i].wrapping_sub(mask.mantissa),
                    exponent: shares.exponent[i].wrapping_sub(mask.exponent) as i64,
                })
            })
            .collect()
    }
}

struct SlotMask {
    sign: u8,
    zero: u8,
    mantissa: u64,
    exponent: u64,
}

/// Unmasked components of one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatComponents {
    pub sign: u8,
    pub zero: u8,
    pub mantissa: u64,
    pub exponent: i64,
}

/// Split a value into sign, zero flag, integer mantissa and binary exponent
pub fn decompose(value: f64) -> FloatComponents {
    let bits = value.to_bits();
    let sign = (bits >> 63) as u8;
    let biased = ((bits >> MANTISSA_BITS) & 0x7ff) as i64;
    let fraction = bits & FRACTION_MASK;

    if value == 0.0 {
        return FloatComponents {
            sign,
            zero: 1,
            mantissa: 0,
            exponent: 0,
        };
    }
    if !value.is_finite() {
        return FloatComponents {
            sign,
            zero: 0,
            mantissa: fraction,
            exponent: NON_FINITE_EXPONENT,
        };
    }

    let (mantissa, exponent) = if biased == 0 {
        (fraction, MIN_EXPONENT)
    } else {
        (
            fraction | (1 << MANTISSA_BITS),
            biased - EXPONENT_BIAS - MANTISSA_BITS as i64,
        )
    };
    FloatComponents {
        sign,
        zero: 0,
        mantissa,
        exponent,
    }
}

/// Inverse of [`decompose`]
pub fn recompose(c: FloatComponents) -> f64 {
    let magnitude = if c.zero == 1 {
        0.0
    } else if c.exponent == NON_FINITE_EXPONENT {
        if c.mantissa == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        ldexp(c.mantissa as f64, c.exponent)
    };

    if c.sign == 1 {
        -magnitude
    } else {
        magnitude
    }
}

/// `x * 2^exp`, stepping so intermediate scale factors stay representable
fn ldexp(mut x: f64, mut exp: i64) -> f64 {
    const MAX_STEP: i64 = 1023;
    const MIN_STEP: i64 = -1022;

    if x == 0.0 {
        return x;
    }
    while exp > MAX_STEP {
        x *= pow2(MAX_STEP);
        exp -= MAX_STEP;
        if x.is_infinite() {
            return x;
        }
    }
    while exp < MIN_STEP {
        x *= pow2(MIN_STEP);
        exp -= MIN_STEP;
        if x == 0.0 {
            return x;
        }
    }
    x * pow2(exp)
}

/// 2^exp for exp in the normal range
fn pow2(exp: i64) -> f64 {
    f64::from_bits(((exp + EXPONENT_BIAS) as u64) << MANTISSA_BITS)
}

/// Share-based confidentiality engine
#[derive(Debug, Clone)]
pub struct SharingEngine {
    config: EngineConfig,
}

impl SharingEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn check_capacity(ctx: &SharingContext, len: usize) -> EngineResult<()> {
        if len > ctx.params.batch_size {
            return Err(EngineError::CapacityExceeded {
                len,
                capacity: ctx.params.batch_size,
            });
        }
        Ok(())
    }
}

impl Default for SharingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ConfidentialityEngine for SharingEngine {
    type Context = SharingContext;
    type Handle = ShareComponents;

    fn info(&self) -> EngineInfo {
        EngineInfo {
            backend: Backend::Sharing,
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_simulated: true,
            tolerance: 0.0,
        }
    }

    fn keygen(&self) -> EngineResult<SharingContext> {
        let ctx = SharingContext {
            params: SharingParams {
                batch_size: self.config.batch_size,
            },
            session_seed: self.config.key_seed(),
        };
        info!(
            session = %ctx.session_id(),
            batch_size = ctx.params.batch_size,
            "Established sharing session"
        );
        Ok(ctx)
    }

    fn encode(&self, ctx: &SharingContext, values: &[f64]) -> EngineResult<ShareComponents> {
        Self::check_capacity(ctx, values.len())?;
        Ok(ctx.share(values))
    }

    fn decode(&self, ctx: &SharingContext, handle: &ShareComponents) -> EngineResult<Vec<f64>> {
        Self::check_capacity(ctx, handle.len())?;
        Ok(ctx.reconstruct(handle))
    }

    fn evaluate(
        &self,
        ctx: &SharingContext,
        op: PrimitiveOperation,
        lhs: &ShareComponents,
        rhs: &ShareComponents,
    ) -> EngineResult<ShareComponents> {
        if lhs.len() != rhs.len() {
            return Err(EngineError::LengthMismatch {
                lhs: lhs.len(),
                rhs: rhs.len(),
            });
        }
        debug!(op = %op, len = lhs.len(), "Sharing evaluate");

        let result: Vec<f64> = ctx
            .reconstruct(lhs)
            .into_iter()
            .zip(ctx.reconstruct(rhs))
            .map(|(l, r)| op.apply(l, r))
            .collect();
        Ok(ctx.share(&result))
    }

    fn export_context(&self, ctx: &SharingContext) -> EngineResult<ContextBundle> {
        Ok(ContextBundle {
            params: bincode::serialize(&ctx.params)?,
            public_material: ctx.session_seed.to_vec(),
            secret: None,
        })
    }

    fn import_context(&self, bundle: &ContextBundle) -> EngineResult<SharingContext> {
        let params: SharingParams = bincode::deserialize(&bundle.params)?;
        let session_seed: [u8; 32] = bundle.public_material.as_slice().try_into().map_err(|_| {
            EngineError::Malformed(format!(
                "session seed must be 32 bytes, got {}",
                bundle.public_material.len()
            ))
        })?;
        Ok(SharingContext {
            params,
            session_seed,
        })
    }

    fn handle_to_bytes(&self, handle: &ShareComponents) -> EngineResult<Vec<u8>> {
        Ok(handle.to_bytes())
    }

    fn handle_from_bytes(&self, bytes: &[u8]) -> EngineResult<ShareComponents> {
        ShareComponents::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SharingEngine {
        SharingEngine::new(EngineConfig::default().with_seed([3u8; 32]))
    }

    #[test]
    fn test_decompose_recompose_exact() {
        let values = [
            1.0,
            -2.5,
            0.1,
            1e300,
            -1e-300,
            f64::MAX,
            f64::MIN_POSITIVE,
            5e-324,
            -0.0,
            0.0,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];
        for v in values {
            let back = recompose(decompose(v));
            assert_eq!(back.to_bits(), v.to_bits(), "{v}");
        }
        assert!(recompose(decompose(f64::NAN)).is_nan());
    }

    #[test]
    fn test_decompose_components() {
        let c = decompose(-6.0);
        assert_eq!(c.sign, 1);
        assert_eq!(c.zero, 0);
        assert_eq!(c.mantissa as f64 * 2f64.powi(c.exponent as i32), 6.0);

        let z = decompose(0.0);
        assert_eq!((z.zero, z.mantissa), (1, 0));
    }

    #[test]
    fn test_sharing_round_trip_is_exact_and_masked() {
        let engine = engine();
        let ctx = engine.keygen().unwrap();
        let values = vec![10.0, -0.2, 3.5e-10];

        let shares = engine.encode(&ctx, &values).unwrap();
        let plain = decompose(10.0);
        assert_ne!(shares.mantissa[0], plain.mantissa);

        assert_eq!(engine.decode(&ctx, &shares).unwrap(), values);
    }

    #[test]
    fn test_sharing_evaluate() {
        let engine = engine();
        let ctx = engine.keygen().unwrap();
        let a = engine.encode(&ctx, &[10.0, 20.0, 30.0]).unwrap();
        let b = engine.encode(&ctx, &[2.0, 4.0, 5.0]).unwrap();

        let product = engine.evaluate(&ctx, PrimitiveOperation::Mul, &a, &b).unwrap();
        assert_eq!(engine.decode(&ctx, &product).unwrap(), vec![20.0, 80.0, 150.0]);

        let diff = engine.evaluate(&ctx, PrimitiveOperation::Sub, &a, &b).unwrap();
        assert_eq!(engine.decode(&ctx, &diff).unwrap(), vec![8.0, 16.0, 25.0]);

        let short = engine.encode(&ctx, &[1.0]).unwrap();
        assert!(matches!(
            engine.evaluate(&ctx, PrimitiveOperation::Add, &a, &short),
            Err(EngineError::LengthMismatch { lhs: 3, rhs: 1 })
        ));
    }

    #[test]
    fn test_sharing_context_and_wire_form() {
        let engine = engine();
        let ctx = engine.keygen().unwrap();
        let bundle = engine.export_context(&ctx).unwrap();
        assert!(!bundle.has_secret());

        let imported = engine.import_context(&bundle).unwrap();
        assert_eq!(imported, ctx);

        let shares = engine.encode(&ctx, &[1.0, 2.0]).unwrap();
        let bytes = engine.handle_to_bytes(&shares).unwrap();
        assert_eq!(bytes.len(), 8 + 2 * 18);
        let parsed = engine.handle_from_bytes(&bytes).unwrap();
        assert_eq!(engine.decode(&imported, &parsed).unwrap(), vec![1.0, 2.0]);

        let bad = ContextBundle {
            public_material: vec![0; 5],
            ..bundle
        };
        assert!(matches!(engine.import_context(&bad), Err(EngineError::Malformed(_))));
    }
}
