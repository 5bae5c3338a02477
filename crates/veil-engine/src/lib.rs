//! # Veil Engine
//!
//! Confidentiality engine abstraction for veil.
//!
//! The delegation protocol never touches plaintext on the computing side. It
//! drives a confidentiality engine through a small capability set and treats
//! every engine failure uniformly:
//!
//! - **MockEngine**: plaintext passthrough with call counters, for tests
//! - **MaskingEngine**: encryption-based, keyed slot masking with a bounded
//!   multiplicative depth
//! - **SharingEngine**: share-based, floating point values split into
//!   sign / zero / mantissa / exponent components and masked per slot
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             Veil Engine                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 ConfidentialityEngine Trait                      │   │
//! │  │  • keygen()    - Fresh context (params, public, secret)         │   │
//! │  │  • encode()    - Vector -> opaque handle                        │   │
//! │  │  • decode()    - Handle -> vector (needs secret where relevant) │   │
//! │  │  • evaluate()  - Primitive add / sub / mul over two handles     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                         │
//! │         ┌────────────────────┼────────────────────┐                    │
//! │         ▼                    ▼                    ▼                    │
//! │  ┌──────────────┐   ┌─────────────────┐   ┌─────────────────┐         │
//! │  │  MockEngine  │   │  MaskingEngine  │   │  SharingEngine  │         │
//! │  │ (feat: mock) │   │ (encryption)    │   │ (shares)        │         │
//! │  │              │   │                 │   │                 │         │
//! │  │ • plaintext  │   │ • slot keys     │   │ • S/Z/M/E split │         │
//! │  │ • counters   │   │ • depth bound   │   │ • binary layout │         │
//! │  └──────────────┘   └─────────────────┘   └─────────────────┘         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use veil_engine::{ConfidentialityEngine, EngineConfig, MaskingEngine};
//! use veil_types::PrimitiveOperation;
//!
//! let engine = MaskingEngine::new(EngineConfig::default());
//! let ctx = engine.keygen()?;
//!
//! let a = engine.encode(&ctx, &[1.0, 2.0])?;
//! let b = engine.encode(&ctx, &[0.5, 0.25])?;
//! let r = engine.evaluate(&ctx, PrimitiveOperation::Mul, &a, &b)?;
//!
//! let values = engine.decode(&ctx, &r)?;
//! ```

pub mod error;
pub mod masking;
pub mod sharing;
pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::{EngineError, EngineResult};
pub use masking::{MaskedVector, MaskingContext, MaskingEngine};
pub use sharing::{ShareComponents, SharingContext, SharingEngine};
pub use traits::{Backend, ConfidentialityEngine, ContextBundle, EngineConfig, EngineInfo};

#[cfg(feature = "mock")]
pub use mock::{MockContext, MockEngine, MockHandle};
