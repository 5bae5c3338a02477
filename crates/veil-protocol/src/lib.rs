//! # Veil Protocol
//!
//! Delegation protocol for private vector arithmetic.
//!
//! A data owner (delegating party) asks a computing party to evaluate
//! `A <op> B` over vectors it does not want to reveal. The confidentiality
//! engine only evaluates add, sub and mul, so the requested operation is
//! first rewritten into one of those:
//!
//! ```text
//!   A + B   ->  A + B
//!   A - B   ->  A - B
//!   A * B   ->  A * B
//!   A / B   ->  A * (1/B)
//!   A ^ B   ->  log2(A) * B      (result and reference live in log2 space)
//! ```
//!
//! ## Protocol flow
//!
//! ```text
//!   Delegating party                 Handoff medium              Computing party
//!   ────────────────                 ──────────────              ───────────────
//!   prepare  (resolve, translate,
//!             keygen, encode)
//!   transfer ───────────────────────▶ context, public,
//!                                      operands, descriptor
//!                                                   ───────────▶ compute (load public
//!                                                                 context, evaluate)
//!                                      result ◀──────────────────
//!   retrieve ◀─────────────────────── result
//!   verify   (local report)
//! ```
//!
//! Each arrow is a separate process invocation; nothing blocks on the peer.
//!
//! ## States
//!
//! `Idle → Prepared → Transferred → Computed → Retrieved → Verified`, with
//! `Failed` reachable from any step. Every failure is returned as a
//! [`ProtocolError`] naming the step at which it happened.

pub mod config;
pub mod context;
pub mod error;
pub mod handoff;
pub mod package;
pub mod protocol;
pub mod resolver;
pub mod translator;
pub mod verifier;

pub use config::{DelegationConfig, Locations};
pub use error::{ProtocolError, ProtocolResult};
pub use handoff::{FsHandoff, HandoffMedium, MemoryHandoff};
pub use package::{DelegationPackage, Descriptor, DESCRIPTOR_VERSION};
pub use protocol::{ComputingParty, DelegatingParty, ProtocolState, Stage};
pub use resolver::{require_valid_role, resolve};
pub use translator::{
    check_domain, primitive_for, result_to_linear, rule, translate, translate_operand,
    translate_reference, ElementTransform, Translation, TranslationRule,
};
pub use verifier::{ResultVerifier, Tolerance};
