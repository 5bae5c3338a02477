use thiserror::Error;

/// Confidentiality engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Vector of length {len} exceeds engine capacity of {capacity} slots")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error("Secret key material required for {0}")]
    MissingSecret(&'static str),

    #[error("Operand length mismatch: {lhs} vs {rhs}")]
    LengthMismatch { lhs: usize, rhs: usize },

    #[error("Handle was produced under a different key: expected {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    #[error("Operand degree mismatch: {lhs} vs {rhs}")]
    DegreeMismatch { lhs: u32, rhs: u32 },

    #[error("Multiplicative depth exhausted: degree {degree} exceeds maximum {max}")]
    DepthExhausted { degree: u32, max: u32 },

    #[error("Truncated share record: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Malformed engine data: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
