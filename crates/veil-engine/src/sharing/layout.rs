//! Share record binary layout.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────┬─────────────────┬─────────────────┐
//! │ len: u64 │ sign: u8×len │ zero: u8×len │ mantissa: u64×len│ exponent: u64×len│
//! └──────────┴──────────────┴──────────────┴─────────────────┴─────────────────┘
//! ```
//!
//! All integers little-endian, no padding, no checksum. Readers trust the
//! length prefix; a record shorter than the prefix implies is rejected.

use crate::error::{EngineError, EngineResult};

const LEN_PREFIX: usize = 8;
/// sign + zero + mantissa + exponent
const BYTES_PER_ELEMENT: usize = 1 + 1 + 8 + 8;

/// Component arrays of a (masked) floating point vector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareComponents {
    pub sign: Vec<u8>,
    pub zero: Vec<u8>,
    pub mantissa: Vec<u64>,
    pub exponent: Vec<u64>,
}

impl ShareComponents {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            sign: Vec::with_capacity(len),
            zero: Vec::with_capacity(len),
            mantissa: Vec::with_capacity(len),
            exponent: Vec::with_capacity(len),
        }
    }

    pub fn len(&self) -> usize {
        self.sign.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sign.is_empty()
    }

    pub fn push(&mut self, sign: u8, zero: u8, mantissa: u64, exponent: u64) {
        self.sign.push(sign);
        self.zero.push(zero);
        self.mantissa.push(mantissa);
        self.exponent.push(exponent);
    }

    /// Size of the encoded record
    pub fn encoded_len(&self) -> usize {
        LEN_PREFIX + self.len() * BYTES_PER_ELEMENT
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.sign);
        out.extend_from_slice(&self.zero);
        for m in &self.mantissa {
            out.extend_from_slice(&m.to_le_bytes());
        }
        for e in &self.exponent {
            out.extend_from_slice(&e.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() < LEN_PREFIX {
            return Err(EngineError::Truncated {
                expected: LEN_PREFIX,
                actual: bytes.len(),
            });
        }
        let len = read_u64(&bytes[..LEN_PREFIX]);
        let len = usize::try_from(len)
            .map_err(|_| EngineError::Malformed(format!("share length {len} out of range")))?;
        let expected = len
            .checked_mul(BYTES_PER_ELEMENT)
            .and_then(|body| body.checked_add(LEN_PREFIX))
            .ok_or_else(|| EngineError::Malformed(format!("share length {len} out of range")))?;
        if bytes.len() < expected {
            return Err(EngineError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = LEN_PREFIX;
        let sign = bytes[offset..offset + len].to_vec();
        offset += len;
        let zero = bytes[offset..offset + len].to_vec();
        offset += len;
        let mantissa = bytes[offset..offset + len * 8]
            .chunks_exact(8)
            .map(read_u64)
            .collect();
        offset += len * 8;
        let exponent = bytes[offset..offset + len * 8]
            .chunks_exact(8)
            .map(read_u64)
            .collect();

        Ok(Self {
            sign,
            zero,
            mantissa,
            exponent,
        })
    }
}

fn read_u64(chunk: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    u64::from_le_bytes(word)
}
