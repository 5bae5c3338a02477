use serde::{Deserialize, Serialize};

/// Per-element absolute difference between a decoded result and a reference.
///
/// Produced by the delegating party only. No pass/fail threshold is applied
/// here; acceptance policy belongs to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub differences: Vec<f64>,
}

impl VerificationReport {
    pub fn new(differences: Vec<f64>) -> Self {
        Self { differences }
    }

    pub fn len(&self) -> usize {
        self.differences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    /// Largest deviation; NaN differences propagate.
    pub fn max_difference(&self) -> Option<f64> {
        self.differences.iter().copied().reduce(|acc, d| {
            if d.is_nan() || acc.is_nan() {
                f64::NAN
            } else {
                acc.max(d)
            }
        })
    }

    pub fn mean_difference(&self) -> Option<f64> {
        if self.differences.is_empty() {
            return None;
        }
        Some(self.differences.iter().sum::<f64>() / self.differences.len() as f64)
    }
}
