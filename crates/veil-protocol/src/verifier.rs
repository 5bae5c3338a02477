//! Result verification.
//!
//! [`ResultVerifier`] only measures: it reports the absolute deviation of
//! every element and never decides pass or fail. [`Tolerance`] is the
//! caller-side policy for flagging elements.

use tracing::warn;
use veil_types::VerificationReport;

/// Compares decoded results against a locally known reference
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultVerifier;

impl ResultVerifier {
    /// Per-element `|result[i] - reference[i]|`.
    ///
    /// Lengths are expected to match. On mismatch the common prefix is
    /// compared and a warning is logged.
    pub fn verify(result: &[f64], reference: &[f64]) -> VerificationReport {
        if result.len() != reference.len() {
            warn!(
                result_len = result.len(),
                reference_len = reference.len(),
                "Result and reference lengths differ, comparing common prefix"
            );
        }
        let differences = result
            .iter()
            .zip(reference)
            .map(|(r, e)| (r - e).abs())
            .collect();
        VerificationReport::new(differences)
    }
}

/// Acceptance policy applied by callers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// `|r - e| <= eps`
    Absolute(f64),
    /// `|r - e| <= ratio * |e|`
    Relative(f64),
    /// Deviation at most half a unit in the last kept significant digit of `e`
    SignificantDigits(u32),
}

impl Tolerance {
    pub fn accepts(&self, result: f64, reference: f64) -> bool {
        let deviation = (result - reference).abs();
        match *self {
            Tolerance::Absolute(eps) => deviation <= eps,
            Tolerance::Relative(ratio) => deviation <= ratio * reference.abs(),
            Tolerance::SignificantDigits(digits) => {
                if reference == 0.0 {
                    return result == 0.0;
                }
                let magnitude = reference.abs().log10().floor() as i32;
                let unit = 10f64.powi(magnitude - digits as i32 + 1);
                deviation <= unit / 2.0
            }
        }
    }

    /// Indices of elements outside tolerance
    pub fn flagged(&self, result: &[f64], reference: &[f64]) -> Vec<usize> {
        result
            .iter()
            .zip(reference)
            .enumerate()
            .filter(|(_, (r, e))| !self.accepts(**r, **e))
            .map(|(i, _)| i)
            .collect()
    }
}
