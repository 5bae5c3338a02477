//! Computation request and its on-disk input format.
//!
//! The loader accepts both the canonical field names
//! (`declaredLength`, `operation`, `vectorA`, `vectorB`, `referenceResult`)
//! and the short ones used by older client data files
//! (`dataLen`, `chosenOp`, `A`, `B`, `res`).

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Request loading errors
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Failed to read request file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Raw request record as found in a request file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFile {
    #[serde(alias = "dataLen")]
    pub declared_length: usize,

    #[serde(alias = "chosenOp")]
    pub operation: Operation,

    #[serde(default, alias = "A")]
    pub vector_a: Option<Vec<f64>>,

    #[serde(default, alias = "B")]
    pub vector_b: Option<Vec<f64>>,

    #[serde(default, alias = "res")]
    pub reference_result: Option<Vec<f64>>,
}

/// One invocation's worth of input.
///
/// Absent vectors are represented as empty. Shape consistency is checked by
/// role resolution, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationRequest {
    pub declared_length: usize,
    pub operation: Operation,
    pub vector_a: Vec<f64>,
    pub vector_b: Vec<f64>,
    pub reference: Vec<f64>,
}

impl ComputationRequest {
    pub fn new(declared_length: usize, operation: Operation) -> Self {
        Self {
            declared_length,
            operation,
            vector_a: Vec::new(),
            vector_b: Vec::new(),
            reference: Vec::new(),
        }
    }

    pub fn with_a(mut self, a: Vec<f64>) -> Self {
        self.vector_a = a;
        self
    }

    pub fn with_b(mut self, b: Vec<f64>) -> Self {
        self.vector_b = b;
        self
    }

    pub fn with_reference(mut self, reference: Vec<f64>) -> Self {
        self.reference = reference;
        self
    }

    pub fn has_reference(&self) -> bool {
        !self.reference.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        let file: RequestFile = serde_json::from_str(json)?;
        Ok(file.into())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RequestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl From<RequestFile> for ComputationRequest {
    fn from(file: RequestFile) -> Self {
        Self {
            declared_length: file.declared_length,
            operation: file.operation,
            vector_a: file.vector_a.unwrap_or_default(),
            vector_b: file.vector_b.unwrap_or_default(),
            reference: file.reference_result.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_canonical_fields() {
        let json = r#"{
            "declaredLength": 3,
            "operation": "div",
            "vectorA": [10, 20, 30],
            "vectorB": [2, 4, 5],
            "referenceResult": [5, 5, 6]
        }"#;
        let req = ComputationRequest::from_json(json).unwrap();

        assert_eq!(req.declared_length, 3);
        assert_eq!(req.operation, Operation::Div);
        assert_eq!(req.vector_b, vec![2.0, 4.0, 5.0]);
        assert!(req.has_reference());
    }

    #[test]
    fn test_request_legacy_fields_and_missing_vectors() {
        let json = r#"{ "dataLen": 2, "chosenOp": "exp", "A": [2, 3], "B": [], "extra": true }"#;
        let req = ComputationRequest::from_json(json).unwrap();

        assert_eq!(req.operation, Operation::Exp);
        assert_eq!(req.vector_a, vec![2.0, 3.0]);
        assert!(req.vector_b.is_empty());
        assert!(req.reference.is_empty());
    }

    #[test]
    fn test_request_rejects_unknown_operation() {
        let json = r#"{ "declaredLength": 1, "operation": "pow" }"#;
        assert!(matches!(
            ComputationRequest::from_json(json),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_to_client.json");
        std::fs::write(&path, r#"{ "declaredLength": 1, "operation": "add", "vectorA": [1] }"#)
            .unwrap();

        let req = ComputationRequest::load(&path).unwrap();
        assert_eq!(req.vector_a, vec![1.0]);

        let missing = ComputationRequest::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(RequestError::Io { .. })));
    }
}
