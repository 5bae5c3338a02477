use crate::protocol::{ProtocolState, Stage};
use thiserror::Error;
use veil_engine::EngineError;

/// Delegation protocol errors.
///
/// Every variant records the step at which it occurred. None of them is
/// retried; the run stops and the state machine moves to `Failed`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("[{stage}] Configuration error: {message}")]
    Configuration { stage: Stage, message: String },

    #[error("[{stage}] Shape error: {message}")]
    Shape { stage: Stage, message: String },

    #[error("[{stage}] Domain error: {message}")]
    Domain { stage: Stage, message: String },

    #[error("[{stage}] I/O error at {location}: {source}")]
    Io {
        stage: Stage,
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{stage}] Engine error: {source}")]
    Engine {
        stage: Stage,
        #[source]
        source: EngineError,
    },

    #[error("[{stage}] Invalid transition from state {state}")]
    InvalidTransition { stage: Stage, state: ProtocolState },
}

impl ProtocolError {
    pub fn configuration(stage: Stage, message: impl Into<String>) -> Self {
        Self::Configuration {
            stage,
            message: message.into(),
        }
    }

    pub fn shape(stage: Stage, message: impl Into<String>) -> Self {
        Self::Shape {
            stage,
            message: message.into(),
        }
    }

    pub fn domain(stage: Stage, message: impl Into<String>) -> Self {
        Self::Domain {
            stage,
            message: message.into(),
        }
    }

    pub fn io(stage: Stage, location: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            location: location.into(),
            source,
        }
    }

    /// Adapter for `map_err` on engine calls
    pub fn engine(stage: Stage) -> impl FnOnce(EngineError) -> Self {
        move |source| Self::Engine { stage, source }
    }

    /// Step at which the error occurred
    pub fn stage(&self) -> Stage {
        match self {
            Self::Configuration { stage, .. }
            | Self::Shape { stage, .. }
            | Self::Domain { stage, .. }
            | Self::Io { stage, .. }
            | Self::Engine { stage, .. }
            | Self::InvalidTransition { stage, .. } => *stage,
        }
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage() {
        let err = ProtocolError::shape(Stage::Prepare, "A has 5 elements, B has 3");
        assert_eq!(err.stage(), Stage::Prepare);
        assert_eq!(err.to_string(), "[prepare] Shape error: A has 5 elements, B has 3");

        let io = ProtocolError::io(
            Stage::Retrieve,
            "data/result.bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(io.is_io());
        assert!(io.to_string().starts_with("[retrieve] I/O error at data/result.bin"));
    }

    #[test]
    fn test_engine_adapter() {
        let err = Err::<(), _>(EngineError::MissingSecret("decode"))
            .map_err(ProtocolError::engine(Stage::Compute))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Compute);
        assert!(matches!(err, ProtocolError::Engine { .. }));
    }
}
