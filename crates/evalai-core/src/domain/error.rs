//! Domain-level error taxonomy for EvalAI.
//!
//! Scoring problems are deliberately absent: a scorer that cannot extract
//! or validate an answer returns `ScoreOutcome::Failed`, never an error.

use eval_store::StoreError;
use llm_transport::TransportError;

/// EvalAI errors.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Malformed or missing required configuration. Fatal before execution.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        EvalError::Configuration(message.into())
    }
}

impl From<serde_yaml::Error> for EvalError {
    fn from(err: serde_yaml::Error) -> Self {
        EvalError::Configuration(err.to_string())
    }
}

/// Result type for EvalAI operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_error_display() {
        let err = EvalError::Configuration("missing key `models`".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("models"));

        let err = EvalError::UnsupportedProvider("bedrock".to_string());
        assert_eq!(err.to_string(), "unsupported provider: bedrock");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: EvalError = TransportError::Http("connection reset".to_string()).into();
        assert!(matches!(err, EvalError::Transport(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_yaml_error_is_configuration() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("{not: a list}").unwrap_err();
        let err: EvalError = yaml_err.into();
        assert!(matches!(err, EvalError::Configuration(_)));
    }
}
