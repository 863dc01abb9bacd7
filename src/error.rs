//! Error types for korspeech.

use crate::annotation::AnnotationParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KorspeechError {
    // Annotation errors
    #[error("Annotation parse error: {0}")]
    AnnotationParse(#[from] AnnotationParseError),

    // Dataset errors
    #[error("Transcript not found for sample {sample_id}")]
    TranscriptNotFound { sample_id: String },

    #[error("Sample index {index} out of range for dataset of {len} samples")]
    SampleOutOfRange { index: usize, len: usize },

    #[error("Invalid record at {path}:{line}: {message}")]
    InvalidRecord {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Dialect {dialect} does not support {operation}")]
    Unsupported { dialect: String, operation: String },

    #[error("Unknown dialect: {name}")]
    UnknownDialect { name: String },

    // Batching errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Configuration file errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // General I/O errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl KorspeechError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, KorspeechError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transcript_not_found_display() {
        let error = KorspeechError::TranscriptNotFound {
            sample_id: "dialog_00017".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcript not found for sample dialog_00017"
        );
    }

    #[test]
    fn test_configuration_display() {
        let error = KorspeechError::configuration("max_tokens 10 < longest sample 12");
        assert_eq!(
            error.to_string(),
            "Configuration error: max_tokens 10 < longest sample 12"
        );
    }

    #[test]
    fn test_invalid_record_display() {
        let error = KorspeechError::InvalidRecord {
            path: "train.trn".to_string(),
            line: 4,
            message: "missing separator \"::\"".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid record at train.trn:4: missing separator \"::\""
        );
    }

    #[test]
    fn test_unsupported_display() {
        let error = KorspeechError::Unsupported {
            dialect: "hallym".to_string(),
            operation: "target lengths".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Dialect hallym does not support target lengths"
        );
    }

    #[test]
    fn test_from_annotation_error() {
        let error: KorspeechError = AnnotationParseError::Unbalanced { open: 1, close: 0 }.into();
        assert!(error.to_string().starts_with("Annotation parse error"));
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: KorspeechError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: KorspeechError = toml_error.into();
        assert!(error.to_string().contains("Failed to parse configuration"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: KorspeechError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KorspeechError>();
        assert_sync::<KorspeechError>();
    }
}
