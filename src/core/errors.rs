//! Error types for the table extraction pipeline.
//!
//! This module defines the error taxonomy used across all pipeline components.
//! Terminal conditions (no regions found, model/dictionary mismatch) carry
//! named variants so callers can react to them; per-cell failures are absorbed
//! by the orchestrator and never surface through this type.

use thiserror::Error;

/// Convenience alias for results produced by this crate.
pub type OcrResult<T> = Result<T, OcrError>;

/// Enum representing the errors that can occur in the extraction pipeline.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Detection produced zero usable boxes after the entire retry ladder.
    ///
    /// Terminal for the current image; the caller may advise retaking the
    /// photo.
    #[error("no text regions detected after {attempts} attempt(s)")]
    NoRegionsDetected {
        /// Number of extraction attempts made before giving up.
        attempts: usize,
    },

    /// The recognition model's class count does not match the dictionary.
    ///
    /// Terminal; processing stops before any cell is recognized so that a
    /// mismatched pairing never produces confidently wrong text.
    #[error(
        "recognition model reports {class_count} classes, dictionary has {dictionary_len} labels (expected {dictionary_len} or {with_blank})",
        with_blank = dictionary_len + 1
    )]
    IncompatibleModel {
        /// Class count reported by the recognition model output.
        class_count: usize,
        /// Number of labels in the loaded dictionary.
        dictionary_len: usize,
    },

    /// An external inference call failed.
    #[error("inference failed in model '{model}': {context}")]
    Inference {
        /// The model the call was routed to ("detection", "recognition", ...).
        model: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error, when one is available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The run was superseded by a newer image submission.
    ///
    /// Partial results of the stale run are discarded by the orchestrator.
    #[error("pipeline run superseded by a newer submission")]
    Superseded,

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from tensor shape operations.
    #[error("tensor shape")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    /// Creates an [`OcrError::InvalidInput`] from a message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an [`OcrError::Config`] from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wraps an error raised by an external inference engine.
    pub fn inference(
        model: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model: model.into(),
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an inference error without an underlying source.
    pub fn inference_msg(model: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Inference {
            model: model.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Returns true for conditions that abort the whole run.
    ///
    /// Per-cell inference errors are recovered locally by the orchestrator and
    /// are not terminal even though the variant appears here.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoRegionsDetected { .. } | Self::IncompatibleModel { .. } | Self::Superseded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_model_message_names_both_counts() {
        let err = OcrError::IncompatibleModel {
            class_count: 50,
            dictionary_len: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("50"));
        assert!(msg.contains("100"));
        assert!(msg.contains("101"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(OcrError::NoRegionsDetected { attempts: 3 }.is_terminal());
        assert!(
            OcrError::IncompatibleModel {
                class_count: 1,
                dictionary_len: 3
            }
            .is_terminal()
        );
        assert!(OcrError::Superseded.is_terminal());
        assert!(!OcrError::invalid_input("x").is_terminal());
        assert!(!OcrError::inference_msg("recognition", "boom").is_terminal());
    }
}
