use std::path::PathBuf;

use crate::EvaluationRecord;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad path, missing file or unexpected extension. Fatal to the single
    /// operation that received it.
    #[error("Invalid input '{}': {reason}", path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("Failed to read capture '{}': {message}", path.display())]
    CaptureRead { path: PathBuf, message: String },

    /// A file or directory this program produces could not be written.
    #[error("Failed to write '{}': {message}", path.display())]
    Output { path: PathBuf, message: String },

    #[error("Provider '{provider}' request failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A scoring step failed after the model produced its answers. The record
    /// carries the sentinel values to store if no retry succeeds.
    #[error("Scoring failed: {reason}")]
    Scoring {
        reason: String,
        record: Box<EvaluationRecord>,
    },
}

impl Error {
    pub fn validation(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Validation { path: path.into(), reason: reason.to_string() }
    }

    pub fn capture_read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::CaptureRead { path: path.into(), message: message.to_string() }
    }

    pub fn output(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Output { path: path.into(), message: message.to_string() }
    }

    pub fn provider(provider: impl ToString, message: impl ToString) -> Self {
        Error::Provider { provider: provider.to_string(), message: message.to_string() }
    }

    /// Provider hiccups and scoring failures are worth another attempt; bad
    /// input and configuration never get better by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { .. } | Error::Scoring { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
