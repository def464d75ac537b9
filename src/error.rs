use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a [`VirtuGeneError`], stable across versions so
/// callers can branch on it without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Unavailable,
    Io,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum VirtuGeneError {
    #[error("invalid nucleotide '{character}' at position {position}")]
    InvalidAlphabet { character: char, position: usize },

    #[error("sequence input is empty")]
    EmptyInput,

    #[error("sequence length {length} is not a multiple of 3")]
    FrameError { length: usize },

    #[error("invalid sequence length range {min}..={max}")]
    InvalidLengthRange { min: usize, max: usize },

    #[error("unknown species '{name}'")]
    UnknownSpecies { name: String },

    #[error("unknown trait '{name}'")]
    UnknownTrait { name: String },

    #[error("unknown expression host '{name}'")]
    UnknownHost { name: String },

    #[error("trait scoring unavailable: {reason}")]
    ScoringUnavailable { reason: String },

    #[error("job '{job_id}' not found")]
    JobNotFound { job_id: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl VirtuGeneError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidAlphabet { .. }
            | Self::EmptyInput
            | Self::FrameError { .. }
            | Self::InvalidLengthRange { .. }
            | Self::UnknownSpecies { .. }
            | Self::UnknownTrait { .. }
            | Self::UnknownHost { .. }
            | Self::Config { .. } => ErrorCode::InvalidInput,
            Self::JobNotFound { .. } => ErrorCode::NotFound,
            Self::ScoringUnavailable { .. } => ErrorCode::Unavailable,
            Self::Io { .. } => ErrorCode::Io,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// True when resubmitting the same request may succeed without changing it.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), ErrorCode::Unavailable)
    }
}

impl From<std::io::Error> for VirtuGeneError {
    fn from(err: std::io::Error) -> Self {
        VirtuGeneError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VirtuGeneError {
    fn from(err: serde_json::Error) -> Self {
        VirtuGeneError::Config {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VirtuGeneError>;
