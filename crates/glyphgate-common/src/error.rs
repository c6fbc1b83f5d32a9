//! Common error types for Glyphgate components.

use thiserror::Error;

use crate::types::ChallengeState;

/// Errors raised by the challenge engine and its boundaries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// Bad construction parameters (caller bug)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not enough eligible glyphs to satisfy a sample
    #[error("Insufficient glyph pool: requested {requested}, available {available}")]
    InsufficientPool { requested: usize, available: usize },

    /// Codepoint bounds wider than the catalog's own bounds
    #[error("Codepoint range violation: {0}")]
    RangeViolation(String),

    /// Glyph id is not part of the challenge (stale or forged press)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Late event on a finished challenge
    #[error("Challenge already terminal ({0:?})")]
    AlreadyTerminal(ChallengeState),

    /// Messaging transport call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Asset store failure (listing, decoding, writing)
    #[error("Asset error: {0}")]
    Asset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidConfiguration(_) => 500,
            Self::InsufficientPool { .. } => 500,
            Self::RangeViolation(_) => 500,
            Self::NotFound(_) => 404,
            Self::AlreadyTerminal(_) => 409,
            Self::Transport(_) => 502,
            Self::Asset(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true for errors that are expected during normal operation
    /// (stale presses, late events) and only warrant a debug log
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AlreadyTerminal(_))
    }
}
