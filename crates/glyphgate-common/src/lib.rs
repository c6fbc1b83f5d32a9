//! # Glyphgate Common
//!
//! Shared types, errors, and constants used across Glyphgate components.
//!
//! ## Modules
//! - `types` - Identifiers and challenge state (GroupId, UserId, ChallengeKey, etc.)
//! - `error` - The challenge engine error taxonomy
//! - `constants` - Reserved glyphs, callback identifiers and defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::GateError;
pub use types::*;
