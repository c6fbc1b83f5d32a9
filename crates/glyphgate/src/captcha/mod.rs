//! Emoji captcha: challenge state, keyboard, grid layout and image composition.
//!
//! A challenge shows an image with a few emojis stamped on it and a keyboard
//! of emoji buttons; the user must press the ones they can see.

mod challenge;
mod compositor;
mod keyboard;
pub mod layout;

pub use challenge::{Challenge, ChallengeButton, ChallengeParams, SelectOutcome};
pub use compositor::{ArtifactFile, Compositor, compose, random_rotation, random_side};
pub use keyboard::{CallbackData, Keyboard, KeyboardButton};
pub use layout::{Envelope, GridCell, GridLayout};

