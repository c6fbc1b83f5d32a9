//! # Glyphgate - emoji captcha for group chats
//!
//! New members are muted and shown an image with a few emojis stamped on it,
//! plus a keyboard of emoji buttons. Pressing the right ones lifts the
//! restriction; too many mistakes or running out of time gets them muted for
//! good or banned.
//!
//! ## Architecture
//! ```text
//! chat adapter ──events──▶ routes ──▶ handler ──▶ registry ◀── sweeper
//!      ▲                                 │
//!      └──────── /commands ◀── outbox ◀──┘
//! ```

pub mod assets;
pub mod captcha;
pub mod catalog;
pub mod config;
pub mod handler;
pub mod registry;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod transport;
