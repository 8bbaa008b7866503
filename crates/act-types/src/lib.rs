//! Core types shared across all agent-chrome-test crates.
//!
//! Defines the WebSocket wire frames exchanged with the browser extension,
//! the error taxonomy used by the bridge and tool surface, and environment
//! configuration.

pub mod config;
pub mod error;
pub mod frames;

pub use config::Config;
pub use error::BridgeError;
pub use frames::{Frame, COMMAND_NAMES, DEFAULT_COMMAND_TIMEOUT_MS};
