//! Environment-driven configuration.
//!
//! Two knobs: `ACT_PORT` (listener port, default 3695) and
//! `ACT_ALLOWED_ORIGINS` (comma-separated origin list, default empty --
//! loopback targets are always allowed by the predicate itself).

use std::path::PathBuf;

use crate::error::BridgeError;

/// Default WebSocket listener port.
pub const DEFAULT_PORT: u16 = 3695;

/// Name of the per-project state directory created under the working
/// directory. Holds the audit log and the baseline images.
pub const STATE_DIR_NAME: &str = ".agent-chrome-test";

#[derive(Debug, Clone)]
pub struct Config {
    /// Loopback port the bridge listens on.
    pub port: u16,
    /// Origins navigation may target, seeded from configuration.
    pub allowed_origins: Vec<String>,
    /// Root of the persistent state layout (audit log, baselines).
    pub state_dir: PathBuf,
}

impl Config {
    /// Build a config from explicit values, as the CLI layer does after clap
    /// has resolved flags and environment variables.
    pub fn new(port: u16, allowed_origins: &str, cwd: PathBuf) -> Self {
        Self {
            port,
            allowed_origins: parse_origins(allowed_origins),
            state_dir: cwd.join(STATE_DIR_NAME),
        }
    }

    /// Parse a port string (`ACT_PORT`). Zero is permitted so tests can bind
    /// an ephemeral port; anything unparseable is *invalid-input*.
    pub fn parse_port(raw: &str) -> Result<u16, BridgeError> {
        raw.trim()
            .parse::<u16>()
            .map_err(|_| BridgeError::invalid_input(format!("invalid port: {raw:?}")))
    }
}

/// Split a comma-separated origin list, trimming whitespace and dropping
/// empty entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
