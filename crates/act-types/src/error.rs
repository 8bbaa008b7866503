//! Error types shared across all agent-chrome-test crates.

/// Errors surfaced by the bridge and the tool surface.
///
/// Every dispatched command terminates with exactly one of the first four
/// variants or a successful response; the remaining variants cover local
/// validation and storage failures. Malformed frames from the peer are never
/// surfaced as errors -- the bridge drops them silently.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// No authenticated extension peer is attached.
    #[error("no extension connected")]
    NotConnected,

    /// The caller-supplied timeout elapsed before a response arrived.
    #[error("command '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The peer disconnected while the command was in flight.
    #[error("extension disconnected")]
    PeerDisconnected,

    /// The bridge is shutting down.
    #[error("bridge shutting down")]
    ShuttingDown,

    /// Locally rejected input: bad baseline name, out-of-range port, bad URL.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The navigation target is outside the origin allowlist.
    #[error("navigation not allowed: {url}")]
    NotAllowed { url: String },

    /// The peer reported a failure in its response frame; the message is
    /// propagated verbatim.
    #[error("{message}")]
    Peer { message: String },

    /// Filesystem I/O failure in the baseline store or audit path.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BridgeError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
