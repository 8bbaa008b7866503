//! Wire frames exchanged between the bridge and the extension peer.
//!
//! Each frame is one JSON object over the WebSocket, internally tagged on
//! `type`. Field names on the wire are camelCase to match the extension side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default timeout for a dispatched command when the caller supplies none.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Commands the bridge forwards to the extension without interpretation
/// (except `navigate`, which is gated on the origin allowlist first).
pub const COMMAND_NAMES: &[&str] = &[
    "ping",
    "navigate",
    "screenshot",
    "evaluate",
    "url",
    "title",
    "network_capture_start",
    "network_capture_stop",
    "click",
    "type",
    "select",
    "hover",
    "scroll",
    "key",
    "wait",
    "query",
    "query_all",
    "text",
    "html",
];

/// A frame on the bridge<->extension socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame after connect, peer -> bridge.
    Auth {
        token: String,
        #[serde(rename = "extensionId", skip_serializing_if = "Option::is_none")]
        extension_id: Option<String>,
        /// Origins the extension asks to be added to the navigation
        /// allowlist. Union-merged with the seeded set; never shrinks it.
        #[serde(rename = "allowedOrigins", skip_serializing_if = "Option::is_none")]
        allowed_origins: Option<Vec<String>>,
    },

    /// Reply to `auth`, bridge -> peer.
    AuthResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "allowedOrigins", skip_serializing_if = "Option::is_none")]
        allowed_origins: Option<Vec<String>>,
    },

    /// A command dispatch. Bridge -> peer, and also peer -> bridge for the
    /// `ping` keepalive.
    Command {
        id: String,
        command: String,
        #[serde(default)]
        params: Value,
        #[serde(rename = "tabId", skip_serializing_if = "Option::is_none")]
        tab_id: Option<i64>,
    },

    /// Correlated reply to a `command` frame, sent by whichever side
    /// received the command.
    Response {
        id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Frame {
    /// Parse a single text frame. Returns `None` for malformed JSON or
    /// unknown frame shapes -- the bridge ignores those rather than erroring.
    pub fn parse(text: &str) -> Option<Frame> {
        serde_json::from_str(text).ok()
    }

    /// Serialize to the single-line JSON wire form.
    pub fn to_wire(&self) -> String {
        // Frame variants only contain JSON-representable data.
        serde_json::to_string(self).unwrap_or_default()
    }
}
