//! The command bridge between the agent-facing tool surface and the browser
//! extension.
//!
//! The bridge owns a loopback-only WebSocket listener that accepts exactly
//! one extension peer at a time. After a token-authenticated handshake,
//! commands flow bridge -> peer as JSON frames and responses are correlated
//! back by id. The crate is split into three layers:
//!
//! - **`bridge`**: the listener, handshake state machine, pending-request
//!   table, timeout/cancellation logic, and dispatch API.
//! - **`allowlist`**: the origin predicate consulted before any `navigate`
//!   command leaves the process.
//! - **`reconnect`**: the exponential backoff schedule the peer follows when
//!   the bridge goes away; the bridge itself never dials out.

pub mod allowlist;
pub mod bridge;
pub mod reconnect;

pub use allowlist::OriginAllowlist;
pub use bridge::{ExtensionBridge, CLOSE_CODE_ALREADY_CONNECTED, REFUSED_REASON};
