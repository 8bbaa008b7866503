//! The agent-facing tool surface.
//!
//! Exposes the bridge's browser commands and the derived testing
//! capabilities (assertions, visual regression, grouped test sessions) as a
//! catalogue of named tools served over MCP stdio. The catalogue is a table
//! of records -- name, schema, handler -- so it stays inspectable and
//! testable.

pub mod context;
pub mod definition;
pub mod mcp_server;
pub mod registry;
pub mod session;
pub mod tools;

pub use context::ToolContext;
pub use definition::{ToolDefinition, ToolInfo};
pub use mcp_server::McpServer;
pub use registry::ToolRegistry;
pub use session::{Assertion, SessionSummary, TestSession};
