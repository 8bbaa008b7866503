//! Core tool abstraction: the [`ToolDefinition`] trait and [`ToolInfo`].
//!
//! Every agent-visible operation implements [`ToolDefinition`]. The trait is
//! `Send + Sync` so tools can live in a shared registry and be called from
//! any async task. A tool's result is a single JSON value; the MCP layer
//! wraps it into the text-chunk envelope.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the agent can invoke.
#[async_trait::async_trait]
pub trait ToolDefinition: Send + Sync {
    /// Unique name (alphanumeric + underscores, max 64 chars).
    fn name(&self) -> &str;

    /// Short description shown in `tools/list`.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn input_schema(&self) -> Value;

    /// Run the tool. Errors are converted into failure payloads at the MCP
    /// boundary -- they never reach the agent as protocol faults.
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Listing entry returned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

const MAX_TOOL_NAME_LEN: usize = 64;

/// Tool names are restricted to alphanumerics and underscores so the
/// catalogue stays injection-proof.
pub fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("tool name must not be empty");
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        anyhow::bail!("tool name exceeds {MAX_TOOL_NAME_LEN} characters: {name}");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        anyhow::bail!("tool name must contain only alphanumerics and underscores: {name}");
    }
    Ok(())
}

/// Input schemas must be JSON objects with a `"type"` field.
pub fn validate_input_schema(schema: &Value) -> Result<()> {
    let obj = schema
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("input schema must be a JSON object"))?;
    if !obj.contains_key("type") {
        anyhow::bail!("input schema must contain a \"type\" field");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_names() {
        assert!(validate_tool_name("browser_navigate").is_ok());
        assert!(validate_tool_name("assert_text").is_ok());
        assert!(validate_tool_name("a").is_ok());
        assert!(validate_tool_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_hostile_names() {
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name(&"x".repeat(65)).is_err());
        assert!(validate_tool_name("has-dash").is_err());
        assert!(validate_tool_name("has space").is_err());
        assert!(validate_tool_name("../traversal").is_err());
        assert!(validate_tool_name("semi;colon").is_err());
    }

    #[test]
    fn schema_must_be_typed_object() {
        assert!(validate_input_schema(&serde_json::json!({"type": "object"})).is_ok());
        assert!(validate_input_schema(&serde_json::json!("string")).is_err());
        assert!(validate_input_schema(&serde_json::json!({"properties": {}})).is_err());
    }
}
