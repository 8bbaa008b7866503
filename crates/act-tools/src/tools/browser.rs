//! Pass-through browser tools.
//!
//! Each tool forwards its arguments verbatim as the params of exactly one
//! bridge command and returns the response `data` untouched. The in-page
//! semantics live in the extension; the schemas here document the parameter
//! shapes the extension expects.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;

struct PassthroughTool {
    ctx: Arc<ToolContext>,
    tool_name: &'static str,
    command: &'static str,
    description: &'static str,
    schema: Value,
}

#[async_trait::async_trait]
impl ToolDefinition for PassthroughTool {
    fn name(&self) -> &str {
        self.tool_name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let data = self.ctx.bridge.send_command(self.command, args, None).await?;
        Ok(data)
    }
}

fn selector_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "selector": { "type": "string" } },
        "required": ["selector"]
    })
}

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// The one-to-one tool table: tool name, command, description, schema.
fn catalogue() -> Vec<(&'static str, &'static str, &'static str, Value)> {
    vec![
        (
            "browser_navigate",
            "navigate",
            "Navigate the active tab to a URL (subject to the origin allowlist)",
            json!({
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"]
            }),
        ),
        (
            "browser_screenshot",
            "screenshot",
            "Capture a PNG screenshot of the visible viewport",
            empty_schema(),
        ),
        (
            "browser_evaluate",
            "evaluate",
            "Evaluate JavaScript in the page and return its result",
            json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"]
            }),
        ),
        ("browser_url", "url", "Get the active tab's URL", empty_schema()),
        ("browser_title", "title", "Get the active tab's title", empty_schema()),
        (
            "browser_click",
            "click",
            "Click the first element matching a selector",
            selector_schema(),
        ),
        (
            "browser_type",
            "type",
            "Type text into the element matching a selector",
            json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string" },
                    "text": { "type": "string" }
                },
                "required": ["selector", "text"]
            }),
        ),
        (
            "browser_select",
            "select",
            "Choose an option in a select element",
            json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string" },
                    "value": { "type": "string" }
                },
                "required": ["selector", "value"]
            }),
        ),
        (
            "browser_hover",
            "hover",
            "Hover the element matching a selector",
            selector_schema(),
        ),
        (
            "browser_scroll",
            "scroll",
            "Scroll an element into view, or the page by pixel offsets",
            json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string" },
                    "x": { "type": "number" },
                    "y": { "type": "number" }
                }
            }),
        ),
        (
            "browser_key",
            "key",
            "Send a keyboard key to the focused element",
            json!({
                "type": "object",
                "properties": { "key": { "type": "string" } },
                "required": ["key"]
            }),
        ),
        (
            "browser_wait",
            "wait",
            "Wait for a selector to appear, or for a fixed number of milliseconds",
            json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string" },
                    "ms": { "type": "number" }
                }
            }),
        ),
        (
            "browser_query",
            "query",
            "Query the first element matching a selector",
            selector_schema(),
        ),
        (
            "browser_query_all",
            "query_all",
            "Query all elements matching a selector",
            selector_schema(),
        ),
        (
            "browser_text",
            "text",
            "Get the text content of the element matching a selector",
            selector_schema(),
        ),
        (
            "browser_html",
            "html",
            "Get the HTML of the matching element, or of the document",
            json!({
                "type": "object",
                "properties": { "selector": { "type": "string" } }
            }),
        ),
        (
            "browser_network_capture_start",
            "network_capture_start",
            "Start capturing network request metadata (never bodies)",
            empty_schema(),
        ),
        (
            "browser_network_capture_stop",
            "network_capture_stop",
            "Stop the network capture and return the captured request list",
            empty_schema(),
        ),
        (
            "browser_ping",
            "ping",
            "Round-trip a ping through the extension",
            empty_schema(),
        ),
    ]
}

pub fn register(registry: &ToolRegistry, ctx: &Arc<ToolContext>) -> Result<()> {
    for (tool_name, command, description, schema) in catalogue() {
        registry.register(Box::new(PassthroughTool {
            ctx: Arc::clone(ctx),
            tool_name,
            command,
            description,
            schema,
        }))?;
    }
    Ok(())
}
