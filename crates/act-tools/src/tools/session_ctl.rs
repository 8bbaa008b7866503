//! Session control tools -- thin forwarders to the shared accumulator.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;

struct SessionStartTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for SessionStartTool {
    fn name(&self) -> &str {
        "session_start"
    }

    fn description(&self) -> &str {
        "Begin a named test session collecting assertion outcomes"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .context("missing required argument: name")?;
        self.ctx
            .session
            .lock()
            .expect("session lock poisoned")
            .start(name);
        Ok(json!({ "started": true, "name": name }))
    }
}

struct SessionEndTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for SessionEndTool {
    fn name(&self) -> &str {
        "session_end"
    }

    fn description(&self) -> &str {
        "End the current test session and return its summary"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<Value> {
        let summary = self
            .ctx
            .session
            .lock()
            .expect("session lock poisoned")
            .end();
        Ok(serde_json::to_value(summary)?)
    }
}

pub fn register(registry: &ToolRegistry, ctx: &Arc<ToolContext>) -> Result<()> {
    registry.register(Box::new(SessionStartTool { ctx: Arc::clone(ctx) }))?;
    registry.register(Box::new(SessionEndTool { ctx: Arc::clone(ctx) }))?;
    Ok(())
}
