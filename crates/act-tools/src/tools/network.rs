//! Network capture assertion.
//!
//! Stopping the capture is a side effect of asserting: the tool calls
//! `network_capture_stop`, scans the returned metadata list, and records one
//! assertion. Only request metadata ever crosses the bridge -- bodies are
//! never captured.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;

struct NetworkAssertTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for NetworkAssertTool {
    fn name(&self) -> &str {
        "network_assert"
    }

    fn description(&self) -> &str {
        "Stop the network capture and assert that a matching request was seen"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "urlContains": { "type": "string" },
                "method": { "type": "string" },
                "status": { "type": "integer" }
            },
            "required": ["urlContains"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let url_contains = args
            .get("urlContains")
            .and_then(Value::as_str)
            .context("missing required argument: urlContains")?;
        let method = args.get("method").and_then(Value::as_str);
        let status = args.get("status").and_then(Value::as_i64);

        let data = self
            .ctx
            .bridge
            .send_command("network_capture_stop", json!({}), None)
            .await?;
        let requests = request_list(&data);

        let matched = requests.iter().find(|req| {
            let url_ok = req
                .get("url")
                .and_then(Value::as_str)
                .is_some_and(|u| u.contains(url_contains));
            let method_ok = method.is_none_or(|m| {
                req.get("method")
                    .and_then(Value::as_str)
                    .is_some_and(|rm| rm.eq_ignore_ascii_case(m))
            });
            let status_ok =
                status.is_none_or(|s| req.get("status").and_then(Value::as_i64) == Some(s));
            url_ok && method_ok && status_ok
        });

        let passed = matched.is_some();
        self.ctx.record_assertion(
            passed,
            format!("network request with url containing {url_contains:?}"),
        );

        Ok(json!({
            "passed": passed,
            "matchedRequest": matched.cloned().unwrap_or(Value::Null),
            "totalCaptured": requests.len()
        }))
    }
}

fn request_list(data: &Value) -> Vec<Value> {
    if let Some(requests) = data.get("requests").and_then(Value::as_array) {
        return requests.clone();
    }
    data.as_array().cloned().unwrap_or_default()
}

pub fn register(registry: &ToolRegistry, ctx: &Arc<ToolContext>) -> Result<()> {
    registry.register(Box::new(NetworkAssertTool { ctx: Arc::clone(ctx) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_list_reads_both_shapes() {
        let wrapped = json!({"requests": [{"url": "a"}]});
        assert_eq!(request_list(&wrapped).len(), 1);

        let bare = json!([{"url": "a"}, {"url": "b"}]);
        assert_eq!(request_list(&bare).len(), 2);

        assert!(request_list(&json!({})).is_empty());
    }
}
