//! Visual regression tools.
//!
//! `visual_compare` screenshots the page and compares against the stored
//! baseline; the first run saves the baseline instead of asserting.
//! `visual_update` overwrites the baseline unconditionally.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Value};

use act_visual::{compare, BaselineStore, DEFAULT_THRESHOLD};

use crate::context::ToolContext;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;

/// Capture the current viewport as PNG bytes via the `screenshot` command.
async fn take_screenshot(ctx: &ToolContext) -> Result<Vec<u8>> {
    let data = ctx.bridge.send_command("screenshot", json!({}), None).await?;
    let encoded = data
        .get("data")
        .and_then(Value::as_str)
        .context("screenshot response carried no image data")?;
    B64.decode(encoded)
        .context("screenshot image data is not valid base64")
}

struct VisualCompareTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for VisualCompareTool {
    fn name(&self) -> &str {
        "visual_compare"
    }

    fn description(&self) -> &str {
        "Screenshot the page and compare it against the named baseline; saves the baseline on first run"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "threshold": { "type": "number" }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .context("missing required argument: name")?;
        let threshold = args
            .get("threshold")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_THRESHOLD);
        BaselineStore::validate_name(name)?;

        let shot = take_screenshot(&self.ctx).await?;

        let Some(baseline) = self.ctx.store.load(name)? else {
            // First run establishes the baseline; no assertion is recorded.
            self.ctx.store.save(name, &shot)?;
            return Ok(json!({
                "name": name,
                "firstRun": true,
                "baselineSaved": true
            }));
        };

        let result = compare(&shot, &baseline, threshold)?;
        if !result.matches {
            // On a dimension mismatch there is no highlight image; persist
            // the offending screenshot as the diff evidence instead.
            let diff_bytes = match &result.diff_image_base64 {
                Some(encoded) => B64.decode(encoded).context("diff image encoding")?,
                None => shot.clone(),
            };
            self.ctx.store.save_diff(name, &diff_bytes)?;
        }

        self.ctx
            .record_assertion(result.matches, format!("visual comparison '{name}'"));

        let mut out = serde_json::to_value(&result)?;
        out["name"] = json!(name);
        out["firstRun"] = json!(false);
        Ok(out)
    }
}

struct VisualUpdateTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for VisualUpdateTool {
    fn name(&self) -> &str {
        "visual_update"
    }

    fn description(&self) -> &str {
        "Screenshot the page and overwrite the named baseline unconditionally"
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
        BaselineStore::validate_name(name)?;

        let shot = take_screenshot(&self.ctx).await?;
        let path = self.ctx.store.save(name, &shot)?;
        Ok(json!({
            "name": name,
            "updated": true,
            "path": path.display().to_string()
        }))
    }
}

pub fn register(registry: &ToolRegistry, ctx: &Arc<ToolContext>) -> Result<()> {
    registry.register(Box::new(VisualCompareTool { ctx: Arc::clone(ctx) }))?;
    registry.register(Box::new(VisualUpdateTool { ctx: Arc::clone(ctx) }))?;
    Ok(())
}
