//! Assertion tools: element, text, url, and count.
//!
//! Each runs one read command, evaluates its operator, records exactly one
//! assertion on the shared session, and returns a structured result with the
//! expected and (truncated) actual values. When the underlying read fails,
//! the assertion passes only for the absence-shaped element states
//! (`not_exists` / `hidden`) and fails otherwise.

use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;

/// Longest actual value echoed back to the agent.
const MAX_ACTUAL_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Operator evaluation
// ---------------------------------------------------------------------------

fn eval_text_op(op: &str, actual: &str, expected: &str) -> Result<bool> {
    match op {
        "contains" => Ok(actual.contains(expected)),
        "equals" => Ok(actual == expected),
        "matches" => {
            let re = Regex::new(expected)
                .with_context(|| format!("invalid pattern for matches: {expected:?}"))?;
            Ok(re.is_match(actual))
        }
        other => anyhow::bail!("unknown op: {other}"),
    }
}

fn eval_count_op(op: &str, actual: i64, expected: i64) -> Result<bool> {
    match op {
        "equals" => Ok(actual == expected),
        "greaterThan" => Ok(actual > expected),
        "lessThan" => Ok(actual < expected),
        "atLeast" => Ok(actual >= expected),
        "atMost" => Ok(actual <= expected),
        other => anyhow::bail!("unknown op: {other}"),
    }
}

fn truncate_actual(value: &str) -> String {
    if value.chars().count() <= MAX_ACTUAL_LEN {
        value.to_string()
    } else {
        let head: String = value.chars().take(MAX_ACTUAL_LEN).collect();
        format!("{head}...")
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing required argument: {key}"))
}

// ---------------------------------------------------------------------------
// assert_element
// ---------------------------------------------------------------------------

struct AssertElementTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for AssertElementTool {
    fn name(&self) -> &str {
        "assert_element"
    }

    fn description(&self) -> &str {
        "Assert that an element exists, is absent, is visible, or is hidden"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": { "type": "string" },
                "state": {
                    "type": "string",
                    "enum": ["exists", "not_exists", "visible", "hidden"]
                }
            },
            "required": ["selector"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let selector = required_str(&args, "selector")?;
        let state = args.get("state").and_then(Value::as_str).unwrap_or("exists");
        if !["exists", "not_exists", "visible", "hidden"].contains(&state) {
            anyhow::bail!("unknown state: {state}");
        }

        let read = self
            .ctx
            .bridge
            .send_command("query", json!({ "selector": selector }), None)
            .await;

        let (passed, actual) = match read {
            Ok(data) => {
                let found = data.get("found").and_then(Value::as_bool).unwrap_or(true);
                let visible = data.get("visible").and_then(Value::as_bool).unwrap_or(found);
                let passed = match state {
                    "exists" => found,
                    "not_exists" => !found,
                    "visible" => visible,
                    _ => !visible,
                };
                (passed, data)
            }
            // A failed read proves absence, nothing more.
            Err(e) => (
                matches!(state, "not_exists" | "hidden"),
                json!({ "error": e.to_string() }),
            ),
        };

        self.ctx
            .record_assertion(passed, format!("element {selector} {state}"));
        Ok(json!({
            "passed": passed,
            "selector": selector,
            "state": state,
            "actual": actual
        }))
    }
}

// ---------------------------------------------------------------------------
// assert_text / assert_url
// ---------------------------------------------------------------------------

struct AssertTextTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for AssertTextTool {
    fn name(&self) -> &str {
        "assert_text"
    }

    fn description(&self) -> &str {
        "Assert on the text content of an element"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": { "type": "string" },
                "expected": { "type": "string" },
                "op": { "type": "string", "enum": ["contains", "equals", "matches"] }
            },
            "required": ["selector", "expected"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let selector = required_str(&args, "selector")?;
        let expected = required_str(&args, "expected")?;
        let op = args.get("op").and_then(Value::as_str).unwrap_or("contains");

        let read = self
            .ctx
            .bridge
            .send_command("text", json!({ "selector": selector }), None)
            .await;

        let (passed, actual) = match read {
            Ok(data) => {
                let actual = data
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (eval_text_op(op, &actual, expected)?, actual)
            }
            Err(e) => (false, format!("<read failed: {e}>")),
        };

        self.ctx
            .record_assertion(passed, format!("text of {selector} {op} {expected:?}"));
        Ok(json!({
            "passed": passed,
            "op": op,
            "expected": expected,
            "actual": truncate_actual(&actual)
        }))
    }
}

struct AssertUrlTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for AssertUrlTool {
    fn name(&self) -> &str {
        "assert_url"
    }

    fn description(&self) -> &str {
        "Assert on the active tab's URL"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expected": { "type": "string" },
                "op": { "type": "string", "enum": ["contains", "equals", "matches"] }
            },
            "required": ["expected"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let expected = required_str(&args, "expected")?;
        let op = args.get("op").and_then(Value::as_str).unwrap_or("contains");

        let read = self.ctx.bridge.send_command("url", json!({}), None).await;
        let (passed, actual) = match read {
            Ok(data) => {
                let actual = data
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (eval_text_op(op, &actual, expected)?, actual)
            }
            Err(e) => (false, format!("<read failed: {e}>")),
        };

        self.ctx
            .record_assertion(passed, format!("url {op} {expected:?}"));
        Ok(json!({
            "passed": passed,
            "op": op,
            "expected": expected,
            "actual": truncate_actual(&actual)
        }))
    }
}

// ---------------------------------------------------------------------------
// assert_count
// ---------------------------------------------------------------------------

struct AssertCountTool {
    ctx: Arc<ToolContext>,
}

#[async_trait::async_trait]
impl ToolDefinition for AssertCountTool {
    fn name(&self) -> &str {
        "assert_count"
    }

    fn description(&self) -> &str {
        "Assert on the number of elements matching a selector"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": { "type": "string" },
                "expected": { "type": "integer" },
                "op": {
                    "type": "string",
                    "enum": ["equals", "greaterThan", "lessThan", "atLeast", "atMost"]
                }
            },
            "required": ["selector", "expected"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let selector = required_str(&args, "selector")?;
        let expected = args
            .get("expected")
            .and_then(Value::as_i64)
            .context("missing required argument: expected")?;
        let op = args.get("op").and_then(Value::as_str).unwrap_or("equals");

        let read = self
            .ctx
            .bridge
            .send_command("query_all", json!({ "selector": selector }), None)
            .await;

        let (passed, actual) = match read {
            Ok(data) => {
                let count = element_count(&data);
                (eval_count_op(op, count, expected)?, json!(count))
            }
            Err(e) => (false, json!({ "error": e.to_string() })),
        };

        self.ctx
            .record_assertion(passed, format!("count of {selector} {op} {expected}"));
        Ok(json!({
            "passed": passed,
            "op": op,
            "expected": expected,
            "actual": actual
        }))
    }
}

/// The extension reports either a `count` field or an `elements` array.
fn element_count(data: &Value) -> i64 {
    if let Some(count) = data.get("count").and_then(Value::as_i64) {
        return count;
    }
    if let Some(elements) = data.get("elements").and_then(Value::as_array) {
        return elements.len() as i64;
    }
    data.as_array().map(|a| a.len() as i64).unwrap_or(0)
}

pub fn register(registry: &ToolRegistry, ctx: &Arc<ToolContext>) -> Result<()> {
    registry.register(Box::new(AssertElementTool { ctx: Arc::clone(ctx) }))?;
    registry.register(Box::new(AssertTextTool { ctx: Arc::clone(ctx) }))?;
    registry.register(Box::new(AssertUrlTool { ctx: Arc::clone(ctx) }))?;
    registry.register(Box::new(AssertCountTool { ctx: Arc::clone(ctx) }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_ops() {
        assert!(eval_text_op("contains", "hello world", "world").unwrap());
        assert!(!eval_text_op("contains", "hello", "world").unwrap());
        assert!(eval_text_op("equals", "abc", "abc").unwrap());
        assert!(!eval_text_op("equals", "abc", "ab").unwrap());
        assert!(eval_text_op("matches", "order #1234", r"#\d+").unwrap());
        assert!(!eval_text_op("matches", "no digits", r"^\d+$").unwrap());
    }

    #[test]
    fn invalid_regex_is_an_error_not_a_failure() {
        assert!(eval_text_op("matches", "anything", "[unclosed").is_err());
    }

    #[test]
    fn unknown_text_op_is_rejected() {
        assert!(eval_text_op("startsWith", "a", "a").is_err());
    }

    #[test]
    fn count_ops() {
        assert!(eval_count_op("equals", 3, 3).unwrap());
        assert!(eval_count_op("greaterThan", 4, 3).unwrap());
        assert!(!eval_count_op("greaterThan", 3, 3).unwrap());
        assert!(eval_count_op("lessThan", 2, 3).unwrap());
        assert!(eval_count_op("atLeast", 3, 3).unwrap());
        assert!(eval_count_op("atMost", 3, 3).unwrap());
        assert!(!eval_count_op("atMost", 4, 3).unwrap());
        assert!(eval_count_op("unknown", 1, 1).is_err());
    }

    #[test]
    fn actual_values_are_truncated() {
        let short = "short";
        assert_eq!(truncate_actual(short), "short");

        let long = "y".repeat(500);
        let truncated = truncate_actual(&long);
        assert_eq!(truncated.chars().count(), MAX_ACTUAL_LEN + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn element_count_reads_known_shapes() {
        assert_eq!(element_count(&json!({"count": 5})), 5);
        assert_eq!(element_count(&json!({"elements": [1, 2, 3]})), 3);
        assert_eq!(element_count(&json!([1, 2])), 2);
        assert_eq!(element_count(&json!({"other": true})), 0);
    }
}
