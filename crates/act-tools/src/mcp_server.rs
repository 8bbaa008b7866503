//! MCP stdio server.
//!
//! Exposes the registered tools to the agent via JSON-RPC 2.0 over
//! stdin/stdout: one request per line in, one response per line out.
//!
//! Routed methods: `initialize`, `tools/list`, `tools/call`. Notifications
//! (requests without an id) produce no response. Tool execution failures are
//! converted into `isError` result payloads carrying the error's short
//! message -- they never surface as JSON-RPC faults, so the agent boundary
//! only ever sees structured results.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::registry::ToolRegistry;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const TOOL_NOT_FOUND: i64 = -32000;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// MCP server bound to a tool registry.
pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until the input reaches EOF.
    pub async fn run(
        &self,
        stdin: impl AsyncBufRead + Unpin,
        mut stdout: impl AsyncWrite + Unpin,
    ) -> Result<()> {
        let mut lines = stdin.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(_) => {
                    let response = error_response(Value::Null, PARSE_ERROR, "Parse error");
                    write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            // Notifications carry no id and get no reply.
            let Some(id) = request.id else {
                debug!(method = %request.method, "notification");
                continue;
            };

            let response = match request.method.as_str() {
                "initialize" => self.handle_initialize(id),
                "tools/list" => self.handle_tools_list(id),
                "tools/call" => self.handle_tools_call(id, request.params).await,
                other => error_response(id, METHOD_NOT_FOUND, &format!("Method not found: {other}")),
            };

            write_response(&mut stdout, &response).await?;
        }

        Ok(())
    }

    fn handle_initialize(&self, id: Value) -> JsonRpcResponse {
        ok_response(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "agent-chrome-test",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools: Vec<Value> = self
            .registry
            .list()
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                })
            })
            .collect();
        ok_response(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return error_response(id, INVALID_PARAMS, "Missing params for tools/call");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return error_response(id, INVALID_PARAMS, "Missing 'name' in tools/call params");
        };
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let Some(tool) = self.registry.get(name) else {
            warn!(tool = name, "unknown tool");
            return error_response(id, TOOL_NOT_FOUND, &format!("tool not found: {name}"));
        };

        match tool.execute(arguments).await {
            Ok(result) => ok_response(
                id,
                json!({
                    "content": [{ "type": "text", "text": result.to_string() }]
                }),
            ),
            Err(e) => {
                // Failure response carrying the short message; never a
                // JSON-RPC fault.
                let payload = json!({ "error": e.to_string() });
                debug!(tool = name, err = %e, "tool failed");
                ok_response(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": payload.to_string() }],
                        "isError": true
                    }),
                )
            }
        }
    }
}

fn ok_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: Some(result),
        error: None,
        id,
    }
}

fn error_response(id: Value, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
        id,
    }
}

async fn write_response(
    writer: &mut (impl AsyncWrite + Unpin),
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ToolDefinition;

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolDefinition for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the arguments back"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: Value) -> anyhow::Result<Value> {
            Ok(json!({ "echoed": args }))
        }
    }

    struct FailingTool;

    #[async_trait::async_trait]
    impl ToolDefinition for FailingTool {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn description(&self) -> &str {
            "Fails every time"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            anyhow::bail!("no extension connected")
        }
    }

    async fn run_lines(server: &McpServer, lines: &[&str]) -> Vec<Value> {
        let mut input = String::new();
        for line in lines {
            input.push_str(line);
            input.push('\n');
        }
        let stdin = tokio::io::BufReader::new(std::io::Cursor::new(input.into_bytes()));
        let mut out: Vec<u8> = Vec::new();
        server.run(stdin, &mut out).await.unwrap();

        String::from_utf8(out)
            .unwrap()
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn server_with(tools: Vec<Box<dyn ToolDefinition>>) -> McpServer {
        let registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool).unwrap();
        }
        McpServer::new(registry)
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = server_with(vec![]);
        let req = json!({"jsonrpc": "2.0", "method": "initialize", "id": 1});
        let out = run_lines(&server, &[&req.to_string()]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["result"]["serverInfo"]["name"], "agent-chrome-test");
        assert!(out[0]["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn tools_list_enumerates_the_catalogue() {
        let server = server_with(vec![Box::new(EchoTool), Box::new(FailingTool)]);
        let req = json!({"jsonrpc": "2.0", "method": "tools/list", "id": 2});
        let out = run_lines(&server, &[&req.to_string()]).await;

        let tools = out[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "always_fails");
        assert_eq!(tools[1]["name"], "echo");
        assert!(tools[1]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tools_call_wraps_result_in_a_text_chunk() {
        let server = server_with(vec![Box::new(EchoTool)]);
        let req = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"k": "v"}},
            "id": 3
        });
        let out = run_lines(&server, &[&req.to_string()]).await;

        let content = &out[0]["result"]["content"][0];
        assert_eq!(content["type"], "text");
        let inner: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(inner["echoed"]["k"], "v");
        assert!(out[0]["result"].get("isError").is_none());
    }

    #[tokio::test]
    async fn tool_failures_become_is_error_payloads() {
        let server = server_with(vec![Box::new(FailingTool)]);
        let req = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "always_fails", "arguments": {}},
            "id": 4
        });
        let out = run_lines(&server, &[&req.to_string()]).await;

        assert!(out[0]["error"].is_null(), "no JSON-RPC fault: {}", out[0]);
        assert_eq!(out[0]["result"]["isError"], true);
        let inner: Value =
            serde_json::from_str(out[0]["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(inner["error"], "no extension connected");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_rpc_error() {
        let server = server_with(vec![]);
        let req = json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {"name": "missing", "arguments": {}},
            "id": 5
        });
        let out = run_lines(&server, &[&req.to_string()]).await;
        assert_eq!(out[0]["error"]["code"], TOOL_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let server = server_with(vec![]);
        let notif = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let out = run_lines(&server, &[&notif.to_string()]).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn parse_errors_answer_with_null_id() {
        let server = server_with(vec![]);
        let out = run_lines(&server, &["this is not json"]).await;
        assert_eq!(out[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(out[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn exits_cleanly_on_eof() {
        let server = server_with(vec![]);
        let out = run_lines(&server, &[]).await;
        assert!(out.is_empty());
    }
}
