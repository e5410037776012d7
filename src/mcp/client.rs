//! MCP JSON-RPC client for talking to a stdio server.
//!
//! Implements the client half of the MCP protocol over JSON-RPC 2.0:
//! `initialize` handshake, `tools/list`, and `tools/call`.
//! Reference: <https://spec.modelcontextprotocol.io/>

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::mcp::server::StdioServerInfo;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server process: {0}")]
    SpawnFailed(String),

    #[error("Failed to communicate with MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for MCP server response")]
    Timeout,

    #[error("MCP server returned error: code={code}, message={message}")]
    Server { code: i64, message: String },
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Serialize)]
struct JsonRpcNotification {
    jsonrpc: &'static str,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Server identity reported during initialize.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    #[allow(dead_code)]
    protocol_version: String,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
}

/// Tool entry from `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

/// Outcome of `tools/call`: the concatenated text content and whether the
/// server flagged the call as failed.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub text: String,
    pub is_error: bool,
}

/// Live connection to an MCP server running as a child process.
///
/// The child is killed when the connection is dropped.
#[derive(Debug)]
pub struct McpConnection {
    #[allow(dead_code)] // Held so the child stays alive for the connection's lifetime
    child: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    next_id: AtomicU64,
    server_info: ServerInfo,
    response_timeout: Duration,
}

impl McpConnection {
    /// Spawn the server described by `info` and run the initialize handshake.
    ///
    /// `response_timeout` bounds the wait for every JSON-RPC response,
    /// including tool calls.
    pub async fn connect(
        info: &StdioServerInfo,
        response_timeout: Duration,
    ) -> Result<Self, McpError> {
        debug!("Spawning MCP server: {}", info.describe());

        let mut child = tokio::process::Command::new(&info.command)
            .args(&info.args)
            .envs(&info.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                McpError::SpawnFailed(format!("Failed to spawn '{}': {}", info.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::SpawnFailed("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::SpawnFailed("Failed to capture stdout".to_string()))?;

        let mut conn = Self {
            child,
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicU64::new(1),
            server_info: ServerInfo {
                name: String::new(),
                version: None,
            },
            response_timeout,
        };

        conn.initialize().await?;
        Ok(conn)
    }

    /// Name and version the server reported during initialize.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {}
        });

        let result: InitializeResult = self.request("initialize", Some(params)).await?;
        debug!(
            "Connected to MCP server: {} {}",
            result.server_info.name,
            result.server_info.version.as_deref().unwrap_or("")
        );
        self.server_info = result.server_info;

        self.notify("notifications/initialized", None).await
    }

    /// List the tools the server advertises.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        let result: Value = self.request("tools/list", None).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        Ok(serde_json::from_value(tools)?)
    }

    /// Invoke a tool by name with a JSON object of arguments.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutcome, McpError> {
        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result: Value = self.request("tools/call", Some(params)).await?;
        Ok(parse_tool_outcome(&result))
    }

    /// Send a request and wait for the matching response.
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let line = serde_json::to_string(&request)?;
        debug!("-> {} (id {})", method, id);

        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        let response = timeout(self.response_timeout, self.read_response(id))
            .await
            .map_err(|_| McpError::Timeout)??;

        if let Some(error) = response.error {
            return Err(McpError::Server {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| McpError::Protocol(format!("Response to {method} has no result")))?;

        Ok(serde_json::from_value(result)?)
    }

    async fn read_response(&self, id: u64) -> Result<JsonRpcResponse, McpError> {
        let mut stdout = self.stdout.lock().await;
        read_matching_response(&mut *stdout, id).await
    }

    /// Send a notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
        };

        let line = serde_json::to_string(&notification)?;
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Read lines until the response with the given id arrives, skipping
/// server-initiated notifications and log output.
async fn read_matching_response<R>(reader: &mut R, id: u64) -> Result<JsonRpcResponse, McpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(McpError::Protocol(
                "MCP server closed its stdout".to_string(),
            ));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(response) if response.id == Some(id) => return Ok(response),
            Ok(_) => {
                debug!("Skipping message with non-matching id");
            }
            Err(_) => {
                warn!("Skipping non-JSON-RPC line from server");
            }
        }
    }
}

/// Fold a `tools/call` result into its text content and error flag.
///
/// Content is an array of text/image items; the text items are joined.
fn parse_tool_outcome(result: &Value) -> ToolCallOutcome {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    ToolCallOutcome { text, is_error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "tools/list".to_string(),
            params: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/list");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn test_tool_list_deserialization() {
        let raw = json!({
            "tools": [
                {"name": "create_issue", "description": "Create an issue",
                 "inputSchema": {"type": "object"}},
                {"name": "get_file_contents"}
            ]
        });
        let tools: Vec<McpToolInfo> =
            serde_json::from_value(raw.get("tools").cloned().unwrap()).unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "create_issue");
        assert_eq!(tools[1].description, None);
    }

    #[test]
    fn test_error_response_deserialization() {
        let raw = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"not found"}}"#;
        let response: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.id, Some(3));
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "not found");
    }

    #[tokio::test]
    async fn test_read_response_skips_notifications_and_noise() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{}}\n",
            "server log line, not JSON-RPC\n",
            "\n",
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n",
        );
        let mut reader = BufReader::new(input.as_bytes());

        let response = read_matching_response(&mut reader, 2).await.unwrap();
        assert_eq!(response.id, Some(2));
        assert_eq!(response.result.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_read_response_eof_is_protocol_error() {
        let mut reader = BufReader::new(&b""[..]);
        let err = read_matching_response(&mut reader, 1).await.unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let info = StdioServerInfo::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            HashMap::new(),
        );

        let err = McpConnection::connect(&info, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Timeout));
    }

    #[test]
    fn test_tool_outcome_error_flag_and_text() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "second"}
            ],
            "isError": true
        });

        let outcome = parse_tool_outcome(&result);
        assert!(outcome.is_error);
        assert_eq!(outcome.text, "first\nsecond");
    }

    #[test]
    fn test_tool_outcome_defaults() {
        let outcome = parse_tool_outcome(&json!({}));
        assert!(!outcome.is_error);
        assert_eq!(outcome.text, "");
    }
}
