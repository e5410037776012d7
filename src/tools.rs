//! Tool set acquisition for the agent.
//!
//! Two ways to build the set: an explicit list of tool names supplied by the
//! caller, or automatic discovery from the running MCP server. Both yield
//! the same [`Toolset`], so agent construction is agnostic to the variant.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::mcp::client::McpToolInfo;
use crate::mcp::{McpConnection, StdioServerInfo};

/// A callable tool exposed by the MCP server.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the tool's arguments, when the server provided one.
    pub input_schema: Option<Value>,
}

/// Caller-side description of a tool to expose explicitly.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    #[allow(dead_code)] // Mirrors the explicit-construction API; CLI specs are name-only
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Build tool descriptors from explicit specs. No server round-trip; the
/// schema is left open and validated server-side at call time.
pub fn tools_from_specs(specs: &[ToolSpec]) -> Vec<Tool> {
    specs
        .iter()
        .map(|spec| Tool {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: None,
        })
        .collect()
}

/// The set of tools available to the agent, bound to one live server
/// connection. Read-only for the duration of a run.
pub struct Toolset {
    conn: McpConnection,
    tools: Vec<Tool>,
}

impl Toolset {
    /// Expose exactly the named tools on the given server.
    ///
    /// `timeout_seconds` bounds every protocol round-trip, tool calls
    /// included.
    pub async fn explicit(
        server: &StdioServerInfo,
        specs: &[ToolSpec],
        timeout_seconds: u64,
    ) -> Result<Self> {
        let conn = McpConnection::connect(server, Duration::from_secs(timeout_seconds))
            .await
            .context("Failed to start MCP server")?;

        let tools = tools_from_specs(specs);
        info!("Exposing {} explicitly named tools", tools.len());

        Ok(Self { conn, tools })
    }

    /// Discover the full tool catalog from the running server.
    pub async fn discover(server: &StdioServerInfo, timeout_seconds: u64) -> Result<Self> {
        let conn = McpConnection::connect(server, Duration::from_secs(timeout_seconds))
            .await
            .context("Failed to start MCP server")?;

        let tools: Vec<Tool> = conn
            .list_tools()
            .await
            .context("Failed to list tools from MCP server")?
            .into_iter()
            .map(Tool::from)
            .collect();

        info!(
            "Discovered {} tools from {}",
            tools.len(),
            conn.server_info().name
        );

        Ok(Self { conn, tools })
    }

    /// The tool descriptors in this set.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Tool definitions in the OpenAI function-calling format.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(definition_for).collect()
    }

    /// Invoke a tool with the model-supplied JSON arguments string.
    ///
    /// Failures come back as `Err` with a message suitable for folding into
    /// the transcript as a tool result.
    pub async fn invoke(&self, name: &str, arguments: &str) -> Result<String> {
        let arguments = parse_invocation(&self.tools, name, arguments)?;

        debug!("Calling tool {}", name);
        let outcome = self
            .conn
            .call_tool(name, arguments)
            .await
            .with_context(|| format!("Tool call {name} failed"))?;

        if outcome.is_error {
            anyhow::bail!("Tool {name} reported an error: {}", outcome.text);
        }

        Ok(outcome.text)
    }
}

impl From<McpToolInfo> for Tool {
    fn from(info: McpToolInfo) -> Self {
        Self {
            name: info.name,
            description: info.description,
            input_schema: info.input_schema,
        }
    }
}

/// Validate a requested invocation against the tool set and parse its
/// arguments. Connection-free front half of [`Toolset::invoke`].
fn parse_invocation(tools: &[Tool], name: &str, arguments: &str) -> Result<Value> {
    if !tools.iter().any(|t| t.name == name) {
        anyhow::bail!("Unknown tool: {name}");
    }

    if arguments.trim().is_empty() {
        return Ok(json!({}));
    }

    serde_json::from_str(arguments)
        .with_context(|| format!("Tool {name} received malformed arguments"))
}

/// Render one tool in the OpenAI function-calling format.
fn definition_for(tool: &Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description.clone().unwrap_or_default(),
            "parameters": tool.input_schema.clone().unwrap_or_else(open_object_schema),
        }
    })
}

/// Permissive schema for tools whose real schema we never fetched.
fn open_object_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": true
    })
}
