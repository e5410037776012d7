//! The agent: a chat generator paired with a tool set and a fixed system
//! prompt.
//!
//! `run` executes one conversation turn: the model answers, and while it
//! keeps requesting tools, each call is executed against the MCP server and
//! its result folded back into the transcript as a `tool` message.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::llm::{ChatGenerator, ChatMessage};
use crate::tools::Toolset;

/// System prompt handed to every agent run.
pub const SYSTEM_PROMPT: &str = "You are an engineering assistant who can read and modify GitHub \
repositories via the tools you have been given. Split the task into smaller \
tasks if necessary. Whenever useful, call tools rather than answering from \
memory. Don't ask for confirmation.";

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model turns before giving up.
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_turns: 10 }
    }
}

/// An LLM agent with access to MCP tools.
pub struct Agent {
    generator: ChatGenerator,
    toolset: Toolset,
    system_prompt: String,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        generator: ChatGenerator,
        toolset: Toolset,
        system_prompt: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        info!(
            "Initializing agent with model {} and {} tools",
            generator.model(),
            toolset.tools().len()
        );

        Self {
            generator,
            toolset,
            system_prompt: system_prompt.into(),
            config,
        }
    }

    /// Run one conversation turn.
    ///
    /// `messages` is the caller's opening of the conversation, conventionally
    /// a single user message. The returned transcript contains the system
    /// prompt, the caller's messages, every intermediate tool call and tool
    /// result, and the final assistant message.
    pub async fn run(&self, messages: Vec<ChatMessage>) -> Result<AgentResponse> {
        let mut transcript = Vec::with_capacity(messages.len() + 1);
        transcript.push(ChatMessage::system(self.system_prompt.clone()));
        transcript.extend(messages);

        let definitions = self.toolset.definitions();

        for turn in 0..self.config.max_turns {
            debug!("Agent turn {}", turn + 1);

            let assistant = self.generator.chat(&transcript, &definitions).await?;
            let tool_calls = assistant.tool_calls.clone();
            transcript.push(assistant);

            let Some(tool_calls) = tool_calls else {
                // Plain text answer: the turn is complete.
                return Ok(AgentResponse {
                    messages: transcript,
                });
            };

            for call in &tool_calls {
                let name = &call.function.name;
                info!("Tool {} requested", name);

                let result =
                    tool_result_text(self.toolset.invoke(name, &call.function.arguments).await);

                transcript.push(ChatMessage::tool(call.id.clone(), result));
            }
        }

        warn!(
            "Agent did not finish within {} turns; returning partial transcript",
            self.config.max_turns
        );

        Ok(AgentResponse {
            messages: transcript,
        })
    }
}

/// Result of one agent run: the full conversation transcript, append-only
/// for the duration of the run.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub messages: Vec<ChatMessage>,
}

impl AgentResponse {
    /// Text of the final message, conventionally the assistant's answer.
    pub fn final_text(&self) -> &str {
        self.messages.last().map(ChatMessage::text).unwrap_or("")
    }

    /// One role-labeled line per message, in transcript order.
    pub fn transcript_lines(&self) -> Vec<String> {
        self.messages.iter().map(render_line).collect()
    }
}

/// Fold a tool invocation outcome into transcript text. Failures (unknown
/// tool, malformed arguments, server-side errors) become error strings the
/// model can read and react to.
fn tool_result_text(result: Result<String>) -> String {
    match result {
        Ok(output) => output,
        Err(e) => format!("Error: {e:#}"),
    }
}

/// Render a message as `ROLE   : text`.
///
/// Assistant messages that carry only tool calls have no text; those render
/// a bracketed call summary so the trace stays one line per message.
fn render_line(message: &ChatMessage) -> String {
    let text = match (&message.content, &message.tool_calls) {
        (Some(content), _) if !content.is_empty() => content.clone(),
        (_, Some(calls)) if !calls.is_empty() => {
            let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
            format!("[calling {}]", names.join(", "))
        }
        _ => String::new(),
    };

    format!("{:7}: {}", message.role.to_uppercase(), text)
}
