//! OctoAgent - LLM-powered GitHub agent via the GitHub MCP server
//!
//! A CLI tool that wires an OpenAI-compatible chat model to the GitHub MCP
//! server, hands it the server's tools, and runs one task against a
//! repository, printing the full conversation transcript.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing config, server launch failure, API error)

mod agent;
mod cli;
mod config;
mod llm;
mod mcp;
mod tools;

use anyhow::Result;
use cli::{Args, Launcher};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

use agent::{Agent, AgentConfig};
use llm::{ChatGenerator, ChatMessage};
use mcp::StdioServerInfo;
use tools::{ToolSpec, Toolset};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args);

    info!("OctoAgent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete agent workflow.
async fn run(args: Args) -> Result<()> {
    // Step 1: Load configuration
    let config = Config::load(args.env_file.as_deref())?;

    // Step 2: Build the MCP server launch descriptor
    let server = match args.launcher {
        Launcher::Docker => StdioServerInfo::github_docker(
            &config.github_token,
            config.github_toolsets.as_deref(),
            args.env_file.as_deref(),
        ),
        Launcher::Npx => {
            StdioServerInfo::github_npx(&config.github_token, config.github_toolsets.as_deref())
        }
    };
    println!("✅ MCP server definition created ({})", server.describe());

    // Step 3: Acquire the tool set (explicit names or auto discovery)
    let spinner = make_spinner(&args, "Starting GitHub MCP server...");
    let toolset = with_spinner(spinner, async {
        match args.tools {
            Some(ref names) => {
                let specs: Vec<ToolSpec> = names.iter().map(ToolSpec::new).collect();
                Toolset::explicit(&server, &specs, args.timeout).await
            }
            None => Toolset::discover(&server, args.timeout).await,
        }
    })
    .await?;
    println!("✅ {} GitHub tools ready", toolset.tools().len());

    // Step 4: Build the agent
    let generator = ChatGenerator::new(
        &config.openai_api_key,
        &config.openai_base_url,
        &args.model,
        args.temperature,
        args.timeout,
    )?;

    let agent = Agent::new(
        generator,
        toolset,
        agent::SYSTEM_PROMPT,
        AgentConfig {
            max_turns: args.max_turns,
        },
    );
    println!("✅ Agent created (model: {})", args.model);

    // Step 5: Run one conversation turn
    println!("\n=== Test-drive ===");
    println!("Using {}", config.repo_slug());

    let prompt = args
        .prompt
        .clone()
        .unwrap_or_else(|| config.default_task_prompt());
    debug!("Task prompt: {}", prompt);

    let spinner = make_spinner(&args, "Agent working...");
    let response = with_spinner(spinner, agent.run(vec![ChatMessage::user(prompt)])).await?;

    // Step 6: Print the transcript and the final answer
    println!("\n=== Full agent trace ===");
    for line in response.transcript_lines() {
        println!("{}", line);
    }

    println!("\n=== Final answer ===");
    println!("{}", response.final_text());

    Ok(())
}

/// Run a task with the spinner active, clearing it whether or not the task
/// succeeds, so error output never interleaves with the ticker.
async fn with_spinner<T>(
    spinner: ProgressBar,
    task: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    let result = task.await;
    spinner.finish_and_clear();
    result
}

/// Spinner for long-running steps, disabled in quiet mode.
fn make_spinner(args: &Args, message: &str) -> ProgressBar {
    if args.quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("static template is valid"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spinner_cleared_when_task_fails() {
        let spinner = ProgressBar::hidden();
        let probe = spinner.clone();

        let result: Result<()> = with_spinner(spinner, async { anyhow::bail!("boom") }).await;

        assert!(result.is_err());
        assert!(probe.is_finished());
    }

    #[tokio::test]
    async fn test_spinner_cleared_when_task_succeeds() {
        let spinner = ProgressBar::hidden();
        let probe = spinner.clone();

        let result = with_spinner(spinner, async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert!(probe.is_finished());
    }
}
