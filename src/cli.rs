//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// OctoAgent - LLM-powered GitHub agent via the GitHub MCP server
///
/// Connects an OpenAI-compatible chat model to the GitHub MCP server,
/// hands it the server's tools, and runs one task against a repository.
///
/// Examples:
///   octoagent
///   octoagent --model gpt-4o --launcher npx
///   octoagent --tools create_issue,get_file_contents
///   octoagent --prompt "List the open issues in acme/widgets"
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to a .env file with credentials
    ///
    /// If not specified, looks for .env in the current directory.
    /// Required variables: GITHUB_PERSONAL_ACCESS_TOKEN, GITHUB_OWNER,
    /// GITHUB_REPO, OPENAI_API_KEY.
    #[arg(short, long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Chat model to use for the agent
    ///
    /// Any model reachable through an OpenAI-compatible chat completions
    /// endpoint with tool-calling support.
    #[arg(short, long, default_value = "gpt-4o-mini", env = "OPENAI_MODEL")]
    pub model: String,

    /// How to launch the GitHub MCP server
    ///
    /// `docker` runs the official ghcr.io/github/github-mcp-server image;
    /// `npx` runs the legacy @modelcontextprotocol/server-github package.
    #[arg(long, default_value = "docker", value_name = "LAUNCHER")]
    pub launcher: Launcher,

    /// Expose only these tools to the agent (comma-separated)
    ///
    /// Example: --tools create_issue,get_file_contents
    /// Without this flag, all tools advertised by the server are discovered
    /// and exposed.
    #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
    pub tools: Option<Vec<String>>,

    /// Task prompt for the agent
    ///
    /// If not specified, a default README-review task is built from
    /// GITHUB_OWNER/GITHUB_REPO.
    #[arg(short, long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Maximum number of model turns before giving up
    #[arg(long, default_value = "10", value_name = "COUNT")]
    pub max_turns: usize,

    /// Request timeout in seconds for each model call and MCP tool call
    #[arg(long, default_value = "300", value_name = "SECS")]
    pub timeout: u64,

    /// Temperature for model responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.1")]
    pub temperature: f32,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Launch mechanism for the GitHub MCP server subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Launcher {
    /// Official server image via `docker run` (default)
    #[default]
    Docker,
    /// Legacy server package via `npx`
    Npx,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        if self.max_turns == 0 {
            return Err("Max turns must be at least 1".to_string());
        }

        if self.timeout == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // An explicit tool list must not contain blank names
        if let Some(ref tools) = self.tools {
            if tools.is_empty() {
                return Err("--tools requires at least one tool name".to_string());
            }
            if tools.iter().any(|t| t.trim().is_empty()) {
                return Err("Tool names must not be empty".to_string());
            }
        }

        // Validate env file if provided
        if let Some(ref env_path) = self.env_file {
            if !env_path.exists() {
                return Err(format!("Env file does not exist: {}", env_path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            env_file: None,
            model: "gpt-4o-mini".to_string(),
            launcher: Launcher::Docker,
            tools: None,
            prompt: None,
            max_turns: 10,
            timeout: 300,
            temperature: 0.1,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_max_turns() {
        let mut args = make_args();
        args.max_turns = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_blank_tool_name() {
        let mut args = make_args();
        args.tools = Some(vec!["create_issue".to_string(), "  ".to_string()]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
