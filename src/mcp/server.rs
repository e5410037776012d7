//! Launch descriptors for the GitHub MCP server.
//!
//! A [`StdioServerInfo`] captures everything needed to start the server as
//! a subprocess: command, arguments, and the environment variables forwarded
//! to it. Constructed once, never mutated afterwards.

use std::collections::HashMap;
use std::path::Path;

use crate::config::{GITHUB_TOKEN_VAR, GITHUB_TOOLSETS_VAR};

/// Docker image of the official GitHub MCP server.
const GITHUB_MCP_IMAGE: &str = "ghcr.io/github/github-mcp-server";

/// npm package of the legacy GitHub MCP server.
const GITHUB_MCP_NPM_PACKAGE: &str = "@modelcontextprotocol/server-github";

/// How to start an MCP server that talks JSON-RPC over stdio.
#[derive(Debug, Clone)]
pub struct StdioServerInfo {
    /// Executable to run.
    pub command: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Environment variables set for the child process.
    pub env: HashMap<String, String>,
}

impl StdioServerInfo {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            env,
        }
    }

    /// Descriptor for the official GitHub MCP server, run in an isolated
    /// Docker container.
    ///
    /// The token is always forwarded; the toolset selector only when one was
    /// supplied. An optional `.env` file is handed to docker via
    /// `--env-file` so the container sees the same settings as this process.
    pub fn github_docker(
        token: &str,
        toolsets: Option<&str>,
        env_file: Option<&Path>,
    ) -> Self {
        let mut args: Vec<String> = vec!["run".into(), "-i".into(), "--rm".into()];

        if let Some(path) = env_file {
            args.push("--env-file".into());
            args.push(path.display().to_string());
        }

        let env = forwarded_env(token, toolsets);

        // Each forwarded variable needs a matching `-e NAME` so docker passes
        // it through to the container.
        let mut names: Vec<&String> = env.keys().collect();
        names.sort();
        for name in names {
            args.push("-e".into());
            args.push(name.clone());
        }

        args.push(GITHUB_MCP_IMAGE.into());

        Self::new("docker", args, env)
    }

    /// Descriptor for the legacy npm-distributed GitHub MCP server.
    pub fn github_npx(token: &str, toolsets: Option<&str>) -> Self {
        Self::new(
            "npx",
            vec!["-y".into(), GITHUB_MCP_NPM_PACKAGE.into()],
            forwarded_env(token, toolsets),
        )
    }

    /// One-line description for progress output, without secrets.
    pub fn describe(&self) -> String {
        format!("{} {}", self.command, self.args.join(" "))
    }
}

fn forwarded_env(token: &str, toolsets: Option<&str>) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(GITHUB_TOKEN_VAR.to_string(), token.to_string());
    if let Some(selector) = toolsets {
        env.insert(GITHUB_TOOLSETS_VAR.to_string(), selector.to_string());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_docker_env_contains_token() {
        let info = StdioServerInfo::github_docker("abc", Some("issues"), None);
        assert_eq!(
            info.env.get(GITHUB_TOKEN_VAR).map(String::as_str),
            Some("abc")
        );
        assert_eq!(
            info.env.get(GITHUB_TOOLSETS_VAR).map(String::as_str),
            Some("issues")
        );
        assert_eq!(info.env.len(), 2);
    }

    #[test]
    fn test_toolsets_only_when_supplied() {
        let info = StdioServerInfo::github_docker("abc", None, None);
        assert!(info.env.contains_key(GITHUB_TOKEN_VAR));
        assert!(!info.env.contains_key(GITHUB_TOOLSETS_VAR));
        assert_eq!(info.env.len(), 1);
    }

    #[test]
    fn test_docker_args_shape() {
        let info = StdioServerInfo::github_docker("abc", None, None);
        assert_eq!(info.command, "docker");
        assert_eq!(info.args[..3], ["run", "-i", "--rm"]);
        assert_eq!(info.args.last().map(String::as_str), Some(GITHUB_MCP_IMAGE));
        // -e forwarding for the token
        let pos = info.args.iter().position(|a| a == "-e").unwrap();
        assert_eq!(info.args[pos + 1], GITHUB_TOKEN_VAR);
    }

    #[test]
    fn test_docker_env_file_flag() {
        let path = PathBuf::from("/tmp/agent.env");
        let info = StdioServerInfo::github_docker("abc", None, Some(&path));
        let pos = info.args.iter().position(|a| a == "--env-file").unwrap();
        assert_eq!(info.args[pos + 1], "/tmp/agent.env");
    }

    #[test]
    fn test_npx_launcher() {
        let info = StdioServerInfo::github_npx("abc", Some("repos,issues"));
        assert_eq!(info.command, "npx");
        assert_eq!(info.args, vec!["-y", GITHUB_MCP_NPM_PACKAGE]);
        assert_eq!(
            info.env.get(GITHUB_TOOLSETS_VAR).map(String::as_str),
            Some("repos,issues")
        );
    }
}
