//! Environment-based configuration.
//!
//! All credentials and repository coordinates are read once at startup into
//! an immutable [`Config`] that is passed down by reference. Nothing deeper
//! in the stack reads the process environment.

use anyhow::{bail, Result};
use std::path::Path;

/// Required: GitHub personal access token, forwarded to the MCP server.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

/// Optional: comma-separated toolset selector understood by the server
/// (e.g. "issues" or "repos,issues").
pub const GITHUB_TOOLSETS_VAR: &str = "GITHUB_TOOLSETS";

/// Required: owner of the repository the default task targets.
pub const GITHUB_OWNER_VAR: &str = "GITHUB_OWNER";

/// Required: name of the repository the default task targets.
pub const GITHUB_REPO_VAR: &str = "GITHUB_REPO";

/// Required: API key for the chat completions endpoint.
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Optional: alternative OpenAI-compatible base URL.
pub const OPENAI_BASE_URL_VAR: &str = "OPENAI_BASE_URL";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GitHub personal access token.
    pub github_token: String,

    /// Toolset selector forwarded to the MCP server, if any.
    pub github_toolsets: Option<String>,

    /// Owner of the target repository.
    pub github_owner: String,

    /// Name of the target repository.
    pub github_repo: String,

    /// API key for the chat model.
    pub openai_api_key: String,

    /// Base URL of the chat completions API.
    pub openai_base_url: String,
}

impl Config {
    /// Load configuration from the process environment, after merging in an
    /// optional `.env` file.
    ///
    /// `env_file` points at an explicit settings file; when `None`, the
    /// default `.env` lookup runs and is allowed to find nothing.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary lookup function.
    ///
    /// Empty values are treated the same as absent ones.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            github_token: require(&lookup, GITHUB_TOKEN_VAR)?,
            github_toolsets: lookup(GITHUB_TOOLSETS_VAR),
            github_owner: require(&lookup, GITHUB_OWNER_VAR)?,
            github_repo: require(&lookup, GITHUB_REPO_VAR)?,
            openai_api_key: require(&lookup, OPENAI_API_KEY_VAR)?,
            openai_base_url: lookup(OPENAI_BASE_URL_VAR)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        })
    }

    /// The `owner/repo` slug of the target repository.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.github_owner, self.github_repo)
    }

    /// The default task prompt when the user supplies none.
    pub fn default_task_prompt(&self) -> String {
        format!(
            "Can you find the typo in the README of {}.git and open an issue \
             describing how to fix it?",
            self.repo_slug()
        )
    }
}

/// Fetch a required value, failing with a message that names the variable.
fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(value) => Ok(value),
        None => bail!("Missing required setting {name}. Add it to .env or export it."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (GITHUB_TOKEN_VAR, "abc"),
            (GITHUB_TOOLSETS_VAR, "issues"),
            (GITHUB_OWNER_VAR, "acme"),
            (GITHUB_REPO_VAR, "widgets"),
            (OPENAI_API_KEY_VAR, "sk-test"),
        ])
    }

    fn load_from(env: &HashMap<&str, &str>) -> Result<Config> {
        Config::from_lookup(|name| env.get(name).map(|v| (*v).to_string()))
    }

    #[test]
    fn test_load_full_config() {
        let config = load_from(&full_env()).unwrap();
        assert_eq!(config.github_token, "abc");
        assert_eq!(config.github_toolsets.as_deref(), Some("issues"));
        assert_eq!(config.repo_slug(), "acme/widgets");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_missing_token_names_variable() {
        let mut env = full_env();
        env.remove(GITHUB_TOKEN_VAR);
        let err = load_from(&env).unwrap_err().to_string();
        assert!(err.contains("GITHUB_PERSONAL_ACCESS_TOKEN"));
    }

    #[test]
    fn test_missing_owner_names_variable() {
        let mut env = full_env();
        env.remove(GITHUB_OWNER_VAR);
        let err = load_from(&env).unwrap_err().to_string();
        assert!(err.contains("GITHUB_OWNER"));
    }

    #[test]
    fn test_missing_api_key_names_variable() {
        let mut env = full_env();
        env.remove(OPENAI_API_KEY_VAR);
        let err = load_from(&env).unwrap_err().to_string();
        assert!(err.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_toolsets_is_optional() {
        let mut env = full_env();
        env.remove(GITHUB_TOOLSETS_VAR);
        let config = load_from(&env).unwrap();
        assert_eq!(config.github_toolsets, None);
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut env = full_env();
        env.insert(GITHUB_REPO_VAR, "  ");
        let err = load_from(&env).unwrap_err().to_string();
        assert!(err.contains("GITHUB_REPO"));
    }

    #[test]
    fn test_default_task_prompt_contains_slug() {
        let config = load_from(&full_env()).unwrap();
        let prompt = config.default_task_prompt();
        assert!(prompt.contains("acme/widgets"));
        assert!(prompt.to_lowercase().contains("readme"));
    }
}
