//! MCP (Model Context Protocol) plumbing.
//!
//! `server` describes how to launch the GitHub MCP server subprocess;
//! `client` speaks JSON-RPC to it over stdio.

pub mod client;
pub mod server;

pub use client::{McpConnection, McpError};
pub use server::StdioServerInfo;
