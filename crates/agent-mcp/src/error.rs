//! Error Types

use thiserror::Error;

/// Result type alias for MCP operations
pub type Result<T> = std::result::Result<T, McpError>;

/// Errors talking to MCP tool servers
#[derive(Error, Debug)]
pub enum McpError {
    /// Connection, HTTP or framing failure
    #[error("Transport error for '{server}' ({url}): {message}")]
    Transport {
        server: String,
        url: String,
        message: String,
    },
    
    /// JSON-RPC error object returned by the server
    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },
    
    /// Well-formed transport, unexpected payload
    #[error("MCP protocol error from '{server}': {message}")]
    Protocol { server: String, message: String },
    
    #[error("MCP server '{server}' timed out after {timeout_ms}ms")]
    Timeout { server: String, timeout_ms: u64 },
    
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    
    #[error("Invalid MCP configuration: {0}")]
    Config(String),
}
