//! Tool server endpoints and loading policies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// How a tool server is reached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportKind {
    /// JSON-RPC over HTTP POST with JSON or SSE responses
    #[default]
    StreamableHttp,
}

/// A configured tool server. Immutable for the life of the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub server_id: String,
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
}

impl ServerEndpoint {
    pub fn new(server_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            url: url.into(),
            transport: TransportKind::StreamableHttp,
        }
    }
    
    /// Parse `id=url,id=url`. Entries without `id=` are named `server-N`
    /// after their position.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>> {
        let mut endpoints: Vec<Self> = Vec::new();
        
        for (index, entry) in spec.split(',').map(str::trim).enumerate() {
            if entry.is_empty() {
                continue;
            }
            
            // A bare URL contains "://" before any '='.
            let (id, url) = match entry.split_once('=') {
                Some((id, url)) if !id.contains("://") => (id.trim().to_string(), url.trim()),
                _ => (format!("server-{}", index + 1), entry),
            };
            
            if url.is_empty() {
                return Err(McpError::Config(format!("server '{}' has an empty URL", id)));
            }
            if endpoints.iter().any(|e| e.server_id == id) {
                return Err(McpError::Config(format!("server id '{}' is configured twice", id)));
            }
            
            endpoints.push(Self::new(id, url));
        }
        
        Ok(endpoints)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.server_id, self.url)
    }
}

/// Bounded retry with a fixed delay, applied to a whole catalog load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// What happens when two servers advertise the same tool name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The server loaded later replaces the earlier registration
    #[default]
    LastWins,
    /// The first registration is kept
    FirstWins,
}

impl FromStr for DuplicatePolicy {
    type Err = McpError;
    
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "last_wins" => Ok(Self::LastWins),
            "first_wins" => Ok(Self::FirstWins),
            other => Err(McpError::Config(format!(
                "unknown duplicate policy '{}' (expected last_wins or first_wins)",
                other
            ))),
        }
    }
}
