//! Tool invocation.
//!
//! Every invocation resolves the tool against the current catalog snapshot
//! and opens its own session, so concurrent calls share no transport state.
//! Failures never escape as errors: they come back as an
//! [`InvocationResult`] whose text describes the problem, which is what the
//! agent loop feeds to the model.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::catalog::CatalogHandle;
use crate::error::McpError;
use crate::session::{with_session, ToolCallOutput};
use crate::transport::Connector;

/// Returned when a tool answers with no content at all
pub const NO_RESULT: &str = "No result";

/// A single tool call decided by the agent
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl InvocationRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments: serde_json::Map::new(),
        }
    }
    
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// Why an invocation did not produce a normal result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Could not talk to the server
    Transport,
    /// The call exceeded its deadline and was abandoned
    Timeout,
    /// No cataloged tool has that name
    ToolNotFound,
    /// The server ran the tool and reported a failure
    Remote,
    /// No async runtime was available to run the call
    Runtime,
}

/// Outcome of one invocation
#[derive(Clone, Debug, Serialize)]
pub struct InvocationResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl InvocationResult {
    pub fn failure(kind: ErrorKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw: None,
            error: Some(kind),
        }
    }
    
    fn from_output(output: ToolCallOutput) -> Self {
        let text = output.first_text().unwrap_or(NO_RESULT).to_string();
        Self {
            text,
            error: output.is_error.then_some(ErrorKind::Remote),
            raw: Some(output.raw),
        }
    }
    
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn error_kind(err: &McpError) -> ErrorKind {
    match err {
        McpError::Timeout { .. } => ErrorKind::Timeout,
        McpError::ToolNotFound(_) => ErrorKind::ToolNotFound,
        McpError::JsonRpc { .. } => ErrorKind::Remote,
        _ => ErrorKind::Transport,
    }
}

/// Calls cataloged tools on their owning servers
pub struct ToolInvoker {
    connector: Arc<dyn Connector>,
    catalog: CatalogHandle,
    call_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(connector: Arc<dyn Connector>, catalog: CatalogHandle) -> Self {
        Self {
            connector,
            catalog,
            call_timeout: Duration::from_secs(30),
        }
    }
    
    /// Deadline for one call, handshake included
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
    
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }
    
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let InvocationRequest { tool_name, arguments } = request;
        let catalog = self.catalog.snapshot();
        
        let Some((tool, endpoint)) = catalog.resolve(&tool_name) else {
            tracing::warn!(tool = %tool_name, "Invocation of unknown tool");
            return InvocationResult::failure(
                ErrorKind::ToolNotFound,
                format!("Error calling tool '{}': {}", tool_name, McpError::ToolNotFound(tool_name.clone())),
            );
        };
        
        tracing::debug!(tool = %tool_name, server = %tool.server_id, "Invoking MCP tool");
        
        let remote_name = tool.name.clone();
        let call = with_session(self.connector.as_ref(), endpoint, move |session| {
            Box::pin(async move { session.call_tool(&remote_name, arguments).await })
        });
        
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(output)) => {
                let result = InvocationResult::from_output(output);
                if result.error.is_some() {
                    tracing::warn!(tool = %tool_name, server = %endpoint.server_id, "Tool reported an error");
                }
                result
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %tool_name, server = %endpoint.server_id, error = %e, "Tool call failed");
                InvocationResult::failure(error_kind(&e), format!("Error calling tool '{}': {}", tool_name, e))
            }
            Err(_) => {
                tracing::warn!(
                    tool = %tool_name,
                    server = %endpoint.server_id,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "Tool call timed out"
                );
                InvocationResult::failure(
                    ErrorKind::Timeout,
                    format!(
                        "Error calling tool '{}': timed out after {}ms",
                        tool_name,
                        self.call_timeout.as_millis()
                    ),
                )
            }
        }
    }
}
