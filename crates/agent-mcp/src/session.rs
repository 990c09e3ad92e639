//! MCP sessions.
//!
//! A [`Session`] owns one transport, performs the initialize handshake and
//! exposes `tools/list` and `tools/call`. Sessions are short-lived: a catalog
//! load or a single invocation opens one and closes it when done. Use
//! [`with_session`] to get the close on every exit path.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::catalog::ToolDescriptor;
use crate::config::ServerEndpoint;
use crate::error::{McpError, Result};
use crate::transport::{Connector, McpTransport};

/// MCP protocol version we request
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Upper bound on `tools/list` pages, against servers that never stop paging
const MAX_LIST_PAGES: usize = 64;

/// A content item in a tool result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Decoded `tools/call` result with the untouched payload alongside
#[derive(Clone, Debug)]
pub struct ToolCallOutput {
    pub content: Vec<ToolContent>,
    pub is_error: bool,
    pub raw: serde_json::Value,
}

impl ToolCallOutput {
    /// The first text item, if any
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct ListToolsResult {
    tools: Vec<ToolEntry>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    json!({"type": "object", "properties": {}})
}

/// Server identity reported during the handshake
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    #[serde(default, rename = "serverInfo")]
    server_info: ServerInfo,
}

/// An initialized session with one tool server
pub struct Session {
    endpoint: ServerEndpoint,
    transport: Box<dyn McpTransport>,
    server_info: ServerInfo,
}

impl Session {
    /// Connect and run the handshake. A failed handshake closes the
    /// transport before the error is returned.
    pub async fn open(connector: &dyn Connector, endpoint: &ServerEndpoint) -> Result<Self> {
        let transport = connector.connect(endpoint).await?;
        let mut session = Self {
            endpoint: endpoint.clone(),
            transport,
            server_info: ServerInfo::default(),
        };
        
        match session.handshake().await {
            Ok(()) => Ok(session),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }
    
    async fn handshake(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        
        let result = self.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| self.protocol_error(format!("invalid initialize result: {}", e)))?;
        
        tracing::debug!(
            server = %self.endpoint.server_id,
            remote = %init.server_info.name,
            protocol = %init.protocol_version,
            "MCP session initialized"
        );
        self.server_info = init.server_info;
        
        self.transport
            .send_notification("notifications/initialized", None)
            .await
    }
    
    /// Send a request and unwrap the JSON-RPC envelope
    async fn request(&mut self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let response = self.transport.send_request(method, params).await?;
        
        if let Some(err) = response.error {
            return Err(McpError::JsonRpc {
                server: self.endpoint.server_id.clone(),
                code: err.code,
                message: err.message,
            });
        }
        
        response.result.ok_or_else(|| {
            self.protocol_error(format!("'{}' response has neither result nor error", method))
        })
    }
    
    fn protocol_error(&self, message: String) -> McpError {
        McpError::Protocol {
            server: self.endpoint.server_id.clone(),
            message,
        }
    }
    
    /// List every tool the server advertises, following pagination
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| self.protocol_error(format!("invalid tools/list result: {}", e)))?;
            
            tools.extend(page.tools.into_iter().map(|t| {
                ToolDescriptor::new(t.name, t.description, t.input_schema, self.endpoint.server_id.clone())
            }));
            
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
        
        tracing::warn!(server = %self.endpoint.server_id, "tools/list pagination truncated");
        Ok(tools)
    }
    
    /// Call a tool by its remote name
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolCallOutput> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        
        let raw = self.request("tools/call", Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(raw.clone())
            .map_err(|e| self.protocol_error(format!("invalid tools/call result: {}", e)))?;
        
        Ok(ToolCallOutput {
            content: result.content,
            is_error: result.is_error,
            raw,
        })
    }
    
    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }
    
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
    
    /// Tear the session down. Close failures are logged, not returned.
    pub async fn close(mut self) {
        if let Err(e) = self.transport.close().await {
            tracing::debug!(server = %self.endpoint.server_id, error = %e, "MCP session close failed");
        }
    }
}

/// Open a session, run `f` against it, and close it whatever `f` returned
pub async fn with_session<T, F>(connector: &dyn Connector, endpoint: &ServerEndpoint, f: F) -> Result<T>
where
    T: Send,
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>>,
{
    let mut session = Session::open(connector, endpoint).await?;
    let outcome = f(&mut session).await;
    session.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_tool_entry_without_description() {
        let entry: ToolEntry = serde_json::from_str(r#"{"name": "list"}"#).unwrap();
        assert_eq!(entry.name, "list");
        assert!(entry.description.is_none());
        assert_eq!(entry.input_schema["type"], "object");
    }

    #[test]
    fn deserialize_mixed_content() {
        let json = r#"{
            "content": [
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "audio", "data": "..."},
                {"type": "text", "text": "Paris: sunny, 22C"},
                {"type": "text", "text": "second"}
            ],
            "isError": false
        }"#;
        let result: CallToolResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.content[1], ToolContent::Unsupported);
        
        let output = ToolCallOutput {
            content: result.content,
            is_error: result.is_error,
            raw: serde_json::Value::Null,
        };
        assert_eq!(output.first_text(), Some("Paris: sunny, 22C"));
    }

    #[test]
    fn empty_content_has_no_text() {
        let result: CallToolResult = serde_json::from_str(r#"{"isError": true}"#).unwrap();
        assert!(result.is_error);
        assert!(result.content.is_empty());
    }

    #[test]
    fn list_result_with_cursor() {
        let json = r#"{"tools": [{"name": "a", "inputSchema": {"type": "object"}}], "nextCursor": "p2"}"#;
        let page: ListToolsResult = serde_json::from_str(json).unwrap();
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("p2"));
    }
}
