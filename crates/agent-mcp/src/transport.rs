//! Transports for MCP tool servers.
//!
//! [`Connector`] opens a [`McpTransport`] to one endpoint. The only wire
//! implementation is streamable HTTP: every JSON-RPC message is POSTed to the
//! endpoint URL and the reply arrives either as a JSON body or as an SSE
//! stream. The session id handed out by the server during `initialize` is
//! echoed on every later request and released with `DELETE` on close.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;

use crate::config::{ServerEndpoint, TransportKind};
use crate::error::{McpError, Result};
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Session id header of the streamable HTTP transport
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Negotiated protocol version header
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// One open connection to a tool server.
///
/// Owned by exactly one session; never shared between concurrent calls.
#[async_trait]
pub trait McpTransport: Send {
    /// Send a request and wait for the response with the same id
    async fn send_request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse>;
    
    /// Send a notification (no response expected)
    async fn send_notification(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()>;
    
    /// Release the connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to configured endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn McpTransport>>;
}

/// Connector for streamable HTTP endpoints
#[derive(Clone, Debug)]
pub struct HttpConnector {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl HttpConnector {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            request_timeout: Duration::from_secs(30),
        }
    }
    
    /// Upper bound for a single HTTP exchange
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Box<dyn McpTransport>> {
        match endpoint.transport {
            TransportKind::StreamableHttp => Ok(Box::new(HttpTransport::new(
                self.client.clone(),
                endpoint.clone(),
                self.request_timeout,
            ))),
        }
    }
}

/// Streamable HTTP transport bound to one endpoint
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: ServerEndpoint,
    request_timeout: Duration,
    session_id: Option<String>,
    protocol_version: Option<String>,
    next_id: u64,
    closed: bool,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, endpoint: ServerEndpoint, request_timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            request_timeout,
            session_id: None,
            protocol_version: None,
            next_id: 1,
            closed: false,
        }
    }
    
    /// Session id assigned by the server, once initialized
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
    
    fn transport_error(&self, message: impl Into<String>) -> McpError {
        McpError::Transport {
            server: self.endpoint.server_id.clone(),
            url: self.endpoint.url.clone(),
            message: message.into(),
        }
    }
    
    fn map_send_error(&self, err: reqwest::Error) -> McpError {
        if err.is_timeout() {
            McpError::Timeout {
                server: self.endpoint.server_id.clone(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            self.transport_error(err.to_string())
        }
    }
    
    async fn post<T: Serialize + Sync>(&self, body: &T) -> Result<reqwest::Response> {
        let mut request = self.client
            .post(&self.endpoint.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .timeout(self.request_timeout)
            .json(body);
        
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_ID_HEADER, session_id);
        }
        if let Some(version) = &self.protocol_version {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }
        
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        
        let status = response.status();
        if !status.is_success() {
            return Err(self.transport_error(format!("HTTP {}", status)));
        }
        
        Ok(response)
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send_request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse> {
        if self.closed {
            return Err(self.transport_error("transport is closed"));
        }
        
        let id = self.next_id;
        self.next_id += 1;
        let request = JsonRpcRequest::new(id, method, params);
        
        let response = self.post(&request).await?;
        
        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session_id.to_string());
        }
        
        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        
        let reply = if is_sse {
            parse_sse_response(&body, id).ok_or_else(|| {
                self.transport_error(format!("event stream ended without a response to '{}'", method))
            })?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body)
                .map_err(|e| self.transport_error(format!("invalid response to '{}': {}", method, e)))?
        };
        
        if method == "initialize" {
            self.protocol_version = reply
                .result
                .as_ref()
                .and_then(|r| r.get("protocolVersion"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        
        Ok(reply)
    }
    
    async fn send_notification(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        if self.closed {
            return Err(self.transport_error("transport is closed"));
        }
        
        self.post(&JsonRpcNotification::new(method, params)).await?;
        Ok(())
    }
    
    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };
        
        let response = self.client
            .delete(&self.endpoint.url)
            .header(SESSION_ID_HEADER, &session_id)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        
        // Servers may refuse client-initiated termination.
        let status = response.status();
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.transport_error(format!("HTTP {} on session close", status)))
        }
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        
        // Dropped mid-flight (e.g. a cancelled call): release the session in
        // the background if a runtime is still around.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let request = self.client
                .delete(&self.endpoint.url)
                .header(SESSION_ID_HEADER, session_id)
                .timeout(self.request_timeout);
            let server = self.endpoint.server_id.clone();
            handle.spawn(async move {
                if let Err(e) = request.send().await {
                    tracing::debug!(server = %server, error = %e, "Background MCP session release failed");
                }
            });
        }
    }
}

/// Find the response with `id` among the `data:` events of an SSE body
pub(crate) fn parse_sse_response(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    
    for line in body.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !data.is_empty() {
                if let Ok(reply) = serde_json::from_str::<JsonRpcResponse>(&data) {
                    if reply.id == Some(id) {
                        return Some(reply);
                    }
                }
                data.clear();
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    
    None
}
