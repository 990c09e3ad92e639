//! Catalog loading across several tool servers.
//!
//! One unreachable server never fails the load: its error is logged and the
//! catalog is built from whatever answered. Only a completely empty result
//! triggers the whole-load retry.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::config::{DuplicatePolicy, RetryPolicy, ServerEndpoint};
use crate::error::{McpError, Result};
use crate::session::with_session;
use crate::transport::Connector;

/// Builds a [`ToolCatalog`] from a list of endpoints
pub struct CatalogLoader {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    duplicates: DuplicatePolicy,
    list_timeout: Duration,
}

impl CatalogLoader {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            retry: RetryPolicy::default(),
            duplicates: DuplicatePolicy::default(),
            list_timeout: Duration::from_secs(30),
        }
    }
    
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
    
    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }
    
    /// Bound on connecting to and listing a single server
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }
    
    /// Load with the configured retry policy. Never fails; an empty catalog
    /// means no server was reachable.
    pub async fn load(&self, endpoints: &[ServerEndpoint]) -> ToolCatalog {
        let attempts = self.retry.max_attempts.max(1);
        
        for attempt in 1..=attempts {
            let catalog = self.load_once(endpoints).await;
            if !catalog.is_empty() || endpoints.is_empty() {
                return catalog;
            }
            
            if attempt < attempts {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = self.retry.delay.as_millis() as u64,
                    "No MCP tools loaded, retrying"
                );
                tokio::time::sleep(self.retry.delay).await;
            }
        }
        
        tracing::warn!(attempts, "No MCP tools available; continuing with an empty catalog");
        ToolCatalog::new()
    }
    
    /// One pass over all endpoints. Servers are queried concurrently and
    /// merged in configuration order, so duplicate resolution is stable.
    pub async fn load_once(&self, endpoints: &[ServerEndpoint]) -> ToolCatalog {
        let listings = join_all(endpoints.iter().map(|e| self.list_endpoint(e))).await;
        
        let mut catalog = ToolCatalog::new();
        for (endpoint, listing) in endpoints.iter().zip(listings) {
            match listing {
                Ok(tools) => {
                    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                    tracing::info!(
                        server = %endpoint.server_id,
                        count = tools.len(),
                        tools = ?names,
                        "Loaded MCP tools"
                    );
                    catalog.add_server(endpoint.clone());
                    for tool in tools {
                        catalog.insert(tool, self.duplicates);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        server = %endpoint.server_id,
                        url = %endpoint.url,
                        error = %e,
                        "Failed to load tools from MCP server"
                    );
                }
            }
        }
        
        catalog
    }
    
    async fn list_endpoint(&self, endpoint: &ServerEndpoint) -> Result<Vec<ToolDescriptor>> {
        let listing = with_session(self.connector.as_ref(), endpoint, |session| {
            Box::pin(session.list_tools())
        });
        
        tokio::time::timeout(self.list_timeout, listing)
            .await
            .map_err(|_| McpError::Timeout {
                server: endpoint.server_id.clone(),
                timeout_ms: self.list_timeout.as_millis() as u64,
            })?
    }
}
