//! Building the agent context: catalog load, tool registration, agent.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Agent, AgentConfig, GenerationOptions, LlmProvider, ToolRegistry};
use agent_mcp::{
    register_catalog, CatalogHandle, CatalogLoader, Connector, DuplicatePolicy, RetryPolicy,
    ServerEndpoint, ToolInvoker,
};
use agent_runtime::ProviderKind;

use crate::config::ServerConfig;
use crate::state::AgentContext;

/// Inputs for (re)building an [`AgentContext`]
pub struct Bootstrap {
    pub connector: Arc<dyn Connector>,
    pub provider: Arc<dyn LlmProvider>,
    pub provider_kind: ProviderKind,
    pub model: String,
    pub servers: Vec<ServerEndpoint>,
    pub retry: RetryPolicy,
    pub duplicates: DuplicatePolicy,
    pub call_timeout: Duration,
}

impl Bootstrap {
    pub fn new(config: &ServerConfig, connector: Arc<dyn Connector>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            connector,
            provider,
            provider_kind: config.provider.kind(),
            model: config.provider.model().to_string(),
            servers: config.servers.clone(),
            retry: config.load_retry,
            duplicates: config.duplicates,
            call_timeout: config.call_timeout,
        }
    }
    
    /// Load the catalog and assemble a fresh context. An unreachable tool
    /// fleet yields an agent with no tools, never an error.
    pub async fn build(&self) -> AgentContext {
        let catalog = CatalogLoader::new(Arc::clone(&self.connector))
            .with_retry(self.retry)
            .with_duplicates(self.duplicates)
            .with_list_timeout(self.call_timeout)
            .load(&self.servers)
            .await;
        let handle = CatalogHandle::new(catalog);
        
        let invoker = Arc::new(
            ToolInvoker::new(Arc::clone(&self.connector), handle.clone())
                .with_call_timeout(self.call_timeout),
        );
        
        let mut registry = ToolRegistry::new();
        let count = register_catalog(&mut registry, &handle.snapshot(), &invoker);
        tracing::info!(count, tools = ?registry.names(), "Registered MCP tools");
        let tools = Arc::new(registry);
        
        let config = AgentConfig {
            generation: GenerationOptions {
                model: self.model.clone(),
                ..Default::default()
            },
            ..Default::default()
        };
        
        AgentContext {
            catalog: handle,
            tools: Arc::clone(&tools),
            agent: Agent::new(Arc::clone(&self.provider), tools, config),
            provider: self.provider_kind,
        }
    }
}
