//! Application State

use std::sync::{Arc, RwLock};
use std::time::Duration;

use agent_core::{Agent, ToolRegistry};
use agent_mcp::CatalogHandle;
use agent_runtime::ProviderKind;

use crate::bootstrap::Bootstrap;

/// Everything a request needs once startup has finished
pub struct AgentContext {
    /// Remote tool catalog the registry was built from
    pub catalog: CatalogHandle,
    
    /// Tool registry with all available tools
    pub tools: Arc<ToolRegistry>,
    
    /// The agent answering queries
    pub agent: Agent,
    
    pub provider: ProviderKind,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Empty until background initialization installs a context
    context: Arc<RwLock<Option<Arc<AgentContext>>>>,
    
    /// Upper bound on one `/ask` turn
    pub llm_timeout: Duration,
    
    /// How to rebuild the context on reload
    pub bootstrap: Option<Arc<Bootstrap>>,
}

impl AppState {
    pub fn new(llm_timeout: Duration) -> Self {
        Self {
            context: Arc::new(RwLock::new(None)),
            llm_timeout,
            bootstrap: None,
        }
    }
    
    pub fn with_bootstrap(mut self, bootstrap: Arc<Bootstrap>) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }
    
    /// Current context, if initialization has finished
    pub fn context(&self) -> Option<Arc<AgentContext>> {
        match self.context.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
    
    /// Swap in a new context, returning the previous one
    pub fn install(&self, context: AgentContext) -> Option<Arc<AgentContext>> {
        let mut guard = match self.context.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(Arc::new(context))
    }
}
