//! Tool catalog: the merged, read-mostly registry of remote tools.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::config::{DuplicatePolicy, ServerEndpoint};

/// A tool advertised by one server. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
    pub server_id: String,
}

impl ToolDescriptor {
    /// Build a descriptor; a blank description becomes `Tool: <name>`
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        input_schema: serde_json::Value,
        server_id: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Tool: {}", name));
        
        Self {
            name,
            description,
            input_schema,
            server_id: server_id.into(),
        }
    }
}

/// Tool name → descriptor, plus the endpoints the tools came from
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDescriptor>,
    servers: BTreeMap<String, ServerEndpoint>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Record an endpoint that tools may be resolved to
    pub fn add_server(&mut self, endpoint: ServerEndpoint) {
        self.servers.insert(endpoint.server_id.clone(), endpoint);
    }
    
    /// Insert a tool under `policy`. Returns whether the descriptor is now
    /// the registered one. Collisions are always logged.
    pub fn insert(&mut self, tool: ToolDescriptor, policy: DuplicatePolicy) -> bool {
        if let Some(existing) = self.tools.get(&tool.name) {
            let keep_new = policy == DuplicatePolicy::LastWins;
            let (kept, dropped) = if keep_new {
                (&tool.server_id, &existing.server_id)
            } else {
                (&existing.server_id, &tool.server_id)
            };
            tracing::warn!(
                tool = %tool.name,
                kept = %kept,
                dropped = %dropped,
                "Tool advertised by more than one server"
            );
            if !keep_new {
                return false;
            }
        }
        self.tools.insert(tool.name.clone(), tool);
        true
    }
    
    /// Look up a tool and the endpoint that owns it
    pub fn resolve(&self, name: &str) -> Option<(&ToolDescriptor, &ServerEndpoint)> {
        let tool = self.tools.get(name)?;
        let endpoint = self.servers.get(&tool.server_id)?;
        Some((tool, endpoint))
    }
    
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }
    
    /// Tool names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
    
    pub fn tools(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }
    
    pub fn by_server<'a>(&'a self, server_id: &'a str) -> impl Iterator<Item = &'a ToolDescriptor> + 'a {
        self.tools.values().filter(move |t| t.server_id == server_id)
    }
    
    pub fn len(&self) -> usize {
        self.tools.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Process-wide holder of the current catalog.
///
/// Readers take a snapshot; reloads swap the whole catalog, so a snapshot
/// taken before a reload stays valid and unchanged.
#[derive(Clone, Debug, Default)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<ToolCatalog>>>,
}

impl CatalogHandle {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }
    
    pub fn snapshot(&self) -> Arc<ToolCatalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
    
    /// Atomically replace the catalog, returning the previous one
    pub fn replace(&self, catalog: ToolCatalog) -> Arc<ToolCatalog> {
        let next = Arc::new(catalog);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, next)
    }
}
