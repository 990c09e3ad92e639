//! McpTool — exposes a cataloged remote tool through `agent_core::Tool`.

use std::collections::BTreeSet;
use std::sync::Arc;

use agent_core::{
    ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema,
};
use async_trait::async_trait;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::invoker::{InvocationRequest, ToolInvoker};

/// A tool backed by an MCP server
pub struct McpTool {
    descriptor: ToolDescriptor,
    invoker: Arc<ToolInvoker>,
}

impl McpTool {
    pub fn new(descriptor: ToolDescriptor, invoker: Arc<ToolInvoker>) -> Self {
        Self { descriptor, invoker }
    }
    
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl Tool for McpTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.descriptor.name.clone(),
            description: self.descriptor.description.clone(),
            parameters: parameters_from_json_schema(&self.descriptor.input_schema),
            category: Some(self.descriptor.server_id.clone()),
            // unknown for remote tools; assume the worst
            has_side_effects: true,
        }
    }
    
    /// Arguments are checked by the server, not here.
    fn validate(&self, _call: &ToolCall) -> CoreResult<()> {
        Ok(())
    }
    
    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let request = InvocationRequest {
            tool_name: self.descriptor.name.clone(),
            arguments: call.arguments.clone().into_iter().collect(),
        };
        
        let result = self.invoker.invoke(request).await;
        
        let mut output = if result.is_ok() {
            ToolResult::success(&self.descriptor.name, result.text)
        } else {
            ToolResult::failure(&self.descriptor.name, result.text)
        };
        if let Some(raw) = result.raw {
            output = output.with_data(raw);
        }
        
        Ok(output)
    }
}

/// Register one [`McpTool`] per catalog entry. Returns how many were added.
pub fn register_catalog(
    registry: &mut ToolRegistry,
    catalog: &ToolCatalog,
    invoker: &Arc<ToolInvoker>,
) -> usize {
    let mut count = 0;
    for descriptor in catalog.tools() {
        registry.register(McpTool::new(descriptor.clone(), Arc::clone(invoker)));
        count += 1;
    }
    count
}

/// Flatten an object JSON Schema into parameter descriptions
pub fn parameters_from_json_schema(schema: &serde_json::Value) -> Vec<ParameterSchema> {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };
    
    let required: BTreeSet<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
        .unwrap_or_default();
    
    properties
        .iter()
        .map(|(name, property)| ParameterSchema {
            name: name.clone(),
            param_type: json_type(property),
            description: property
                .get("description")
                .or_else(|| property.get("title"))
                .and_then(|d| d.as_str())
                .unwrap_or_default()
                .to_string(),
            required: required.contains(name.as_str()),
            default: property.get("default").cloned(),
            enum_values: property.get("enum").and_then(|e| e.as_array()).cloned(),
        })
        .collect()
}

/// `"type": "string"` or `"type": ["string", "null"]`; anything else is a string
fn json_type(property: &serde_json::Value) -> String {
    match property.get("type") {
        Some(serde_json::Value::String(t)) => t.clone(),
        Some(serde_json::Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .find(|t| *t != "null")
            .unwrap_or("string")
            .to_string(),
        _ => "string".into(),
    }
}
