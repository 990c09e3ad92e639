//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The agent observes, thinks, acts (via tools), and responds. Every tool
//! call the model issues is executed in the order it was issued and
//! recorded on the returned [`AgentTurn`].

use std::sync::Arc;

use serde::Serialize;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System directive
    pub system_prompt: String,
    
    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,
    
    /// Generation options
    pub generation: GenerationOptions,
    
    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: TRAVEL_ASSISTANT_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

/// Directive restricting the model to tool-sourced facts
pub const TRAVEL_ASSISTANT_PROMPT: &str = r#"You are a travel assistant with no knowledge of your own.
You can ONLY answer using the provided tools.
If no tool can answer the question, say 'I don't know'.
Never make up information. Only return what the tools give you.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, combine them into your final answer."#;

/// Outcome of one agent turn
#[derive(Clone, Debug, Serialize)]
pub struct AgentTurn {
    /// Final answer text
    pub answer: String,
    
    /// Tool calls made during the turn, in the order they were issued
    pub tool_calls: Vec<ToolCall>,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }
    
    /// Create with default configuration
    pub fn with_defaults(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }
    
    /// Build the full system prompt including tool descriptions
    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();
        
        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }
        
        prompt
    }
    
    /// Run the agent on a conversation until the model stops calling tools
    pub async fn run(&self, conversation: &mut Conversation) -> Result<AgentTurn> {
        if conversation.messages().first().map(|m| &m.role) != Some(&Role::System) {
            conversation
                .messages_mut()
                .insert(0, Message::system(self.build_system_prompt()));
        }
        
        let mut tool_calls = Vec::new();
        let mut iterations = 0;
        
        loop {
            iterations += 1;
            
            if iterations > self.config.max_iterations {
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }
            
            let completion = self.provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;
            
            let content = completion.content;
            conversation.push(Message::assistant(&content));
            
            let calls = parse_tool_calls(&content);
            if calls.is_empty() {
                return Ok(AgentTurn {
                    answer: content,
                    tool_calls,
                });
            }
            
            for call in calls {
                tracing::debug!(tool = %call.name, "Executing tool");
                
                let result = self.execute_tool(&call).await;
                conversation.push(Message::tool(format_tool_result(&result), call.id.clone()));
                tool_calls.push(call);
            }
        }
    }
    
    /// Run one turn for a single user query
    pub async fn run_turn(&self, query: &str) -> Result<AgentTurn> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.push(Message::user(query));
        self.run(&mut conversation).await
    }
    
    /// Execute a tool call; failures become failed results for the model
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(mut result) => {
                result.id = call.id.clone();
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult {
                    name: call.name.clone(),
                    id: call.id.clone(),
                    success: false,
                    output: format!("Error: {}", e),
                    data: None,
                }
            }
        }
    }
    
    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
    
    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Format tool result for conversation
fn format_tool_result(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, result.output)
    }
}

/// Parse every ```tool block from an LLM response, in order
fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";
    
    let mut calls = Vec::new();
    let mut rest = content;
    
    while let Some(start_idx) = rest.find(TOOL_START) {
        let after_marker = &rest[start_idx + TOOL_START.len()..];
        let Some(end_idx) = after_marker.find(TOOL_END) else {
            break;
        };
        
        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(with_call_id(call)),
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed tool block"),
        }
        rest = &after_marker[end_idx + TOOL_END.len()..];
    }
    
    if calls.is_empty() {
        if let Some(call) = parse_inline_tool_call(content) {
            calls.push(with_call_id(call));
        }
    }
    
    calls
}

/// Try to parse an inline JSON object with a "tool" key
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }
    
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    
    if end <= start {
        return None;
    }
    
    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}
