//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),
    
    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    
    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    
    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),
    
    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),
    
    /// The agent turn exceeded its deadline
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    
    /// A request arrived before startup finished
    #[error("Agent not initialized")]
    Uninitialized,
    
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),
    
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Message placed in the `error` field of an `/ask` response
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Timeout(_) => "Request timed out".into(),
            AgentError::Uninitialized => "Agent not initialized".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::MaxIterations(_) => "The request took too many steps. Please try a simpler query.".into(),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_user_message() {
        assert_eq!(AgentError::Timeout(60).user_message(), "Request timed out");
        assert_eq!(AgentError::Uninitialized.user_message(), "Agent not initialized");
    }

    #[test]
    fn test_provider_error_keeps_detail() {
        let err = AgentError::Provider("connection refused".into());
        assert!(err.user_message().contains("connection refused"));
    }

    #[test]
    fn test_iteration_limit_user_message() {
        assert_eq!(
            AgentError::MaxIterations(2).user_message(),
            "The request took too many steps. Please try a simpler query."
        );
        assert_eq!(AgentError::ToolNotFound("find_hotel".into()).user_message(), "The tool 'find_hotel' is not available.");
    }
}
