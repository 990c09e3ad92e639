//! # agent-runtime
//!
//! LLM providers for the travel assistant.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via Ollama
//! - **Gemini**: Google Generative Language API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::{Agent, ToolRegistry};
//! use agent_runtime::{ProviderSettings, ollama::OllamaConfig};
//!
//! let provider = ProviderSettings::Ollama(OllamaConfig::default()).build()?;
//! let agent = Agent::with_defaults(provider, Arc::new(ToolRegistry::new()));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use gemini::{GeminiConfig, GeminiProvider};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

use agent_core::{AgentError, LlmProvider, Result};

/// Which backend answers completions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Ollama,
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = AgentError;
    
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(AgentError::Config(format!(
                "unknown LLM provider '{}' (expected 'ollama' or 'gemini')",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        })
    }
}

/// Fully resolved provider configuration
#[derive(Clone, Debug)]
pub enum ProviderSettings {
    #[cfg(feature = "ollama")]
    Ollama(OllamaConfig),
    Gemini(GeminiConfig),
}

impl ProviderSettings {
    pub fn kind(&self) -> ProviderKind {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama(_) => ProviderKind::Ollama,
            Self::Gemini(_) => ProviderKind::Gemini,
        }
    }
    
    /// Model the agent should request
    pub fn model(&self) -> &str {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama(config) => &config.model,
            Self::Gemini(config) => &config.model,
        }
    }
    
    pub fn build(self) -> Result<Arc<dyn LlmProvider>> {
        match self {
            #[cfg(feature = "ollama")]
            Self::Ollama(config) => Ok(Arc::new(OllamaProvider::from_config(config))),
            Self::Gemini(config) => Ok(Arc::new(GeminiProvider::from_config(config)?)),
        }
    }
}

// Re-export core types for convenience
pub use agent_core::{Agent, Message, Role, Tool, ToolRegistry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parsing() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!(" Gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("openai".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::default().to_string(), "ollama");
    }

    #[test]
    fn gemini_settings_need_a_key() {
        let settings = ProviderSettings::Gemini(GeminiConfig::new(""));
        assert_eq!(settings.kind(), ProviderKind::Gemini);
        assert_eq!(settings.model(), "gemini-2.0-flash-lite");
        assert!(settings.build().is_err());
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn ollama_settings_build() {
        let settings = ProviderSettings::Ollama(OllamaConfig::default());
        assert_eq!(settings.model(), "llama3.2");
        assert!(settings.build().is_ok());
    }
}
