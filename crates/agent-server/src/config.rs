//! Server configuration, read from the environment (and `.env`).

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use agent_mcp::{DuplicatePolicy, RetryPolicy, ServerEndpoint};
use agent_runtime::gemini::{GeminiConfig, DEFAULT_GEMINI_MODEL};
use agent_runtime::ollama::{OllamaConfig, DEFAULT_OLLAMA_MODEL};
use agent_runtime::{ProviderKind, ProviderSettings};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

pub const DEFAULT_MCP_SERVERS: &str = "weather=http://weather-service:8001/mcp,\
travel=http://travel-service:8002/mcp,\
packing=http://packing-service:8003/mcp";

/// Everything the server needs to start
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub servers: Vec<ServerEndpoint>,
    pub call_timeout: Duration,
    pub load_retry: RetryPolicy,
    pub duplicates: DuplicatePolicy,
    pub llm_timeout: Duration,
    pub provider: ProviderSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
    
    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        
        let servers = ServerEndpoint::parse_list(&env.string("MCP_SERVERS", DEFAULT_MCP_SERVERS))
            .context("invalid MCP_SERVERS")?;
        
        let max_attempts: u32 = env.parsed("MCP_LOAD_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            bail!("MCP_LOAD_ATTEMPTS must be at least 1");
        }
        let load_retry = RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(env.parsed("MCP_LOAD_DELAY_SECS", 2)?),
        };
        
        let provider = match env.parsed("LLM_PROVIDER", ProviderKind::Ollama)? {
            ProviderKind::Ollama => ProviderSettings::Ollama(OllamaConfig {
                host: env.string("OLLAMA_HOST", "http://localhost"),
                port: env.parsed("OLLAMA_PORT", 11434)?,
                model: env.string("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            }),
            ProviderKind::Gemini => {
                let Some(api_key) = env.get("GEMINI_API_KEY") else {
                    bail!("LLM_PROVIDER=gemini requires GEMINI_API_KEY");
                };
                let mut config = GeminiConfig::new(api_key);
                config.model = env.string("GEMINI_MODEL", DEFAULT_GEMINI_MODEL);
                ProviderSettings::Gemini(config)
            }
        };
        
        Ok(Self {
            bind_addr: env.string("BIND_ADDR", DEFAULT_BIND_ADDR),
            servers,
            call_timeout: Duration::from_secs(env.parsed("MCP_CALL_TIMEOUT_SECS", 30)?),
            load_retry,
            duplicates: env.parsed("MCP_DUPLICATE_POLICY", DuplicatePolicy::LastWins)?,
            llm_timeout: Duration::from_secs(env.parsed("LLM_TIMEOUT_SECS", 60)?),
            provider,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }
    
    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
    
    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("invalid {}={:?}", key, raw)),
            None => Ok(default),
        }
    }
}
