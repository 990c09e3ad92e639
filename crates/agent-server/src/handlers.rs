//! HTTP Handlers

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, AgentTurn};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub framework: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ToolCallSummary {
    pub name: String,
    pub args: HashMap<String, serde_json::Value>,
}

/// Body of every `/ask` reply; application errors are still HTTP 200
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AskResponse {
    Answer {
        query: String,
        answer: String,
        tool_calls: Vec<ToolCallSummary>,
    },
    Error {
        error: String,
        query: String,
    },
}

impl AskResponse {
    fn answer(query: String, turn: AgentTurn) -> Self {
        Self::Answer {
            query,
            answer: turn.answer,
            tool_calls: turn
                .tool_calls
                .into_iter()
                .map(|call| ToolCallSummary {
                    name: call.name,
                    args: call.arguments,
                })
                .collect(),
        }
    }
    
    fn error(query: String, error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            query,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools: Vec<String>,
}

const FRAMEWORK: &str = "agent-core";

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let Some(context) = state.context() else {
        return Json(HealthResponse {
            status: "initializing",
            framework: FRAMEWORK,
            provider: None,
            tools: Vec::new(),
        });
    };
    
    Json(HealthResponse {
        status: "healthy",
        framework: FRAMEWORK,
        provider: Some(context.provider.to_string()),
        tools: context.tools.names().into_iter().map(str::to_string).collect(),
    })
}

/// Run one agent turn for a query
pub async fn ask(
    State(state): State<AppState>,
    Json(payload): Json<AskRequest>,
) -> Json<AskResponse> {
    let query = payload.query;
    
    let Some(context) = state.context() else {
        return Json(AskResponse::error(query, AgentError::Uninitialized.user_message()));
    };
    
    tracing::info!(query = %query, "Processing query");
    
    // Expiry drops the turn, cancelling any in-flight tool call with it.
    let outcome = tokio::time::timeout(state.llm_timeout, context.agent.run_turn(&query)).await;
    
    let response = match outcome {
        Ok(Ok(turn)) => {
            tracing::info!(tool_calls = turn.tool_calls.len(), "Query answered");
            AskResponse::answer(query, turn)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Agent error");
            AskResponse::error(query, e.user_message())
        }
        Err(_) => {
            let secs = state.llm_timeout.as_secs();
            tracing::warn!(timeout_secs = secs, "Query timed out");
            AskResponse::error(query, AgentError::Timeout(secs).user_message())
        }
    };
    
    Json(response)
}

/// Rebuild the catalog and agent, then swap them in
pub async fn reload(State(state): State<AppState>) -> Json<ReloadResponse> {
    let Some(bootstrap) = state.bootstrap.clone() else {
        return Json(ReloadResponse {
            status: None,
            error: Some("Reload not available".into()),
            tools: Vec::new(),
        });
    };
    
    let context = bootstrap.build().await;
    let tools = context.catalog.snapshot().names().into_iter().map(str::to_string).collect();
    let previous = state.install(context);
    tracing::info!(replaced = previous.is_some(), "Agent context reloaded");
    
    Json(ReloadResponse {
        status: Some("reloaded"),
        error: None,
        tools,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use agent_core::provider::{ModelInfo, ProviderInfo};
    use agent_core::{
        Agent, AgentConfig, Completion, GenerationOptions, LlmProvider, Message, Result, Tool, ToolCall,
        ToolRegistry, ToolResult, ToolSchema,
    };
    use agent_mcp::{CatalogHandle, HttpConnector, RetryPolicy};
    use agent_runtime::ProviderKind;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::bootstrap::Bootstrap;
    use crate::router;
    use crate::state::{AgentContext, AppState};

    enum Reply {
        Text(&'static str),
        Fail,
        Stall,
    }

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Reply>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()) })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "scripted".into(),
                version: None,
                models: Vec::new(),
                supports_tools: false,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, _messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Text(text)) => Ok(Completion::text(text, options.model.clone())),
                Some(Reply::Stall) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Completion::text("too late", options.model.clone()))
                }
                Some(Reply::Fail) | None => Err(agent_core::AgentError::ProviderUnavailable("connection refused".into())),
            }
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    struct WeatherTool;

    #[async_trait]
    impl Tool for WeatherTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "get_weather".into(),
                description: "Get the current weather for a location".into(),
                parameters: Vec::new(),
                category: Some("weather".into()),
                has_side_effects: false,
            }
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success("get_weather", "Paris: sunny, 22C"))
        }
    }

    fn ready_state(replies: Vec<Reply>, llm_timeout: Duration) -> AppState {
        state_with_config(replies, llm_timeout, AgentConfig::default())
    }

    fn state_with_config(replies: Vec<Reply>, llm_timeout: Duration, config: AgentConfig) -> AppState {
        let mut registry = ToolRegistry::new();
        registry.register(WeatherTool);
        let tools = Arc::new(registry);

        let state = AppState::new(llm_timeout);
        state.install(AgentContext {
            catalog: CatalogHandle::default(),
            tools: Arc::clone(&tools),
            agent: Agent::new(ScriptedProvider::new(replies), tools, config),
            provider: ProviderKind::Ollama,
        });
        state
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post(state: AppState, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn ask(state: AppState, query: &str) -> Value {
        let (status, body) = post(state, "/ask", &json!({"query": query}).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_before_initialization() {
        let (status, body) = get_json(AppState::new(Duration::from_secs(60)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "initializing");
        assert_eq!(body["tools"], json!([]));
    }

    #[tokio::test]
    async fn health_lists_tools_once_ready() {
        let (_, body) = get_json(ready_state(Vec::new(), Duration::from_secs(60)), "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["framework"], "agent-core");
        assert_eq!(body["provider"], "ollama");
        assert_eq!(body["tools"], json!(["get_weather"]));
    }

    #[tokio::test]
    async fn ask_before_initialization() {
        let body = ask(AppState::new(Duration::from_secs(60)), "Weather in Paris?").await;
        assert_eq!(body, json!({"error": "Agent not initialized", "query": "Weather in Paris?"}));
    }

    #[tokio::test]
    async fn ask_reports_answer_and_tool_calls() {
        let state = ready_state(
            vec![
                Reply::Text("```tool\n{\"tool\": \"get_weather\", \"arguments\": {\"location\": \"Paris\"}}\n```"),
                Reply::Text("It is sunny, 22C in Paris."),
            ],
            Duration::from_secs(60),
        );

        let body = ask(state, "What's the weather in Paris?").await;

        assert_eq!(body["query"], "What's the weather in Paris?");
        assert_eq!(body["answer"], "It is sunny, 22C in Paris.");
        assert_eq!(body["tool_calls"], json!([{"name": "get_weather", "args": {"location": "Paris"}}]));
    }

    #[tokio::test]
    async fn ask_times_out() {
        let state = ready_state(vec![Reply::Stall], Duration::from_millis(50));
        let body = ask(state, "slow").await;
        assert_eq!(body, json!({"error": "Request timed out", "query": "slow"}));
    }

    #[tokio::test]
    async fn provider_failure_is_a_200_with_error() {
        let state = ready_state(vec![Reply::Fail], Duration::from_secs(60));
        let body = ask(state, "Weather?").await;
        assert_eq!(body["query"], "Weather?");
        assert_eq!(body["error"], "The AI service is currently unavailable. Please try again.");
        assert!(body.get("answer").is_none());
    }

    #[tokio::test]
    async fn iteration_limit_is_reported_plainly() {
        let lookup = "```tool\n{\"tool\": \"find_hotel\", \"arguments\": {}}\n```";
        let config = AgentConfig { max_iterations: 2, ..AgentConfig::default() };
        let state = state_with_config(
            vec![Reply::Text(lookup), Reply::Text(lookup), Reply::Text(lookup)],
            Duration::from_secs(60),
            config,
        );

        let body = ask(state, "q").await;

        assert_eq!(
            body,
            json!({"error": "The request took too many steps. Please try a simpler query.", "query": "q"})
        );
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let state = ready_state(Vec::new(), Duration::from_secs(60));
        let (status, _) = post(state, "/ask", r#"{"question": "x"}"#).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn reload_swaps_the_context() {
        let state = ready_state(Vec::new(), Duration::from_secs(60));
        let (_, body) = post(state.clone(), "/reload", "").await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Reload not available");

        let bootstrap = Bootstrap {
            connector: Arc::new(HttpConnector::default()),
            provider: ScriptedProvider::new(Vec::new()),
            provider_kind: ProviderKind::Gemini,
            model: "gemini-2.0-flash-lite".into(),
            servers: Vec::new(),
            retry: RetryPolicy::no_retry(),
            duplicates: Default::default(),
            call_timeout: Duration::from_secs(1),
        };
        let state = state.with_bootstrap(Arc::new(bootstrap));
        let before = state.context().unwrap();

        let (status, body) = post(state.clone(), "/reload", "").await;
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "reloaded", "tools": []}));
        let after = state.context().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.provider, ProviderKind::Gemini);
        assert_eq!(before.tools.len(), 1);
        assert!(after.tools.is_empty());
    }
}
