//! Streamable HTTP transport against a local stub MCP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_mcp::transport::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use agent_mcp::{
    CatalogHandle, CatalogLoader, ErrorKind, HttpConnector, InvocationRequest, McpError,
    RetryPolicy, ServerEndpoint, Session, ToolInvoker,
};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

const SESSION: &str = "stub-session-1";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    session: Option<String>,
    protocol: Option<String>,
}

#[derive(Default)]
struct Stub {
    requests: Mutex<Vec<Recorded>>,
    deletes: AtomicUsize,
}

impl Stub {
    fn methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.method.clone()).collect()
    }

    fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn handle_post(State(stub): State<Arc<Stub>>, headers: HeaderMap, Json(message): Json<Value>) -> Response {
    let method = message["method"].as_str().unwrap_or_default().to_string();
    stub.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        session: header_value(&headers, SESSION_ID_HEADER),
        protocol: header_value(&headers, PROTOCOL_VERSION_HEADER),
    });

    let Some(id) = message.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    match method.as_str() {
        "initialize" => (
            [(SESSION_ID_HEADER, SESSION)],
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": "stub", "version": "0.1.0"}
                }
            })),
        )
            .into_response(),
        "tools/list" => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "tools": [
                    {
                        "name": "get_weather",
                        "description": "Get the current weather for a location",
                        "inputSchema": {
                            "type": "object",
                            "properties": {"location": {"type": "string"}},
                            "required": ["location"]
                        }
                    },
                    {"name": "list_destinations", "inputSchema": {"type": "object"}}
                ]
            }
        }))
        .into_response(),
        "tools/call" => {
            let location = message["params"]["arguments"]["location"].as_str().unwrap_or("nowhere");
            if location == "Atlantis" {
                return std::future::pending::<Response>().await;
            }
            let reply = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "content": [{"type": "text", "text": format!("{}: sunny, 22C", location)}],
                    "isError": false
                }
            });
            let body = format!(
                "event: message\ndata: {}\n\nevent: message\ndata: {}\n\n",
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}}),
                reply
            );
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .into_response(),
    }
}

async fn handle_delete(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> StatusCode {
    if header_value(&headers, SESSION_ID_HEADER).as_deref() == Some(SESSION) {
        stub.deletes.fetch_add(1, Ordering::SeqCst);
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn garbled() -> Response {
    ([(header::CONTENT_TYPE, "application/json")], "<html>not json</html>").into_response()
}

/// Serve the stub on an ephemeral port and return its base URL
async fn spawn_stub() -> (String, Arc<Stub>) {
    let stub = Arc::new(Stub::default());
    let app = Router::new()
        .route("/mcp", post(handle_post).delete(handle_delete))
        .route("/broken", post(broken))
        .route("/garbled", post(garbled))
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), stub)
}

#[tokio::test]
async fn handshake_listing_and_close() {
    let (base, stub) = spawn_stub().await;
    let endpoint = ServerEndpoint::new("stub", format!("{}/mcp", base));
    let connector = HttpConnector::default();

    let mut session = Session::open(&connector, &endpoint).await.unwrap();
    assert_eq!(session.server_info().name, "stub");

    let tools = session.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_weather", "list_destinations"]);
    assert_eq!(tools[1].description, "Tool: list_destinations");
    assert!(tools.iter().all(|t| t.server_id == "stub"));

    session.close().await;

    assert_eq!(stub.methods(), vec!["initialize", "notifications/initialized", "tools/list"]);
    let requests = stub.requests.lock().unwrap().clone();
    assert!(requests[0].session.is_none());
    for later in &requests[1..] {
        assert_eq!(later.session.as_deref(), Some(SESSION));
        assert_eq!(later.protocol.as_deref(), Some("2025-03-26"));
    }
    assert_eq!(stub.deletes(), 1);
}

#[tokio::test]
async fn load_and_invoke_over_http() {
    let (base, stub) = spawn_stub().await;
    let endpoints = vec![
        ServerEndpoint::new("weather", format!("{}/mcp", base)),
        ServerEndpoint::new("offline", "http://127.0.0.1:1/mcp"),
    ];
    let connector = Arc::new(HttpConnector::default());

    let catalog = CatalogLoader::new(connector.clone())
        .with_retry(RetryPolicy::no_retry())
        .load(&endpoints)
        .await;
    assert_eq!(catalog.names(), vec!["get_weather", "list_destinations"]);

    let invoker = ToolInvoker::new(connector, CatalogHandle::new(catalog));
    let result = invoker
        .invoke(InvocationRequest::new("get_weather").arg("location", "Paris"))
        .await;

    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(result.text, "Paris: sunny, 22C");
    assert_eq!(result.raw.unwrap()["isError"], false);
    assert_eq!(stub.deletes(), 2);
}

#[tokio::test]
async fn session_call_reads_sse_reply_past_notifications() {
    let (base, _stub) = spawn_stub().await;
    let endpoint = ServerEndpoint::new("stub", format!("{}/mcp", base));

    let mut session = Session::open(&HttpConnector::default(), &endpoint).await.unwrap();
    let mut arguments = serde_json::Map::new();
    arguments.insert("location".into(), json!("Tokyo"));
    let output = session.call_tool("get_weather", arguments).await.unwrap();
    session.close().await;

    assert!(!output.is_error);
    assert_eq!(output.first_text(), Some("Tokyo: sunny, 22C"));
}

#[tokio::test]
async fn http_failure_status_is_a_transport_error() {
    let (base, stub) = spawn_stub().await;
    let endpoint = ServerEndpoint::new("broken", format!("{}/broken", base));

    let err = Session::open(&HttpConnector::default(), &endpoint).await.err().unwrap();

    match err {
        McpError::Transport { server, message, .. } => {
            assert_eq!(server, "broken");
            assert!(message.contains("500"), "{}", message);
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert!(stub.methods().is_empty());
}

#[tokio::test]
async fn unreachable_server_invocation_is_a_transport_failure() {
    let mut catalog = agent_mcp::ToolCatalog::new();
    let endpoint = ServerEndpoint::new("offline", "http://127.0.0.1:1/mcp");
    catalog.add_server(endpoint.clone());
    catalog.insert(
        agent_mcp::ToolDescriptor::new("get_weather", None, json!({"type": "object"}), "offline"),
        agent_mcp::DuplicatePolicy::LastWins,
    );
    let invoker = ToolInvoker::new(Arc::new(HttpConnector::default()), CatalogHandle::new(catalog));

    let result = invoker.invoke(InvocationRequest::new("get_weather")).await;

    assert_eq!(result.error, Some(ErrorKind::Transport));
    assert!(result.text.starts_with("Error calling tool 'get_weather':"));
}

#[tokio::test]
async fn undecodable_body_is_a_transport_error() {
    let (base, _stub) = spawn_stub().await;
    let endpoint = ServerEndpoint::new("garbled", format!("{}/garbled", base));

    let err = Session::open(&HttpConnector::default(), &endpoint).await.err().unwrap();

    match err {
        McpError::Transport { server, url, message } => {
            assert_eq!(server, "garbled");
            assert!(url.ends_with("/garbled"));
            assert!(message.contains("initialize"), "{}", message);
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn timed_out_call_still_deletes_its_session() {
    let (base, stub) = spawn_stub().await;
    let endpoint = ServerEndpoint::new("weather", format!("{}/mcp", base));
    let mut catalog = agent_mcp::ToolCatalog::new();
    catalog.add_server(endpoint);
    catalog.insert(
        agent_mcp::ToolDescriptor::new("get_weather", None, json!({"type": "object"}), "weather"),
        agent_mcp::DuplicatePolicy::LastWins,
    );
    let invoker = ToolInvoker::new(Arc::new(HttpConnector::default()), CatalogHandle::new(catalog))
        .with_call_timeout(Duration::from_millis(300));

    let result = invoker
        .invoke(InvocationRequest::new("get_weather").arg("location", "Atlantis"))
        .await;

    assert_eq!(result.error, Some(ErrorKind::Timeout));
    assert!(stub.methods().contains(&"tools/call".to_string()));

    // The release runs on a spawned task once the cancelled transport drops.
    for _ in 0..50 {
        if stub.deletes() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stub.deletes(), 1);
}
