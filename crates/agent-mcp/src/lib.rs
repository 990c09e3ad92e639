//! # agent-mcp
//!
//! Discovers tools on remote MCP servers and exposes them to the agent loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   load()   ┌──────────────┐  swap   ┌───────────────┐
//! │ CatalogLoader│──────────▶ │ ToolCatalog  │───────▶ │ CatalogHandle │
//! └──────┬───────┘            └──────────────┘         └───────┬───────┘
//!        │ with_session                                        │ snapshot
//!        ▼                                                     ▼
//! ┌──────────────┐  Connector ┌──────────────┐  invoke ┌───────────────┐
//! │   Session    │◀───────────│ McpTransport │◀────────│  ToolInvoker  │◀── McpTool
//! └──────────────┘            └──────────────┘         └───────────────┘
//! ```
//!
//! Each load and each invocation opens a short-lived [`Session`] and closes
//! it on every exit path. Nothing here returns an error to the agent: a
//! failed server shrinks the catalog, a failed call becomes result text.

pub mod blocking;
pub mod catalog;
pub mod config;
pub mod error;
pub mod invoker;
pub mod jsonrpc;
pub mod loader;
pub mod session;
pub mod tool;
pub mod transport;

pub use blocking::BlockingInvoker;
pub use catalog::{CatalogHandle, ToolCatalog, ToolDescriptor};
pub use config::{DuplicatePolicy, RetryPolicy, ServerEndpoint, TransportKind};
pub use error::{McpError, Result};
pub use invoker::{ErrorKind, InvocationRequest, InvocationResult, ToolInvoker, NO_RESULT};
pub use loader::CatalogLoader;
pub use session::{with_session, ServerInfo, Session, ToolCallOutput, ToolContent};
pub use tool::{register_catalog, McpTool};
pub use transport::{Connector, HttpConnector, HttpTransport, McpTransport};
