//! Synchronous entry point for callers that cannot await.
//!
//! Some agent frameworks drive tools from plain synchronous callbacks. The
//! [`BlockingInvoker`] runs an invocation to completion on a runtime handle
//! captured at startup and returns the same [`InvocationResult`] the async
//! path would.

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::invoker::{ErrorKind, InvocationRequest, InvocationResult, ToolInvoker};

#[derive(Clone)]
pub struct BlockingInvoker {
    invoker: Arc<ToolInvoker>,
    handle: Handle,
}

impl BlockingInvoker {
    /// `handle` should belong to a multi-thread runtime
    pub fn new(invoker: Arc<ToolInvoker>, handle: Handle) -> Self {
        Self { invoker, handle }
    }
    
    /// Capture the runtime the caller is running on
    pub fn from_current(invoker: Arc<ToolInvoker>) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(invoker, handle))
    }
    
    /// Run one invocation, blocking the calling thread until it finishes.
    ///
    /// From a worker of a multi-thread runtime the worker is handed off with
    /// `block_in_place` first. A current-thread runtime cannot be blocked
    /// without deadlocking, so that case returns a [`ErrorKind::Runtime`]
    /// failure instead.
    pub fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let invoker = Arc::clone(&self.invoker);
        let run = async move { invoker.invoke(request).await };
        
        match Handle::try_current() {
            Ok(current) => match current.runtime_flavor() {
                RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| self.handle.block_on(run))
                }
                flavor => {
                    tracing::error!(?flavor, "Blocking tool call from a single-threaded runtime");
                    InvocationResult::failure(
                        ErrorKind::Runtime,
                        "Error calling tool: blocking calls need a multi-threaded runtime",
                    )
                }
            },
            Err(_) => self.handle.block_on(run),
        }
    }
}
