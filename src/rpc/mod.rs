//! JSON-RPC transport to the ledger node.
//!
//! # Data Flow
//! ```text
//! ChainConnection
//!     → Transport::request      (one response)
//!     → Transport::subscribe    (stream of notifications until unsubscribed)
//!         → ws.rs: one socket, one background task, all calls multiplexed
//! ```
//!
//! # Design Decisions
//! - The trait is the seam between chain logic and the wire; tests plug in
//!   an in-memory ledger
//! - Unsubscribing is synchronous and idempotent so it can run from `Drop`
//! - No reconnect: a closed socket fails pending calls and ends subscriptions

pub mod ws;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

pub use ws::WsTransport;

/// Errors raised by a transport.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The socket could not be opened or failed mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// The node returned a JSON-RPC error object.
    #[error("call failed ({code}): {message}")]
    Call {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The node returned something that is not valid JSON-RPC.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Human-readable reason including any `data` payload the node attached.
    pub fn reason(&self) -> String {
        match self {
            RpcError::Call {
                code,
                message,
                data: Some(data),
            } => format!("{code}: {message}: {data}"),
            other => other.to_string(),
        }
    }
}

/// A bidirectional JSON-RPC connection.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Issue a call and wait for its result.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Open a subscription. `unsubscribe_method` is sent when it is cancelled.
    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> Result<RpcSubscription, RpcError>;
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Raw server-push notifications of one subscription.
pub struct RpcSubscription {
    id: String,
    notifications: mpsc::UnboundedReceiver<Value>,
    cancel: CancelHandle,
}

impl RpcSubscription {
    /// `on_cancel` runs at most once, on the first cancel or on drop.
    pub fn new(
        id: String,
        notifications: mpsc::UnboundedReceiver<Value>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            notifications,
            cancel: CancelHandle::new(on_cancel),
        }
    }

    /// Server-assigned subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next notification, `None` once the server side is gone.
    pub async fn next(&mut self) -> Option<Value> {
        self.notifications.recv().await
    }

    /// A clonable handle that cancels this subscription.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for RpcSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSubscription")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Drop for RpcSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Idempotent, clonable cancellation of a server-side subscription.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<Mutex<Option<CancelFn>>>,
}

impl CancelHandle {
    /// `f` runs on the first `cancel`.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        let f: CancelFn = Box::new(f);
        Self {
            inner: Arc::new(Mutex::new(Some(f))),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the cancel action if it has not run yet.
    pub fn cancel(&self) {
        let f = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(f) = f {
            f();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self.inner.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
