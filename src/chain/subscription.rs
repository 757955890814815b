//! Disposable value streams.
//!
//! A [`Subscription`] is a stream of decoded values paired with a
//! [`SubscriptionHandle`]. Disposing the handle stops delivery immediately,
//! even for a value already in flight, and releases the server-side
//! subscription exactly once.

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::chain::types::ChainResult;
use crate::observability::metrics;
use crate::rpc::CancelHandle;

struct HandleInner {
    label: String,
    disposed: AtomicBool,
    cancel: CancelHandle,
}

/// Clonable, idempotent disposer of one subscription.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    pub fn new(label: impl Into<String>, cancel: CancelHandle) -> Self {
        metrics::record_subscription_opened();
        Self {
            inner: Arc::new(HandleInner {
                label: label.into(),
                disposed: AtomicBool::new(false),
                cancel,
            }),
        }
    }

    /// Stop delivery and release server resources. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        metrics::record_subscription_closed();
        tracing::debug!(subscription = %self.inner.label, "Subscription disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("label", &self.inner.label)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A stream of decoded values that ends when its handle is disposed.
pub struct Subscription<T> {
    stream: BoxStream<'static, ChainResult<T>>,
    handle: SubscriptionHandle,
}

impl<T> Subscription<T> {
    pub fn new(stream: BoxStream<'static, ChainResult<T>>, handle: SubscriptionHandle) -> Self {
        Self { stream, handle }
    }

    /// A handle that can dispose this subscription from elsewhere.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Transform each delivered value, keeping the same handle.
    pub fn map<U, F>(self, f: F) -> Subscription<U>
    where
        T: 'static,
        F: FnMut(ChainResult<T>) -> ChainResult<U> + Send + 'static,
    {
        let handle = self.handle.clone();
        let stream = Detached(self).map(f).boxed();
        Subscription { stream, handle }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = ChainResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.handle.is_disposed() {
            return Poll::Ready(None);
        }
        let polled = self.stream.poll_next_unpin(cx);
        if self.handle.is_disposed() {
            return Poll::Ready(None);
        }
        polled
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .finish()
    }
}

/// A subscription moved inside a mapped stream; disposal still applies.
struct Detached<T>(Subscription<T>);

impl<T> Stream for Detached<T> {
    type Item = ChainResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.0).poll_next(cx)
    }
}
