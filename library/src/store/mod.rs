/*!
The document store contract the signaling channel is written against.

A store keeps documents grouped in collections, assigns ids on creation,
merges top-level fields on write and pushes a snapshot to every subscriber on each change.
*/

use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use call_signal_protocol::{CallId, DocumentSnapshot};
use futures_util::Stream;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::StoreError;

#[cfg(feature = "memory-store")]
mod memory;
#[cfg(feature = "websocket-store")]
mod websocket;

#[cfg(feature = "memory-store")]
pub use memory::MemoryStore;
#[cfg(feature = "websocket-store")]
pub use websocket::WebSocketStore;

/// Backing store for call documents.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Create a new empty document in `collection` and return its id.
    async fn create_document(&self, collection: &str) -> Result<CallId, StoreError>;

    /// Watch a document.
    ///
    /// The returned [`Subscription`] yields the current state first and then one snapshot per change.
    /// Once the document is deleted, or if it never existed, it yields a snapshot with
    /// `exists == false` and ends.
    async fn subscribe(&self, collection: &str, id: &CallId) -> Result<Subscription, StoreError>;

    /// Merge `data` into a document: each top-level key replaces the stored value under that key,
    /// keys not present in `data` are left untouched.
    async fn set_document(
        &self,
        collection: &str,
        id: &CallId,
        data: Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Remove a document, notifying its subscribers.
    async fn delete_document(&self, collection: &str, id: &CallId) -> Result<(), StoreError>;
}

/// Live stream of snapshots of one document. Dropping it cancels the subscription.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<DocumentSnapshot>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    #[cfg_attr(not(feature = "memory-store"), allow(dead_code))]
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<DocumentSnapshot>) -> Self {
        Self {
            receiver,
            on_drop: None,
        }
    }

    /// Run `on_drop` once the subscriber loses interest, used to tell a remote store to stop pushing.
    #[cfg_attr(not(feature = "websocket-store"), allow(dead_code))]
    pub(crate) fn with_cancel(
        receiver: mpsc::UnboundedReceiver<DocumentSnapshot>,
        on_drop: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl Stream for Subscription {
    type Item = DocumentSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
