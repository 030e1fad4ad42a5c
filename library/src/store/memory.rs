use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use call_signal_protocol::{CallId, DocumentSnapshot};
use log::debug;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};

use crate::store::{DocumentStore, Subscription};
use crate::{get_random_call_id, StoreError};

type DocumentKey = (String, CallId);

#[derive(Debug, Default)]
struct StoredDocument {
    data: Map<String, Value>,
    subscribers: Vec<mpsc::UnboundedSender<DocumentSnapshot>>,
}

impl StoredDocument {
    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::existing(self.data.clone())
    }

    /// Push the current state to every subscriber, forgetting the ones that went away.
    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}

/// In-process document store.
///
/// Both participants of a call can share one instance (it is cheap to clone, clones share state),
/// which makes it the store of choice for tests and for running both ends in a single process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<DocumentKey, StoredDocument>>>,
}

impl MemoryStore {
    /// Current body of a document, `None` if it does not exist.
    pub async fn get_document(&self, collection: &str, id: &CallId) -> Option<Map<String, Value>> {
        self.documents
            .read()
            .await
            .get(&(collection.to_owned(), id.clone()))
            .map(|document| document.data.clone())
    }

    /// Number of live subscriptions on a document.
    pub async fn subscriber_count(&self, collection: &str, id: &CallId) -> usize {
        self.documents
            .read()
            .await
            .get(&(collection.to_owned(), id.clone()))
            .map_or(0, |document| {
                document
                    .subscribers
                    .iter()
                    .filter(|subscriber| !subscriber.is_closed())
                    .count()
            })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str) -> Result<CallId, StoreError> {
        let id = get_random_call_id();
        self.documents
            .write()
            .await
            .insert((collection.to_owned(), id.clone()), StoredDocument::default());
        debug!("created document {}/{}", collection, id);
        Ok(id)
    }

    async fn subscribe(&self, collection: &str, id: &CallId) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        // holding the write lock keeps the initial snapshot ahead of any later change
        let mut documents = self.documents.write().await;
        match documents.get_mut(&(collection.to_owned(), id.clone())) {
            Some(document) => {
                document.subscribers.retain(|subscriber| !subscriber.is_closed());
                if tx.send(document.snapshot()).is_ok() {
                    document.subscribers.push(tx);
                }
            }
            None => {
                debug!("subscribed to missing document {}/{}", collection, id);
                // the sender is dropped right after, so the stream ends
                if tx.send(DocumentSnapshot::missing()).is_err() {
                    debug!("subscriber went away before the first snapshot");
                }
            }
        }
        Ok(Subscription::new(rx))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &CallId,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&(collection.to_owned(), id.clone()))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        document.data.extend(data);
        document.notify();
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &CallId) -> Result<(), StoreError> {
        let document = self
            .documents
            .write()
            .await
            .remove(&(collection.to_owned(), id.clone()))
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        for subscriber in document.subscribers {
            if subscriber.send(DocumentSnapshot::missing()).is_err() {
                debug!("subscriber of {}/{} already gone", collection, id);
            }
        }
        debug!("deleted document {}/{}", collection, id);
        Ok(())
    }
}
