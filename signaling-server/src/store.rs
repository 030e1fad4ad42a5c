use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;

use call_signal_protocol::store::{RequestId, StoreRequest, StoreResponse, SubscriptionId};
use call_signal_protocol::{CallId, DocumentSnapshot};

pub type ConnectionId = u64;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DocumentKey {
    pub collection: String,
    pub document_id: CallId,
}

pub struct Subscriber {
    pub connection_id: ConnectionId,
    pub tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
pub struct StoredDocument {
    pub data: Map<String, Value>,
    pub subscribers: HashMap<SubscriptionId, Subscriber>,
}

pub type Documents = Arc<RwLock<HashMap<DocumentKey, StoredDocument>>>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

pub async fn user_connected(ws: WebSocket, documents: Documents) {
    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    info!("new client connected: {}", connection_id);

    let (mut user_ws_tx, mut user_ws_rx) = ws.split();

    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            if let Err(err) = user_ws_tx.send(message).await {
                error!("websocket send error: {}", err);
                break;
            }
        }
    });

    while let Some(result) = user_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(err) => {
                error!("websocket error (id={}): {}", connection_id, err);
                break;
            }
        };

        match msg {
            Message::Text(text) => user_message(connection_id, &text, &tx, &documents).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("client disconnected: {}", connection_id);
    user_disconnected(connection_id, &documents).await;
}

fn send_response(tx: &mpsc::UnboundedSender<Message>, response: &StoreResponse) {
    match serde_json::to_string(response) {
        Ok(text) => {
            if tx.send(Message::Text(text)).is_err() {
                debug!("client went away before the response was sent");
            }
        }
        Err(err) => error!("failed to encode response {:?}: {}", response, err),
    }
}

fn error_response(request_id: Option<RequestId>, message: String, not_found: bool) -> StoreResponse {
    StoreResponse::Error {
        request_id,
        message,
        not_found,
    }
}

fn not_found(request_id: RequestId, key: &DocumentKey) -> StoreResponse {
    error_response(
        Some(request_id),
        format!("no such document: {}/{}", key.collection, key.document_id),
        true,
    )
}

/// Push the current state of a document to all of its subscribers,
/// dropping the ones whose connection is gone.
fn notify(document: &mut StoredDocument) {
    let snapshot = DocumentSnapshot::existing(document.data.clone());
    document.subscribers.retain(|subscription_id, subscriber| {
        let response = StoreResponse::Snapshot {
            subscription_id: *subscription_id,
            snapshot: snapshot.clone(),
        };
        match serde_json::to_string(&response) {
            Ok(text) => subscriber.tx.send(Message::Text(text)).is_ok(),
            Err(err) => {
                error!("failed to encode snapshot: {}", err);
                true
            }
        }
    });
}

async fn user_message(
    connection_id: ConnectionId,
    msg: &str,
    tx: &mpsc::UnboundedSender<Message>,
    documents: &Documents,
) {
    let request = match serde_json::from_str::<StoreRequest>(msg) {
        Ok(request) => request,
        Err(err) => {
            warn!("unreadable request from client {}: {}", connection_id, err);
            send_response(tx, &error_response(None, err.to_string(), false));
            return;
        }
    };
    debug!("request from client {}: {:?}", connection_id, request);

    match request {
        StoreRequest::Create {
            request_id,
            collection,
        } => {
            let document_id = CallId::new(uuid::Uuid::new_v4().to_string());
            let key = DocumentKey {
                collection,
                document_id: document_id.clone(),
            };
            documents
                .write()
                .await
                .insert(key, StoredDocument::default());
            info!("client {} created document {}", connection_id, document_id);
            send_response(
                tx,
                &StoreResponse::Created {
                    request_id,
                    document_id,
                },
            );
        }
        // each top-level field replaces the stored one, the rest of the document is kept
        StoreRequest::Set {
            request_id,
            collection,
            document_id,
            data,
        } => {
            let key = DocumentKey {
                collection,
                document_id,
            };
            let response = match documents.write().await.get_mut(&key) {
                Some(document) => {
                    document.data.extend(data);
                    notify(document);
                    StoreResponse::Ack { request_id }
                }
                None => not_found(request_id, &key),
            };
            send_response(tx, &response);
        }
        StoreRequest::Delete {
            request_id,
            collection,
            document_id,
        } => {
            let key = DocumentKey {
                collection,
                document_id,
            };
            let response = match documents.write().await.remove(&key) {
                Some(document) => {
                    for (subscription_id, subscriber) in document.subscribers {
                        send_response(
                            &subscriber.tx,
                            &StoreResponse::Snapshot {
                                subscription_id,
                                snapshot: DocumentSnapshot::missing(),
                            },
                        );
                    }
                    info!(
                        "client {} deleted document {}",
                        connection_id, key.document_id
                    );
                    StoreResponse::Ack { request_id }
                }
                None => not_found(request_id, &key),
            };
            send_response(tx, &response);
        }
        StoreRequest::Subscribe {
            request_id,
            collection,
            document_id,
        } => {
            let subscription_id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
            let key = DocumentKey {
                collection,
                document_id,
            };
            // hold the lock so no change can slip in between the response and the first snapshot
            let mut documents = documents.write().await;
            send_response(
                tx,
                &StoreResponse::Subscribed {
                    request_id,
                    subscription_id,
                },
            );
            let snapshot = match documents.entry(key) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().subscribers.insert(
                        subscription_id,
                        Subscriber {
                            connection_id,
                            tx: tx.clone(),
                        },
                    );
                    DocumentSnapshot::existing(entry.get().data.clone())
                }
                Entry::Vacant(entry) => {
                    debug!(
                        "client {} subscribed to missing document {}",
                        connection_id,
                        entry.key().document_id
                    );
                    DocumentSnapshot::missing()
                }
            };
            send_response(
                tx,
                &StoreResponse::Snapshot {
                    subscription_id,
                    snapshot,
                },
            );
        }
        StoreRequest::Unsubscribe { subscription_id } => {
            for document in documents.write().await.values_mut() {
                if document.subscribers.remove(&subscription_id).is_some() {
                    debug!(
                        "client {} cancelled subscription {}",
                        connection_id, subscription_id
                    );
                    break;
                }
            }
        }
    }
}

async fn user_disconnected(connection_id: ConnectionId, documents: &Documents) {
    // documents outlive the connection that created them, only its subscriptions go away
    for document in documents.write().await.values_mut() {
        document
            .subscribers
            .retain(|_, subscriber| subscriber.connection_id != connection_id);
    }
}
