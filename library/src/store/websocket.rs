use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use call_signal_protocol::store::{RequestId, StoreRequest, StoreResponse, SubscriptionId};
use call_signal_protocol::{CallId, DocumentSnapshot};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::store::{DocumentStore, Subscription};
use crate::StoreError;

enum Pending {
    Reply(oneshot::Sender<StoreResponse>),
    Subscribe {
        reply: oneshot::Sender<StoreResponse>,
        snapshots: mpsc::UnboundedSender<DocumentSnapshot>,
    },
}

#[derive(Default)]
struct Shared {
    closed: AtomicBool,
    pending: Mutex<HashMap<RequestId, Pending>>,
    subscriptions: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<DocumentSnapshot>>>,
}

/// Client of the `call-signal-server` document store.
///
/// One WebSocket connection carries every request and subscription.
/// A reader task matches responses to requests and routes pushed snapshots to their subscriptions.
/// When the connection drops, pending requests fail with [`StoreError::Unavailable`]
/// and all subscriptions end.
#[derive(Debug, Clone)]
pub struct WebSocketStore {
    outgoing: mpsc::UnboundedSender<StoreRequest>,
    shared: Arc<Shared>,
    next_request_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

impl WebSocketStore {
    /// Opens a connection to the store endpoint, e.g. `ws://127.0.0.1:9001/store`.
    ///
    /// # Errors
    /// Fails with [`StoreError::Unavailable`] if the WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (websocket, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|err| {
                StoreError::Unavailable(format!("failed to connect to store on {url}: {err}"))
            })?;
        info!("connected to document store on {}", url);
        let (mut sink, mut stream) = websocket.split();

        let (outgoing, mut requests) = mpsc::unbounded_channel::<StoreRequest>();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(err) => {
                        error!("failed to encode store request {:?}: {}", request, err);
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(text)).await {
                    error!("websocket send error: {}", err);
                    break;
                }
            }
            if let Err(err) = sink.close().await {
                debug!("websocket close error: {}", err);
            }
        });

        let shared = Arc::new(Shared::default());
        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                let message = match result {
                    Ok(message) => message,
                    Err(err) => {
                        error!("websocket error: {}", err);
                        break;
                    }
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<StoreResponse>(&text) {
                        Ok(response) => dispatch(&reader_shared, response).await,
                        Err(err) => warn!("ignoring unreadable store frame: {}", err),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            info!("connection to document store closed");
            reader_shared.closed.store(true, Ordering::SeqCst);
            // dropping the senders fails pending requests and ends subscriptions
            reader_shared.pending.lock().await.clear();
            reader_shared.subscriptions.lock().await.clear();
        });

        Ok(Self {
            outgoing,
            shared,
            next_request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn next_request_id(&self) -> RequestId {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(
        &self,
        request_id: RequestId,
        request: StoreRequest,
        pending: Pending,
        reply: oneshot::Receiver<StoreResponse>,
        target: Option<&CallId>,
    ) -> Result<StoreResponse, StoreError> {
        self.shared.pending.lock().await.insert(request_id, pending);
        // checked after registering, the reader sets the flag before it drops pending requests
        if self.shared.closed.load(Ordering::SeqCst) || self.outgoing.send(request).is_err() {
            self.shared.pending.lock().await.remove(&request_id);
            return Err(StoreError::Unavailable(
                "connection to store is closed".to_owned(),
            ));
        }
        let response = reply.await.map_err(|err| {
            StoreError::Unavailable(format!("connection to store closed mid-request: {err}"))
        })?;
        match (response, target) {
            (
                StoreResponse::Error {
                    not_found: true, ..
                },
                Some(target),
            ) => Err(StoreError::NotFound(target.clone())),
            (StoreResponse::Error { message, .. }, _) => Err(StoreError::Protocol(message)),
            (response, _) => Ok(response),
        }
    }

    async fn call(
        &self,
        target: Option<&CallId>,
        build: impl FnOnce(RequestId) -> StoreRequest + Send,
    ) -> Result<StoreResponse, StoreError> {
        let request_id = self.next_request_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = build(request_id);
        self.request(request_id, request, Pending::Reply(reply_tx), reply_rx, target)
            .await
    }
}

fn unexpected(response: &StoreResponse) -> StoreError {
    StoreError::Protocol(format!("unexpected response: {response:?}"))
}

async fn dispatch(shared: &Shared, response: StoreResponse) {
    match response {
        StoreResponse::Snapshot {
            subscription_id,
            snapshot,
        } => {
            let mut subscriptions = shared.subscriptions.lock().await;
            let gone = !snapshot.exists;
            let delivered = subscriptions
                .get(&subscription_id)
                .map(|subscriber| subscriber.send(snapshot).is_ok());
            match delivered {
                Some(true) if !gone => {}
                Some(_) => {
                    // document gone or subscriber dropped, the stream ends here
                    subscriptions.remove(&subscription_id);
                }
                None => debug!("snapshot for unknown subscription {}", subscription_id),
            }
        }
        StoreResponse::Subscribed {
            request_id,
            subscription_id,
        } => {
            let reply = match shared.pending.lock().await.remove(&request_id) {
                Some(Pending::Subscribe { reply, snapshots }) => {
                    // registered before the next frame is read, so the first snapshot cannot be missed
                    shared
                        .subscriptions
                        .lock()
                        .await
                        .insert(subscription_id, snapshots);
                    reply
                }
                Some(Pending::Reply(reply)) => reply,
                None => {
                    warn!("response to unknown request {}", request_id);
                    return;
                }
            };
            if reply.send(response).is_err() {
                debug!("requester {} went away", request_id);
            }
        }
        StoreResponse::Created { request_id, .. }
        | StoreResponse::Ack { request_id }
        | StoreResponse::Error {
            request_id: Some(request_id),
            ..
        } => {
            let reply = match shared.pending.lock().await.remove(&request_id) {
                Some(Pending::Reply(reply) | Pending::Subscribe { reply, .. }) => reply,
                None => {
                    warn!("response to unknown request {}", request_id);
                    return;
                }
            };
            if reply.send(response).is_err() {
                debug!("requester {} went away", request_id);
            }
        }
        StoreResponse::Error {
            request_id: None,
            message,
            ..
        } => error!("store rejected a request: {}", message),
    }
}

#[async_trait]
impl DocumentStore for WebSocketStore {
    async fn create_document(&self, collection: &str) -> Result<CallId, StoreError> {
        let response = self
            .call(None, |request_id| StoreRequest::Create {
                request_id,
                collection: collection.to_owned(),
            })
            .await?;
        match response {
            StoreResponse::Created { document_id, .. } => Ok(document_id),
            other => Err(unexpected(&other)),
        }
    }

    async fn subscribe(&self, collection: &str, id: &CallId) -> Result<Subscription, StoreError> {
        let request_id = self.next_request_id();
        let (reply_tx, reply_rx) = oneshot::channel();
        let (snapshots, receiver) = mpsc::unbounded_channel();
        let request = StoreRequest::Subscribe {
            request_id,
            collection: collection.to_owned(),
            document_id: id.clone(),
        };
        let pending = Pending::Subscribe {
            reply: reply_tx,
            snapshots,
        };
        let subscription_id = match self
            .request(request_id, request, pending, reply_rx, Some(id))
            .await?
        {
            StoreResponse::Subscribed {
                subscription_id, ..
            } => subscription_id,
            other => return Err(unexpected(&other)),
        };

        let outgoing = self.outgoing.clone();
        Ok(Subscription::with_cancel(receiver, move || {
            if outgoing
                .send(StoreRequest::Unsubscribe { subscription_id })
                .is_err()
            {
                debug!("store connection already closed, nothing to unsubscribe");
            }
        }))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &CallId,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let response = self
            .call(Some(id), |request_id| StoreRequest::Set {
                request_id,
                collection: collection.to_owned(),
                document_id: id.clone(),
                data,
            })
            .await?;
        match response {
            StoreResponse::Ack { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn delete_document(&self, collection: &str, id: &CallId) -> Result<(), StoreError> {
        let response = self
            .call(Some(id), |request_id| StoreRequest::Delete {
                request_id,
                collection: collection.to_owned(),
                document_id: id.clone(),
            })
            .await?;
        match response {
            StoreResponse::Ack { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}
