/*!
Messages exchanged between a `WebSocketStore` client and the document store server.

Every request carries a client-chosen [`RequestId`] that the server echoes back,
so one connection can have many requests in flight.
Snapshots of watched documents are pushed unprompted and tagged with the [`SubscriptionId`]
the server handed out in [`StoreResponse::Subscribed`].
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CallId, DocumentSnapshot};

/// Correlates a request with its response, unique per connection.
pub type RequestId = u64;

/// Identifies a live subscription, unique per server.
pub type SubscriptionId = u64;

/// Requests sent by a client to the store server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreRequest {
    /// Create a new empty document, server assigns its id.
    Create {
        /// Echoed in the response.
        request_id: RequestId,
        /// Collection to create the document in.
        collection: String,
    },
    /// Merge top-level fields into an existing document.
    Set {
        /// Echoed in the response.
        request_id: RequestId,
        /// Collection of the document.
        collection: String,
        /// Target document.
        document_id: CallId,
        /// Each top-level key replaces the stored value under that key.
        data: Map<String, Value>,
    },
    /// Remove a document, subscribers receive a snapshot with `exists == false`.
    Delete {
        /// Echoed in the response.
        request_id: RequestId,
        /// Collection of the document.
        collection: String,
        /// Target document.
        document_id: CallId,
    },
    /// Start receiving snapshots of a document.
    Subscribe {
        /// Echoed in the response.
        request_id: RequestId,
        /// Collection of the document.
        collection: String,
        /// Watched document.
        document_id: CallId,
    },
    /// Stop receiving snapshots, no response is sent.
    Unsubscribe {
        /// Subscription to cancel.
        subscription_id: SubscriptionId,
    },
}

/// Responses and pushed snapshots sent by the store server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreResponse {
    /// Document created.
    Created {
        /// Request being answered.
        request_id: RequestId,
        /// Id assigned to the new document.
        document_id: CallId,
    },
    /// Set or delete applied.
    Ack {
        /// Request being answered.
        request_id: RequestId,
    },
    /// Subscription registered, snapshots follow.
    Subscribed {
        /// Request being answered.
        request_id: RequestId,
        /// Tag of the snapshots that follow.
        subscription_id: SubscriptionId,
    },
    /// Current state of a watched document.
    Snapshot {
        /// Subscription the snapshot belongs to.
        subscription_id: SubscriptionId,
        /// Document state.
        snapshot: DocumentSnapshot,
    },
    /// Request failed.
    Error {
        /// Request being answered, `None` when the request itself could not be parsed.
        request_id: Option<RequestId>,
        /// Human readable cause.
        message: String,
        /// Set when the failure is a missing document.
        #[serde(default)]
        not_found: bool,
    },
}
