use call_signal_protocol::CallId;

/// Returns a new random call id, the way both bundled stores name new documents.
#[must_use]
pub fn get_random_call_id() -> CallId {
    CallId::new(uuid::Uuid::new_v4().to_string())
}
