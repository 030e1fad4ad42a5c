/*!
Signaling channel of one call participant.

The channel creates (as the phone) or joins (as the dispatcher) a call document,
publishes the local session description and ICE candidates under its role's field,
and reports what the remote participant publishes as [`SignalEvent`]s.

# Example

Phone and dispatcher sharing an in-process store:

```
use call_signal::channel::{ChannelConfig, SignalEvent, SignalingChannel};
use call_signal::store::MemoryStore;
use call_signal::{Role, SessionDescription};
use futures_util::StreamExt;

# #[tokio::main(flavor = "current_thread")]
# async fn main() -> call_signal::Result<()> {
let store = MemoryStore::default();

let (mut phone, mut phone_events) =
    SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
let call_id = phone.connect().await?;
phone.send_description(SessionDescription::offer("X")).await?;

let (mut dispatcher, _dispatcher_events) =
    SignalingChannel::new(store, ChannelConfig::new(Role::Dispatcher));
dispatcher.join(call_id).await?;
dispatcher.send_description(SessionDescription::answer("Y")).await?;

assert_eq!(phone_events.next().await, Some(SignalEvent::Connected));
assert_eq!(
    phone_events.next().await,
    Some(SignalEvent::RemoteDescription(SessionDescription::answer("Y")))
);
# Ok(())
# }
```
*/

use std::sync::Arc;

use call_signal_protocol::{
    CallDocument, CallId, IceCandidate, ParticipantRecord, Role, SdpType, SessionDescription,
};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::constants::DEFAULT_COLLECTION;
use crate::store::{DocumentStore, Subscription};
use crate::Error;

mod tracker;

pub use tracker::SnapshotTracker;

/// What the remote participant did, as seen through the call document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    /// The remote participant published its record for the first time.
    Connected,
    /// The call document is gone, or the store stopped delivering snapshots.
    Disconnected,
    /// The remote participant published a new session description.
    RemoteDescription(SessionDescription),
    /// The remote participant published a candidate not delivered before.
    RemoteCandidate(IceCandidate),
}

/// Stream of events produced by a [`SignalingChannel`].
pub type SignalEvents = UnboundedReceiverStream<SignalEvent>;

/// Settings of a [`SignalingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Role this participant plays.
    pub role: Role,
    /// Store collection call documents live in.
    pub collection: String,
}

impl ChannelConfig {
    /// Config for `role` using the default `calls` collection.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            role,
            collection: DEFAULT_COLLECTION.to_owned(),
        }
    }

    /// Use a different collection.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

/// One participant's end of the call signaling.
///
/// Start-up is split between [`SignalingChannel::new`], which hands out the event stream,
/// and [`SignalingChannel::connect`] or [`SignalingChannel::join`], which attach the channel to a call.
/// The listener task is cancelled on [`SignalingChannel::close`] or when the channel is dropped.
#[derive(Debug)]
pub struct SignalingChannel<S: DocumentStore> {
    store: Arc<S>,
    config: ChannelConfig,
    call_id: Option<CallId>,
    local: Arc<Mutex<ParticipantRecord>>,
    tracker: Arc<Mutex<SnapshotTracker>>,
    events: mpsc::UnboundedSender<SignalEvent>,
    listener: Option<JoinHandle<()>>,
}

impl<S: DocumentStore> SignalingChannel<S> {
    /// Creates a detached channel together with the stream its events are delivered on.
    pub fn new(store: S, config: ChannelConfig) -> (Self, SignalEvents) {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Same as [`SignalingChannel::new`] for a store that is shared with other owners.
    pub fn with_shared_store(store: Arc<S>, config: ChannelConfig) -> (Self, SignalEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let tracker = SnapshotTracker::new(config.role);
        let channel = Self {
            store,
            config,
            call_id: None,
            local: Arc::new(Mutex::new(ParticipantRecord::default())),
            tracker: Arc::new(Mutex::new(tracker)),
            events,
            listener: None,
        };
        (channel, UnboundedReceiverStream::new(rx))
    }

    /// Role this channel plays.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.config.role
    }

    /// Call the channel is attached to, if any.
    #[must_use]
    pub const fn call_id(&self) -> Option<&CallId> {
        self.call_id.as_ref()
    }

    /// Copy of everything published locally so far.
    pub async fn local_record(&self) -> ParticipantRecord {
        self.local.lock().await.clone()
    }

    /// Creates a new empty call document and starts listening to it.
    ///
    /// # Errors
    /// Fails with [`Error::StoreUnavailable`] if the document cannot be created or watched.
    /// Nothing is retried.
    pub async fn connect(&mut self) -> crate::Result<CallId> {
        let call_id = self
            .store
            .create_document(&self.config.collection)
            .await
            .map_err(|err| {
                error!("failed to create call document: {}", err);
                Error::from(err)
            })?;
        info!("{} created call {}", self.config.role, call_id);
        self.attach(call_id.clone());
        self.setup_listeners().await?;
        Ok(call_id)
    }

    /// Attaches to an existing call and starts listening to it.
    /// A call that does not exist is reported as [`SignalEvent::Disconnected`].
    ///
    /// # Errors
    /// Fails with [`Error::StoreUnavailable`] if the document cannot be watched.
    pub async fn join(&mut self, call_id: CallId) -> crate::Result<()> {
        info!("{} joining call {}", self.config.role, call_id);
        self.attach(call_id);
        self.setup_listeners().await
    }

    /// (Re)starts the listener on the current call, replacing a previous one.
    /// Events already delivered for this call are not delivered again.
    ///
    /// # Errors
    /// Fails with [`Error::NotConnected`] before [`SignalingChannel::connect`] or [`SignalingChannel::join`],
    /// and with [`Error::StoreUnavailable`] if the subscription cannot be opened.
    pub async fn setup_listeners(&mut self) -> crate::Result<()> {
        let call_id = self.call_id.clone().ok_or(Error::NotConnected)?;
        self.close();

        let subscription = self
            .store
            .subscribe(&self.config.collection, &call_id)
            .await?;
        debug!("{} listening to call {}", self.config.role, call_id);

        self.listener = Some(tokio::spawn(listen(
            subscription,
            Arc::clone(&self.tracker),
            self.events.clone(),
            call_id,
        )));
        Ok(())
    }

    /// Publishes the local session description.
    ///
    /// # Errors
    /// Fails with [`Error::RoleMismatch`] if the description kind is not the one this role publishes,
    /// and with [`Error::NotConnected`] or [`Error::StoreUnavailable`] if it cannot be written.
    pub async fn send_description(&self, description: SessionDescription) -> crate::Result<()> {
        let role = self.config.role;
        let expected = SdpType::published_by(role);
        if description.sdp_type != expected {
            return Err(Error::RoleMismatch {
                role,
                expected,
                actual: description.sdp_type,
            });
        }
        let call_id = self.call_id.as_ref().ok_or(Error::NotConnected)?;

        let mut local = self.local.lock().await;
        local.set_description(role, description);
        self.write(call_id, &local).await?;
        debug!("{} published its {:?} to call {}", role, expected, call_id);
        Ok(())
    }

    /// Publishes a newly gathered local candidate.
    ///
    /// The full list is written every time. Concurrent sends are serialized,
    /// so every write carries all candidates appended before it.
    ///
    /// # Errors
    /// Fails with [`Error::NotConnected`] or [`Error::StoreUnavailable`] if it cannot be written.
    /// The candidate stays in the local list and goes out with the next successful write.
    pub async fn send_candidate(&self, candidate: IceCandidate) -> crate::Result<()> {
        let call_id = self.call_id.as_ref().ok_or(Error::NotConnected)?;

        let mut local = self.local.lock().await;
        local.ice_candidates.push(candidate);
        self.write(call_id, &local).await?;
        debug!(
            "{} published candidate #{} to call {}",
            self.config.role,
            local.ice_candidates.len(),
            call_id
        );
        Ok(())
    }

    /// Stops listening. Events already queued stay in the stream.
    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    /// Deletes the call document, which the remote side sees as a disconnect, then stops listening.
    ///
    /// The channel stays attached to the call when the delete fails, so it can be retried.
    ///
    /// # Errors
    /// Fails with [`Error::NotConnected`] when not attached to a call,
    /// and with [`Error::StoreUnavailable`] if the document cannot be deleted.
    pub async fn hang_up(&mut self) -> crate::Result<()> {
        let call_id = self.call_id.as_ref().ok_or(Error::NotConnected)?;
        self.store
            .delete_document(&self.config.collection, call_id)
            .await?;
        info!("{} hung up call {}", self.config.role, call_id);
        self.close();
        self.call_id = None;
        Ok(())
    }

    fn attach(&mut self, call_id: CallId) {
        if self.call_id.as_ref() != Some(&call_id) {
            self.close();
            self.local = Arc::new(Mutex::new(ParticipantRecord::default()));
            self.tracker = Arc::new(Mutex::new(SnapshotTracker::new(self.config.role)));
        }
        self.call_id = Some(call_id);
    }

    async fn write(&self, call_id: &CallId, record: &ParticipantRecord) -> crate::Result<()> {
        let payload = CallDocument::merge_payload(self.config.role, record)?;
        self.store
            .set_document(&self.config.collection, call_id, payload)
            .await
            .map_err(|err| {
                error!("failed to write to call {}: {}", call_id, err);
                Error::from(err)
            })
    }
}

impl<S: DocumentStore> Drop for SignalingChannel<S> {
    fn drop(&mut self) {
        self.close();
    }
}

async fn listen(
    mut subscription: Subscription,
    tracker: Arc<Mutex<SnapshotTracker>>,
    events: mpsc::UnboundedSender<SignalEvent>,
    call_id: CallId,
) {
    while let Some(snapshot) = subscription.next().await {
        let mut state = tracker.lock().await;
        match state.apply(&snapshot) {
            Ok(produced) => {
                for event in produced {
                    debug!("call {}: {:?}", call_id, event);
                    if events.send(event).is_err() {
                        debug!("event stream of call {} dropped, stop listening", call_id);
                        return;
                    }
                }
            }
            Err(err) => warn!("skipping snapshot of call {}: {}", call_id, err),
        }
        if state.is_finished() {
            info!("call {} disconnected", call_id);
            return;
        }
    }

    if let Some(event) = tracker.lock().await.stream_ended() {
        info!("snapshots of call {} stopped", call_id);
        if events.send(event).is_err() {
            debug!("event stream of call {} dropped", call_id);
        }
    }
}
