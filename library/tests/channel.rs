use std::time::Duration;

use call_signal::channel::{ChannelConfig, SignalEvent, SignalEvents, SignalingChannel};
use call_signal::store::{DocumentStore, MemoryStore};
use call_signal::{CallDocument, CallId, Error, IceCandidate, Role, SessionDescription, StoreError};
use futures_util::StreamExt;
use serde_json::{json, Map, Value};
use tokio::time::timeout;

const COLLECTION: &str = "calls";

async fn next_event(events: &mut SignalEvents) -> SignalEvent {
    timeout(Duration::from_secs(1), events.next())
        .await
        .expect("timed out waiting for a signal event")
        .expect("event stream ended")
}

async fn assert_quiet(events: &mut SignalEvents) {
    if let Ok(event) = timeout(Duration::from_millis(100), events.next()).await {
        panic!("unexpected event: {event:?}");
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn candidate(n: u32) -> IceCandidate {
    IceCandidate::new(n % 2, if n % 2 == 0 { "audio" } else { "video" }, format!("candidate:{n}"))
}

async fn stored_document(store: &MemoryStore, call_id: &CallId) -> CallDocument {
    let data = store
        .get_document(COLLECTION, call_id)
        .await
        .expect("call document missing");
    CallDocument::from_data(&data).unwrap()
}

#[tokio::test]
async fn phone_receives_answer_written_by_peer() {
    let store = MemoryStore::default();
    let (mut phone, mut events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));

    let call_id = phone.connect().await.unwrap();
    assert_eq!(phone.call_id(), Some(&call_id));
    phone
        .send_description(SessionDescription::offer("X"))
        .await
        .unwrap();

    store
        .set_document(
            COLLECTION,
            &call_id,
            object(json!({"dispatcher": {"answer": {"type": "answer", "sdp": "Y"}}})),
        )
        .await
        .unwrap();

    assert_eq!(next_event(&mut events).await, SignalEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SignalEvent::RemoteDescription(SessionDescription::answer("Y"))
    );
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn offer_round_trips_through_the_store() {
    let store = MemoryStore::default();
    let (mut phone, _events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();

    let offer = SessionDescription::offer("v=0\r\no=- 46117317 2 IN IP4 127.0.0.1\r\n");
    phone.send_description(offer.clone()).await.unwrap();

    let document = stored_document(&store, &call_id).await;
    assert_eq!(document.phone.and_then(|phone| phone.offer), Some(offer));
    assert_eq!(document.dispatcher, None);
}

#[tokio::test]
async fn every_candidate_write_carries_the_full_local_list() {
    let store = MemoryStore::default();
    let (mut phone, _events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();

    for n in 0..5 {
        phone.send_candidate(candidate(n)).await.unwrap();
        let local = phone.local_record().await;
        assert_eq!(local.ice_candidates.len(), usize::try_from(n + 1).unwrap());

        let stored = stored_document(&store, &call_id).await.phone.unwrap();
        assert_eq!(stored.ice_candidates, local.ice_candidates);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_candidate_sends_lose_nothing() {
    let store = MemoryStore::default();
    let (mut phone, _events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();

    let (a, b, c, d) = tokio::join!(
        phone.send_candidate(candidate(0)),
        phone.send_candidate(candidate(1)),
        phone.send_candidate(candidate(2)),
        phone.send_candidate(candidate(3)),
    );
    for result in [a, b, c, d] {
        result.unwrap();
    }

    let stored = stored_document(&store, &call_id).await.phone.unwrap();
    assert_eq!(stored.ice_candidates.len(), 4);
    assert_eq!(stored.ice_candidates, phone.local_record().await.ice_candidates);
}

#[tokio::test]
async fn full_exchange_between_phone_and_dispatcher() {
    let store = MemoryStore::default();
    let (mut phone, mut phone_events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let (mut dispatcher, mut dispatcher_events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Dispatcher));

    let call_id = phone.connect().await.unwrap();
    phone
        .send_description(SessionDescription::offer("X"))
        .await
        .unwrap();
    phone.send_candidate(candidate(0)).await.unwrap();

    dispatcher.join(call_id.clone()).await.unwrap();
    assert_eq!(next_event(&mut dispatcher_events).await, SignalEvent::Connected);
    assert_eq!(
        next_event(&mut dispatcher_events).await,
        SignalEvent::RemoteDescription(SessionDescription::offer("X"))
    );
    assert_eq!(
        next_event(&mut dispatcher_events).await,
        SignalEvent::RemoteCandidate(candidate(0))
    );

    dispatcher
        .send_description(SessionDescription::answer("Y"))
        .await
        .unwrap();
    dispatcher.send_candidate(candidate(1)).await.unwrap();
    phone.send_candidate(candidate(2)).await.unwrap();

    assert_eq!(next_event(&mut phone_events).await, SignalEvent::Connected);
    assert_eq!(
        next_event(&mut phone_events).await,
        SignalEvent::RemoteDescription(SessionDescription::answer("Y"))
    );
    assert_eq!(
        next_event(&mut phone_events).await,
        SignalEvent::RemoteCandidate(candidate(1))
    );
    assert_eq!(
        next_event(&mut dispatcher_events).await,
        SignalEvent::RemoteCandidate(candidate(2))
    );
    assert_quiet(&mut phone_events).await;
    assert_quiet(&mut dispatcher_events).await;

    // neither side clobbered the other's field
    let document = stored_document(&store, &call_id).await;
    let phone_record = document.phone.unwrap();
    let dispatcher_record = document.dispatcher.unwrap();
    assert_eq!(phone_record.offer, Some(SessionDescription::offer("X")));
    assert_eq!(phone_record.ice_candidates, vec![candidate(0), candidate(2)]);
    assert_eq!(dispatcher_record.answer, Some(SessionDescription::answer("Y")));
    assert_eq!(dispatcher_record.ice_candidates, vec![candidate(1)]);
}

#[tokio::test]
async fn own_writes_are_not_reported() {
    let store = MemoryStore::default();
    let (mut phone, mut events) = SignalingChannel::new(store, ChannelConfig::new(Role::Phone));
    phone.connect().await.unwrap();

    phone
        .send_description(SessionDescription::offer("X"))
        .await
        .unwrap();
    phone.send_candidate(candidate(0)).await.unwrap();

    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn hang_up_disconnects_the_other_side_once() {
    let store = MemoryStore::default();
    let (mut phone, _phone_events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let (mut dispatcher, mut dispatcher_events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Dispatcher));

    let call_id = phone.connect().await.unwrap();
    dispatcher.join(call_id.clone()).await.unwrap();
    phone.hang_up().await.unwrap();

    assert_eq!(
        next_event(&mut dispatcher_events).await,
        SignalEvent::Disconnected
    );
    assert_quiet(&mut dispatcher_events).await;
    assert_eq!(store.get_document(COLLECTION, &call_id).await, None);
    assert_eq!(phone.call_id(), None);
}

#[tokio::test]
async fn failed_hang_up_keeps_the_call() {
    let store = MemoryStore::default();
    let (mut phone, _events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));

    let call_id = phone.connect().await.unwrap();
    store.delete_document(COLLECTION, &call_id).await.unwrap();

    assert!(matches!(
        phone.hang_up().await,
        Err(Error::StoreUnavailable(StoreError::NotFound(id))) if id == call_id
    ));
    assert_eq!(phone.call_id(), Some(&call_id));
    assert!(matches!(
        phone.hang_up().await,
        Err(Error::StoreUnavailable(StoreError::NotFound(_)))
    ));
}

#[tokio::test]
async fn joining_a_missing_call_disconnects() {
    let store = MemoryStore::default();
    let (mut dispatcher, mut events) =
        SignalingChannel::new(store, ChannelConfig::new(Role::Dispatcher));

    dispatcher
        .join(CallId::new("abc123".to_owned()))
        .await
        .unwrap();

    assert_eq!(next_event(&mut events).await, SignalEvent::Disconnected);
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn malformed_snapshot_is_skipped() {
    let store = MemoryStore::default();
    let (mut phone, mut events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();

    store
        .set_document(
            COLLECTION,
            &call_id,
            object(json!({"dispatcher": {"iceCandidates": "garbage"}})),
        )
        .await
        .unwrap();
    assert_quiet(&mut events).await;

    store
        .set_document(
            COLLECTION,
            &call_id,
            object(json!({"dispatcher": {"iceCandidates": [candidate(1)]}})),
        )
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, SignalEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SignalEvent::RemoteCandidate(candidate(1))
    );
}

#[tokio::test]
async fn repeated_candidate_list_fires_nothing_new() {
    let store = MemoryStore::default();
    let (mut phone, mut events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();
    let remote = object(json!({"dispatcher": {"iceCandidates": [candidate(0), candidate(1)]}}));

    store
        .set_document(COLLECTION, &call_id, remote.clone())
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, SignalEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        SignalEvent::RemoteCandidate(candidate(0))
    );
    assert_eq!(
        next_event(&mut events).await,
        SignalEvent::RemoteCandidate(candidate(1))
    );

    store.set_document(COLLECTION, &call_id, remote).await.unwrap();
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn restarting_listeners_does_not_replay_events() {
    let store = MemoryStore::default();
    let (mut phone, mut events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();
    store
        .set_document(
            COLLECTION,
            &call_id,
            object(json!({"dispatcher": {"answer": {"type": "answer", "sdp": "Y"}}})),
        )
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await, SignalEvent::Connected);
    next_event(&mut events).await;

    phone.setup_listeners().await.unwrap();

    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn close_cancels_the_subscription() {
    let store = MemoryStore::default();
    let (mut phone, _events) =
        SignalingChannel::new(store.clone(), ChannelConfig::new(Role::Phone));
    let call_id = phone.connect().await.unwrap();
    assert_eq!(store.subscriber_count(COLLECTION, &call_id).await, 1);

    phone.close();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store.subscriber_count(COLLECTION, &call_id).await, 0);
}

#[tokio::test]
async fn sending_requires_a_call_and_the_right_description_kind() {
    let (phone, _events) =
        SignalingChannel::new(MemoryStore::default(), ChannelConfig::new(Role::Phone));

    assert!(matches!(
        phone.send_candidate(candidate(0)).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        phone
            .send_description(SessionDescription::answer("Y"))
            .await,
        Err(Error::RoleMismatch { .. })
    ));
}

#[tokio::test]
async fn custom_collection_is_used() {
    let store = MemoryStore::default();
    let (mut phone, _events) = SignalingChannel::new(
        store.clone(),
        ChannelConfig::new(Role::Phone).with_collection("rooms"),
    );
    let call_id = phone.connect().await.unwrap();
    phone
        .send_description(SessionDescription::offer("X"))
        .await
        .unwrap();

    assert!(store.get_document("rooms", &call_id).await.is_some());
    assert_eq!(store.get_document(COLLECTION, &call_id).await, None);
}
