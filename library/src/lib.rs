/*!
This crate implements the signaling half of a two-party `WebRTC` call.

# Overview

Both participants, the `phone` that starts the call and the `dispatcher` that answers it,
rendezvous through one shared document in a realtime document store.
Each side writes its session description and ICE candidates under its own field
and watches the other side's field for changes.

The [`SignalingChannel`](channel::SignalingChannel) owns that exchange. It is generic over a
[`DocumentStore`](store::DocumentStore), with an in-process [`MemoryStore`](store::MemoryStore)
and a [`WebSocketStore`](store::WebSocketStore) client for the accompanying `call-signal-server`.
Everything the channel learns from the remote side is reported as a stream of
[`SignalEvent`](channel::SignalEvent)s, ready to be fed into a media engine.

```no_run
use call_signal::channel::{ChannelConfig, SignalEvent, SignalingChannel};
use call_signal::store::MemoryStore;
use call_signal::{Role, SessionDescription};
use futures_util::StreamExt;

# async fn run() -> call_signal::Result<()> {
let store = MemoryStore::default();
let (mut phone, mut events) = SignalingChannel::new(store, ChannelConfig::new(Role::Phone));
let call_id = phone.connect().await?;
println!("share this call id with the dispatcher: {call_id}");

phone.send_description(SessionDescription::offer("v=0...")).await?;
while let Some(event) = events.next().await {
    match event {
        SignalEvent::RemoteDescription(answer) => println!("answer: {}", answer.sdp),
        SignalEvent::Disconnected => break,
        _ => {}
    }
}
# Ok(())
# }
```
*/

#![allow(clippy::module_name_repetitions)]
// clippy WARN level lints
#![warn(
    missing_docs,
    clippy::cargo,
    clippy::pedantic,
    clippy::dbg_macro,
    clippy::unwrap_used,
    clippy::integer_division,
    clippy::large_include_file,
    clippy::map_err_ignore,
    clippy::panic,
    clippy::todo,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unreachable
)]
// clippy WARN level lints, that can be upgraded to DENY if preferred
#![warn(
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::if_then_some_else_none,
    clippy::indexing_slicing,
    clippy::let_underscore_must_use,
    clippy::pattern_type_mismatch,
    clippy::string_slice,
    clippy::try_err
)]
// clippy DENY level lints, they always have a quick fix that should be preferred
#![deny(
    clippy::wildcard_imports,
    clippy::multiple_inherent_impl,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::self_named_module_files,
    clippy::str_to_string,
    clippy::string_add,
    clippy::string_to_string,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::verbose_file_reads
)]

pub mod channel;
pub(crate) mod constants;
mod error;
pub mod store;
mod utils;

pub use call_signal_protocol::{
    CallDocument, CallId, DocumentSnapshot, IceCandidate, MediaKind, ParticipantRecord, Role,
    SdpType, SessionDescription,
};
pub use error::{Error, Result, StoreError};
pub use utils::get_random_call_id;
