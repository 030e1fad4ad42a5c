/*!
Helper crate that declares the types shared between [call-signal](../call_signal/index.html)
and [call-signal-server](../call_signal_server/index.html).

It holds two things: the shape of the shared call document that both participants read and write,
and the messages a client exchanges with the document store server.
*/

#![warn(missing_docs)]

mod common;
pub mod document;
pub mod store;

pub use common::{CallId, Role};
pub use document::{
    CallDocument, DocumentSnapshot, IceCandidate, MediaKind, ParticipantRecord, SdpType,
    SessionDescription,
};
