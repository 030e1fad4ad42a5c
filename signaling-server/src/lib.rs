/*!
Realtime document store for `call-signal`.

Clients connect over WebSocket on `/store`, create, write, delete and watch documents
with the messages from `call_signal_protocol::store`. Every change to a document is pushed
to all of its subscribers as a full snapshot. Documents live in memory only.
*/

pub mod env;
pub mod router;
pub mod store;
