use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::store;

#[derive(Default, Clone)]
pub struct ServerState {
    documents: store::Documents,
}

#[allow(clippy::unused_async)]
async fn health_handler() -> &'static str {
    "OK"
}

#[allow(clippy::unused_async)]
async fn store_handler(State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| store::user_connected(socket, state.documents))
}

pub fn create(server_state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/store", get(store_handler))
        .with_state(server_state)
}

#[must_use]
pub fn create_router() -> Router {
    create(ServerState::default())
}
