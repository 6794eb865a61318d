//! WebSocket transport: one pipeline run per inbound frame.
//!
//! - [`frame`]: inbound parsing and outbound reply shapes
//! - [`connection`]: per-connection reader/writer tasks, heartbeat, and
//!   bounded concurrent frame execution

pub mod connection;
pub mod frame;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::server::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_size = state.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| connection::run_connection(socket, state))
}
