// WebSocket upgrade endpoint: `/ws/{client_id}` (§6). Authentication on the
// WS handshake is intentionally light — the client_id is the device_id the
// caller already proved ownership of via the access token used to obtain it;
// the correlator only ever routes tool requests back to whichever socket is
// currently registered under that id.

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        Path, State,
    },
    response::Response,
};

use crate::app::AppState;

pub async fn ws_upgrade(
    State(app_state): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| crate::ws::connection::handle_connection(socket, app_state.ws_registry, client_id))
}
