//! Websocket endpoint carrying protocol envelopes from the host's web
//! content to the vault.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use spicetify_vault::{Dispatcher, ModuleManager};
use tracing::{debug, warn};

use crate::server::DaemonState;
use crate::settings::Settings;

const RPC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::rpc");

/// Axum handler for `/rpc`.
pub(crate) async fn upgrade(State(state): State<DaemonState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn serve(mut socket: WebSocket, state: DaemonState) {
    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(error) => {
                    warn!(target: RPC_TARGET, %error, "ignoring non UTF-8 message");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(error) => {
                warn!(target: RPC_TARGET, %error, "websocket read failed");
                break;
            }
        };

        let settings = state.settings().load();
        let reply = match tokio::task::spawn_blocking(move || handle_message(&settings, &text)).await
        {
            Ok(reply) => reply,
            Err(error) => {
                warn!(target: RPC_TARGET, %error, "dispatch task failed");
                continue;
            }
        };
        if !reply.is_empty() && socket.send(Message::Text(reply.into())).await.is_err() {
            break;
        }
    }
    debug!(target: RPC_TARGET, "websocket closed");
}

/// Dispatches one envelope against the vault named by `settings`.
///
/// Protocol failures are logged; the returned reply already encodes them.
#[must_use]
pub fn handle_message(settings: &Settings, message: &str) -> String {
    debug!(target: RPC_TARGET, message, "received envelope");
    let manager = ModuleManager::new(&settings.layout(), settings.checksum_policy);
    let (reply, result) = Dispatcher::new(manager).handle(message);
    if let Err(error) = result {
        warn!(target: RPC_TARGET, %error, message, "protocol error");
    }
    reply
}
