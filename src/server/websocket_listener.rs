use axum::extract::ws::{Message, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, warn};

use crate::model::{ClientEvent, ConnectionId};
use crate::server::{Connection, EventHandler, RelayEngine};

pub async fn handle_websocket(ws: WebSocketUpgrade, engine: RelayEngine) -> impl IntoResponse {
    ws.on_upgrade(move |socket| listen(socket, engine))
}

async fn listen(socket: WebSocket, engine: RelayEngine) {
    let connection_id = ConnectionId::new_v4();
    let (ws_sender, ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    engine.register(Connection::new(connection_id, tx)).await;

    let sender_task = handle_outgoing_messages(rx, ws_sender);
    let receiver_task = handle_incoming_messages(ws_receiver, &engine, connection_id);

    tokio::select! {
        _ = sender_task => {
            debug!(%connection_id, "sender task completed");
        }
        _ = receiver_task => {
            debug!(%connection_id, "receiver task completed");
        }
    }

    if let Err(e) = engine.disconnect(connection_id).await {
        error!(%connection_id, "failed to disconnect: {:?}", e);
    }
}

async fn handle_outgoing_messages(
    mut rx: UnboundedReceiver<Message>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = ws_sender.send(msg).await {
            debug!("failed to send message: {:?}", e);
            break;
        }
    }
}

async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    engine: &RelayEngine,
    connection_id: ConnectionId,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(e) = engine.handle_event(connection_id, event).await {
                        error!(%connection_id, "failed to handle event: {:?}", e);
                    }
                }
                Err(e) => {
                    warn!(%connection_id, "failed to parse event: {:?}", e);
                }
            },
            Ok(Message::Close(_)) => {
                debug!(%connection_id, "client closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(%connection_id, "receive error: {:?}", e);
                break;
            }
        }
    }
}
