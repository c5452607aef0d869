use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::ConnectionId;

/// A live transport link: the outbound half is a channel drained by the
/// socket's send task, so delivery is fire-and-forget for the relay.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, sender: UnboundedSender<Message>) -> Self {
        Connection { id, sender }
    }
}
