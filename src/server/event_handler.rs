use async_trait::async_trait;

use crate::model::{ClientEvent, ConnectionId, RelayError};

/// Seam between the websocket listener and the relay core: one decoded
/// inbound event in, zero or more outbound sends as a side effect.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), RelayError>;
}
