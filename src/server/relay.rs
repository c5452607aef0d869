use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::ws::Message;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::model::{
    ClientDisconnected, ClientEvent, ConnectionId, DeviceRole, RelayError, ResultPayload,
    ServerEvent, SessionDetail, SessionJoined, SessionStatus, SessionSummary,
};
use crate::server::registry::{Departure, SessionRegistry};
use crate::server::{Connection, EventHandler};

/// The relay core. One engine owns all session state for the process; the
/// handle is cheap to clone into connection tasks. Each operation holds the
/// registry guard from its mutation until every outbound frame has been
/// enqueued, so members observe events in processing order and a delivery
/// failure can never leave the store half-updated. Enqueueing is a
/// non-blocking push onto the socket's unbounded channel, so no await happens
/// while the guard is held.
#[derive(Clone)]
pub struct RelayEngine {
    registry: Arc<RwLock<SessionRegistry>>,
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
    started_at: Instant,
}

impl RelayEngine {
    pub fn new() -> Self {
        RelayEngine {
            registry: Arc::new(RwLock::new(SessionRegistry::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            started_at: Instant::now(),
        }
    }

    /// Tracks a freshly upgraded socket. The connection is not in any session
    /// until it sends `join-session`.
    pub async fn register(&self, connection: Connection) {
        debug!(connection_id = %connection.id, "registering connection");
        self.connections
            .write()
            .await
            .insert(connection.id, connection);
    }

    /// Transport-level teardown: leave the current session (if any) and drop
    /// the sender handle.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        self.leave(connection_id).await?;
        self.connections.write().await.remove(&connection_id);
        debug!(%connection_id, "connection removed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        session_id: Option<String>,
        device_type: Option<String>,
    ) -> Result<(), RelayError> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(RelayError::MissingSessionId)?;
        let role = DeviceRole::parse(device_type.as_deref());

        let mut registry = self.registry.write().await;
        let outcome = registry.join(connection_id, &session_id, role);
        let connections = self.connections.read().await;

        if let Some(departure) = &outcome.departure {
            Self::broadcast_to(&connections, &departure.remaining, &departure_event(departure))?;
        }

        info!(%connection_id, session_id, role = role.as_str(), "joined session");
        Self::broadcast_to(
            &connections,
            &outcome.members,
            &ServerEvent::SessionJoined(SessionJoined {
                session_id: outcome.session_id,
                client_count: outcome.client_count,
                mobile_count: outcome.counts.mobile,
                display_count: outcome.counts.display,
                has_result: outcome.has_result,
                joined_socket_id: connection_id,
                joined_device_type: role,
            }),
        )?;

        // Late joiners see the most recent result without waiting for a new
        // one. The replay carries the stored receivedAt.
        if let Some(replay) = outcome.replay {
            Self::send_to(
                &connections,
                connection_id,
                &ServerEvent::TryOnResult(serde_json::to_value(&replay)?),
            )?;
        }
        Ok(())
    }

    /// Unicast status reply. Trusts the caller-supplied session id so a
    /// socket can query before joining; a missing id is dropped silently.
    #[instrument(skip(self))]
    pub async fn get_status(
        &self,
        connection_id: ConnectionId,
        session_id: Option<String>,
    ) -> Result<(), RelayError> {
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return Ok(());
        };
        let registry = self.registry.read().await;
        let snapshot = registry.status(&session_id);
        let connections = self.connections.read().await;
        Self::send_to(
            &connections,
            connection_id,
            &ServerEvent::SessionStatus(SessionStatus {
                session_id: snapshot.session_id,
                client_count: snapshot.client_count,
                mobile_count: snapshot.counts.mobile,
                display_count: snapshot.counts.display,
                has_result: snapshot.has_result,
            }),
        )
    }

    /// Stores the result (with arrival timestamp) and relays the original
    /// payload to every other member. Like `get_status`, this trusts the
    /// caller-supplied session id. A result for a session that no longer
    /// exists is a benign race and is dropped.
    #[instrument(skip(self, payload))]
    pub async fn submit_result(
        &self,
        connection_id: ConnectionId,
        payload: ResultPayload,
    ) -> Result<(), RelayError> {
        let Some(session_id) = payload.session_id.clone().filter(|id| !id.is_empty()) else {
            return Ok(());
        };
        let payload = payload.into_map();

        let mut registry = self.registry.write().await;
        let recipients = registry.store_result(&session_id, payload.clone());

        if let Some(recipients) = recipients {
            info!(%connection_id, session_id, "result stored and relayed");
            let targets: Vec<ConnectionId> = recipients
                .into_iter()
                .filter(|member| *member != connection_id)
                .collect();
            let connections = self.connections.read().await;
            Self::broadcast_to(
                &connections,
                &targets,
                &ServerEvent::TryOnResult(Value::Object(payload)),
            )?;
        }
        Ok(())
    }

    /// Relays an opaque `session-update` to the other members of the
    /// sender's current session, resolved via the registry. No-op for
    /// connections that belong to no session.
    #[instrument(skip(self, data))]
    pub async fn relay_update(
        &self,
        connection_id: ConnectionId,
        data: Value,
    ) -> Result<(), RelayError> {
        let registry = self.registry.read().await;
        let Some(targets) = registry.relay_targets(connection_id) else {
            return Ok(());
        };
        let connections = self.connections.read().await;
        Self::broadcast_to(&connections, &targets, &ServerEvent::SessionUpdate(data))
    }

    /// Same relay path as `relay_update`, with the sender's id stamped into
    /// the payload so receivers know who reported.
    #[instrument(skip(self, data))]
    pub async fn relay_client_status(
        &self,
        connection_id: ConnectionId,
        data: Value,
    ) -> Result<(), RelayError> {
        let registry = self.registry.read().await;
        let Some(targets) = registry.relay_targets(connection_id) else {
            return Ok(());
        };

        let mut annotated = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        annotated.insert(
            "socketId".to_string(),
            Value::String(connection_id.to_string()),
        );
        let connections = self.connections.read().await;
        Self::broadcast_to(
            &connections,
            &targets,
            &ServerEvent::ClientStatus(Value::Object(annotated)),
        )
    }

    /// Removes the connection from its current session and notifies the
    /// remaining members. Safe to call for connections with no session.
    #[instrument(skip(self))]
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        let mut registry = self.registry.write().await;
        if let Some(departure) = registry.leave(connection_id) {
            info!(%connection_id, session_id = departure.session_id, "left session");
            let connections = self.connections.read().await;
            Self::broadcast_to(&connections, &departure.remaining, &departure_event(&departure))?;
        }
        Ok(())
    }

    pub async fn heartbeat(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        let connections = self.connections.read().await;
        Self::send_to(&connections, connection_id, &ServerEvent::Pong)
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.read().await.active_sessions()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub async fn session_summaries(&self) -> Vec<SessionSummary> {
        self.registry.read().await.summaries()
    }

    pub async fn session_detail(&self, session_id: &str) -> Option<SessionDetail> {
        self.registry.read().await.detail(session_id)
    }

    fn send_to(
        connections: &HashMap<ConnectionId, Connection>,
        connection_id: ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), RelayError> {
        let text = serde_json::to_string(event)?;
        if let Some(connection) = connections.get(&connection_id) {
            if let Err(e) = connection.sender.send(Message::Text(text)) {
                debug!(%connection_id, "dropping frame for closed connection: {}", e);
            }
        }
        Ok(())
    }

    fn broadcast_to(
        connections: &HashMap<ConnectionId, Connection>,
        targets: &[ConnectionId],
        event: &ServerEvent,
    ) -> Result<(), RelayError> {
        let text = serde_json::to_string(event)?;
        for target in targets {
            if let Some(connection) = connections.get(target) {
                if let Err(e) = connection.sender.send(Message::Text(text.clone())) {
                    debug!(connection_id = %target, "dropping frame for closed connection: {}", e);
                }
            }
        }
        Ok(())
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn departure_event(departure: &Departure) -> ServerEvent {
    ServerEvent::ClientDisconnected(ClientDisconnected {
        socket_id: departure.socket_id,
        device_type: departure.device_type,
        client_count: departure.client_count,
        mobile_count: departure.counts.mobile,
        display_count: departure.counts.display,
        session_id: departure.session_id.clone(),
    })
}

#[async_trait]
impl EventHandler for RelayEngine {
    async fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), RelayError> {
        match event {
            ClientEvent::JoinSession {
                session_id,
                device_type,
            } => match self.join(connection_id, session_id, device_type).await {
                Err(RelayError::MissingSessionId) => {
                    let connections = self.connections.read().await;
                    Self::send_to(
                        &connections,
                        connection_id,
                        &ServerEvent::Error {
                            message: RelayError::MissingSessionId.to_string(),
                        },
                    )
                }
                other => other,
            },
            ClientEvent::GetSessionStatus { session_id } => {
                self.get_status(connection_id, session_id).await
            }
            ClientEvent::TryOnResult(payload) => self.submit_result(connection_id, payload).await,
            ClientEvent::SessionUpdate(data) => self.relay_update(connection_id, data).await,
            ClientEvent::ClientStatus(data) => self.relay_client_status(connection_id, data).await,
            ClientEvent::Ping => self.heartbeat(connection_id).await,
        }
    }
}
