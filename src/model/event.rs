use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConnectionId, DeviceRole};

/// Inbound wire events, one JSON object per text frame:
/// `{"event": "<name>", "data": {...}}`.
///
/// Session ids are kept optional here so a frame with the field missing still
/// parses; the relay decides per operation whether that is an error reply
/// (`join-session`) or a silent drop (status/result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinSession {
        #[serde(rename = "sessionId", default)]
        session_id: Option<String>,
        #[serde(rename = "deviceType", default)]
        device_type: Option<String>,
    },
    GetSessionStatus {
        #[serde(rename = "sessionId", default)]
        session_id: Option<String>,
    },
    TryOnResult(ResultPayload),
    SessionUpdate(Value),
    ClientStatus(Value),
    Ping,
}

/// A submitted result: the addressed session plus an opaque remainder that is
/// relayed and stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ResultPayload {
    /// Reassembles the payload exactly as the client sent it, `sessionId`
    /// included, for the sender-excluded broadcast.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = self.rest;
        if let Some(session_id) = self.session_id {
            map.insert("sessionId".to_string(), Value::String(session_id));
        }
        map
    }
}

/// Outbound wire events. Field names and recipient sets are the interop
/// contract with the browser clients and must not change shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    SessionJoined(SessionJoined),
    TryOnResult(Value),
    SessionStatus(SessionStatus),
    SessionUpdate(Value),
    ClientStatus(Value),
    ClientDisconnected(ClientDisconnected),
    Pong,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJoined {
    pub session_id: String,
    pub client_count: usize,
    pub mobile_count: usize,
    pub display_count: usize,
    pub has_result: bool,
    pub joined_socket_id: ConnectionId,
    pub joined_device_type: DeviceRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub client_count: usize,
    pub mobile_count: usize,
    pub display_count: usize,
    pub has_result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDisconnected {
    pub socket_id: ConnectionId,
    pub device_type: DeviceRole,
    pub client_count: usize,
    pub mobile_count: usize,
    pub display_count: usize,
    pub session_id: String,
}
