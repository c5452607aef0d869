use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::DeviceRole;

/// Transient identifier assigned to a live transport connection.
pub type ConnectionId = Uuid;

/// A pairing context joined by one or more connections. Exists only while it
/// has participants; an empty session is removed from the store immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub participants: HashSet<ConnectionId>,
    pub roles: HashMap<ConnectionId, DeviceRole>,
    pub last_result: Option<StoredResult>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Session {
            id: id.into(),
            participants: HashSet::new(),
            roles: HashMap::new(),
            last_result: None,
            created_at: Utc::now(),
        }
    }

    /// Adds a participant, overwriting its role on re-join.
    pub fn insert(&mut self, connection_id: ConnectionId, role: DeviceRole) {
        self.participants.insert(connection_id);
        self.roles.insert(connection_id, role);
    }

    /// Removes a participant, returning the role it held.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<DeviceRole> {
        self.participants.remove(&connection_id);
        self.roles.remove(&connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn client_count(&self) -> usize {
        self.participants.len()
    }

    /// Per-role tallies, always derived by scanning the role map so the
    /// counts cannot drift from the participant set.
    pub fn role_counts(&self) -> RoleCounts {
        RoleCounts::of(self.roles.values())
    }

    pub fn has_result(&self) -> bool {
        self.last_result.is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            client_count: self.client_count(),
            has_result: self.has_result(),
            created_at: self.created_at,
        }
    }

    pub fn detail(&self) -> SessionDetail {
        SessionDetail {
            id: self.id.clone(),
            client_count: self.client_count(),
            has_result: self.has_result(),
            created_at: self.created_at,
            last_result: self.last_result.as_ref().map(StoredResult::info),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub mobile: usize,
    pub display: usize,
}

impl RoleCounts {
    pub fn of<'a>(roles: impl IntoIterator<Item = &'a DeviceRole>) -> Self {
        let mut counts = RoleCounts::default();
        for role in roles {
            match role {
                DeviceRole::Mobile => counts.mobile += 1,
                DeviceRole::Display => counts.display += 1,
                DeviceRole::Unknown => {}
            }
        }
        counts
    }
}

/// The most recent result submitted to a session: the payload exactly as the
/// client sent it, plus the server-assigned arrival timestamp. Replayed to
/// late joiners until the session is destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
}

impl StoredResult {
    pub fn new(payload: Map<String, Value>) -> Self {
        StoredResult {
            payload,
            received_at: Utc::now(),
        }
    }

    fn info(&self) -> LastResultInfo {
        LastResultInfo {
            timestamp: self.payload.get("timestamp").cloned(),
            has_image: self
                .payload
                .get("result")
                .map(|result| !result.is_null())
                .unwrap_or(false),
        }
    }
}

/// One row of the session-listing probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub client_count: usize,
    pub has_result: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    pub client_count: usize,
    pub has_result: bool,
    pub created_at: DateTime<Utc>,
    pub last_result: Option<LastResultInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastResultInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    pub has_image: bool,
}
