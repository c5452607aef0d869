use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::model::{
    ConnectionId, DeviceRole, RoleCounts, Session, SessionDetail, SessionSummary, StoredResult,
};

/// Owns the session store and the connection-to-session registry. All
/// mutations go through this value, so the invariants hold by construction:
/// a session exists iff it has participants, roles mirror the participant
/// set, and a connection belongs to at most one session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    session_of: HashMap<ConnectionId, String>,
}

/// Snapshot taken while the joining mutation is applied, so the broadcast
/// observes consistent counts.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Set when the connection was switched out of a different session first.
    pub departure: Option<Departure>,
    pub session_id: String,
    pub client_count: usize,
    pub counts: RoleCounts,
    pub has_result: bool,
    /// All current members, the joiner included.
    pub members: Vec<ConnectionId>,
    /// The stored result to replay to the joiner, if any.
    pub replay: Option<StoredResult>,
}

#[derive(Debug, Clone)]
pub struct Departure {
    pub session_id: String,
    pub socket_id: ConnectionId,
    pub device_type: DeviceRole,
    pub client_count: usize,
    pub counts: RoleCounts,
    pub remaining: Vec<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub client_count: usize,
    pub counts: RoleCounts,
    pub has_result: bool,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection to the target session, creating it on first join.
    /// A connection currently in a *different* session is removed from it
    /// first with full leave semantics; re-joining the same session simply
    /// overwrites the role and re-triggers the join effect.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        session_id: &str,
        role: DeviceRole,
    ) -> JoinOutcome {
        let departure = match self.session_of.get(&connection_id) {
            Some(current) if current != session_id => self.leave(connection_id),
            _ => None,
        };

        let session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id));
        session.insert(connection_id, role);
        self.session_of
            .insert(connection_id, session_id.to_string());

        JoinOutcome {
            departure,
            session_id: session_id.to_string(),
            client_count: session.client_count(),
            counts: session.role_counts(),
            has_result: session.has_result(),
            members: session.participants.iter().copied().collect(),
            replay: session.last_result.clone(),
        }
    }

    /// Removes the connection from its current session, destroying the
    /// session the instant it becomes empty. No-op for connections that never
    /// joined anything.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let session_id = self.session_of.remove(&connection_id)?;
        let session = self.sessions.get_mut(&session_id)?;

        let device_type = session.remove(connection_id).unwrap_or_default();
        let departure = Departure {
            session_id: session_id.clone(),
            socket_id: connection_id,
            device_type,
            client_count: session.client_count(),
            counts: session.role_counts(),
            remaining: session.participants.iter().copied().collect(),
        };

        if session.is_empty() {
            self.sessions.remove(&session_id);
        }
        Some(departure)
    }

    /// Read-only counts for a caller-supplied session id; zeroed when the
    /// session does not exist. This deliberately trusts the given id instead
    /// of the registry, so a connection may query before joining.
    pub fn status(&self, session_id: &str) -> StatusSnapshot {
        match self.sessions.get(session_id) {
            Some(session) => StatusSnapshot {
                session_id: session_id.to_string(),
                client_count: session.client_count(),
                counts: session.role_counts(),
                has_result: session.has_result(),
            },
            None => StatusSnapshot {
                session_id: session_id.to_string(),
                client_count: 0,
                counts: RoleCounts::default(),
                has_result: false,
            },
        }
    }

    /// Overwrites the session's stored result and returns the members to
    /// notify. `None` when the session does not exist, which callers treat
    /// as a benign race rather than a fault.
    pub fn store_result(
        &mut self,
        session_id: &str,
        payload: Map<String, Value>,
    ) -> Option<Vec<ConnectionId>> {
        let session = self.sessions.get_mut(session_id)?;
        session.last_result = Some(StoredResult::new(payload));
        Some(session.participants.iter().copied().collect())
    }

    /// Resolves the sender's current session via the registry (not a
    /// caller-supplied id) and returns the other members to relay to.
    pub fn relay_targets(&self, connection_id: ConnectionId) -> Option<Vec<ConnectionId>> {
        let session_id = self.session_of.get(&connection_id)?;
        let session = self.sessions.get(session_id)?;
        Some(
            session
                .participants
                .iter()
                .copied()
                .filter(|member| *member != connection_id)
                .collect(),
        )
    }

    pub fn session_of(&self, connection_id: ConnectionId) -> Option<&str> {
        self.session_of.get(&connection_id).map(String::as_str)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions.values().map(Session::summary).collect()
    }

    pub fn detail(&self, session_id: &str) -> Option<SessionDetail> {
        self.sessions.get(session_id).map(Session::detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_payload() -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("result".to_string(), json!("<payload>"));
        payload.insert("timestamp".to_string(), json!("T1"));
        payload
    }

    #[test]
    fn first_join_creates_the_session() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();

        let outcome = registry.join(a, "S1", DeviceRole::Display);
        assert!(outcome.departure.is_none());
        assert_eq!(outcome.client_count, 1);
        assert_eq!(outcome.counts.display, 1);
        assert_eq!(outcome.counts.mobile, 0);
        assert!(!outcome.has_result);
        assert_eq!(outcome.members, vec![a]);
        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.session_of(a), Some("S1"));
    }

    #[test]
    fn rejoin_is_idempotent_in_counts() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();

        registry.join(a, "S1", DeviceRole::Mobile);
        let outcome = registry.join(a, "S1", DeviceRole::Mobile);
        assert!(outcome.departure.is_none());
        assert_eq!(outcome.client_count, 1);
        assert_eq!(outcome.counts.mobile, 1);
    }

    #[test]
    fn rejoin_keeps_stored_result() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();

        registry.join(a, "S1", DeviceRole::Mobile);
        registry.store_result("S1", result_payload()).unwrap();

        let outcome = registry.join(a, "S1", DeviceRole::Mobile);
        assert!(outcome.has_result);
        assert!(outcome.replay.is_some());
    }

    #[test]
    fn switching_sessions_leaves_the_previous_one() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();

        registry.join(a, "S1", DeviceRole::Mobile);
        registry.join(b, "S1", DeviceRole::Display);

        let outcome = registry.join(a, "S2", DeviceRole::Mobile);
        let departure = outcome.departure.expect("switch must run leave first");
        assert_eq!(departure.session_id, "S1");
        assert_eq!(departure.socket_id, a);
        assert_eq!(departure.device_type, DeviceRole::Mobile);
        assert_eq!(departure.client_count, 1);
        assert_eq!(departure.counts.mobile, 0);
        assert_eq!(departure.remaining, vec![b]);

        assert_eq!(registry.session_of(a), Some("S2"));
        assert_eq!(registry.status("S1").client_count, 1);
        assert_eq!(registry.status("S2").client_count, 1);
    }

    #[test]
    fn empty_session_is_destroyed_synchronously() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();

        registry.join(a, "S1", DeviceRole::Mobile);
        registry.store_result("S1", result_payload()).unwrap();
        registry.leave(a);

        assert_eq!(registry.active_sessions(), 0);
        let status = registry.status("S1");
        assert_eq!(status.client_count, 0);
        assert!(!status.has_result);
    }

    #[test]
    fn leave_without_session_is_a_noop() {
        let mut registry = SessionRegistry::new();
        assert!(registry.leave(ConnectionId::new_v4()).is_none());
        // Calling twice is safe as well.
        let a = ConnectionId::new_v4();
        registry.join(a, "S1", DeviceRole::Unknown);
        assert!(registry.leave(a).is_some());
        assert!(registry.leave(a).is_none());
    }

    #[test]
    fn leave_reports_role_and_counts_after_removal() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();

        registry.join(a, "S3", DeviceRole::Mobile);
        registry.join(b, "S3", DeviceRole::Display);

        let departure = registry.leave(a).unwrap();
        assert_eq!(departure.device_type, DeviceRole::Mobile);
        assert_eq!(departure.client_count, 1);
        assert_eq!(departure.counts.mobile, 0);
        assert_eq!(departure.counts.display, 1);
        assert_eq!(departure.remaining, vec![b]);
        assert_eq!(registry.active_sessions(), 1);
    }

    #[test]
    fn unknown_roles_count_toward_total_only() {
        let mut registry = SessionRegistry::new();
        registry.join(ConnectionId::new_v4(), "S1", DeviceRole::Unknown);
        registry.join(ConnectionId::new_v4(), "S1", DeviceRole::Mobile);

        let status = registry.status("S1");
        assert_eq!(status.client_count, 2);
        assert_eq!(status.counts.mobile, 1);
        assert_eq!(status.counts.display, 0);
        assert!(status.counts.mobile + status.counts.display < status.client_count);
    }

    #[test]
    fn store_result_requires_an_existing_session() {
        let mut registry = SessionRegistry::new();
        assert!(registry.store_result("S1", result_payload()).is_none());

        let a = ConnectionId::new_v4();
        registry.join(a, "S1", DeviceRole::Mobile);
        let members = registry.store_result("S1", result_payload()).unwrap();
        assert_eq!(members, vec![a]);
        assert!(registry.status("S1").has_result);
    }

    #[test]
    fn relay_targets_exclude_the_sender() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();
        let c = ConnectionId::new_v4();

        registry.join(a, "S1", DeviceRole::Mobile);
        registry.join(b, "S1", DeviceRole::Display);

        let targets = registry.relay_targets(a).unwrap();
        assert_eq!(targets, vec![b]);
        // A connection that never joined resolves to nothing.
        assert!(registry.relay_targets(c).is_none());
    }

    #[test]
    fn sessions_are_isolated_from_each_other() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();
        let b = ConnectionId::new_v4();

        registry.join(a, "S4", DeviceRole::Mobile);
        registry.join(b, "S5", DeviceRole::Display);
        registry.store_result("S4", result_payload()).unwrap();

        let s5 = registry.status("S5");
        assert_eq!(s5.client_count, 1);
        assert!(!s5.has_result);

        registry.leave(a);
        assert_eq!(registry.status("S5").client_count, 1);
        assert_eq!(registry.active_sessions(), 1);
    }

    #[test]
    fn summaries_and_detail_expose_the_store() {
        let mut registry = SessionRegistry::new();
        let a = ConnectionId::new_v4();
        registry.join(a, "S1", DeviceRole::Mobile);
        registry.store_result("S1", result_payload()).unwrap();

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "S1");
        assert_eq!(summaries[0].client_count, 1);
        assert!(summaries[0].has_result);

        let detail = registry.detail("S1").unwrap();
        let last_result = detail.last_result.unwrap();
        assert!(last_result.has_image);
        assert_eq!(last_result.timestamp, Some(json!("T1")));

        assert!(registry.detail("missing").is_none());
    }
}
