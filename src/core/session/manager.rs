//! Session table for the streaming transport.
//!
//! Every event stream gets its own [`ProtocolSession`], keyed by the id
//! announced to the client when the stream opens. Posted messages name that
//! id, so concurrent streams never steal each other's requests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use super::protocol_session::ProtocolSession;
use super::state::SessionId;

/// How many closed ids are remembered to answer "session closed".
const CLOSED_HISTORY: usize = 1024;

/// Why a posted message could not be routed to a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// No stream is open at all.
    #[error("No active session; open the event stream first")]
    NoSession,

    /// Several streams are open and the message did not say which.
    #[error("Missing sessionId query parameter")]
    MissingId,

    /// The id is not a session id.
    #[error("Malformed sessionId: {0}")]
    Malformed(String),

    /// The id was never issued.
    #[error("Unknown session: {0}")]
    Unknown(SessionId),

    /// The session existed but has closed.
    #[error("Session {0} is closed")]
    Closed(SessionId),
}

#[derive(Debug, Default)]
struct Sessions {
    open: HashMap<SessionId, Arc<ProtocolSession>>,
    closed: HashSet<SessionId>,
    closed_order: VecDeque<SessionId>,
}

impl Sessions {
    fn remember_closed(&mut self, id: SessionId) {
        if self.closed.insert(id) {
            self.closed_order.push_back(id);
        }
        while self.closed_order.len() > CLOSED_HISTORY {
            if let Some(oldest) = self.closed_order.pop_front() {
                self.closed.remove(&oldest);
            }
        }
    }
}

/// Open streaming sessions plus a short memory of closed ones.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Mutex<Sessions>,
}

impl SessionManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a newly opened session.
    pub fn insert(&self, session: Arc<ProtocolSession>) {
        let id = session.id();
        self.sessions().open.insert(id, session);
        debug!(session = %id, "Session registered");
    }

    /// Find the session a posted message belongs to.
    ///
    /// Without an id the message goes to the only open session, if there is
    /// exactly one.
    pub fn route(&self, id: Option<&str>) -> Result<Arc<ProtocolSession>, RouteError> {
        let sessions = self.sessions();

        let Some(raw) = id else {
            return match sessions.open.len() {
                0 => Err(RouteError::NoSession),
                1 => sessions
                    .open
                    .values()
                    .next()
                    .cloned()
                    .ok_or(RouteError::NoSession),
                _ => Err(RouteError::MissingId),
            };
        };

        let id: SessionId = raw
            .parse()
            .map_err(|_| RouteError::Malformed(raw.to_string()))?;

        match sessions.open.get(&id) {
            Some(session) if session.state().is_closed() => Err(RouteError::Closed(id)),
            Some(session) => Ok(session.clone()),
            None if sessions.closed.contains(&id) => Err(RouteError::Closed(id)),
            None if sessions.open.is_empty() => Err(RouteError::NoSession),
            None => Err(RouteError::Unknown(id)),
        }
    }

    /// Close a session and forget it.
    pub fn close(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions();
            let removed = sessions.open.remove(&id);
            sessions.remember_closed(id);
            removed
        };
        if let Some(session) = removed {
            session.close();
            debug!(session = %id, "Session removed");
        }
    }

    /// Number of open sessions.
    pub fn open_count(&self) -> usize {
        self.sessions().open.len()
    }

    /// Close every open session (server shutdown).
    pub fn close_all(&self) {
        let drained: Vec<_> = {
            let mut sessions = self.sessions();
            let ids: Vec<_> = sessions.open.keys().copied().collect();
            for id in &ids {
                sessions.remember_closed(*id);
            }
            sessions.open.drain().map(|(_, s)| s).collect()
        };
        for session in drained {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ServerConfig;
    use crate::domains::tools::ToolRegistry;
    use tokio::sync::mpsc;

    fn new_session(registry: &Arc<ToolRegistry>) -> Arc<ProtocolSession> {
        let (tx, _rx) = mpsc::channel(1);
        let server = Arc::new(ServerConfig {
            name: "test".to_string(),
            version: "0".to_string(),
        });
        let session = ProtocolSession::streaming(registry, server, tx);
        session.open();
        session
    }

    #[tokio::test]
    async fn test_route_without_sessions() {
        let manager = SessionManager::new();
        assert_eq!(manager.route(None).unwrap_err(), RouteError::NoSession);
        let id = SessionId::new().to_string();
        assert_eq!(manager.route(Some(&id)).unwrap_err(), RouteError::NoSession);
    }

    #[tokio::test]
    async fn test_route_by_id() {
        let registry = Arc::new(ToolRegistry::new());
        let manager = SessionManager::new();
        let a = new_session(&registry);
        let b = new_session(&registry);
        manager.insert(a.clone());
        manager.insert(b.clone());

        let routed = manager.route(Some(&b.id().to_string())).unwrap();
        assert_eq!(routed.id(), b.id());
        assert_eq!(manager.route(None).unwrap_err(), RouteError::MissingId);

        let stranger = SessionId::new();
        assert_eq!(
            manager.route(Some(&stranger.to_string())).unwrap_err(),
            RouteError::Unknown(stranger)
        );
        assert!(matches!(
            manager.route(Some("garbage")).unwrap_err(),
            RouteError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_single_session_routes_without_id() {
        let registry = Arc::new(ToolRegistry::new());
        let manager = SessionManager::new();
        let only = new_session(&registry);
        manager.insert(only.clone());
        assert_eq!(manager.route(None).unwrap().id(), only.id());
    }

    #[tokio::test]
    async fn test_closed_session_is_reported() {
        let registry = Arc::new(ToolRegistry::new());
        let manager = SessionManager::new();
        let session = new_session(&registry);
        let id = session.id();
        manager.insert(session.clone());

        manager.close(id);
        assert!(session.state().is_closed());
        assert_eq!(manager.open_count(), 0);
        assert_eq!(
            manager.route(Some(&id.to_string())).unwrap_err(),
            RouteError::Closed(id)
        );
    }

    #[test]
    fn test_closed_history_is_bounded() {
        let mut sessions = Sessions::default();
        let first = SessionId::new();
        sessions.remember_closed(first);
        for _ in 0..CLOSED_HISTORY {
            sessions.remember_closed(SessionId::new());
        }
        assert_eq!(sessions.closed.len(), CLOSED_HISTORY);
        assert!(!sessions.closed.contains(&first));
    }
}
