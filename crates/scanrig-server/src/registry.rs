//! Connection registry for client session tracking.
//!
//! The registry knows which sessions are connected, where they connect from,
//! and whether they joined while a scan was running (read-only). The
//! session count drives preview start/stop; the session list drives
//! diagnostics. Message delivery lives in [`crate::Notifier`].

use std::{collections::HashMap, net::SocketAddr};

/// Information about a connected client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Remote address, for diagnostics
    pub remote_addr: SocketAddr,
    /// Session was told to disable its interactive controls
    pub controls_disabled: bool,
}

impl SessionInfo {
    /// Create info for a fully interactive session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self { remote_addr, controls_disabled: false }
    }

    /// Create info for a session that joined during a scan.
    pub fn read_only(remote_addr: SocketAddr) -> Self {
        Self { remote_addr, controls_disabled: true }
    }
}

/// Registry of connected sessions keyed by runtime-assigned session id.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<u64, SessionInfo>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// Returns `false` if the session id is already registered; the existing
    /// entry is left untouched.
    pub fn register_session(&mut self, session_id: u64, info: SessionInfo) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, info);
        true
    }

    /// Unregister a session, returning its info if it existed.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        self.sessions.remove(&session_id)
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// All registered session ids, in no particular order.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// Sessions that were put into read-only mode on connect.
    pub fn read_only_sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.iter().filter(|(_, info)| info.controls_disabled).map(|(id, _)| *id)
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 20], port))
    }

    #[test]
    fn register_and_lookup_session() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1, SessionInfo::new(addr(5000))));
        assert!(registry.has_session(1));
        assert!(!registry.has_session(2));

        let info = registry.session(1).unwrap();
        assert_eq!(info.remote_addr, addr(5000));
        assert!(!info.controls_disabled);
    }

    #[test]
    fn register_duplicate_session_fails() {
        let mut registry = ConnectionRegistry::new();

        assert!(registry.register_session(1, SessionInfo::new(addr(5000))));
        assert!(!registry.register_session(1, SessionInfo::read_only(addr(6000))));

        // First registration wins
        assert_eq!(registry.session(1).unwrap().remote_addr, addr(5000));
    }

    #[test]
    fn unregister_session_returns_info() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1, SessionInfo::read_only(addr(5000)));

        let info = registry.unregister_session(1).unwrap();
        assert!(info.controls_disabled);
        assert!(!registry.has_session(1));
        assert!(registry.unregister_session(1).is_none());
    }

    #[test]
    fn read_only_sessions_are_tracked_individually() {
        let mut registry = ConnectionRegistry::new();
        registry.register_session(1, SessionInfo::new(addr(1)));
        registry.register_session(2, SessionInfo::read_only(addr(2)));
        registry.register_session(3, SessionInfo::new(addr(3)));

        let read_only: Vec<_> = registry.read_only_sessions().collect();
        assert_eq!(read_only, vec![2]);

        let all: HashSet<_> = registry.session_ids().collect();
        assert_eq!(all, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn session_count() {
        let mut registry = ConnectionRegistry::new();

        assert_eq!(registry.session_count(), 0);

        registry.register_session(1, SessionInfo::new(addr(1)));
        assert_eq!(registry.session_count(), 1);

        registry.register_session(2, SessionInfo::new(addr(2)));
        assert_eq!(registry.session_count(), 2);

        registry.unregister_session(1);
        assert_eq!(registry.session_count(), 1);
    }
}
