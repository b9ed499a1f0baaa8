//! Broadcast notifier.
//!
//! Fan-out of server messages to connected clients. Each session owns a
//! bounded queue drained by its connection's writer task. Delivery is
//! at-most-once and best-effort: a full or closed queue drops the message for
//! that client only, so a slow client never blocks the others.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use scanrig_proto::{Notification, ServerMessage};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Default outbound queue depth per session.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Shared handle to every session's outbound queue.
///
/// Clone is cheap; clones address the same set of sessions.
#[derive(Debug, Clone)]
pub struct Notifier {
    sessions: Arc<RwLock<HashMap<u64, mpsc::Sender<ServerMessage>>>>,
    capacity: usize,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_QUEUE)
    }
}

impl Notifier {
    /// Create a notifier whose per-session queues hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), capacity: capacity.max(1) }
    }

    /// Open an outbound queue for `session_id`.
    ///
    /// Replaces any previous queue for the same id; the old receiver then sees
    /// its channel close.
    pub fn attach(&self, session_id: u64) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).insert(session_id, tx);
        rx
    }

    /// Close the outbound queue for `session_id`.
    ///
    /// Returns `true` if the session was attached.
    pub fn detach(&self, session_id: u64) -> bool {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(&session_id).is_some()
    }

    /// Queue a message for one session.
    ///
    /// Returns `true` if the message was queued.
    pub fn unicast(&self, session_id: u64, message: ServerMessage) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&session_id) {
            Some(tx) => deliver(session_id, tx, message),
            None => {
                tracing::debug!(session_id, "unicast to unknown session dropped");
                false
            },
        }
    }

    /// Queue a notification for every attached session.
    ///
    /// Returns the number of sessions that accepted it.
    pub fn broadcast(&self, notification: &Notification) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .iter()
            .filter(|(session_id, tx)| {
                deliver(**session_id, tx, ServerMessage::Notify(notification.clone()))
            })
            .count()
    }

    /// Number of attached sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn deliver(session_id: u64, tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> bool {
    match tx.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::debug!(session_id, "outbound queue full, message dropped");
            false
        },
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(session_id, "outbound queue closed, message dropped");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use scanrig_proto::Reply;

    use super::*;

    #[test]
    fn broadcast_reaches_every_session() {
        let notifier = Notifier::new(8);
        let mut a = notifier.attach(1);
        let mut b = notifier.attach(2);

        assert_eq!(notifier.broadcast(&Notification::DisableControls), 2);

        assert_eq!(a.try_recv().unwrap(), ServerMessage::Notify(Notification::DisableControls));
        assert_eq!(b.try_recv().unwrap(), ServerMessage::Notify(Notification::DisableControls));
    }

    #[test]
    fn unicast_reaches_only_target() {
        let notifier = Notifier::new(8);
        let mut a = notifier.attach(1);
        let mut b = notifier.attach(2);

        assert!(notifier.unicast(2, ServerMessage::ok(7, Reply::Ack)));

        assert!(a.try_recv().is_err());
        assert_eq!(b.try_recv().unwrap(), ServerMessage::ok(7, Reply::Ack));
    }

    #[test]
    fn unicast_to_unknown_session_is_dropped() {
        let notifier = Notifier::new(8);
        assert!(!notifier.unicast(42, ServerMessage::ok(1, Reply::Ack)));
    }

    #[test]
    fn full_queue_drops_without_blocking_others() {
        let notifier = Notifier::new(1);
        let _slow = notifier.attach(1);
        let mut fast = notifier.attach(2);

        assert_eq!(notifier.broadcast(&Notification::info("k", "first")), 2);
        fast.try_recv().unwrap();

        // Session 1 never drained its queue.
        assert_eq!(notifier.broadcast(&Notification::info("k", "second")), 1);
        assert_eq!(
            fast.try_recv().unwrap(),
            ServerMessage::Notify(Notification::info("k", "second"))
        );
    }

    #[test]
    fn closed_receiver_is_skipped() {
        let notifier = Notifier::new(4);
        let gone = notifier.attach(1);
        let _live = notifier.attach(2);
        drop(gone);

        assert_eq!(notifier.broadcast(&Notification::DisableControls), 1);
    }

    #[test]
    fn detach_removes_session() {
        let notifier = Notifier::new(4);
        let mut rx = notifier.attach(1);

        assert!(notifier.detach(1));
        assert!(!notifier.detach(1));
        assert_eq!(notifier.session_count(), 0);
        assert!(rx.try_recv().is_err());
    }
}
