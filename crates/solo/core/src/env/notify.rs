use crate::types::SessionId;

/// Best-effort chat delivery to a session.
///
/// Implementations drop messages for sessions that are not connected.
pub trait NotificationSink: Send + Sync {
    fn send(&self, session: SessionId, text: &str);
}
