//! Session source exposed by the host.

use super::OracleError;
use crate::types::{ClanId, SessionId, SubjectId, Timestamp};

/// One player session as reported by the host on a given tick.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: String,
    pub connected: bool,
    /// Last time the host saw this session connect, if it tracks that.
    pub last_connected_at: Option<Timestamp>,
    pub clan: Option<ClanId>,
    pub subject: Option<SubjectId>,
}

impl SessionRecord {
    pub fn new(id: SessionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connected: false,
            last_connected_at: None,
            clan: None,
            subject: None,
        }
    }

    pub fn connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    pub fn with_clan(mut self, clan: ClanId) -> Self {
        self.clan = Some(clan);
        self
    }

    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_last_connected_at(mut self, at: Timestamp) -> Self {
        self.last_connected_at = Some(at);
        self
    }
}

/// Read-only view of every active session.
pub trait SessionOracle: Send + Sync {
    /// Enumerates all sessions the host currently tracks.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::SessionSourceUnavailable` while the host world is
    /// still starting up.
    fn sessions(&self) -> Result<Vec<SessionRecord>, OracleError>;

    /// Returns whether the clan id still resolves to a live clan.
    fn clan_resolves(&self, clan: ClanId) -> bool;

    /// Looks up a single session.
    fn session(&self, id: SessionId) -> Result<SessionRecord, OracleError> {
        self.sessions()?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or(OracleError::SessionNotFound(id))
    }
}
