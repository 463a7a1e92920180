//! Traits describing the host collaborators.
//!
//! The engine never talks to the game world directly. Sessions, subject
//! attributes, the carrier effect and chat delivery are reached through the
//! oracles below, bundled by [`Env`] for a single call.
mod attributes;
mod carrier;
mod error;
mod notify;
mod sessions;

pub use attributes::AttributeStore;
pub use carrier::{CarrierEntry, EffectCarrier};
pub use error::OracleError;
pub use notify::NotificationSink;
pub use sessions::{SessionOracle, SessionRecord};

use crate::types::SessionId;

/// Aggregates the host oracles required by a tick or command.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    sessions: Option<&'a dyn SessionOracle>,
    attributes: Option<&'a dyn AttributeStore>,
    carrier: Option<&'a dyn EffectCarrier>,
    notifier: Option<&'a dyn NotificationSink>,
}

impl<'a> Env<'a> {
    pub fn new(
        sessions: Option<&'a dyn SessionOracle>,
        attributes: Option<&'a dyn AttributeStore>,
        carrier: Option<&'a dyn EffectCarrier>,
        notifier: Option<&'a dyn NotificationSink>,
    ) -> Self {
        Self {
            sessions,
            attributes,
            carrier,
            notifier,
        }
    }

    pub fn with_all(
        sessions: &'a dyn SessionOracle,
        attributes: &'a dyn AttributeStore,
        carrier: &'a dyn EffectCarrier,
        notifier: &'a dyn NotificationSink,
    ) -> Self {
        Self::new(
            Some(sessions),
            Some(attributes),
            Some(carrier),
            Some(notifier),
        )
    }

    pub fn empty() -> Self {
        Self {
            sessions: None,
            attributes: None,
            carrier: None,
            notifier: None,
        }
    }

    /// Returns the SessionOracle, or an error if not available.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::SessionsNotAvailable` if no session oracle was provided.
    pub fn sessions(&self) -> Result<&'a dyn SessionOracle, OracleError> {
        self.sessions.ok_or(OracleError::SessionsNotAvailable)
    }

    /// Returns the AttributeStore, or an error if not available.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::AttributesNotAvailable` if no attribute store was provided.
    pub fn attributes(&self) -> Result<&'a dyn AttributeStore, OracleError> {
        self.attributes.ok_or(OracleError::AttributesNotAvailable)
    }

    /// Returns the EffectCarrier, or an error if not available.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::CarrierNotAvailable` if no carrier was provided.
    pub fn carrier(&self) -> Result<&'a dyn EffectCarrier, OracleError> {
        self.carrier.ok_or(OracleError::CarrierNotAvailable)
    }

    /// Sends a notice if a sink is wired up; otherwise the message is dropped.
    pub fn notify(&self, session: SessionId, text: &str) {
        if let Some(notifier) = self.notifier {
            notifier.send(session, text);
        }
    }
}

impl core::fmt::Debug for Env<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Env")
            .field("sessions", &self.sessions.is_some())
            .field("attributes", &self.attributes.is_some())
            .field("carrier", &self.carrier.is_some())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}
