//! Oracle access errors.
//!
//! Errors raised by host collaborators when the engine reads sessions,
//! touches subject attributes or drives the effect carrier.

use crate::error::{ErrorSeverity, SoloError};
use crate::stats::Attribute;
use crate::types::{SessionId, SubjectId};

/// Errors that occur when accessing host data through an oracle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OracleError {
    /// SessionOracle is not available in the environment.
    #[error("SessionOracle not available")]
    SessionsNotAvailable,

    /// AttributeStore is not available in the environment.
    #[error("AttributeStore not available")]
    AttributesNotAvailable,

    /// EffectCarrier is not available in the environment.
    #[error("EffectCarrier not available")]
    CarrierNotAvailable,

    /// The host's session source exists but is not initialized yet.
    #[error("session source is not ready")]
    SessionSourceUnavailable,

    /// Session id no longer resolves.
    #[error("{0} not found")]
    SessionNotFound(SessionId),

    /// Subject was destroyed or never existed.
    #[error("{0} not found")]
    SubjectNotFound(SubjectId),

    /// Subject does not carry the requested attribute.
    #[error("{subject} has no attribute {attribute}")]
    AttributeAbsent {
        subject: SubjectId,
        attribute: Attribute,
    },

    /// Host refused to create or update the carrier effect.
    #[error("carrier rejected for {0}")]
    CarrierRejected(SubjectId),
}

impl OracleError {
    /// True for errors meaning "this entity is gone", which are silent no-ops.
    pub const fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::SubjectNotFound(_))
    }

    pub const fn is_attribute_absent(&self) -> bool {
        matches!(self, Self::AttributeAbsent { .. })
    }
}

impl SoloError for OracleError {
    fn severity(&self) -> ErrorSeverity {
        use OracleError::*;
        match self {
            // Missing oracles are fatal - engine cannot proceed
            SessionsNotAvailable | AttributesNotAvailable | CarrierNotAvailable => {
                ErrorSeverity::Fatal
            }

            SessionSourceUnavailable | CarrierRejected(_) => ErrorSeverity::Recoverable,

            SessionNotFound(_) | SubjectNotFound(_) | AttributeAbsent { .. } => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        use OracleError::*;
        match self {
            SessionsNotAvailable => "ORACLE_SESSIONS_NOT_AVAILABLE",
            AttributesNotAvailable => "ORACLE_ATTRIBUTES_NOT_AVAILABLE",
            CarrierNotAvailable => "ORACLE_CARRIER_NOT_AVAILABLE",
            SessionSourceUnavailable => "ORACLE_SESSION_SOURCE_UNAVAILABLE",
            SessionNotFound(_) => "ORACLE_SESSION_NOT_FOUND",
            SubjectNotFound(_) => "ORACLE_SUBJECT_NOT_FOUND",
            AttributeAbsent { .. } => "ORACLE_ATTRIBUTE_ABSENT",
            CarrierRejected(_) => "ORACLE_CARRIER_REJECTED",
        }
    }
}
