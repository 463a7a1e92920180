//! Host-provided persistent effect that marks a subject as buffed.

use super::OracleError;
use crate::stats::{Attribute, ModificationKind};
use crate::types::SubjectId;

/// One native stat entry mirrored onto the carrier.
///
/// Multiplicative entries carry the factor (`1 + bonus`), additive entries
/// carry the addend.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierEntry {
    pub attribute: Attribute,
    pub value: f32,
    pub kind: ModificationKind,
}

/// Protocol for driving the carrier effect.
pub trait EffectCarrier: Send + Sync {
    fn is_present(&self, subject: SubjectId) -> bool;

    /// Creates the carrier on the subject. Hosts may create it asynchronously
    /// and report back through the engine's carrier-spawned callback.
    fn attach(&self, subject: SubjectId) -> Result<(), OracleError>;

    fn detach(&self, subject: SubjectId) -> Result<(), OracleError>;

    /// Replaces the ordered stat entries held by an existing carrier.
    fn write_entries(&self, subject: SubjectId, entries: &[CarrierEntry])
    -> Result<(), OracleError>;
}
