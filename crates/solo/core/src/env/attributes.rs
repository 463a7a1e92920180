//! Typed access to subject attributes.

use super::OracleError;
use crate::stats::Attribute;
use crate::types::SubjectId;

/// Reads and writes numeric attributes on subjects.
///
/// Subjects are heterogeneous: callers must check [`has_attribute`] before
/// touching a field. Writes go through `&self`; implementations own their
/// synchronization the way a host entity manager does.
///
/// [`has_attribute`]: AttributeStore::has_attribute
pub trait AttributeStore: Send + Sync {
    fn subject_exists(&self, subject: SubjectId) -> bool;

    fn has_attribute(&self, subject: SubjectId, attribute: Attribute) -> bool;

    /// # Errors
    ///
    /// `SubjectNotFound` when the subject vanished, `AttributeAbsent` when it
    /// does not carry the attribute.
    fn read(&self, subject: SubjectId, attribute: Attribute) -> Result<f32, OracleError>;

    /// # Errors
    ///
    /// Same as [`AttributeStore::read`].
    fn write(&self, subject: SubjectId, attribute: Attribute, value: f32)
    -> Result<(), OracleError>;
}
