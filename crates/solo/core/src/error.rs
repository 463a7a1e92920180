//! Common error infrastructure for solo-core.
//!
//! Domain errors live next to the component that raises them
//! ([`OracleError`](crate::env::OracleError) for host access,
//! [`EngineError`](crate::engine::EngineError) for tick and command
//! processing). This module provides the shared classification.

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: transient host condition, retried on the next tick
/// - **Validation**: reference that no longer resolves, skipped silently
/// - **Internal**: unexpected state inconsistency worth investigating
/// - **Fatal**: the environment is missing a required collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable error - the next tick may succeed.
    ///
    /// Examples: session source not initialized, carrier rejected
    Recoverable,

    /// Validation error - the referenced entity is gone or malformed.
    ///
    /// Examples: session not found, attribute absent
    Validation,

    /// Internal error - unexpected state inconsistency.
    Internal,

    /// Fatal error - engine cannot proceed with this environment.
    ///
    /// Examples: missing session oracle
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all solo-core errors.
///
/// # Implementation Guidelines
///
/// - All error enums should implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait SoloError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Used for log fields, metrics and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
