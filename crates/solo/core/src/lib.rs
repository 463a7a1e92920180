//! Clan-aware solo eligibility and a reversible stat bundle.
//!
//! `solo-core` decides, tick by tick, whether each connected player counts as
//! playing solo and keeps a bundle of stat adjustments on that player's
//! character while the status holds. It performs no I/O: the host world is
//! reached through the oracles in [`env`], and all state mutation flows through
//! [`engine::SoloEngine`].
pub mod buff;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod env;
pub mod error;
pub mod report;
pub mod snapshot;
pub mod stats;
pub mod timers;
pub mod types;

pub use config::{SoloConfig, StatBonus, StatBonuses};
pub use eligibility::{
    BlockCause, Blocker, EligibilityReport, EligibilityState, SoloReasons, evaluate,
    evaluate_detailed,
};
pub use engine::{
    ClearSummary, EngineError, SessionFailure, SessionOutcome, SessionUpdate, SoloEngine,
    SubjectFailure, TickReport,
};
pub use env::{
    AttributeStore, CarrierEntry, EffectCarrier, Env, NotificationSink, OracleError,
    SessionOracle, SessionRecord,
};
pub use error::{ErrorSeverity, SoloError};
pub use report::{AttributeReading, DebugDump, StatusReport};
pub use snapshot::{ClanCounts, ClanSnapshot, SessionView};
pub use stats::{
    Attribute, BonusSet, ModificationKind, StatAdjustment, StatBounds, StatKind,
    StatModifierLedger, StatModifierRecord,
};
pub use timers::{TimerRegistry, Transition};
pub use types::{ClanId, SessionId, SubjectId, Timestamp, format_short_duration};
