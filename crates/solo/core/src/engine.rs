//! Tick orchestration and command entry points.
//!
//! [`SoloEngine`] owns every per-session map (timers, ledger records, opt-outs,
//! carrier bindings). A tick runs to completion before anything else touches
//! that state:
//!
//! ```text
//! sessions ─▶ ClanSnapshot ─▶ TimerRegistry::record_transition ─▶ expire
//!          ─▶ evaluate per session ─▶ ledger apply/clear + carrier present/absent
//!          ─▶ sweep stale entries ─▶ next wakeup
//! ```
//!
//! Per-session failures are collected in the [`TickReport`] and never abort
//! the batch. Only a missing collaborator or an unavailable session source
//! fails the whole tick.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::buff;
use crate::config::SoloConfig;
use crate::eligibility::{self, EligibilityState};
use crate::env::{CarrierEntry, Env, OracleError};
use crate::error::{ErrorSeverity, SoloError};
use crate::report::{AttributeReading, DebugDump, StatusReport};
use crate::snapshot::{ClanSnapshot, SessionView};
use crate::stats::{BonusSet, StatKind, StatModifierLedger};
use crate::timers::TimerRegistry;
use crate::types::{SessionId, SubjectId, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EngineError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl EngineError {
    pub const fn is_lookup_failure(&self) -> bool {
        match self {
            Self::Oracle(err) => err.is_lookup_failure(),
        }
    }

    /// True when retrying on the next trigger may succeed.
    pub fn is_transient(&self) -> bool {
        self.severity().is_recoverable()
    }
}

impl SoloError for EngineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Oracle(err) => err.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Oracle(err) => err.error_code(),
        }
    }
}

/// What a session update did to the subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum SessionOutcome {
    /// Bundle applied or carrier attached.
    Applied,
    /// Bundle cleared or carrier detached.
    Cleared,
    Unchanged,
    /// No live subject to work on.
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionUpdate {
    pub state: EligibilityState,
    pub outcome: SessionOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionFailure {
    pub session: SessionId,
    pub error: EngineError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubjectFailure {
    pub subject: SubjectId,
    pub error: EngineError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickReport {
    pub evaluated: usize,
    /// Connected sessions that evaluated as solo.
    pub solo: usize,
    pub applied: Vec<SessionId>,
    pub cleared: Vec<SessionId>,
    pub failures: Vec<SessionFailure>,
    /// This tick consumed a pending refresh and reapplied after a reload.
    pub refreshed: bool,
    /// When the next timer window closes; `None` if nothing is pending.
    pub next_wakeup: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClearSummary {
    pub cleared: usize,
    pub failures: Vec<SubjectFailure>,
}

pub struct SoloEngine {
    config: SoloConfig,
    bonuses: BonusSet,
    timers: TimerRegistry,
    ledger: StatModifierLedger,
    /// Subjects whose bundle could not be cleared on reload; rewritten from
    /// scratch the next time they are granted.
    stale: HashSet<SubjectId>,
    opted_out: HashSet<SessionId>,
    /// Sessions currently holding the buff, with the subject it sits on.
    buffed: HashMap<SessionId, SubjectId>,
    pending_refresh: bool,
}

impl SoloEngine {
    pub fn new(config: SoloConfig) -> Self {
        let bonuses = BonusSet::from_config(&config.stats);
        Self {
            config,
            bonuses,
            timers: TimerRegistry::new(),
            ledger: StatModifierLedger::new(),
            stale: HashSet::new(),
            opted_out: HashSet::new(),
            buffed: HashMap::new(),
            pending_refresh: false,
        }
    }

    pub fn config(&self) -> &SoloConfig {
        &self.config
    }

    pub fn bonuses(&self) -> &BonusSet {
        &self.bonuses
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn ledger(&self) -> &StatModifierLedger {
        &self.ledger
    }

    pub fn threshold(&self) -> Duration {
        self.config.threshold()
    }

    pub fn is_opted_out(&self, session: SessionId) -> bool {
        self.opted_out.contains(&session)
    }

    pub fn is_buffed(&self, session: SessionId) -> bool {
        self.buffed.contains_key(&session)
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.pending_refresh
    }

    /// Asks the next tick to treat itself as the reapplication pass.
    pub fn request_refresh(&mut self) {
        self.pending_refresh = true;
    }

    /// Returns and resets the pending-refresh flag.
    pub fn consume_pending_refresh(&mut self) -> bool {
        std::mem::take(&mut self.pending_refresh)
    }

    /// Runs one evaluation pass over every session.
    ///
    /// # Errors
    ///
    /// Fails only when a collaborator is missing or the session source is not
    /// ready; the caller should retry on the next trigger.
    pub fn tick(&mut self, env: &Env<'_>, now: Timestamp) -> Result<TickReport, EngineError> {
        let snapshot = self.observe(env, now)?;
        let mut report = TickReport {
            refreshed: self.consume_pending_refresh(),
            ..TickReport::default()
        };

        for view in snapshot.all() {
            report.evaluated += 1;
            match self.process_session(env, &snapshot, view, now) {
                Ok(update) => {
                    if view.connected && update.state.is_solo() {
                        report.solo += 1;
                    }
                    match update.outcome {
                        SessionOutcome::Applied => report.applied.push(view.id),
                        SessionOutcome::Cleared => report.cleared.push(view.id),
                        SessionOutcome::Unchanged | SessionOutcome::Skipped => {}
                    }
                }
                Err(error) if error.is_lookup_failure() => {}
                Err(error) => report.failures.push(SessionFailure {
                    session: view.id,
                    error,
                }),
            }
        }

        self.sweep(env, &snapshot, &mut report)?;
        report.next_wakeup = self
            .timers
            .time_until_next_expiry(now, self.threshold());
        Ok(report)
    }

    /// Re-evaluates a single session immediately, outside the regular tick.
    pub fn update_session(
        &mut self,
        env: &Env<'_>,
        session: SessionId,
        now: Timestamp,
    ) -> Result<SessionUpdate, EngineError> {
        let snapshot = self.observe(env, now)?;
        let view = snapshot
            .get(session)
            .ok_or(OracleError::SessionNotFound(session))?;
        self.process_session(env, &snapshot, view, now)
    }

    /// Disables the buff for `session` and strips it right away.
    pub fn opt_out(
        &mut self,
        env: &Env<'_>,
        session: SessionId,
        now: Timestamp,
    ) -> Result<SessionUpdate, EngineError> {
        self.opted_out.insert(session);
        self.update_session(env, session, now)
    }

    /// Re-enables the buff for `session`; it applies at once if eligible.
    pub fn opt_in(
        &mut self,
        env: &Env<'_>,
        session: SessionId,
        now: Timestamp,
    ) -> Result<SessionUpdate, EngineError> {
        self.opted_out.remove(&session);
        self.update_session(env, session, now)
    }

    /// Describes the session's eligibility without changing anything.
    pub fn status(
        &self,
        env: &Env<'_>,
        session: SessionId,
        now: Timestamp,
    ) -> Result<StatusReport, EngineError> {
        let sessions = env.sessions()?;
        let snapshot = ClanSnapshot::build(sessions.sessions()?, |clan| {
            sessions.clan_resolves(clan)
        });
        let view = snapshot
            .get(session)
            .ok_or(OracleError::SessionNotFound(session))?;
        let eligibility =
            eligibility::evaluate_detailed(view, &snapshot, &self.timers, now, self.threshold());

        let buffed = self.buffed.contains_key(&session)
            || view.subject.is_some_and(|subject| self.ledger.has_record(subject));

        Ok(StatusReport {
            session,
            name: view.name.clone(),
            solo: eligibility.is_solo(),
            buffed,
            opted_out: self.is_opted_out(session),
            eligibility,
            threshold: self.threshold(),
        })
    }

    /// Collects tracked attribute values, ledger state and effective config.
    pub fn debug_dump(&self, env: &Env<'_>, session: SessionId) -> Result<DebugDump, EngineError> {
        let record = env.sessions()?.session(session)?;
        let attributes = env.attributes()?;
        let carrier = env.carrier()?;

        let readings = match record.subject {
            Some(subject) if attributes.subject_exists(subject) => StatKind::ALL
                .into_iter()
                .flat_map(|stat| stat.attributes().iter().copied())
                .map(|attribute| AttributeReading {
                    attribute,
                    value: attributes
                        .has_attribute(subject, attribute)
                        .then(|| attributes.read(subject, attribute).ok())
                        .flatten(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(DebugDump {
            session,
            subject: record.subject,
            opted_out: self.is_opted_out(session),
            carrier_present: record
                .subject
                .is_some_and(|subject| carrier.is_present(subject)),
            attributes: readings,
            record: record
                .subject
                .and_then(|subject| self.ledger.record(subject).cloned()),
            config: self.config.clone(),
            adjustments: self.bonuses.adjustments().to_vec(),
            carrier_entries: record
                .subject
                .map(|subject| self.carrier_entries(subject))
                .unwrap_or_default(),
        })
    }

    /// Swaps in a new config: clears every bundle now and marks the next tick
    /// as the reapplication pass.
    pub fn reload(
        &mut self,
        env: &Env<'_>,
        config: SoloConfig,
    ) -> Result<ClearSummary, EngineError> {
        self.bonuses = BonusSet::from_config(&config.stats);
        self.config = config;

        let summary = self.clear_all(env)?;
        self.request_refresh();
        Ok(summary)
    }

    /// Strips the bundle and carrier from every subject we touched.
    ///
    /// Subjects that fail are reported and marked stale; their next grant
    /// retries the clear before writing the current bundle.
    pub fn clear_all(&mut self, env: &Env<'_>) -> Result<ClearSummary, EngineError> {
        let attributes = env.attributes()?;
        let carrier = env.carrier()?;

        let mut subjects: Vec<SubjectId> = self.buffed.drain().map(|(_, subject)| subject).collect();
        subjects.extend(self.ledger.subjects());
        subjects.sort_unstable();
        subjects.dedup();

        let mut summary = ClearSummary::default();
        for subject in subjects {
            let cleared = self.ledger.clear(attributes, subject);
            let detached = buff::ensure_absent(carrier, subject);
            let result = match (cleared, detached) {
                (Ok(cleared), Ok(detached)) => Ok(cleared || detached),
                (Err(err), _) | (_, Err(err)) => Err(err),
            };
            match result {
                Ok(cleared) => {
                    self.stale.remove(&subject);
                    if cleared {
                        summary.cleared += 1;
                    }
                }
                Err(err) if err.is_lookup_failure() => {
                    self.stale.remove(&subject);
                }
                Err(err) => {
                    self.stale.insert(subject);
                    summary.failures.push(SubjectFailure {
                        subject,
                        error: err.into(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Teardown: clears every bundle and forgets all per-session state.
    pub fn shutdown(&mut self, env: &Env<'_>) -> Result<ClearSummary, EngineError> {
        let summary = self.clear_all(env)?;
        self.timers.clear();
        self.opted_out.clear();
        self.pending_refresh = false;
        Ok(summary)
    }

    /// Host callback for a carrier that was (re)created on `subject`.
    ///
    /// Re-populates the stat entries when the subject is buffed. Ignored while
    /// a refresh is pending, since the carrier is about to be rebuilt anyway.
    pub fn on_carrier_spawned(
        &mut self,
        env: &Env<'_>,
        subject: SubjectId,
    ) -> Result<bool, EngineError> {
        if self.pending_refresh {
            return Ok(false);
        }
        let buffed = self.ledger.has_record(subject)
            || self.buffed.values().any(|&bound| bound == subject);
        if !buffed {
            return Ok(false);
        }
        let entries = self.carrier_entries(subject);
        Ok(buff::repopulate(env.carrier()?, subject, &entries)?)
    }

    /// Entries mirrored onto the carrier of `subject`, taken from what the
    /// ledger wrote.
    fn carrier_entries(&self, subject: SubjectId) -> Vec<CarrierEntry> {
        self.ledger
            .record(subject)
            .map(|record| record.carrier_entries())
            .unwrap_or_default()
    }

    fn observe(&mut self, env: &Env<'_>, now: Timestamp) -> Result<ClanSnapshot, EngineError> {
        let sessions = env.sessions()?;
        let snapshot = ClanSnapshot::build(sessions.sessions()?, |clan| {
            sessions.clan_resolves(clan)
        });

        for view in snapshot.all() {
            let buffed = self.buffed.contains_key(&view.id);
            self.timers.record_transition(view, now, buffed);
        }
        self.timers.expire(now, self.threshold());
        Ok(snapshot)
    }

    fn process_session(
        &mut self,
        env: &Env<'_>,
        snapshot: &ClanSnapshot,
        view: &SessionView,
        now: Timestamp,
    ) -> Result<SessionUpdate, EngineError> {
        let attributes = env.attributes()?;
        let state = eligibility::evaluate(view, snapshot, &self.timers, now, self.threshold());

        // The session switched characters since we buffed it.
        if let Some(&previous) = self.buffed.get(&view.id)
            && view.subject != Some(previous)
        {
            self.revoke(env, view.id, previous)?;
        }

        let Some(subject) = view
            .subject
            .filter(|subject| attributes.subject_exists(*subject))
        else {
            self.buffed.remove(&view.id);
            return Ok(SessionUpdate {
                state,
                outcome: SessionOutcome::Skipped,
            });
        };

        let opted_out = self.opted_out.contains(&view.id);
        let wanted = view.connected && state.is_solo() && !opted_out;
        let outcome = if wanted {
            self.grant(env, view.id, subject)?
        } else {
            self.revoke(env, view.id, subject)?
        };

        if self.config.notify_transitions
            && view.connected
            && let Some(text) = transition_notice(outcome, state, opted_out)
        {
            env.notify(view.id, text);
        }

        Ok(SessionUpdate { state, outcome })
    }

    fn grant(
        &mut self,
        env: &Env<'_>,
        session: SessionId,
        subject: SubjectId,
    ) -> Result<SessionOutcome, EngineError> {
        let attributes = env.attributes()?;
        let carrier = env.carrier()?;

        // An existing record stays until eligibility, opt-out or config changes.
        let stale = self.stale.contains(&subject);
        let applied = if stale || !self.ledger.has_record(subject) {
            self.ledger.apply(attributes, subject, &self.bonuses)?
        } else {
            false
        };
        self.buffed.insert(session, subject);

        let entries = self.carrier_entries(subject);
        let attached = buff::ensure_present(carrier, subject, &entries)?;
        if !attached && (applied || stale) {
            buff::repopulate(carrier, subject, &entries)?;
        }
        self.stale.remove(&subject);

        Ok(if applied || attached {
            SessionOutcome::Applied
        } else {
            SessionOutcome::Unchanged
        })
    }

    fn revoke(
        &mut self,
        env: &Env<'_>,
        session: SessionId,
        subject: SubjectId,
    ) -> Result<SessionOutcome, EngineError> {
        let attributes = env.attributes()?;
        let carrier = env.carrier()?;

        let was_buffed = self.buffed.remove(&session).is_some();
        let cleared = self.ledger.clear(attributes, subject)?;
        let detached = buff::ensure_absent(carrier, subject)?;
        self.stale.remove(&subject);

        Ok(if was_buffed || cleared || detached {
            SessionOutcome::Cleared
        } else {
            SessionOutcome::Unchanged
        })
    }

    fn sweep(
        &mut self,
        env: &Env<'_>,
        snapshot: &ClanSnapshot,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        let sessions = env.sessions()?;
        let attributes = env.attributes()?;

        let live: HashSet<SessionId> = snapshot.all().iter().map(|view| view.id).collect();
        self.timers
            .sweep(&live, |clan| snapshot.has_clan(clan) || sessions.clan_resolves(clan));
        self.opted_out.retain(|session| live.contains(session));

        let stale: Vec<(SessionId, SubjectId)> = self
            .buffed
            .iter()
            .filter(|(session, _)| !live.contains(session))
            .map(|(&session, &subject)| (session, subject))
            .collect();
        for (session, subject) in stale {
            match self.revoke(env, session, subject) {
                Ok(_) => report.cleared.push(session),
                Err(error) if error.is_lookup_failure() => {}
                Err(error) => report.failures.push(SessionFailure { session, error }),
            }
        }

        self.ledger.sweep(attributes);
        self.stale
            .retain(|subject| attributes.subject_exists(*subject));
        Ok(())
    }
}

fn transition_notice(
    outcome: SessionOutcome,
    state: EligibilityState,
    opted_out: bool,
) -> Option<&'static str> {
    match outcome {
        SessionOutcome::Applied => Some("You are playing solo. Solo buff applied."),
        SessionOutcome::Cleared if opted_out => None,
        SessionOutcome::Cleared => Some(match state {
            EligibilityState::NotSoloOtherOnline => {
                "Solo buff removed: another clan member is online."
            }
            EligibilityState::NotSoloWithinDepartureWindow => {
                "Solo buff removed: a clan member left or went offline recently."
            }
            EligibilityState::NotSoloRecentClanLeave => {
                "Solo buff removed: you left a clan recently."
            }
            EligibilityState::SoloNoClan | EligibilityState::SoloClanThresholdPassed => {
                "Solo buff removed."
            }
        }),
        SessionOutcome::Unchanged | SessionOutcome::Skipped => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;
    use crate::config::{StatBonus, StatBonuses};
    use crate::env::{
        AttributeStore, CarrierEntry, EffectCarrier, NotificationSink, SessionOracle,
        SessionRecord,
    };
    use crate::stats::Attribute;
    use crate::types::ClanId;

    #[derive(Default)]
    struct FakeHost {
        ready: Mutex<bool>,
        sessions: Mutex<Vec<SessionRecord>>,
        values: Mutex<HashMap<(SubjectId, Attribute), f32>>,
        carriers: Mutex<HashMap<SubjectId, Vec<CarrierEntry>>>,
        messages: Mutex<Vec<(SessionId, String)>>,
        reject_writes: Mutex<bool>,
    }

    impl FakeHost {
        fn new() -> Self {
            let host = Self::default();
            *host.ready.lock().unwrap() = true;
            host
        }

        fn env(&self) -> Env<'_> {
            Env::with_all(self, self, self, self)
        }

        fn add_player(&self, id: u64, clan: Option<u64>, health: f32) {
            let mut record = SessionRecord::new(SessionId(id), format!("p{id}"))
                .connected(true)
                .with_subject(SubjectId(id));
            record.clan = clan.map(ClanId);
            self.sessions.lock().unwrap().push(record);
            self.values
                .lock()
                .unwrap()
                .insert((SubjectId(id), Attribute::MaxHealth), health);
        }

        fn update(&self, id: u64, f: impl FnOnce(&mut SessionRecord)) {
            let mut sessions = self.sessions.lock().unwrap();
            let record = sessions
                .iter_mut()
                .find(|record| record.id == SessionId(id))
                .unwrap();
            f(record);
        }

        fn health(&self, id: u64) -> f32 {
            self.values.lock().unwrap()[&(SubjectId(id), Attribute::MaxHealth)]
        }

        fn has_carrier(&self, id: u64) -> bool {
            self.carriers.lock().unwrap().contains_key(&SubjectId(id))
        }
    }

    impl SessionOracle for FakeHost {
        fn sessions(&self) -> Result<Vec<SessionRecord>, OracleError> {
            if !*self.ready.lock().unwrap() {
                return Err(OracleError::SessionSourceUnavailable);
            }
            Ok(self.sessions.lock().unwrap().clone())
        }

        fn clan_resolves(&self, clan: ClanId) -> bool {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .any(|record| record.clan == Some(clan))
        }
    }

    impl AttributeStore for FakeHost {
        fn subject_exists(&self, subject: SubjectId) -> bool {
            self.values.lock().unwrap().keys().any(|(s, _)| *s == subject)
        }

        fn has_attribute(&self, subject: SubjectId, attribute: Attribute) -> bool {
            self.values.lock().unwrap().contains_key(&(subject, attribute))
        }

        fn read(&self, subject: SubjectId, attribute: Attribute) -> Result<f32, OracleError> {
            self.values
                .lock()
                .unwrap()
                .get(&(subject, attribute))
                .copied()
                .ok_or(OracleError::AttributeAbsent { subject, attribute })
        }

        fn write(
            &self,
            subject: SubjectId,
            attribute: Attribute,
            value: f32,
        ) -> Result<(), OracleError> {
            if *self.reject_writes.lock().unwrap() {
                return Err(OracleError::CarrierRejected(subject));
            }
            self.values
                .lock()
                .unwrap()
                .insert((subject, attribute), value);
            Ok(())
        }
    }

    impl EffectCarrier for FakeHost {
        fn is_present(&self, subject: SubjectId) -> bool {
            self.carriers.lock().unwrap().contains_key(&subject)
        }

        fn attach(&self, subject: SubjectId) -> Result<(), OracleError> {
            self.carriers.lock().unwrap().insert(subject, Vec::new());
            Ok(())
        }

        fn detach(&self, subject: SubjectId) -> Result<(), OracleError> {
            self.carriers.lock().unwrap().remove(&subject);
            Ok(())
        }

        fn write_entries(
            &self,
            subject: SubjectId,
            entries: &[CarrierEntry],
        ) -> Result<(), OracleError> {
            self.carriers
                .lock()
                .unwrap()
                .insert(subject, entries.to_vec());
            Ok(())
        }
    }

    impl NotificationSink for FakeHost {
        fn send(&self, session: SessionId, text: &str) {
            self.messages.lock().unwrap().push((session, text.to_string()));
        }
    }

    const THIRTY_MIN: u32 = 30;

    fn at(minutes: i64) -> Timestamp {
        Timestamp::from_secs(minutes * 60)
    }

    fn health_only(value: f32) -> SoloConfig {
        let mut stats = StatBonuses::zeroed();
        stats.max_health = StatBonus::multiply(value);
        SoloConfig::new()
            .with_threshold_minutes(THIRTY_MIN)
            .with_stats(stats)
    }

    #[test]
    fn clanless_player_is_buffed_on_first_tick() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));

        let report = engine.tick(&host.env(), at(0)).unwrap();
        assert_eq!(report.applied, vec![SessionId(1)]);
        assert_eq!(report.solo, 1);
        assert_eq!(host.health(1), 150.0);
        assert!(host.has_carrier(1));
        assert!(engine.is_buffed(SessionId(1)));

        // Kept, not compounded.
        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(host.health(1), 150.0);
    }

    #[test]
    fn clanmate_disconnect_holds_buff_until_threshold() {
        let host = FakeHost::new();
        host.add_player(1, Some(9), 100.0);
        host.add_player(2, Some(9), 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));

        let report = engine.tick(&host.env(), at(0)).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.next_wakeup, None);

        host.update(2, |record| record.connected = false);
        let report = engine.tick(&host.env(), at(10)).unwrap();
        assert!(report.applied.is_empty());
        assert_eq!(report.next_wakeup, Some(Duration::from_secs(30 * 60)));

        engine.tick(&host.env(), at(39)).unwrap();
        assert_eq!(host.health(1), 100.0);

        let report = engine.tick(&host.env(), at(40)).unwrap();
        assert_eq!(report.applied, vec![SessionId(1)]);
        assert_eq!(host.health(1), 150.0);
        // Offline player never gets the bundle.
        assert_eq!(host.health(2), 100.0);
    }

    #[test]
    fn clanmate_reconnect_strips_buff() {
        let host = FakeHost::new();
        host.add_player(1, Some(9), 100.0);
        host.add_player(2, Some(9), 100.0);
        host.update(2, |record| {
            record.connected = false;
            record.last_connected_at = Some(at(-60));
        });
        let mut engine = SoloEngine::new(health_only(0.5));

        engine.tick(&host.env(), at(0)).unwrap();
        assert_eq!(host.health(1), 150.0);

        host.update(2, |record| record.connected = true);
        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert_eq!(report.cleared, vec![SessionId(1)]);
        assert_eq!(host.health(1), 100.0);
        assert!(!host.has_carrier(1));
    }

    #[test]
    fn leaving_a_clan_does_not_grant_instant_solo() {
        let host = FakeHost::new();
        host.add_player(1, Some(9), 100.0);
        host.add_player(2, Some(9), 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        host.update(1, |record| record.clan = None);
        host.update(2, |record| record.connected = false);
        engine.tick(&host.env(), at(5)).unwrap();
        assert_eq!(host.health(1), 100.0);

        let status = engine.status(&host.env(), SessionId(1), at(20)).unwrap();
        assert_eq!(status.eligibility.state, EligibilityState::NotSoloRecentClanLeave);
        assert_eq!(status.eligibility.available_in(), Some(Duration::from_secs(15 * 60)));

        engine.tick(&host.env(), at(35)).unwrap();
        assert_eq!(host.health(1), 150.0);
    }

    #[test]
    fn zero_threshold_grants_on_the_disconnect_tick() {
        let host = FakeHost::new();
        host.add_player(1, Some(9), 100.0);
        host.add_player(2, Some(9), 100.0);
        let mut engine = SoloEngine::new(health_only(0.5).with_threshold_minutes(0));
        engine.tick(&host.env(), at(0)).unwrap();

        host.update(2, |record| record.connected = false);
        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert_eq!(report.applied, vec![SessionId(1)]);
        assert_eq!(report.next_wakeup, None);
    }

    #[test]
    fn opted_out_session_never_holds_a_record() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        let update = engine.opt_out(&host.env(), SessionId(1), at(1)).unwrap();
        assert_eq!(update.outcome, SessionOutcome::Cleared);
        assert!(update.state.is_solo());
        assert!(!engine.ledger().has_record(SubjectId(1)));
        assert_eq!(host.health(1), 100.0);

        engine.tick(&host.env(), at(2)).unwrap();
        assert!(!engine.ledger().has_record(SubjectId(1)));
        assert!(!host.has_carrier(1));

        let update = engine.opt_in(&host.env(), SessionId(1), at(3)).unwrap();
        assert_eq!(update.outcome, SessionOutcome::Applied);
        assert_eq!(host.health(1), 150.0);
    }

    #[test]
    fn disconnecting_player_loses_buff() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        host.update(1, |record| record.connected = false);
        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert_eq!(report.cleared, vec![SessionId(1)]);
        assert_eq!(host.health(1), 100.0);
        assert!(!engine.is_buffed(SessionId(1)));
    }

    #[test]
    fn reload_clears_now_and_reapplies_next_tick() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        let summary = engine.reload(&host.env(), health_only(1.0)).unwrap();
        assert_eq!(summary.cleared, 1);
        assert!(engine.is_refresh_pending());
        assert_eq!(host.health(1), 100.0);
        assert!(!host.has_carrier(1));

        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert!(report.refreshed);
        assert!(!engine.is_refresh_pending());
        assert_eq!(host.health(1), 200.0);
        let entries = host.carriers.lock().unwrap()[&SubjectId(1)].clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, 2.0);
    }

    #[test]
    fn reload_rewrites_a_bundle_whose_clear_was_refused() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        *host.reject_writes.lock().unwrap() = true;
        let summary = engine.reload(&host.env(), health_only(1.0)).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].subject, SubjectId(1));
        assert_eq!(host.health(1), 150.0);
        assert!(engine.is_refresh_pending());
        *host.reject_writes.lock().unwrap() = false;

        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert!(report.refreshed);
        assert_eq!(report.applied, vec![SessionId(1)]);
        assert_eq!(host.health(1), 200.0);
        let record = engine.ledger().record(SubjectId(1)).unwrap();
        assert_eq!(record.pre_image(Attribute::MaxHealth), Some(100.0));
        let entries = host.carriers.lock().unwrap()[&SubjectId(1)].clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, 2.0);

        // Settled: later ticks leave the new bundle alone.
        engine.tick(&host.env(), at(2)).unwrap();
        assert_eq!(host.health(1), 200.0);
    }

    #[test]
    fn carrier_mirrors_only_attributes_the_subject_has() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut stats = StatBonuses::zeroed();
        stats.max_health = StatBonus::multiply(0.5);
        stats.move_speed = StatBonus::multiply(0.2);
        let mut engine = SoloEngine::new(SoloConfig::new().with_stats(stats));
        engine.tick(&host.env(), at(0)).unwrap();

        let entries = host.carriers.lock().unwrap()[&SubjectId(1)].clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attribute, Attribute::MaxHealth);

        let dump = engine.debug_dump(&host.env(), SessionId(1)).unwrap();
        assert_eq!(dump.carrier_entries, entries);
        assert_eq!(dump.adjustments.len(), 2);
    }

    #[test]
    fn unavailable_source_skips_the_tick() {
        let host = FakeHost::default();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));

        let err = engine.tick(&host.env(), at(0)).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.error_code(), "ORACLE_SESSION_SOURCE_UNAVAILABLE");
        assert_eq!(host.health(1), 100.0);
    }

    #[test]
    fn missing_collaborator_is_fatal() {
        let host = FakeHost::new();
        let env = Env::new(
            Some(&host as &dyn SessionOracle),
            None,
            Some(&host as &dyn EffectCarrier),
            None,
        );
        let mut engine = SoloEngine::new(health_only(0.5));

        let err = engine.tick(&env, at(0)).unwrap_err();
        assert_eq!(err.severity(), ErrorSeverity::Fatal);
    }

    #[test]
    fn vanished_session_is_swept() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();
        engine.opt_out(&host.env(), SessionId(1), at(0)).unwrap();
        engine.opt_in(&host.env(), SessionId(1), at(0)).unwrap();

        host.sessions.lock().unwrap().clear();
        let report = engine.tick(&host.env(), at(1)).unwrap();
        assert_eq!(report.cleared, vec![SessionId(1)]);
        assert_eq!(host.health(1), 100.0);
        assert!(engine.ledger().is_empty());
        assert!(!engine.is_buffed(SessionId(1)));
    }

    #[test]
    fn switching_characters_moves_the_buff() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        host.values
            .lock()
            .unwrap()
            .insert((SubjectId(50), Attribute::MaxHealth), 80.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        host.update(1, |record| record.subject = Some(SubjectId(50)));
        engine.tick(&host.env(), at(1)).unwrap();

        assert_eq!(host.health(1), 100.0);
        assert!(!host.has_carrier(1));
        assert_eq!(host.values.lock().unwrap()[&(SubjectId(50), Attribute::MaxHealth)], 120.0);
        assert!(engine.ledger().has_record(SubjectId(50)));
    }

    #[test]
    fn respawned_carrier_is_repopulated() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        // Host recreated the effect without stat entries.
        host.carriers
            .lock()
            .unwrap()
            .insert(SubjectId(1), Vec::new());
        assert!(engine.on_carrier_spawned(&host.env(), SubjectId(1)).unwrap());
        assert_eq!(host.carriers.lock().unwrap()[&SubjectId(1)].len(), 1);

        assert!(!engine.on_carrier_spawned(&host.env(), SubjectId(2)).unwrap());
    }

    #[test]
    fn transitions_are_announced_to_connected_sessions() {
        let host = FakeHost::new();
        host.add_player(1, Some(9), 100.0);
        host.add_player(2, Some(9), 100.0);
        host.update(2, |record| {
            record.connected = false;
            record.last_connected_at = Some(at(-60));
        });
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();
        host.update(2, |record| record.connected = true);
        engine.tick(&host.env(), at(1)).unwrap();

        let messages = host.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|(session, _)| *session == SessionId(1)));
        assert!(messages[1].1.contains("another clan member is online"));
    }

    #[test]
    fn shutdown_restores_everything() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        host.add_player(2, None, 70.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        let summary = engine.shutdown(&host.env()).unwrap();
        assert_eq!(summary.cleared, 2);
        assert_eq!(host.health(1), 100.0);
        assert_eq!(host.health(2), 70.0);
        assert!(host.carriers.lock().unwrap().is_empty());
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn debug_dump_reports_tracked_values() {
        let host = FakeHost::new();
        host.add_player(1, None, 100.0);
        let mut engine = SoloEngine::new(health_only(0.5));
        engine.tick(&host.env(), at(0)).unwrap();

        let dump = engine.debug_dump(&host.env(), SessionId(1)).unwrap();
        assert!(dump.carrier_present);
        assert_eq!(dump.adjustments.len(), 1);
        let health = dump
            .attributes
            .iter()
            .find(|reading| reading.attribute == Attribute::MaxHealth)
            .unwrap();
        assert_eq!(health.value, Some(150.0));
        let absent: HashSet<_> = dump
            .attributes
            .iter()
            .filter(|reading| reading.value.is_none())
            .map(|reading| reading.attribute)
            .collect();
        assert!(absent.contains(&Attribute::MovementSpeed));
        assert_eq!(dump.record.unwrap().pre_image(Attribute::MaxHealth), Some(100.0));
    }
}
