//! In-memory host world.
//!
//! [`MemoryHost`] implements every oracle over plain maps. It backs the
//! runtime tests and serves as a reference for real host adapters.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use solo_core::{
    Attribute, AttributeStore, CarrierEntry, ClanId, EffectCarrier, Env, NotificationSink,
    OracleError, SessionId, SessionOracle, SessionRecord, SubjectId, Timestamp,
};

/// Source of the oracles handed to the engine on every tick.
pub trait Host: Send + Sync + 'static {
    fn env(&self) -> Env<'_>;
}

#[derive(Debug)]
pub struct MemoryHost {
    ready: AtomicBool,
    carriers_rejected: AtomicBool,
    sessions: RwLock<BTreeMap<SessionId, SessionRecord>>,
    clans: RwLock<HashSet<ClanId>>,
    subjects: RwLock<HashMap<SubjectId, HashMap<Attribute, f32>>>,
    carriers: RwLock<HashMap<SubjectId, Vec<CarrierEntry>>>,
    messages: RwLock<Vec<(SessionId, String)>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            carriers_rejected: AtomicBool::new(false),
            sessions: RwLock::default(),
            clans: RwLock::default(),
            subjects: RwLock::default(),
            carriers: RwLock::default(),
            messages: RwLock::default(),
        }
    }

    /// Toggles whether the session source answers queries.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// While set, every carrier attach is refused.
    pub fn reject_carriers(&self, rejected: bool) {
        self.carriers_rejected.store(rejected, Ordering::Relaxed);
    }

    pub fn add_clan(&self, clan: ClanId) {
        write_lock(&self.clans).insert(clan);
    }

    /// Removes the clan; sessions still pointing at it read as clanless.
    pub fn disband_clan(&self, clan: ClanId) {
        write_lock(&self.clans).remove(&clan);
    }

    pub fn upsert_session(&self, record: SessionRecord) {
        write_lock(&self.sessions).insert(record.id, record);
    }

    pub fn remove_session(&self, session: SessionId) -> Option<SessionRecord> {
        write_lock(&self.sessions).remove(&session)
    }

    pub fn connect(&self, session: SessionId, at: Timestamp) {
        self.update_session(session, |record| {
            record.connected = true;
            record.last_connected_at = Some(at);
        });
    }

    pub fn disconnect(&self, session: SessionId, at: Timestamp) {
        self.update_session(session, |record| {
            record.connected = false;
            record.last_connected_at = Some(at);
        });
    }

    pub fn set_clan(&self, session: SessionId, clan: Option<ClanId>) {
        self.update_session(session, |record| record.clan = clan);
    }

    pub fn set_subject(&self, session: SessionId, subject: Option<SubjectId>) {
        self.update_session(session, |record| record.subject = subject);
    }

    pub fn spawn_subject(
        &self,
        subject: SubjectId,
        attributes: impl IntoIterator<Item = (Attribute, f32)>,
    ) {
        write_lock(&self.subjects).insert(subject, attributes.into_iter().collect());
    }

    /// Destroys the subject together with its carrier.
    pub fn despawn_subject(&self, subject: SubjectId) {
        write_lock(&self.subjects).remove(&subject);
        write_lock(&self.carriers).remove(&subject);
    }

    pub fn attribute(&self, subject: SubjectId, attribute: Attribute) -> Option<f32> {
        read_lock(&self.subjects)
            .get(&subject)
            .and_then(|attributes| attributes.get(&attribute).copied())
    }

    /// Overwrites an attribute as the host's own systems would.
    pub fn set_attribute(&self, subject: SubjectId, attribute: Attribute, value: f32) {
        if let Some(attributes) = write_lock(&self.subjects).get_mut(&subject) {
            attributes.insert(attribute, value);
        }
    }

    pub fn carrier(&self, subject: SubjectId) -> Option<Vec<CarrierEntry>> {
        read_lock(&self.carriers).get(&subject).cloned()
    }

    /// Recreates the carrier empty, as a host does after a respawn.
    pub fn respawn_carrier(&self, subject: SubjectId) {
        if let Some(entries) = write_lock(&self.carriers).get_mut(&subject) {
            entries.clear();
        }
    }

    pub fn messages_for(&self, session: SessionId) -> Vec<String> {
        read_lock(&self.messages)
            .iter()
            .filter(|(target, _)| *target == session)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn update_session(&self, session: SessionId, f: impl FnOnce(&mut SessionRecord)) {
        if let Some(record) = write_lock(&self.sessions).get_mut(&session) {
            f(record);
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn env(&self) -> Env<'_> {
        Env::with_all(self, self, self, self)
    }
}

impl SessionOracle for MemoryHost {
    fn sessions(&self) -> Result<Vec<SessionRecord>, OracleError> {
        if !self.ready.load(Ordering::Relaxed) {
            return Err(OracleError::SessionSourceUnavailable);
        }
        Ok(read_lock(&self.sessions).values().cloned().collect())
    }

    fn clan_resolves(&self, clan: ClanId) -> bool {
        read_lock(&self.clans).contains(&clan)
    }
}

impl AttributeStore for MemoryHost {
    fn subject_exists(&self, subject: SubjectId) -> bool {
        read_lock(&self.subjects).contains_key(&subject)
    }

    fn has_attribute(&self, subject: SubjectId, attribute: Attribute) -> bool {
        self.attribute(subject, attribute).is_some()
    }

    fn read(&self, subject: SubjectId, attribute: Attribute) -> Result<f32, OracleError> {
        let subjects = read_lock(&self.subjects);
        let attributes = subjects
            .get(&subject)
            .ok_or(OracleError::SubjectNotFound(subject))?;
        attributes
            .get(&attribute)
            .copied()
            .ok_or(OracleError::AttributeAbsent { subject, attribute })
    }

    fn write(
        &self,
        subject: SubjectId,
        attribute: Attribute,
        value: f32,
    ) -> Result<(), OracleError> {
        let mut subjects = write_lock(&self.subjects);
        let slot = subjects
            .get_mut(&subject)
            .ok_or(OracleError::SubjectNotFound(subject))?
            .get_mut(&attribute)
            .ok_or(OracleError::AttributeAbsent { subject, attribute })?;
        *slot = value;
        Ok(())
    }
}

impl EffectCarrier for MemoryHost {
    fn is_present(&self, subject: SubjectId) -> bool {
        read_lock(&self.carriers).contains_key(&subject)
    }

    fn attach(&self, subject: SubjectId) -> Result<(), OracleError> {
        if !self.subject_exists(subject) {
            return Err(OracleError::SubjectNotFound(subject));
        }
        if self.carriers_rejected.load(Ordering::Relaxed) {
            return Err(OracleError::CarrierRejected(subject));
        }
        write_lock(&self.carriers).entry(subject).or_default();
        Ok(())
    }

    fn detach(&self, subject: SubjectId) -> Result<(), OracleError> {
        write_lock(&self.carriers).remove(&subject);
        Ok(())
    }

    fn write_entries(
        &self,
        subject: SubjectId,
        entries: &[CarrierEntry],
    ) -> Result<(), OracleError> {
        let mut carriers = write_lock(&self.carriers);
        let slot = carriers
            .get_mut(&subject)
            .ok_or(OracleError::CarrierRejected(subject))?;
        *slot = entries.to_vec();
        Ok(())
    }
}

impl NotificationSink for MemoryHost {
    fn send(&self, session: SessionId, text: &str) {
        write_lock(&self.messages).push((session, text.to_owned()));
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
