//! Reversible stat modification ledger.
//!
//! The ledger is the only writer of the attributes it touches while a record
//! exists. It stores the absolute value observed before each write (the
//! pre-image) and restores exactly that value on clear, so unrelated changes
//! made by other systems in between never leave drift behind and repeated
//! apply/clear cycles cannot accumulate float error.

use std::collections::HashMap;

use super::{Attribute, BonusSet, StatAdjustment, StatKind};
use crate::env::{AttributeStore, CarrierEntry, OracleError};
use crate::types::SubjectId;

/// One attribute write performed by [`StatModifierLedger::apply`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifiedAttribute {
    pub stat: StatKind,
    pub attribute: Attribute,
    /// Value observed immediately before the write.
    pub pre_image: f32,
    /// Value written.
    pub applied: f32,
}

/// Everything the ledger changed on one subject.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatModifierRecord {
    pub adjustments: Vec<StatAdjustment>,
    pub entries: Vec<ModifiedAttribute>,
}

impl StatModifierRecord {
    pub fn pre_image(&self, attribute: Attribute) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.attribute == attribute)
            .map(|entry| entry.pre_image)
    }

    pub fn touches(&self, attribute: Attribute) -> bool {
        self.entries.iter().any(|entry| entry.attribute == attribute)
    }

    /// Carrier entries for the attributes this record actually wrote, in stat
    /// order.
    pub fn carrier_entries(&self) -> Vec<CarrierEntry> {
        self.adjustments
            .iter()
            .flat_map(|adj| {
                adj.stat
                    .carrier_attributes()
                    .iter()
                    .filter(|&&attribute| self.touches(attribute))
                    .map(move |&attribute| CarrierEntry {
                        attribute,
                        value: adj.effective,
                        kind: adj.kind,
                    })
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct StatModifierLedger {
    records: HashMap<SubjectId, StatModifierRecord>,
}

impl StatModifierLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `bonuses` to `subject`, starting from a clean baseline.
    ///
    /// Returns `true` when a record now exists. Absent attributes are skipped;
    /// a subject that vanishes midway leaves no record behind.
    ///
    /// # Errors
    ///
    /// Propagates host failures other than lookups and absent attributes.
    /// Writes made before the failure are rolled back first; any the host
    /// refuses to roll back are kept as a record so a later `clear` retries
    /// them.
    pub fn apply(
        &mut self,
        store: &dyn AttributeStore,
        subject: SubjectId,
        bonuses: &BonusSet,
    ) -> Result<bool, OracleError> {
        self.clear(store, subject)?;

        if !store.subject_exists(subject) {
            return Ok(false);
        }

        let mut record = StatModifierRecord::default();
        for adjustment in bonuses.adjustments() {
            let mut touched = false;
            for &attribute in adjustment.stat.attributes() {
                if !store.has_attribute(subject, attribute) {
                    continue;
                }

                match write_adjusted(store, subject, attribute, adjustment) {
                    Ok(Some(entry)) => {
                        record.entries.push(entry);
                        touched = true;
                    }
                    Ok(None) => {}
                    Err(err) if err.is_attribute_absent() => {}
                    Err(err) => {
                        // Writes that cannot be rolled back stay on record for `clear`.
                        let (failed, _) = restore(store, subject, &record.entries);
                        if !failed.is_empty() {
                            record.entries = failed;
                            self.records.insert(subject, record);
                        }
                        if err.is_lookup_failure() {
                            return Ok(self.has_record(subject));
                        }
                        return Err(err);
                    }
                }
            }
            if touched {
                record.adjustments.push(*adjustment);
            }
        }

        if record.entries.is_empty() {
            return Ok(false);
        }
        self.records.insert(subject, record);
        Ok(true)
    }

    /// Restores every pre-image held for `subject` and drops the record.
    ///
    /// Returns `true` if a record existed. A vanished subject simply loses its
    /// record.
    ///
    /// # Errors
    ///
    /// If the host rejects some writes, the record keeps only the entries that
    /// could not be restored and the first error is returned, so a later call
    /// retries them.
    pub fn clear(
        &mut self,
        store: &dyn AttributeStore,
        subject: SubjectId,
    ) -> Result<bool, OracleError> {
        let Some(mut record) = self.records.remove(&subject) else {
            return Ok(false);
        };

        if !store.subject_exists(subject) {
            return Ok(true);
        }

        let (failed, first_error) = restore(store, subject, &record.entries);
        match first_error {
            None => Ok(true),
            Some(err) => {
                record.entries = failed;
                self.records.insert(subject, record);
                Err(err)
            }
        }
    }

    pub fn has_record(&self, subject: SubjectId) -> bool {
        self.records.contains_key(&subject)
    }

    pub fn record(&self, subject: SubjectId) -> Option<&StatModifierRecord> {
        self.records.get(&subject)
    }

    pub fn subjects(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.records.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops records whose subject no longer exists. Returns how many went.
    pub fn sweep(&mut self, store: &dyn AttributeStore) -> usize {
        let before = self.records.len();
        self.records
            .retain(|subject, _| store.subject_exists(*subject));
        before - self.records.len()
    }
}

fn write_adjusted(
    store: &dyn AttributeStore,
    subject: SubjectId,
    attribute: Attribute,
    adjustment: &StatAdjustment,
) -> Result<Option<ModifiedAttribute>, OracleError> {
    let pre_image = store.read(subject, attribute)?;
    let applied = adjustment.apply_to(pre_image);
    if applied == pre_image {
        return Ok(None);
    }
    store.write(subject, attribute, applied)?;
    Ok(Some(ModifiedAttribute {
        stat: adjustment.stat,
        attribute,
        pre_image,
        applied,
    }))
}

/// Writes pre-images back in reverse order. Absent attributes count as
/// restored; other failures are collected.
fn restore(
    store: &dyn AttributeStore,
    subject: SubjectId,
    entries: &[ModifiedAttribute],
) -> (Vec<ModifiedAttribute>, Option<OracleError>) {
    let mut failed = Vec::new();
    let mut first_error = None;
    for entry in entries.iter().rev() {
        match store.write(subject, entry.attribute, entry.pre_image) {
            Ok(()) => {}
            Err(err) if err.is_attribute_absent() || err.is_lookup_failure() => {}
            Err(err) => {
                failed.push(*entry);
                first_error.get_or_insert(err);
            }
        }
    }
    failed.reverse();
    (failed, first_error)
}
