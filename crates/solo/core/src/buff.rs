//! Carrier lifecycle.
//!
//! Keeps the host's carrier effect in sync with the ledger so other systems
//! can observe "this character is buffed" without reading ledger state. The
//! entries written to a carrier come from the subject's ledger record.

use crate::env::{CarrierEntry, EffectCarrier, OracleError};
use crate::types::SubjectId;

/// Attaches the carrier if missing and fills it with `entries`. Returns `true`
/// if it was created by this call.
pub fn ensure_present(
    carrier: &dyn EffectCarrier,
    subject: SubjectId,
    entries: &[CarrierEntry],
) -> Result<bool, OracleError> {
    if carrier.is_present(subject) {
        return Ok(false);
    }
    carrier.attach(subject)?;
    // Hosts that spawn asynchronously populate through `repopulate`.
    if carrier.is_present(subject) {
        carrier.write_entries(subject, entries)?;
    }
    Ok(true)
}

/// Detaches the carrier if present. Returns `true` if it was removed.
pub fn ensure_absent(carrier: &dyn EffectCarrier, subject: SubjectId) -> Result<bool, OracleError> {
    if !carrier.is_present(subject) {
        return Ok(false);
    }
    carrier.detach(subject)?;
    Ok(true)
}

/// Rewrites the entries of an existing carrier in place, e.g. after the host
/// recreated it. Returns `false` when there is no carrier.
pub fn repopulate(
    carrier: &dyn EffectCarrier,
    subject: SubjectId,
    entries: &[CarrierEntry],
) -> Result<bool, OracleError> {
    if !carrier.is_present(subject) {
        return Ok(false);
    }
    carrier.write_entries(subject, entries)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::stats::{Attribute, ModificationKind};

    #[derive(Default)]
    struct Carriers {
        present: Mutex<HashMap<SubjectId, Vec<CarrierEntry>>>,
        attaches: Mutex<u32>,
    }

    impl EffectCarrier for Carriers {
        fn is_present(&self, subject: SubjectId) -> bool {
            self.present.lock().unwrap().contains_key(&subject)
        }

        fn attach(&self, subject: SubjectId) -> Result<(), OracleError> {
            *self.attaches.lock().unwrap() += 1;
            self.present.lock().unwrap().insert(subject, Vec::new());
            Ok(())
        }

        fn detach(&self, subject: SubjectId) -> Result<(), OracleError> {
            self.present.lock().unwrap().remove(&subject);
            Ok(())
        }

        fn write_entries(
            &self,
            subject: SubjectId,
            entries: &[CarrierEntry],
        ) -> Result<(), OracleError> {
            match self.present.lock().unwrap().get_mut(&subject) {
                Some(slot) => {
                    *slot = entries.to_vec();
                    Ok(())
                }
                None => Err(OracleError::CarrierRejected(subject)),
            }
        }
    }

    fn speed_entry(value: f32) -> CarrierEntry {
        CarrierEntry {
            attribute: Attribute::MovementSpeed,
            value,
            kind: ModificationKind::Multiply,
        }
    }

    #[test]
    fn ensure_present_is_idempotent() {
        let carriers = Carriers::default();
        let hero = SubjectId(1);

        assert!(ensure_present(&carriers, hero, &[speed_entry(1.1)]).unwrap());
        assert!(!ensure_present(&carriers, hero, &[speed_entry(1.5)]).unwrap());
        assert_eq!(*carriers.attaches.lock().unwrap(), 1);
        assert_eq!(carriers.present.lock().unwrap()[&hero], vec![speed_entry(1.1)]);
    }

    #[test]
    fn ensure_absent_only_detaches_once() {
        let carriers = Carriers::default();
        let hero = SubjectId(1);

        assert!(!ensure_absent(&carriers, hero).unwrap());
        ensure_present(&carriers, hero, &[]).unwrap();
        assert!(ensure_absent(&carriers, hero).unwrap());
        assert!(!carriers.is_present(hero));
    }

    #[test]
    fn repopulate_rewrites_entries_of_live_carrier() {
        let carriers = Carriers::default();
        let hero = SubjectId(1);

        assert!(!repopulate(&carriers, hero, &[speed_entry(1.1)]).unwrap());
        ensure_present(&carriers, hero, &[speed_entry(1.1)]).unwrap();

        assert!(repopulate(&carriers, hero, &[speed_entry(1.5)]).unwrap());
        assert_eq!(carriers.present.lock().unwrap()[&hero], vec![speed_entry(1.5)]);
    }
}
