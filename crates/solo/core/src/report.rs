//! Read-only views returned by engine commands.

use std::time::Duration;

use crate::config::SoloConfig;
use crate::eligibility::{EligibilityReport, SoloReasons};
use crate::env::CarrierEntry;
use crate::stats::{Attribute, StatAdjustment, StatModifierRecord};
use crate::types::{SessionId, SubjectId, format_short_duration};

/// Answer to a status query for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusReport {
    pub session: SessionId,
    pub name: String,
    pub solo: bool,
    pub buffed: bool,
    pub opted_out: bool,
    pub eligibility: EligibilityReport,
    pub threshold: Duration,
}

impl StatusReport {
    /// Chat lines describing the status, most important first.
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Status: {}, {}",
            if self.solo { "SOLO" } else { "NOT SOLO" },
            if self.buffed { "BUFF" } else { "NO BUFF" },
        )];

        if let Some(counts) = self.eligibility.clan {
            lines.push(format!(
                "Clan members: {} total, {} online.",
                counts.total, counts.online
            ));
        }

        let reasons = self.eligibility.reasons;
        if reasons.contains(SoloReasons::OTHER_ONLINE) {
            lines.push("Another clan member is currently online. Solo buff is disabled.".into());
        } else if let Some(left) = self.eligibility.available_in() {
            let when = format_short_duration(left);
            if reasons.contains(SoloReasons::RECENT_CLAN_LEAVE) {
                lines.push(format!(
                    "You left a clan recently. Solo buff will become available in {when}."
                ));
            } else {
                lines.push(format!("Solo buff in clan will become available in {when}."));
            }
        }

        if self.opted_out {
            lines.push("Solo buff is DISABLED for you. Opt in to enable it again.".into());
        } else if self.buffed {
            lines.push("Solo buff is ACTIVE.".into());
        } else {
            lines.push("Solo buff is NOT ACTIVE.".into());
        }

        lines
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeReading {
    pub attribute: Attribute,
    /// `None` when the subject does not carry the attribute.
    pub value: Option<f32>,
}

/// Everything the engine knows about one session's subject.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DebugDump {
    pub session: SessionId,
    pub subject: Option<SubjectId>,
    pub opted_out: bool,
    pub carrier_present: bool,
    pub attributes: Vec<AttributeReading>,
    pub record: Option<StatModifierRecord>,
    pub config: SoloConfig,
    pub adjustments: Vec<StatAdjustment>,
    pub carrier_entries: Vec<CarrierEntry>,
}
