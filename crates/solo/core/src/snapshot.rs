//! Tick-scoped grouping of sessions by clan.
//!
//! Built in one pass at the start of every tick and thrown away at its end.
//! Membership changes constantly, so nothing here is cached across ticks.

use std::collections::HashMap;

use crate::env::SessionRecord;
use crate::types::{ClanId, SessionId, SubjectId, Timestamp};

/// A session as seen by the rest of the tick. `clan` is `None` when the
/// host-reported clan no longer resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionView {
    pub id: SessionId,
    pub name: String,
    pub connected: bool,
    pub last_connected_at: Option<Timestamp>,
    pub clan: Option<ClanId>,
    pub subject: Option<SubjectId>,
}

/// Member counts for one clan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClanCounts {
    pub total: usize,
    pub online: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ClanSnapshot {
    all: Vec<SessionView>,
    by_id: HashMap<SessionId, usize>,
    by_clan: HashMap<ClanId, Vec<usize>>,
}

impl ClanSnapshot {
    /// Groups `sessions` by clan. `clan_resolves` filters out dangling clan
    /// references, which are treated as clanless.
    pub fn build(
        sessions: impl IntoIterator<Item = SessionRecord>,
        clan_resolves: impl Fn(ClanId) -> bool,
    ) -> Self {
        let mut snapshot = Self::default();
        for record in sessions {
            let clan = record.clan.filter(|clan| clan_resolves(*clan));
            let index = snapshot.all.len();
            if let Some(clan) = clan {
                snapshot.by_clan.entry(clan).or_default().push(index);
            }
            snapshot.by_id.insert(record.id, index);
            snapshot.all.push(SessionView {
                id: record.id,
                name: record.name,
                connected: record.connected,
                last_connected_at: record.last_connected_at,
                clan,
                subject: record.subject,
            });
        }
        snapshot
    }

    pub fn all(&self) -> &[SessionView] {
        &self.all
    }

    pub fn get(&self, id: SessionId) -> Option<&SessionView> {
        self.by_id.get(&id).map(|&index| &self.all[index])
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Members of `clan`, including the asking session.
    pub fn members(&self, clan: ClanId) -> impl Iterator<Item = &SessionView> {
        self.by_clan
            .get(&clan)
            .into_iter()
            .flatten()
            .map(|&index| &self.all[index])
    }

    pub fn has_clan(&self, clan: ClanId) -> bool {
        self.by_clan.contains_key(&clan)
    }

    pub fn clan_counts(&self, clan: ClanId) -> ClanCounts {
        self.members(clan).fold(ClanCounts::default(), |mut counts, view| {
            counts.total += 1;
            if view.connected {
                counts.online += 1;
            }
            counts
        })
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
