//! Disconnect, clan-leave and clan-departure timers.
//!
//! The registry watches connection and clan transitions between ticks and
//! stamps the moment they happened. Eligibility compares those stamps with the
//! offline threshold; the scheduler asks for the next expiry so it can wake up
//! exactly when a window closes instead of polling.
//!
//! Disconnect stamps double as "offline since" markers and live until the
//! session reconnects, joins a clan or is swept. Leave and departure stamps
//! are dropped by [`TimerRegistry::expire`] once their window has closed.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::snapshot::SessionView;
use crate::types::{ClanId, SessionId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Observation {
    connected: bool,
    clan: Option<ClanId>,
}

/// Transition detected by [`TimerRegistry::record_transition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    FirstSeen,
    Disconnected,
    Reconnected,
    LeftClan(ClanId),
    JoinedClan(ClanId),
    SwitchedClan { from: ClanId, to: ClanId },
}

#[derive(Clone, Debug, Default)]
pub struct TimerRegistry {
    observed: HashMap<SessionId, Observation>,
    disconnect_time: HashMap<SessionId, Timestamp>,
    clan_leave_time: HashMap<SessionId, Timestamp>,
    clan_departure_time: HashMap<ClanId, Timestamp>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `view` with the previous observation and stamps timers.
    ///
    /// `buffed` tells whether the session currently holds the solo bundle; a
    /// buffed player leaving a clan does not start leave or departure timers.
    pub fn record_transition(
        &mut self,
        view: &SessionView,
        now: Timestamp,
        buffed: bool,
    ) -> Vec<Transition> {
        let current = Observation {
            connected: view.connected,
            clan: view.clan,
        };
        let Some(previous) = self.observed.insert(view.id, current) else {
            // Offline at start-up: back-date so a restart does not reset
            // cooldowns. Unknown last-seen is treated as "just now".
            if !view.connected {
                self.disconnect_time
                    .entry(view.id)
                    .or_insert(view.last_connected_at.unwrap_or(now));
            }
            return vec![Transition::FirstSeen];
        };

        let mut transitions = Vec::new();

        if previous.connected && !current.connected {
            self.disconnect_time.insert(view.id, now);
            transitions.push(Transition::Disconnected);
        } else if !previous.connected && current.connected {
            if !self.clan_leave_time.contains_key(&view.id) {
                self.disconnect_time.remove(&view.id);
            }
            transitions.push(Transition::Reconnected);
        }

        match (previous.clan, current.clan) {
            (Some(old), None) => {
                if !buffed {
                    self.clan_leave_time.insert(view.id, now);
                    self.clan_departure_time.insert(old, now);
                }
                transitions.push(Transition::LeftClan(old));
            }
            (None, Some(new)) => {
                self.clan_leave_time.remove(&view.id);
                self.disconnect_time.remove(&view.id);
                transitions.push(Transition::JoinedClan(new));
            }
            (Some(old), Some(new)) if old != new => {
                self.clan_leave_time.remove(&view.id);
                self.disconnect_time.remove(&view.id);
                if !buffed {
                    self.clan_departure_time.insert(old, now);
                }
                transitions.push(Transition::SwitchedClan { from: old, to: new });
            }
            _ => {}
        }

        transitions
    }

    pub fn disconnect_time(&self, session: SessionId) -> Option<Timestamp> {
        self.disconnect_time.get(&session).copied()
    }

    pub fn clan_leave_time(&self, session: SessionId) -> Option<Timestamp> {
        self.clan_leave_time.get(&session).copied()
    }

    pub fn clan_departure_time(&self, clan: ClanId) -> Option<Timestamp> {
        self.clan_departure_time.get(&clan).copied()
    }

    /// Remaining time on the session's own leave and disconnect windows.
    pub fn remaining_for(
        &self,
        session: SessionId,
        now: Timestamp,
        threshold: Duration,
    ) -> Duration {
        [
            self.clan_leave_time(session),
            self.disconnect_time(session),
        ]
        .into_iter()
        .flatten()
        .map(|stamp| remaining(stamp, now, threshold))
        .max()
        .unwrap_or(Duration::ZERO)
    }

    pub fn has_active_timers(&self, now: Timestamp, threshold: Duration) -> bool {
        self.time_until_next_expiry(now, threshold).is_some()
    }

    /// Time until the earliest open window closes; `None` when nothing is
    /// pending.
    pub fn time_until_next_expiry(&self, now: Timestamp, threshold: Duration) -> Option<Duration> {
        self.stamps()
            .map(|stamp| remaining(stamp, now, threshold))
            .filter(|left| !left.is_zero())
            .min()
    }

    /// Drops leave and departure stamps whose window has closed.
    pub fn expire(&mut self, now: Timestamp, threshold: Duration) -> usize {
        let before = self.clan_leave_time.len() + self.clan_departure_time.len();
        self.clan_leave_time
            .retain(|_, stamp| !remaining(*stamp, now, threshold).is_zero());
        self.clan_departure_time
            .retain(|_, stamp| !remaining(*stamp, now, threshold).is_zero());
        before - self.clan_leave_time.len() - self.clan_departure_time.len()
    }

    /// Drops entries for sessions no longer reported by the host and for
    /// clans that no longer resolve.
    pub fn sweep(
        &mut self,
        live_sessions: &HashSet<SessionId>,
        clan_resolves: impl Fn(ClanId) -> bool,
    ) {
        self.observed.retain(|id, _| live_sessions.contains(id));
        self.disconnect_time.retain(|id, _| live_sessions.contains(id));
        self.clan_leave_time.retain(|id, _| live_sessions.contains(id));
        self.clan_departure_time.retain(|clan, _| clan_resolves(*clan));
    }

    pub fn clear(&mut self) {
        self.observed.clear();
        self.disconnect_time.clear();
        self.clan_leave_time.clear();
        self.clan_departure_time.clear();
    }

    fn stamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.disconnect_time
            .values()
            .chain(self.clan_leave_time.values())
            .chain(self.clan_departure_time.values())
            .copied()
    }
}

/// Time left in a window opened at `stamp`.
pub(crate) fn remaining(stamp: Timestamp, now: Timestamp, threshold: Duration) -> Duration {
    threshold.saturating_sub(now.since(stamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRTY_MIN: Duration = Duration::from_secs(30 * 60);

    fn view(id: u64, connected: bool, clan: Option<u64>) -> SessionView {
        SessionView {
            id: SessionId(id),
            name: format!("p{id}"),
            connected,
            last_connected_at: None,
            clan: clan.map(ClanId),
            subject: None,
        }
    }

    fn at(minutes: i64) -> Timestamp {
        Timestamp::from_secs(minutes * 60)
    }

    #[test]
    fn disconnect_edge_stamps_now() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        let transitions = timers.record_transition(&view(1, false, Some(5)), at(3), false);

        assert_eq!(transitions, vec![Transition::Disconnected]);
        assert_eq!(timers.disconnect_time(SessionId(1)), Some(at(3)));
        assert_eq!(
            timers.remaining_for(SessionId(1), at(13), THIRTY_MIN),
            Duration::from_secs(20 * 60)
        );
    }

    #[test]
    fn offline_at_start_up_is_back_dated() {
        let mut timers = TimerRegistry::new();
        let mut offline = view(1, false, Some(5));
        offline.last_connected_at = Some(at(-40));
        timers.record_transition(&offline, at(0), false);
        assert_eq!(timers.disconnect_time(SessionId(1)), Some(at(-40)));

        let unknown = view(2, false, Some(5));
        timers.record_transition(&unknown, at(0), false);
        assert_eq!(timers.disconnect_time(SessionId(2)), Some(at(0)));
    }

    #[test]
    fn reconnect_clears_disconnect_unless_leave_is_pending() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, None), at(0), false);
        timers.record_transition(&view(1, false, None), at(1), false);
        timers.record_transition(&view(1, true, None), at(2), false);
        assert_eq!(timers.disconnect_time(SessionId(1)), None);

        timers.record_transition(&view(2, true, Some(5)), at(0), false);
        timers.record_transition(&view(2, false, None), at(1), false);
        timers.record_transition(&view(2, true, None), at(2), false);
        assert_eq!(timers.disconnect_time(SessionId(2)), Some(at(1)));
        assert_eq!(timers.clan_leave_time(SessionId(2)), Some(at(1)));
    }

    #[test]
    fn leaving_a_clan_stamps_session_and_clan() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        let transitions = timers.record_transition(&view(1, true, None), at(4), false);

        assert_eq!(transitions, vec![Transition::LeftClan(ClanId(5))]);
        assert_eq!(timers.clan_leave_time(SessionId(1)), Some(at(4)));
        assert_eq!(timers.clan_departure_time(ClanId(5)), Some(at(4)));
    }

    #[test]
    fn buffed_sessions_leave_without_timers() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), true);
        timers.record_transition(&view(1, true, None), at(4), true);

        assert_eq!(timers.clan_leave_time(SessionId(1)), None);
        assert_eq!(timers.clan_departure_time(ClanId(5)), None);
    }

    #[test]
    fn joining_or_switching_clears_session_timers() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        timers.record_transition(&view(1, true, None), at(1), false);
        timers.record_transition(&view(1, true, Some(6)), at(2), false);
        assert_eq!(timers.clan_leave_time(SessionId(1)), None);

        let transitions = timers.record_transition(&view(1, true, Some(7)), at(3), false);
        assert_eq!(
            transitions,
            vec![Transition::SwitchedClan {
                from: ClanId(6),
                to: ClanId(7)
            }]
        );
        assert_eq!(timers.clan_departure_time(ClanId(6)), Some(at(3)));
    }

    #[test]
    fn next_expiry_tracks_the_earliest_window() {
        let mut timers = TimerRegistry::new();
        assert_eq!(timers.time_until_next_expiry(at(0), THIRTY_MIN), None);

        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        timers.record_transition(&view(2, true, Some(5)), at(0), false);
        timers.record_transition(&view(1, false, Some(5)), at(0), false);
        timers.record_transition(&view(2, false, Some(5)), at(10), false);

        assert_eq!(
            timers.time_until_next_expiry(at(20), THIRTY_MIN),
            Some(Duration::from_secs(10 * 60))
        );
        assert_eq!(
            timers.time_until_next_expiry(at(35), THIRTY_MIN),
            Some(Duration::from_secs(5 * 60))
        );
        assert!(!timers.has_active_timers(at(40), THIRTY_MIN));
        assert!(!timers.has_active_timers(at(0), Duration::ZERO));
    }

    #[test]
    fn expire_keeps_offline_markers() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        timers.record_transition(&view(1, false, None), at(0), false);

        assert_eq!(timers.expire(at(10), THIRTY_MIN), 0);
        assert_eq!(timers.expire(at(30), THIRTY_MIN), 2);
        assert_eq!(timers.clan_leave_time(SessionId(1)), None);
        assert_eq!(timers.clan_departure_time(ClanId(5)), None);
        assert_eq!(timers.disconnect_time(SessionId(1)), Some(at(0)));
    }

    #[test]
    fn sweep_drops_unresolvable_entries() {
        let mut timers = TimerRegistry::new();
        timers.record_transition(&view(1, true, Some(5)), at(0), false);
        timers.record_transition(&view(1, false, None), at(1), false);

        timers.sweep(&HashSet::new(), |_| false);
        assert_eq!(timers.disconnect_time(SessionId(1)), None);
        assert_eq!(timers.clan_leave_time(SessionId(1)), None);
        assert_eq!(timers.clan_departure_time(ClanId(5)), None);

        // Unknown again, so the next sighting is a first observation.
        let transitions = timers.record_transition(&view(1, true, None), at(2), false);
        assert_eq!(transitions, vec![Transition::FirstSeen]);
    }
}
