//! Solo eligibility state machine.
//!
//! Evaluation is a pure function of the session, the tick snapshot, the timer
//! registry, the current time and the offline threshold. Whenever the
//! information needed to prove a clanmate is safely offline is missing, the
//! session is treated as not solo.

use std::time::Duration;

use bitflags::bitflags;

use crate::snapshot::{ClanCounts, ClanSnapshot, SessionView};
use crate::timers::{TimerRegistry, remaining};
use crate::types::{SessionId, Timestamp};

/// Outcome of evaluating one session.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum EligibilityState {
    /// No clan and no pending leave window.
    SoloNoClan,
    /// In a clan whose other members have all been offline long enough.
    SoloClanThresholdPassed,
    /// Another clan member is connected.
    NotSoloOtherOnline,
    /// A clan departure or a clanmate's disconnect is still inside the window.
    NotSoloWithinDepartureWindow,
    /// The session itself left a clan inside the window.
    NotSoloRecentClanLeave,
}

impl EligibilityState {
    pub const fn is_solo(self) -> bool {
        matches!(self, Self::SoloNoClan | Self::SoloClanThresholdPassed)
    }
}

bitflags! {
    /// Informational reasons collected by [`evaluate_detailed`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SoloReasons: u8 {
        const NO_CLAN                = 1 << 0;
        const CLAN_THRESHOLD_PASSED  = 1 << 1;
        const OTHER_ONLINE           = 1 << 2;
        const CLAN_DEPARTURE         = 1 << 3;
        const MEMBER_RECENTLY_OFFLINE = 1 << 4;
        const RECENT_CLAN_LEAVE      = 1 << 5;
        const UNKNOWN_LAST_SEEN      = 1 << 6;
    }
}

/// Why a specific member or timer blocks solo status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockCause {
    Online,
    RecentlyOffline,
    UnknownLastSeen,
    ClanDeparture,
    RecentClanLeave,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Blocker {
    /// Blocking member; `None` for clan-wide or own timers.
    pub member: Option<SessionId>,
    pub cause: BlockCause,
    /// Time until this blocker clears; `None` while it is open-ended.
    pub remaining: Option<Duration>,
}

/// Diagnostic evaluation used for status replies.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EligibilityReport {
    pub state: EligibilityState,
    pub reasons: SoloReasons,
    pub blockers: Vec<Blocker>,
    pub clan: Option<ClanCounts>,
}

impl EligibilityReport {
    pub fn is_solo(&self) -> bool {
        self.state.is_solo()
    }

    /// Time until every blocker has cleared, assuming nobody reconnects.
    ///
    /// `None` when solo already or when a connected member blocks
    /// indefinitely.
    pub fn available_in(&self) -> Option<Duration> {
        if self.is_solo() {
            return None;
        }
        self.blockers
            .iter()
            .map(|blocker| blocker.remaining)
            .try_fold(Duration::ZERO, |acc, left| left.map(|left| acc.max(left)))
    }
}

/// Decides whether `session` is solo right now.
pub fn evaluate(
    session: &SessionView,
    snapshot: &ClanSnapshot,
    timers: &TimerRegistry,
    now: Timestamp,
    threshold: Duration,
) -> EligibilityState {
    let open = |stamp: Timestamp| !remaining(stamp, now, threshold).is_zero();

    let Some(clan) = session.clan else {
        return match timers.clan_leave_time(session.id) {
            Some(left) if open(left) => EligibilityState::NotSoloRecentClanLeave,
            _ => EligibilityState::SoloNoClan,
        };
    };

    if timers.clan_departure_time(clan).is_some_and(open) {
        return EligibilityState::NotSoloWithinDepartureWindow;
    }

    let mut within_window = false;
    for member in snapshot.members(clan).filter(|m| m.id != session.id) {
        if member.connected {
            return EligibilityState::NotSoloOtherOnline;
        }
        match offline_since(member, timers) {
            Some(since) if !open(since) => {}
            _ => within_window = true,
        }
    }

    if within_window {
        EligibilityState::NotSoloWithinDepartureWindow
    } else {
        EligibilityState::SoloClanThresholdPassed
    }
}

/// Same decision as [`evaluate`], plus every blocker and its remaining time.
pub fn evaluate_detailed(
    session: &SessionView,
    snapshot: &ClanSnapshot,
    timers: &TimerRegistry,
    now: Timestamp,
    threshold: Duration,
) -> EligibilityReport {
    let mut reasons = SoloReasons::empty();
    let mut blockers = Vec::new();

    let Some(clan) = session.clan else {
        let leave_left = timers
            .clan_leave_time(session.id)
            .map(|left| remaining(left, now, threshold))
            .filter(|left| !left.is_zero());
        let state = match leave_left {
            Some(left) => {
                reasons |= SoloReasons::RECENT_CLAN_LEAVE;
                blockers.push(Blocker {
                    member: None,
                    cause: BlockCause::RecentClanLeave,
                    remaining: Some(left),
                });
                EligibilityState::NotSoloRecentClanLeave
            }
            None => {
                reasons |= SoloReasons::NO_CLAN;
                EligibilityState::SoloNoClan
            }
        };
        return EligibilityReport {
            state,
            reasons,
            blockers,
            clan: None,
        };
    };

    let departure_left = timers
        .clan_departure_time(clan)
        .map(|stamp| remaining(stamp, now, threshold))
        .filter(|left| !left.is_zero());
    if let Some(left) = departure_left {
        reasons |= SoloReasons::CLAN_DEPARTURE;
        blockers.push(Blocker {
            member: None,
            cause: BlockCause::ClanDeparture,
            remaining: Some(left),
        });
    }

    for member in snapshot.members(clan).filter(|m| m.id != session.id) {
        if member.connected {
            reasons |= SoloReasons::OTHER_ONLINE;
            blockers.push(Blocker {
                member: Some(member.id),
                cause: BlockCause::Online,
                remaining: None,
            });
            continue;
        }
        match offline_since(member, timers) {
            Some(since) => {
                let left = remaining(since, now, threshold);
                if !left.is_zero() {
                    reasons |= SoloReasons::MEMBER_RECENTLY_OFFLINE;
                    blockers.push(Blocker {
                        member: Some(member.id),
                        cause: BlockCause::RecentlyOffline,
                        remaining: Some(left),
                    });
                }
            }
            None => {
                reasons |= SoloReasons::UNKNOWN_LAST_SEEN;
                blockers.push(Blocker {
                    member: Some(member.id),
                    cause: BlockCause::UnknownLastSeen,
                    remaining: Some(threshold),
                });
            }
        }
    }

    // Same precedence as `evaluate`.
    let state = if reasons.contains(SoloReasons::CLAN_DEPARTURE) {
        EligibilityState::NotSoloWithinDepartureWindow
    } else if reasons.contains(SoloReasons::OTHER_ONLINE) {
        EligibilityState::NotSoloOtherOnline
    } else if blockers.is_empty() {
        reasons |= SoloReasons::CLAN_THRESHOLD_PASSED;
        EligibilityState::SoloClanThresholdPassed
    } else {
        EligibilityState::NotSoloWithinDepartureWindow
    };

    EligibilityReport {
        state,
        reasons,
        blockers,
        clan: Some(snapshot.clan_counts(clan)),
    }
}

fn offline_since(member: &SessionView, timers: &TimerRegistry) -> Option<Timestamp> {
    timers
        .disconnect_time(member.id)
        .or(member.last_connected_at)
}
