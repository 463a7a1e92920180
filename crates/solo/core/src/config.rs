use std::time::Duration;

use crate::stats::{ModificationKind, StatKind};

/// One configured stat bonus.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatBonus {
    /// Bonus magnitude; `0.10` means +10%.
    pub value: f32,
    pub kind: ModificationKind,
}

impl StatBonus {
    pub const fn multiply(value: f32) -> Self {
        Self {
            value,
            kind: ModificationKind::Multiply,
        }
    }

    pub const fn add(value: f32) -> Self {
        Self {
            value,
            kind: ModificationKind::Add,
        }
    }

    const fn with_default_kind(stat: StatKind, value: f32) -> Self {
        Self {
            value,
            kind: stat.default_kind(),
        }
    }
}

/// Per-stat bonuses, one field per [`StatKind`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatBonuses {
    pub attack_speed: StatBonus,
    pub physical_damage: StatBonus,
    pub spell_damage: StatBonus,
    pub crit_chance: StatBonus,
    pub crit_damage: StatBonus,
    pub max_health: StatBonus,
    pub physical_leech: StatBonus,
    pub spell_leech: StatBonus,
    pub physical_resistance: StatBonus,
    pub spell_resistance: StatBonus,
    pub move_speed: StatBonus,
    pub resource_yield: StatBonus,
}

impl StatBonuses {
    pub const DEFAULT_BONUS: f32 = 0.10;

    /// Every stat at [`Self::DEFAULT_BONUS`] with its default kind.
    pub const fn new() -> Self {
        Self::uniform(Self::DEFAULT_BONUS)
    }

    /// Every stat at zero, i.e. an empty bundle.
    pub const fn zeroed() -> Self {
        Self::uniform(0.0)
    }

    const fn uniform(value: f32) -> Self {
        Self {
            attack_speed: StatBonus::with_default_kind(StatKind::AttackSpeed, value),
            physical_damage: StatBonus::with_default_kind(StatKind::PhysicalDamage, value),
            spell_damage: StatBonus::with_default_kind(StatKind::SpellDamage, value),
            crit_chance: StatBonus::with_default_kind(StatKind::CritChance, value),
            crit_damage: StatBonus::with_default_kind(StatKind::CritDamage, value),
            max_health: StatBonus::with_default_kind(StatKind::MaxHealth, value),
            physical_leech: StatBonus::with_default_kind(StatKind::PhysicalLeech, value),
            spell_leech: StatBonus::with_default_kind(StatKind::SpellLeech, value),
            physical_resistance: StatBonus::with_default_kind(StatKind::PhysicalResistance, value),
            spell_resistance: StatBonus::with_default_kind(StatKind::SpellResistance, value),
            move_speed: StatBonus::with_default_kind(StatKind::MoveSpeed, value),
            resource_yield: StatBonus::with_default_kind(StatKind::ResourceYield, value),
        }
    }

    pub const fn get(&self, stat: StatKind) -> StatBonus {
        match stat {
            StatKind::AttackSpeed => self.attack_speed,
            StatKind::PhysicalDamage => self.physical_damage,
            StatKind::SpellDamage => self.spell_damage,
            StatKind::CritChance => self.crit_chance,
            StatKind::CritDamage => self.crit_damage,
            StatKind::MaxHealth => self.max_health,
            StatKind::PhysicalLeech => self.physical_leech,
            StatKind::SpellLeech => self.spell_leech,
            StatKind::PhysicalResistance => self.physical_resistance,
            StatKind::SpellResistance => self.spell_resistance,
            StatKind::MoveSpeed => self.move_speed,
            StatKind::ResourceYield => self.resource_yield,
        }
    }

    pub fn set(&mut self, stat: StatKind, bonus: StatBonus) {
        let slot = match stat {
            StatKind::AttackSpeed => &mut self.attack_speed,
            StatKind::PhysicalDamage => &mut self.physical_damage,
            StatKind::SpellDamage => &mut self.spell_damage,
            StatKind::CritChance => &mut self.crit_chance,
            StatKind::CritDamage => &mut self.crit_damage,
            StatKind::MaxHealth => &mut self.max_health,
            StatKind::PhysicalLeech => &mut self.physical_leech,
            StatKind::SpellLeech => &mut self.spell_leech,
            StatKind::PhysicalResistance => &mut self.physical_resistance,
            StatKind::SpellResistance => &mut self.spell_resistance,
            StatKind::MoveSpeed => &mut self.move_speed,
            StatKind::ResourceYield => &mut self.resource_yield,
        };
        *slot = bonus;
    }
}

impl Default for StatBonuses {
    fn default() -> Self {
        Self::new()
    }
}

/// Solo policy configuration and tunable parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SoloConfig {
    /// Minutes clanmates must stay offline (and departures must age) before a
    /// session counts as solo. Zero disables the delay.
    pub offline_threshold_minutes: u32,

    /// Send a chat notice when a session's buff switches on or off.
    pub notify_transitions: bool,

    pub stats: StatBonuses,
}

impl SoloConfig {
    pub const DEFAULT_OFFLINE_THRESHOLD_MINUTES: u32 = 30;

    pub const fn new() -> Self {
        Self {
            offline_threshold_minutes: Self::DEFAULT_OFFLINE_THRESHOLD_MINUTES,
            notify_transitions: true,
            stats: StatBonuses::new(),
        }
    }

    pub const fn with_threshold_minutes(mut self, minutes: u32) -> Self {
        self.offline_threshold_minutes = minutes;
        self
    }

    pub fn with_stats(mut self, stats: StatBonuses) -> Self {
        self.stats = stats;
        self
    }

    pub const fn threshold(&self) -> Duration {
        Duration::from_secs(self.offline_threshold_minutes as u64 * 60)
    }
}

impl Default for SoloConfig {
    fn default() -> Self {
        Self::new()
    }
}
