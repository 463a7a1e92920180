//! Effective bonus computation.
//!
//! Configured values are turned into [`StatAdjustment`]s once per config
//! load: zero bonuses are dropped, then the factor (`1 + bonus`) or addend is
//! clamped to the stat's [`StatBounds`]. The ledger writes from the
//! [`BonusSet`]; carrier entries are derived from the ledger record, so the
//! native representation never disagrees with what was written to the subject.

use super::{ModificationKind, StatKind};
use crate::config::StatBonuses;

/// Bonuses at or below this magnitude count as "no change".
pub const NEGLIGIBLE_BONUS: f32 = 0.0001;

/// Clamp ranges for a single stat.
///
/// `factor` bounds apply to multiplicative bonuses (the full factor, not the
/// bonus), `addend` bounds to additive ones.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatBounds {
    pub min_factor: f32,
    pub max_factor: f32,
    pub min_addend: f32,
    pub max_addend: f32,
}

impl StatBounds {
    /// Attack and move speed: ×[0.1, 5], +[0, 5]
    pub const SPEED: Self = Self::new(0.1, 5.0, 0.0, 5.0);

    /// Physical power and per-target damage: ×[0.1, 5], +[0, 1000]
    pub const POWER: Self = Self::new(0.1, 5.0, 0.0, 1_000.0);

    /// Spell power scales much lower in absolute terms: ×[0.1, 20], +[0, 1000]
    pub const SPELL_POWER: Self = Self::new(0.1, 20.0, 0.0, 1_000.0);

    /// Crit chance is a probability: ×[0.1, 5], +[0, 1]
    pub const CRIT_CHANCE: Self = Self::new(0.1, 5.0, 0.0, 1.0);

    /// Crit damage: ×[0.1, 5], +[0, 5]
    pub const CRIT_DAMAGE: Self = Self::new(0.1, 5.0, 0.0, 5.0);

    /// Max health: ×[0.1, 10], +[0, 10000]
    pub const MAX_HEALTH: Self = Self::new(0.1, 10.0, 0.0, 10_000.0);

    /// Leech and resistance: ×[0.1, 5], +[0, 0.5]
    pub const LEECH_AND_RESISTANCE: Self = Self::new(0.1, 5.0, 0.0, 0.5);

    /// Resource yield: ×[0.1, 5], +[0, 5]
    pub const RESOURCE_YIELD: Self = Self::new(0.1, 5.0, 0.0, 5.0);

    pub const fn new(min_factor: f32, max_factor: f32, min_addend: f32, max_addend: f32) -> Self {
        Self {
            min_factor,
            max_factor,
            min_addend,
            max_addend,
        }
    }

    /// Clamps the effective value for `kind`.
    pub fn clamp(&self, kind: ModificationKind, effective: f32) -> f32 {
        match kind {
            ModificationKind::Multiply => effective.clamp(self.min_factor, self.max_factor),
            ModificationKind::Add => effective.clamp(self.min_addend, self.max_addend),
        }
    }
}

/// A configured bonus resolved to the value actually applied.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatAdjustment {
    pub stat: StatKind,
    pub kind: ModificationKind,
    /// Bonus as written in the config.
    pub configured: f32,
    /// Factor for `Multiply`, addend for `Add`, after clamping.
    pub effective: f32,
    /// Whether clamping changed the value.
    pub clamped: bool,
}

impl StatAdjustment {
    /// Resolves a configured bonus. Returns `None` when it changes nothing.
    pub fn resolve(stat: StatKind, kind: ModificationKind, configured: f32) -> Option<Self> {
        if !configured.is_finite() || configured.abs() <= NEGLIGIBLE_BONUS {
            return None;
        }

        let raw = match kind {
            ModificationKind::Multiply => 1.0 + configured,
            ModificationKind::Add => configured,
        };
        let effective = stat.bounds().clamp(kind, raw);

        let unchanged = match kind {
            ModificationKind::Multiply => (effective - 1.0).abs() <= NEGLIGIBLE_BONUS,
            ModificationKind::Add => effective.abs() <= NEGLIGIBLE_BONUS,
        };
        if unchanged {
            return None;
        }

        Some(Self {
            stat,
            kind,
            configured,
            effective,
            clamped: effective != raw,
        })
    }

    /// Applies the adjustment to a live attribute value.
    pub fn apply_to(&self, value: f32) -> f32 {
        match self.kind {
            ModificationKind::Multiply => value * self.effective,
            ModificationKind::Add => value + self.effective,
        }
    }
}

/// The named bundle applied to every solo subject.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BonusSet {
    adjustments: Vec<StatAdjustment>,
}

impl BonusSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the bundle from configuration, in stat order.
    pub fn from_config(bonuses: &StatBonuses) -> Self {
        let adjustments = StatKind::ALL
            .into_iter()
            .filter_map(|stat| {
                let bonus = bonuses.get(stat);
                StatAdjustment::resolve(stat, bonus.kind, bonus.value)
            })
            .collect();
        Self { adjustments }
    }

    pub fn adjustments(&self) -> &[StatAdjustment] {
        &self.adjustments
    }

    pub fn get(&self, stat: StatKind) -> Option<&StatAdjustment> {
        self.adjustments.iter().find(|adj| adj.stat == stat)
    }

    /// Adjustments whose configured value fell outside the stat bounds.
    pub fn clamped(&self) -> impl Iterator<Item = &StatAdjustment> {
        self.adjustments.iter().filter(|adj| adj.clamped)
    }

    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adjustments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatBonus;

    #[test]
    fn multiplicative_bonus_is_clamped_to_the_ceiling() {
        let adj = StatAdjustment::resolve(StatKind::AttackSpeed, ModificationKind::Multiply, 4.0)
            .unwrap();
        assert_eq!(adj.effective, 5.0);
        assert!(!adj.clamped);

        let adj = StatAdjustment::resolve(StatKind::AttackSpeed, ModificationKind::Multiply, 9.0)
            .unwrap();
        assert_eq!(adj.effective, 5.0);
        assert!(adj.clamped);
    }

    #[test]
    fn spell_damage_allows_a_wider_factor() {
        let adj = StatAdjustment::resolve(StatKind::SpellDamage, ModificationKind::Multiply, 14.0)
            .unwrap();
        assert_eq!(adj.effective, 15.0);
    }

    #[test]
    fn additive_leech_is_clamped_to_half() {
        let adj =
            StatAdjustment::resolve(StatKind::PhysicalLeech, ModificationKind::Add, 2.0).unwrap();
        assert_eq!(adj.effective, 0.5);
        assert!(adj.clamped);
    }

    #[test]
    fn negligible_and_non_finite_bonuses_resolve_to_nothing() {
        assert!(StatAdjustment::resolve(StatKind::MaxHealth, ModificationKind::Multiply, 0.0).is_none());
        assert!(StatAdjustment::resolve(StatKind::MaxHealth, ModificationKind::Add, 0.00005).is_none());
        assert!(StatAdjustment::resolve(StatKind::MaxHealth, ModificationKind::Add, f32::NAN).is_none());
        // Negative additive leech clamps to zero, which changes nothing.
        assert!(StatAdjustment::resolve(StatKind::SpellLeech, ModificationKind::Add, -0.3).is_none());
    }

    #[test]
    fn apply_to_follows_kind() {
        let mul = StatAdjustment::resolve(StatKind::MoveSpeed, ModificationKind::Multiply, 0.5)
            .unwrap();
        assert_eq!(mul.apply_to(4.0), 6.0);

        let add =
            StatAdjustment::resolve(StatKind::SpellResistance, ModificationKind::Add, 0.25).unwrap();
        assert_eq!(add.apply_to(0.5), 0.75);
    }

    #[test]
    fn bonus_set_follows_stat_order_and_skips_zero_stats() {
        let mut bonuses = StatBonuses::zeroed();
        bonuses.physical_leech = StatBonus::add(0.1);
        bonuses.attack_speed = StatBonus::multiply(0.2);
        bonuses.physical_damage = StatBonus::multiply(0.3);

        let set = BonusSet::from_config(&bonuses);
        let stats: Vec<StatKind> = set.adjustments().iter().map(|adj| adj.stat).collect();
        assert_eq!(
            stats,
            vec![StatKind::AttackSpeed, StatKind::PhysicalDamage, StatKind::PhysicalLeech]
        );
        assert!((set.get(StatKind::AttackSpeed).unwrap().effective - 1.2).abs() < 1e-6);
        assert!(set.get(StatKind::MaxHealth).is_none());
    }
}
