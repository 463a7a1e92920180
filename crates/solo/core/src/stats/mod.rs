//! Stat catalogue for the solo bundle.
//!
//! Configuration speaks in [`StatKind`]s (twelve player-facing categories).
//! Subjects store [`Attribute`]s (native fields). Each stat is backed by one
//! or more attributes; only a subset of those is mirrored onto the carrier.
//!
//! Modules:
//! - [`bonus`]: clamps configured values into effective adjustments
//! - [`ledger`]: applies adjustments and restores pre-images

pub mod bonus;
pub mod ledger;

pub use bonus::{BonusSet, StatAdjustment, StatBounds};
pub use ledger::{ModifiedAttribute, StatModifierLedger, StatModifierRecord};

/// How a configured bonus combines with the current attribute value.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ModificationKind {
    /// `value * (1 + bonus)`
    #[default]
    Multiply,
    /// `value + bonus`
    Add,
}

/// Player-facing stat categories, in carrier order.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatKind {
    AttackSpeed,
    PhysicalDamage,
    SpellDamage,
    CritChance,
    CritDamage,
    MaxHealth,
    PhysicalLeech,
    SpellLeech,
    PhysicalResistance,
    SpellResistance,
    MoveSpeed,
    ResourceYield,
}

impl StatKind {
    pub const ALL: [StatKind; 12] = [
        StatKind::AttackSpeed,
        StatKind::PhysicalDamage,
        StatKind::SpellDamage,
        StatKind::CritChance,
        StatKind::CritDamage,
        StatKind::MaxHealth,
        StatKind::PhysicalLeech,
        StatKind::SpellLeech,
        StatKind::PhysicalResistance,
        StatKind::SpellResistance,
        StatKind::MoveSpeed,
        StatKind::ResourceYield,
    ];

    /// Kind used when the config does not say otherwise.
    pub const fn default_kind(self) -> ModificationKind {
        match self {
            StatKind::PhysicalLeech
            | StatKind::SpellLeech
            | StatKind::PhysicalResistance
            | StatKind::SpellResistance => ModificationKind::Add,
            _ => ModificationKind::Multiply,
        }
    }

    /// Every subject attribute the ledger touches for this stat.
    pub const fn attributes(self) -> &'static [Attribute] {
        use Attribute::*;
        match self {
            StatKind::AttackSpeed => &[
                PrimaryAttackSpeed,
                AbilityAttackSpeed,
                AbilityCastSpeed,
            ],
            StatKind::PhysicalDamage => &[
                PhysicalPower,
                DamageVsUndead,
                DamageVsHumans,
                DamageVsDemons,
                DamageVsMechanical,
                DamageVsBeasts,
                DamageVsCastleObjects,
                DamageVsVampires,
                DamageVsWood,
                DamageVsMineral,
                DamageVsVegetation,
                DamageVsLightArmor,
                DamageVsVBloods,
                DamageVsMagic,
            ],
            StatKind::SpellDamage => &[SpellPower, BonusSpellPower],
            StatKind::CritChance => &[PhysicalCritChance, SpellCritChance],
            StatKind::CritDamage => &[PhysicalCritDamage, SpellCritDamage],
            StatKind::MaxHealth => &[MaxHealth],
            StatKind::PhysicalLeech => &[PhysicalLifeLeech],
            StatKind::SpellLeech => &[SpellLifeLeech],
            StatKind::PhysicalResistance => &[PhysicalResistance],
            StatKind::SpellResistance => &[SpellResistance],
            StatKind::MoveSpeed => &[MovementSpeed],
            StatKind::ResourceYield => &[ResourceYield],
        }
    }

    /// Attributes mirrored onto the carrier effect.
    ///
    /// The per-target damage factors and bonus spell power are ledger-only.
    pub fn carrier_attributes(self) -> &'static [Attribute] {
        match self {
            StatKind::PhysicalDamage => &[Attribute::PhysicalPower],
            StatKind::SpellDamage => &[Attribute::SpellPower],
            other => other.attributes(),
        }
    }

    /// Clamp range for the effective factor or addend.
    pub const fn bounds(self) -> StatBounds {
        match self {
            StatKind::AttackSpeed | StatKind::MoveSpeed => StatBounds::SPEED,
            StatKind::PhysicalDamage => StatBounds::POWER,
            StatKind::SpellDamage => StatBounds::SPELL_POWER,
            StatKind::CritChance => StatBounds::CRIT_CHANCE,
            StatKind::CritDamage => StatBounds::CRIT_DAMAGE,
            StatKind::MaxHealth => StatBounds::MAX_HEALTH,
            StatKind::PhysicalLeech
            | StatKind::SpellLeech
            | StatKind::PhysicalResistance
            | StatKind::SpellResistance => StatBounds::LEECH_AND_RESISTANCE,
            StatKind::ResourceYield => StatBounds::RESOURCE_YIELD,
        }
    }
}

/// Native numeric fields a subject may carry.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Attribute {
    PrimaryAttackSpeed,
    AbilityAttackSpeed,
    AbilityCastSpeed,
    PhysicalPower,
    SpellPower,
    BonusSpellPower,
    PhysicalCritChance,
    SpellCritChance,
    PhysicalCritDamage,
    SpellCritDamage,
    MaxHealth,
    PhysicalLifeLeech,
    SpellLifeLeech,
    PhysicalResistance,
    SpellResistance,
    MovementSpeed,
    ResourceYield,
    DamageVsUndead,
    DamageVsHumans,
    DamageVsDemons,
    DamageVsMechanical,
    DamageVsBeasts,
    DamageVsCastleObjects,
    DamageVsVampires,
    DamageVsWood,
    DamageVsMineral,
    DamageVsVegetation,
    DamageVsLightArmor,
    DamageVsVBloods,
    DamageVsMagic,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn every_attribute_belongs_to_exactly_one_stat() {
        let mut seen = HashSet::new();
        for stat in StatKind::ALL {
            for attribute in stat.attributes() {
                assert!(seen.insert(*attribute), "{attribute} listed twice");
            }
        }
        assert_eq!(seen.len(), 30);
    }

    #[test]
    fn carrier_attributes_are_a_subset() {
        for stat in StatKind::ALL {
            for attribute in stat.carrier_attributes() {
                assert!(stat.attributes().contains(attribute));
            }
        }
    }

    #[test]
    fn leech_and_resistance_default_to_additive() {
        assert_eq!(StatKind::PhysicalLeech.default_kind(), ModificationKind::Add);
        assert_eq!(StatKind::SpellResistance.default_kind(), ModificationKind::Add);
        assert_eq!(StatKind::MaxHealth.default_kind(), ModificationKind::Multiply);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(StatKind::from_str("Attack_Speed").ok(), Some(StatKind::AttackSpeed));
        assert_eq!(ModificationKind::from_str("ADD").ok(), Some(ModificationKind::Add));
        assert_eq!(Attribute::MovementSpeed.as_ref(), "movement_speed");
    }
}
