//! Combat data model.
//!
//! - [`Build`]: what the character can do
//! - [`Target`]: what it fights
//! - [`CombatScenario`]: how long, how often, and what the enemy does
//! - [`CombatState`]: mutable state of one simulated run
//! - [`Action`]: what the selector picks each turn

pub mod action;
pub mod build;
pub mod scenario;
pub mod state;
pub mod target;

pub use action::{Action, ActionKind, AttackAction, ItemAction, MovementAction, SpecialAction, SpellAction};
pub use build::{
    Ability, AbilityScores, ActionPolicy, BonusAttack, Build, CharacterClass, ClassLevel, ClassResource,
    ConcentrationRider, FeatureFlags, OncePerTurnDamage, Recharge, ResourceCost, ResourceDamage,
    RiderTrigger, Spell, SpellResolution, Weapon, ACTION_SURGE, MAX_SLOTS_PER_LEVEL,
};
pub use scenario::{CombatScenario, Cover, EnemyAction, EnemyEffect, Environment, Lighting};
pub use state::{ActionEconomy, CombatState, Concentration, EffectData, Resources, TemporaryEffect};
pub use target::{SaveBonuses, Target};

use serde::{Deserialize, Serialize};

use crate::dice::Advantage;

/// Damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

/// Conditions that can affect the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Disadvantage on attacks.
    Blinded,
    /// Disadvantage on attacks.
    Frightened,
    /// Disadvantage on attacks.
    Poisoned,
    /// Disadvantage on attacks.
    Prone,
    /// Disadvantage on attacks.
    Restrained,
    /// Advantage on attacks.
    Invisible,
    /// No actions.
    Incapacitated,
    /// No actions.
    Stunned,
    /// Downed.
    Unconscious,
}

impl Condition {
    /// Effect on the build's own attack rolls.
    #[must_use]
    pub const fn attack_modifier(self) -> Advantage {
        match self {
            Self::Blinded | Self::Frightened | Self::Poisoned | Self::Prone | Self::Restrained => {
                Advantage::Disadvantage
            }
            Self::Invisible => Advantage::Advantage,
            Self::Incapacitated | Self::Stunned | Self::Unconscious => Advantage::Normal,
        }
    }

    /// Whether the condition removes the build's turn.
    #[must_use]
    pub const fn prevents_actions(self) -> bool {
        matches!(self, Self::Incapacitated | Self::Stunned | Self::Unconscious)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_effects() {
        assert_eq!(Condition::Poisoned.attack_modifier(), Advantage::Disadvantage);
        assert_eq!(Condition::Invisible.attack_modifier(), Advantage::Advantage);
        assert!(Condition::Stunned.prevents_actions());
        assert!(!Condition::Prone.prevents_actions());
    }

    #[test]
    fn test_damage_type_serde() {
        let t: DamageType = serde_yaml::from_str("radiant").unwrap();
        assert_eq!(t, DamageType::Radiant);
    }
}
