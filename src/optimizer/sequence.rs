//! Closed-form attack profiles.
//!
//! An [`AttackSequence`] is a pure value object: attack bonus, attack count,
//! crit range and a list of [`DamageModifier`]s. Its expected damage is the
//! deterministic counterpart of what the Monte Carlo simulator rolls.

use serde::{Deserialize, Serialize};

use crate::combat::{Build, DamageType, Target};
use crate::dice::{Advantage, DiceExpr};
use crate::probability::{
    expected_attack_damage, great_weapon_fighting_die_expectation, multi_attack_hit_probability,
    AttackOdds,
};

/// Where a damage term comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSource {
    /// The weapon itself; power attack adds its bonus here.
    Weapon,
    /// Class feature, feat or item rider.
    Feature,
    /// Spell rider.
    Spell,
}

/// One damage term of an attack profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageModifier {
    /// Display name.
    pub name: String,
    /// Dice (flat parts of the expression count as flat damage).
    pub dice: DiceExpr,
    /// Additional flat damage per hit.
    #[serde(default)]
    pub flat: f64,
    /// Damage type.
    pub damage_type: DamageType,
    /// Source kind.
    pub source: DamageSource,
    /// Applies to the first hit of the turn only.
    #[serde(default)]
    pub once_per_turn: bool,
    /// Dice use Great Weapon Fighting rerolls.
    #[serde(default)]
    pub great_weapon_fighting: bool,
}

impl DamageModifier {
    /// Weapon-sourced term that applies on every hit.
    #[must_use]
    pub fn weapon(name: impl Into<String>, dice: DiceExpr, flat: f64, damage_type: DamageType) -> Self {
        Self {
            name: name.into(),
            dice,
            flat,
            damage_type,
            source: DamageSource::Weapon,
            once_per_turn: false,
            great_weapon_fighting: false,
        }
    }

    /// Feature-sourced term.
    #[must_use]
    pub fn feature(name: impl Into<String>, dice: DiceExpr, damage_type: DamageType, once_per_turn: bool) -> Self {
        Self {
            name: name.into(),
            dice,
            flat: 0.0,
            damage_type,
            source: DamageSource::Feature,
            once_per_turn,
            great_weapon_fighting: false,
        }
    }

    /// Average of the dice portion (doubled on a crit).
    #[must_use]
    pub fn expected_dice(&self) -> f64 {
        if self.great_weapon_fighting {
            self.dice
                .expected_dice_value_with(&great_weapon_fighting_die_expectation)
        } else {
            self.dice.expected_dice_value()
        }
    }

    /// Average of the flat portion (not doubled on a crit).
    #[must_use]
    pub fn expected_flat(&self) -> f64 {
        self.dice.expected_value() - self.dice.expected_dice_value() + self.flat
    }
}

/// Attack profile evaluated in closed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSequence {
    /// Display name.
    pub name: String,
    /// Attack bonus (fractional for expected buff dice).
    pub attack_bonus: f64,
    /// Attacks per turn.
    pub attacks: u32,
    /// Lowest d20 face that crits.
    pub crit_range: u32,
    /// Roll state.
    pub advantage: Advantage,
    /// Third die under advantage.
    #[serde(default)]
    pub elven_accuracy: bool,
    /// Reroll natural 1s.
    #[serde(default)]
    pub halfling_luck: bool,
    /// Damage terms.
    pub modifiers: Vec<DamageModifier>,
}

impl AttackSequence {
    /// Plain profile: `attacks` attacks with one weapon term.
    #[must_use]
    pub fn new(attack_bonus: f64, attacks: u32, weapon: DamageModifier) -> Self {
        Self {
            name: weapon.name.clone(),
            attack_bonus,
            attacks,
            crit_range: 20,
            advantage: Advantage::Normal,
            elven_accuracy: false,
            halfling_luck: false,
            modifiers: vec![weapon],
        }
    }

    /// Profile of a build's Attack action, or `None` without a weapon.
    ///
    /// Resource-spending riders and concentration riders are left out: they
    /// depend on state the closed form does not track.
    #[must_use]
    pub fn from_build(build: &Build) -> Option<Self> {
        let weapon = build.weapon.as_ref()?;
        let mut modifiers = vec![DamageModifier {
            great_weapon_fighting: weapon.great_weapon_fighting,
            ..DamageModifier::weapon(
                weapon.name.clone(),
                weapon.damage.clone(),
                f64::from(weapon.damage_bonus),
                weapon.damage_type,
            )
        }];
        modifiers.extend(build.once_per_turn.iter().map(|bonus| {
            DamageModifier::feature(
                bonus.name.clone(),
                bonus.dice.clone(),
                bonus.damage_type,
                !bonus.allow_repeat,
            )
        }));
        Some(Self {
            name: build.name.clone(),
            attack_bonus: f64::from(build.attack_bonus),
            attacks: build.attacks_per_action,
            crit_range: weapon.crit_range,
            advantage: build.advantage,
            elven_accuracy: build.features.elven_accuracy,
            halfling_luck: build.features.halfling_luck,
            modifiers,
        })
    }

    /// Add a damage term.
    #[must_use]
    pub fn with_modifier(mut self, modifier: DamageModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Replace the roll state.
    #[must_use]
    pub fn with_advantage(mut self, advantage: Advantage) -> Self {
        self.advantage = advantage;
        self
    }

    /// Power-attack variant: `penalty` to hit, `damage_bonus` per hit.
    ///
    /// The bonus lands once per hit, on the first weapon-sourced term that
    /// applies to every hit. Profiles without such a term only take the penalty.
    #[must_use]
    pub fn power_attack(&self, penalty: f64, damage_bonus: f64) -> Self {
        let mut sequence = self.clone();
        sequence.attack_bonus -= penalty;
        if let Some(term) = sequence
            .modifiers
            .iter_mut()
            .find(|m| m.source == DamageSource::Weapon && !m.once_per_turn)
        {
            term.flat += damage_bonus;
        }
        sequence
    }

    /// Hit and crit odds against `ac` under `advantage`.
    #[must_use]
    pub fn odds(&self, ac: f64, advantage: Advantage) -> AttackOdds {
        AttackOdds::roll(
            self.attack_bonus,
            ac,
            self.crit_range,
            advantage,
            self.elven_accuracy,
            self.halfling_luck,
        )
    }

    /// Expected damage per turn against `ac` with the profile's own roll state.
    #[must_use]
    pub fn expected_damage(&self, ac: f64) -> f64 {
        self.expected_damage_with(ac, self.advantage, |_| 1.0)
    }

    /// Expected damage per turn against a target, honouring its damage
    /// resistances, immunities and vulnerabilities.
    #[must_use]
    pub fn expected_damage_against(&self, target: &Target, advantage: Advantage) -> f64 {
        self.expected_damage_with(f64::from(target.armor_class), advantage, |t| {
            target.damage_factor(t)
        })
    }

    /// Expected damage with a per-type damage factor.
    ///
    /// Per-hit terms use [`expected_attack_damage`] once per attack;
    /// once-per-turn terms land on the first hit, whose crit chance is the
    /// per-hit crit share.
    #[must_use]
    pub fn expected_damage_with<F: Fn(DamageType) -> f64>(
        &self,
        ac: f64,
        advantage: Advantage,
        factor: F,
    ) -> f64 {
        if self.attacks == 0 {
            return 0.0;
        }
        let odds = self.odds(ac, advantage);
        let any_hit = multi_attack_hit_probability(odds.hit, self.attacks);
        let crit_share = if odds.hit > 0.0 { odds.crit / odds.hit } else { 0.0 };
        let attacks = f64::from(self.attacks);

        self.modifiers
            .iter()
            .map(|m| {
                let dice = m.expected_dice();
                let flat = m.expected_flat();
                let per_type = factor(m.damage_type);
                if m.once_per_turn {
                    per_type * any_hit * (dice * (1.0 + crit_share) + flat)
                } else {
                    per_type * attacks * expected_attack_damage(odds, dice, flat)
                }
            })
            .sum()
    }
}
