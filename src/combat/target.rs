//! Target the build fights against.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Ability, DamageType};
use crate::error::SimResult;

/// Saving throw bonuses by ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveBonuses {
    /// STR save.
    #[serde(default)]
    pub strength: i32,
    /// DEX save.
    #[serde(default)]
    pub dexterity: i32,
    /// CON save.
    #[serde(default)]
    pub constitution: i32,
    /// INT save.
    #[serde(default)]
    pub intelligence: i32,
    /// WIS save.
    #[serde(default)]
    pub wisdom: i32,
    /// CHA save.
    #[serde(default)]
    pub charisma: i32,
}

impl SaveBonuses {
    /// Same bonus for every ability.
    #[must_use]
    pub const fn uniform(bonus: i32) -> Self {
        Self {
            strength: bonus,
            dexterity: bonus,
            constitution: bonus,
            intelligence: bonus,
            wisdom: bonus,
            charisma: bonus,
        }
    }

    /// Bonus for one ability.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }
}

/// Enemy statistics relevant to damage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Target {
    /// Display name.
    #[serde(default = "default_target_name")]
    pub name: String,
    /// Armor class.
    #[validate(range(min = 1, max = 40))]
    pub armor_class: u32,
    /// Hit points per encounter.
    #[validate(range(min = 1))]
    pub hit_points: u32,
    /// Saving throw bonuses.
    #[serde(default)]
    pub saves: SaveBonuses,
    /// Damage types dealt half.
    #[serde(default)]
    pub resistances: Vec<DamageType>,
    /// Damage types ignored.
    #[serde(default)]
    pub immunities: Vec<DamageType>,
    /// Damage types doubled.
    #[serde(default)]
    pub vulnerabilities: Vec<DamageType>,
    /// Failed saves it may turn into successes per encounter.
    #[validate(range(max = 5))]
    #[serde(default)]
    pub legendary_resistances: u32,
    /// Advantage on saves against spells.
    #[serde(default)]
    pub magic_resistance: bool,
}

fn default_target_name() -> String {
    "Target".to_string()
}

impl Target {
    /// Target with only AC and HP set.
    #[must_use]
    pub fn new(armor_class: u32, hit_points: u32) -> Self {
        Self {
            name: default_target_name(),
            armor_class,
            hit_points,
            saves: SaveBonuses::default(),
            resistances: Vec::new(),
            immunities: Vec::new(),
            vulnerabilities: Vec::new(),
            legendary_resistances: 0,
            magic_resistance: false,
        }
    }

    /// Declarative validation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when a field is out of range.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        Ok(())
    }

    /// Damage multiplier for a type: 0, 0.5, 1, 2 (or 1 when resisted and vulnerable).
    #[must_use]
    pub fn damage_factor(&self, damage_type: DamageType) -> f64 {
        if self.immunities.contains(&damage_type) {
            return 0.0;
        }
        let mut factor = 1.0;
        if self.resistances.contains(&damage_type) {
            factor *= 0.5;
        }
        if self.vulnerabilities.contains(&damage_type) {
            factor *= 2.0;
        }
        factor
    }

    /// Apply immunity, resistance (rounded down) then vulnerability to rolled damage.
    #[must_use]
    pub fn modify_damage(&self, amount: i64, damage_type: DamageType) -> i64 {
        if amount <= 0 || self.immunities.contains(&damage_type) {
            return 0;
        }
        let mut amount = amount;
        if self.resistances.contains(&damage_type) {
            amount /= 2;
        }
        if self.vulnerabilities.contains(&damage_type) {
            amount *= 2;
        }
        amount
    }
}
