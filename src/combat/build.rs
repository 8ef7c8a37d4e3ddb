//! Character build description.
//!
//! Pure data supplied by collaborators. Validation happens once, before any
//! simulation or analysis consumes it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::DamageType;
use crate::dice::{Advantage, DiceExpr};
use crate::error::{SimError, SimResult};

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// STR
    Strength,
    /// DEX
    Dexterity,
    /// CON
    Constitution,
    /// INT
    Intelligence,
    /// WIS
    Wisdom,
    /// CHA
    Charisma,
}

/// Ability score block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AbilityScores {
    /// Strength.
    #[validate(range(min = 1, max = 30))]
    pub strength: u8,
    /// Dexterity.
    #[validate(range(min = 1, max = 30))]
    pub dexterity: u8,
    /// Constitution.
    #[validate(range(min = 1, max = 30))]
    pub constitution: u8,
    /// Intelligence.
    #[validate(range(min = 1, max = 30))]
    pub intelligence: u8,
    /// Wisdom.
    #[validate(range(min = 1, max = 30))]
    pub wisdom: u8,
    /// Charisma.
    #[validate(range(min = 1, max = 30))]
    pub charisma: u8,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    /// Raw score.
    #[must_use]
    pub const fn score(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Modifier, `floor((score - 10) / 2)`.
    #[must_use]
    pub fn modifier(&self, ability: Ability) -> i32 {
        (i32::from(self.score(ability)) - 10).div_euclid(2)
    }
}

/// Character classes with built-in progression tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    /// Barbarian
    Barbarian,
    /// Bard
    Bard,
    /// Cleric
    Cleric,
    /// Druid
    Druid,
    /// Fighter
    Fighter,
    /// Monk
    Monk,
    /// Paladin
    Paladin,
    /// Ranger
    Ranger,
    /// Rogue
    Rogue,
    /// Sorcerer
    Sorcerer,
    /// Warlock
    Warlock,
    /// Wizard
    Wizard,
}

/// Levels taken in one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClassLevel {
    /// Class.
    pub class: CharacterClass,
    /// Subclass name, e.g. "Battle Master".
    #[serde(default)]
    pub subclass: Option<String>,
    /// Levels in this class.
    #[validate(range(min = 1, max = 20))]
    pub level: u32,
}

impl ClassLevel {
    /// Class level without subclass.
    #[must_use]
    pub const fn new(class: CharacterClass, level: u32) -> Self {
        Self {
            class,
            subclass: None,
            level,
        }
    }

    /// Attach a subclass.
    #[must_use]
    pub fn with_subclass(mut self, subclass: impl Into<String>) -> Self {
        self.subclass = Some(subclass.into());
        self
    }
}

/// Primary weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Weapon {
    /// Display name.
    pub name: String,
    /// Damage dice, e.g. `2d6`.
    pub damage: DiceExpr,
    /// Flat damage per hit (ability modifier and magic included).
    #[serde(default)]
    pub damage_bonus: i32,
    /// Damage type.
    #[serde(default = "default_weapon_damage_type")]
    pub damage_type: DamageType,
    /// Lowest d20 face that crits.
    #[validate(range(min = 2, max = 20))]
    #[serde(default = "default_crit_range")]
    pub crit_range: u32,
    /// Reroll 1s and 2s on damage dice once.
    #[serde(default)]
    pub great_weapon_fighting: bool,
    /// Ability used for attack and damage when deriving bonuses per level.
    #[serde(default = "default_weapon_ability")]
    pub ability: Ability,
    /// Magic bonus to attack and damage used when deriving bonuses per level.
    #[validate(range(min = 0, max = 3))]
    #[serde(default)]
    pub enhancement: i32,
}

const fn default_weapon_damage_type() -> DamageType {
    DamageType::Slashing
}

const fn default_crit_range() -> u32 {
    20
}

const fn default_weapon_ability() -> Ability {
    Ability::Strength
}

impl Weapon {
    /// Weapon with default crit range and no extras.
    #[must_use]
    pub fn new(name: impl Into<String>, damage: DiceExpr, damage_bonus: i32) -> Self {
        Self {
            name: name.into(),
            damage,
            damage_bonus,
            damage_type: DamageType::Slashing,
            crit_range: 20,
            great_weapon_fighting: false,
            ability: Ability::Strength,
            enhancement: 0,
        }
    }
}

/// Bonus damage usable on one hit per turn (Sneak Attack style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OncePerTurnDamage {
    /// Feature name.
    pub name: String,
    /// Damage dice.
    pub dice: DiceExpr,
    /// Damage type.
    #[serde(default = "default_weapon_damage_type")]
    pub damage_type: DamageType,
    /// Apply on every qualifying hit instead of the first.
    #[serde(default)]
    pub allow_repeat: bool,
}

/// What a resource-spending rider consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceCost {
    /// Lowest available spell slot at or above `min_level`.
    SpellSlot {
        /// Minimum slot level.
        min_level: u32,
    },
    /// One use of a named class resource.
    ClassResource {
        /// Resource key in `Build::class_resources`.
        name: String,
    },
}

/// When a resource-spending rider fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderTrigger {
    /// Never spend.
    Never,
    /// Only on critical hits.
    #[default]
    OnCrit,
    /// On every hit while resources last.
    Always,
}

/// Bonus damage that spends a resource (smite style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDamage {
    /// Feature name.
    pub name: String,
    /// Base damage dice.
    pub dice: DiceExpr,
    /// Extra dice per spell-slot level above the minimum.
    #[serde(default)]
    pub per_slot_level: Option<DiceExpr>,
    /// Damage type.
    #[serde(default = "default_rider_damage_type")]
    pub damage_type: DamageType,
    /// What one use costs.
    pub cost: ResourceCost,
    /// Spending policy.
    #[serde(default)]
    pub trigger: RiderTrigger,
}

const fn default_rider_damage_type() -> DamageType {
    DamageType::Radiant
}

/// Attack made with the bonus action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BonusAttack {
    /// Display name.
    pub name: String,
    /// Attack bonus.
    #[validate(range(min = -10, max = 30))]
    pub attack_bonus: i32,
    /// Damage dice.
    pub damage: DiceExpr,
    /// Flat damage.
    #[serde(default)]
    pub damage_bonus: i32,
    /// Damage type.
    #[serde(default = "default_weapon_damage_type")]
    pub damage_type: DamageType,
}

/// How a spell resolves against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpellResolution {
    /// Spell attack roll.
    Attack,
    /// Target saving throw.
    Save {
        /// Saving throw ability.
        ability: Ability,
        /// Half damage on a successful save.
        #[serde(default)]
        half_on_save: bool,
    },
    /// No roll (automatic or rider-only).
    Automatic,
}

/// Concentration rider added to weapon hits while the spell lasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ConcentrationRider {
    /// Extra damage per weapon hit.
    pub dice: DiceExpr,
    /// Damage type.
    #[serde(default = "default_rider_damage_type")]
    pub damage_type: DamageType,
    /// Duration in rounds.
    #[validate(range(min = 1))]
    pub duration: u32,
}

/// Spell the build can cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Spell {
    /// Spell name.
    pub name: String,
    /// Spell level, 0 for cantrips.
    #[validate(range(max = 9))]
    pub level: u32,
    /// Damage on a full effect.
    pub damage: DiceExpr,
    /// Damage type.
    #[serde(default = "default_spell_damage_type")]
    pub damage_type: DamageType,
    /// Resolution rule.
    pub resolution: SpellResolution,
    /// Concentration rider started by the cast.
    #[validate(nested)]
    #[serde(default)]
    pub concentration: Option<ConcentrationRider>,
    /// Cast with the bonus action instead of the action.
    #[serde(default)]
    pub bonus_action: bool,
}

const fn default_spell_damage_type() -> DamageType {
    DamageType::Force
}

/// When a class resource comes back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recharge {
    /// Short or long rest.
    ShortRest,
    /// Long rest only.
    #[default]
    LongRest,
}

/// Limited-use class resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassResource {
    /// Uses when fully rested.
    pub uses: u32,
    /// Recharge rule.
    #[serde(default)]
    pub recharge: Recharge,
}

/// Racial or feat flags that change d20 mechanics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Roll three dice with advantage.
    #[serde(default)]
    pub elven_accuracy: bool,
    /// Reroll natural 1s once.
    #[serde(default)]
    pub halfling_luck: bool,
}

/// Tactical policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Spend Action Surge in the first round of an encounter.
    #[serde(default = "default_true")]
    pub use_action_surge: bool,
    /// Drink a potion below half hit points.
    #[serde(default = "default_true")]
    pub drink_potions: bool,
    /// Dash when nothing offensive is available instead of failing.
    #[serde(default)]
    pub allow_pass: bool,
    /// Take opportunity attacks when provoked.
    #[serde(default = "default_true")]
    pub opportunity_attacks: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            use_action_surge: true,
            drink_potions: true,
            allow_pass: false,
            opportunity_attacks: true,
        }
    }
}

/// Name of the class resource that grants an extra action.
pub const ACTION_SURGE: &str = "action_surge";

/// Most spell slots a build may hold at one slot level.
pub const MAX_SLOTS_PER_LEVEL: u32 = 10;

/// Complete build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Build {
    /// Display name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Ability scores.
    #[validate(nested)]
    #[serde(default)]
    pub abilities: AbilityScores,
    /// Class levels in the order they were taken.
    #[validate(length(min = 1), nested)]
    pub class_levels: Vec<ClassLevel>,
    /// Weapon attack bonus.
    #[validate(range(min = -10, max = 30))]
    pub attack_bonus: i32,
    /// Weapon attacks per Attack action.
    #[validate(range(max = 8))]
    pub attacks_per_action: u32,
    /// Primary weapon.
    #[validate(nested)]
    #[serde(default)]
    pub weapon: Option<Weapon>,
    /// Once-per-turn bonus damage.
    #[serde(default)]
    pub once_per_turn: Vec<OncePerTurnDamage>,
    /// Resource-spending bonus damage.
    #[serde(default)]
    pub resource_damage: Vec<ResourceDamage>,
    /// Bonus action attack.
    #[validate(nested)]
    #[serde(default)]
    pub bonus_attack: Option<BonusAttack>,
    /// Known damaging or rider spells.
    #[validate(nested)]
    #[serde(default)]
    pub spells: Vec<Spell>,
    /// Spell attack bonus.
    #[serde(default)]
    pub spell_attack_bonus: i32,
    /// Spell save DC.
    #[validate(range(max = 30))]
    #[serde(default)]
    pub spell_save_dc: u32,
    /// Spell slots per level (index 0 = 1st level).
    #[serde(default)]
    pub spell_slots: [u32; 9],
    /// Limited-use class resources.
    #[serde(default)]
    pub class_resources: IndexMap<String, ClassResource>,
    /// Maximum hit points.
    #[validate(range(min = 1))]
    pub hit_points: u32,
    /// Healing potions carried.
    #[serde(default)]
    pub potions: u32,
    /// Walking speed in feet.
    #[serde(default = "default_speed")]
    pub speed: u32,
    /// d20 feature flags.
    #[serde(default)]
    pub features: FeatureFlags,
    /// Baseline roll state for attacks.
    #[serde(default)]
    pub advantage: Advantage,
    /// Tactical policy.
    #[serde(default)]
    pub policy: ActionPolicy,
}

const fn default_speed() -> u32 {
    30
}

impl Build {
    /// Sum of class levels.
    #[must_use]
    pub fn total_level(&self) -> u32 {
        self.class_levels.iter().map(|c| c.level).sum()
    }

    /// Levels in a class (0 if absent).
    #[must_use]
    pub fn class_level(&self, class: CharacterClass) -> u32 {
        self.class_levels
            .iter()
            .filter(|c| c.class == class)
            .map(|c| c.level)
            .sum()
    }

    /// Constitution save bonus used for concentration checks.
    #[must_use]
    pub fn concentration_bonus(&self) -> i32 {
        self.abilities.modifier(Ability::Constitution)
    }

    /// Whether anything can deal damage with the action.
    #[must_use]
    pub fn has_offense(&self) -> bool {
        self.weapon.is_some() || self.spells.iter().any(|s| !s.bonus_action)
    }

    /// Declarative and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for declarative violations and `InvalidInput`
    /// for cross-field problems.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;

        for (i, rider) in self.resource_damage.iter().enumerate() {
            match &rider.cost {
                ResourceCost::SpellSlot { min_level } => {
                    if !(1..=9).contains(min_level) {
                        return Err(SimError::invalid_input(
                            format!("build.resource_damage[{i}].cost.min_level"),
                            "must be between 1 and 9",
                        ));
                    }
                }
                ResourceCost::ClassResource { name } => {
                    if !self.class_resources.contains_key(name) {
                        return Err(SimError::invalid_input(
                            format!("build.resource_damage[{i}].cost.name"),
                            format!("unknown class resource '{name}'"),
                        ));
                    }
                }
            }
        }

        if let Some(level) = self
            .spell_slots
            .iter()
            .position(|&slots| slots > MAX_SLOTS_PER_LEVEL)
        {
            return Err(SimError::invalid_input(
                format!("build.spell_slots[{level}]"),
                format!("at most {MAX_SLOTS_PER_LEVEL} slots per level"),
            ));
        }

        if self.total_level() > 20 {
            return Err(SimError::invalid_input(
                "build.class_levels",
                format!("total level {} exceeds 20", self.total_level()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Level 5 greatsword fighter.
    pub fn fighter() -> Build {
        let mut class_resources = IndexMap::new();
        class_resources.insert(
            ACTION_SURGE.to_string(),
            ClassResource {
                uses: 1,
                recharge: Recharge::ShortRest,
            },
        );
        Build {
            name: "Greatsword Fighter".to_string(),
            abilities: AbilityScores {
                strength: 18,
                constitution: 14,
                ..AbilityScores::default()
            },
            class_levels: vec![ClassLevel::new(CharacterClass::Fighter, 5)],
            attack_bonus: 7,
            attacks_per_action: 2,
            weapon: Some(Weapon {
                great_weapon_fighting: true,
                ..Weapon::new("Greatsword", DiceExpr::dice(2, 6), 4)
            }),
            once_per_turn: Vec::new(),
            resource_damage: Vec::new(),
            bonus_attack: None,
            spells: Vec::new(),
            spell_attack_bonus: 0,
            spell_save_dc: 0,
            spell_slots: [0; 9],
            class_resources,
            hit_points: 44,
            potions: 0,
            speed: 30,
            features: FeatureFlags::default(),
            advantage: Advantage::Normal,
            policy: ActionPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::fighter;
    use super::*;

    #[test]
    fn test_ability_modifier() {
        let scores = AbilityScores {
            strength: 18,
            dexterity: 9,
            constitution: 1,
            ..AbilityScores::default()
        };
        assert_eq!(scores.modifier(Ability::Strength), 4);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), -5);
        assert_eq!(scores.modifier(Ability::Wisdom), 0);
    }

    #[test]
    fn test_fixture_is_valid() {
        assert!(fighter().check().is_ok());
    }

    #[test]
    fn test_rejects_empty_class_levels() {
        let mut build = fighter();
        build.class_levels.clear();
        assert!(matches!(build.check(), Err(SimError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_crit_range() {
        let mut build = fighter();
        if let Some(weapon) = build.weapon.as_mut() {
            weapon.crit_range = 1;
        }
        assert!(matches!(build.check(), Err(SimError::Validation(_))));
    }

    #[test]
    fn test_rejects_unknown_resource() {
        let mut build = fighter();
        build.resource_damage.push(ResourceDamage {
            name: "Stunning Smite".to_string(),
            dice: DiceExpr::dice(1, 6),
            per_slot_level: None,
            damage_type: DamageType::Radiant,
            cost: ResourceCost::ClassResource {
                name: "ki".to_string(),
            },
            trigger: RiderTrigger::Always,
        });
        assert!(matches!(build.check(), Err(SimError::InvalidInput { .. })));
    }

    #[test]
    fn test_rejects_oversized_spell_slots() {
        let mut build = fighter();
        build.spell_slots = [4, 3, 3, 3, 2, 1, 1, 1, MAX_SLOTS_PER_LEVEL];
        assert!(build.check().is_ok());
        build.spell_slots[8] = u32::MAX;
        let err = build.check().unwrap_err();
        assert!(matches!(err, SimError::InvalidInput { .. }));
        assert!(err.to_string().contains("spell_slots[8]"));
    }

    #[test]
    fn test_rejects_level_over_twenty() {
        let mut build = fighter();
        build.class_levels.push(ClassLevel::new(CharacterClass::Rogue, 16));
        assert!(matches!(build.check(), Err(SimError::InvalidInput { .. })));
    }

    #[test]
    fn test_class_level_lookup() {
        let mut build = fighter();
        build
            .class_levels
            .push(ClassLevel::new(CharacterClass::Rogue, 3).with_subclass("Arcane Trickster"));
        assert_eq!(build.total_level(), 8);
        assert_eq!(build.class_level(CharacterClass::Rogue), 3);
        assert_eq!(build.class_level(CharacterClass::Wizard), 0);
    }

    #[test]
    fn test_deserialize_yaml_build() {
        let yaml = r#"
name: Rogue
class_levels:
  - class: rogue
    level: 5
attack_bonus: 7
attacks_per_action: 1
weapon:
  name: Rapier
  damage: 1d8
  damage_bonus: 4
  damage_type: piercing
  ability: dexterity
once_per_turn:
  - name: Sneak Attack
    dice: 3d6
hit_points: 38
"#;
        let build: Build = serde_yaml::from_str(yaml).unwrap();
        assert!(build.check().is_ok());
        assert_eq!(build.once_per_turn[0].dice, DiceExpr::dice(3, 6));
        assert_eq!(build.weapon.as_ref().map(|w| w.crit_range), Some(20));
        assert!(build.policy.opportunity_attacks);
    }
}
