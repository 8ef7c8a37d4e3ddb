//! Class progression tables.
//!
//! [`ProgressionTables`] is the seam for rules data. [`StandardTables`]
//! carries the twelve SRD classes; callers with homebrew or newer rules
//! supply their own implementation.

use serde::{Deserialize, Serialize};

use crate::combat::CharacterClass;

/// How a class contributes to spellcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasterProgression {
    /// No spell slots.
    None,
    /// Full caster level per class level.
    Full,
    /// Half caster (Paladin, Ranger).
    Half,
    /// Third caster (Eldritch Knight, Arcane Trickster).
    Third,
    /// Separate pact slots (Warlock).
    Pact,
}

/// Warlock pact slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PactSlots {
    /// Number of slots.
    pub count: u32,
    /// Level of every slot.
    pub slot_level: u32,
}

/// Rules data the progression analyzer consults.
pub trait ProgressionTables {
    /// Hit die size.
    fn hit_die(&self, class: CharacterClass) -> u32;

    /// Attacks per Attack action at `level` in the class.
    fn attacks_per_action(&self, class: CharacterClass, subclass: Option<&str>, level: u32) -> u32;

    /// Whether reaching `level` in the class grants an Ability Score Improvement.
    fn is_asi_level(&self, class: CharacterClass, level: u32) -> bool;

    /// Spellcasting contribution of the class.
    fn caster_progression(&self, class: CharacterClass, subclass: Option<&str>) -> CasterProgression;

    /// Spell slots per level for a (multiclass) caster level.
    fn spell_slots(&self, caster_level: u32) -> [u32; 9];

    /// Pact slots at a warlock level.
    fn pact_slots(&self, warlock_level: u32) -> Option<PactSlots>;

    /// Features gained on reaching exactly `level` in the class.
    fn features(&self, class: CharacterClass, subclass: Option<&str>, level: u32) -> Vec<String>;
}

/// SRD progression tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTables;

/// Slots by caster level 1..=20.
const SPELL_SLOTS: [[u32; 9]; 20] = [
    [2, 0, 0, 0, 0, 0, 0, 0, 0],
    [3, 0, 0, 0, 0, 0, 0, 0, 0],
    [4, 2, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 2, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 1, 0, 0, 0, 0, 0],
    [4, 3, 3, 2, 0, 0, 0, 0, 0],
    [4, 3, 3, 3, 1, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 2, 1, 1],
];

/// `(count, slot level)` by warlock level 1..=20.
const PACT_SLOTS: [(u32, u32); 20] = [
    (1, 1),
    (2, 1),
    (2, 2),
    (2, 2),
    (2, 3),
    (2, 3),
    (2, 4),
    (2, 4),
    (2, 5),
    (2, 5),
    (3, 5),
    (3, 5),
    (3, 5),
    (3, 5),
    (3, 5),
    (3, 5),
    (4, 5),
    (4, 5),
    (4, 5),
    (4, 5),
];

const ASI_LEVELS: [u32; 5] = [4, 8, 12, 16, 19];

/// Case-insensitive subclass match.
pub(crate) fn subclass_is(subclass: Option<&str>, needle: &str) -> bool {
    subclass.is_some_and(|s| s.to_ascii_lowercase().contains(needle))
}

impl ProgressionTables for StandardTables {
    fn hit_die(&self, class: CharacterClass) -> u32 {
        use CharacterClass::{
            Barbarian, Bard, Cleric, Druid, Fighter, Monk, Paladin, Ranger, Rogue, Sorcerer,
            Warlock, Wizard,
        };
        match class {
            Barbarian => 12,
            Fighter | Paladin | Ranger => 10,
            Bard | Cleric | Druid | Monk | Rogue | Warlock => 8,
            Sorcerer | Wizard => 6,
        }
    }

    fn attacks_per_action(&self, class: CharacterClass, subclass: Option<&str>, level: u32) -> u32 {
        match class {
            CharacterClass::Fighter => match level {
                20.. => 4,
                11.. => 3,
                5.. => 2,
                _ => 1,
            },
            CharacterClass::Barbarian
            | CharacterClass::Monk
            | CharacterClass::Paladin
            | CharacterClass::Ranger => {
                if level >= 5 {
                    2
                } else {
                    1
                }
            }
            CharacterClass::Bard
                if level >= 6 && (subclass_is(subclass, "valor") || subclass_is(subclass, "swords")) =>
            {
                2
            }
            CharacterClass::Wizard if level >= 6 && subclass_is(subclass, "bladesing") => 2,
            _ => 1,
        }
    }

    fn is_asi_level(&self, class: CharacterClass, level: u32) -> bool {
        ASI_LEVELS.contains(&level)
            || (class == CharacterClass::Fighter && matches!(level, 6 | 14))
            || (class == CharacterClass::Rogue && level == 10)
    }

    fn caster_progression(&self, class: CharacterClass, subclass: Option<&str>) -> CasterProgression {
        match class {
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Sorcerer
            | CharacterClass::Wizard => CasterProgression::Full,
            CharacterClass::Paladin | CharacterClass::Ranger => CasterProgression::Half,
            CharacterClass::Warlock => CasterProgression::Pact,
            CharacterClass::Fighter if subclass_is(subclass, "eldritch knight") => {
                CasterProgression::Third
            }
            CharacterClass::Rogue if subclass_is(subclass, "arcane trickster") => {
                CasterProgression::Third
            }
            _ => CasterProgression::None,
        }
    }

    fn spell_slots(&self, caster_level: u32) -> [u32; 9] {
        match caster_level {
            0 => [0; 9],
            level => SPELL_SLOTS[(level.min(20) - 1) as usize],
        }
    }

    fn pact_slots(&self, warlock_level: u32) -> Option<PactSlots> {
        match warlock_level {
            0 => None,
            level => {
                let (count, slot_level) = PACT_SLOTS[(level.min(20) - 1) as usize];
                Some(PactSlots { count, slot_level })
            }
        }
    }

    fn features(&self, class: CharacterClass, subclass: Option<&str>, level: u32) -> Vec<String> {
        let mut features: Vec<&str> = class_features(class, level).to_vec();

        if class == CharacterClass::Fighter && subclass_is(subclass, "champion") {
            match level {
                3 => features.push("Improved Critical"),
                15 => features.push("Superior Critical"),
                _ => {}
            }
        }
        if class == CharacterClass::Fighter && subclass_is(subclass, "battle master") {
            match level {
                3 => features.push("Combat Superiority"),
                10 => features.push("Improved Combat Superiority (d10)"),
                18 => features.push("Improved Combat Superiority (d12)"),
                _ => {}
            }
        }
        if self.attacks_per_action(class, subclass, level)
            > self.attacks_per_action(class, subclass, level.saturating_sub(1))
            && !features.iter().any(|f| f.starts_with("Extra Attack"))
        {
            features.push("Extra Attack");
        }
        if self.is_asi_level(class, level) {
            features.push("Ability Score Improvement");
        }

        features.into_iter().map(str::to_string).collect()
    }
}

fn class_features(class: CharacterClass, level: u32) -> &'static [&'static str] {
    use CharacterClass::{
        Barbarian, Bard, Cleric, Druid, Fighter, Monk, Paladin, Ranger, Rogue, Sorcerer, Warlock,
        Wizard,
    };
    match (class, level) {
        (Barbarian, 1) => &["Rage", "Unarmored Defense"],
        (Barbarian, 2) => &["Reckless Attack", "Danger Sense"],
        (Barbarian, 5) => &["Extra Attack", "Fast Movement"],
        (Barbarian, 9) => &["Brutal Critical"],
        (Bard, 1) => &["Spellcasting", "Bardic Inspiration"],
        (Bard, 5) => &["Font of Inspiration"],
        (Cleric, 1) => &["Spellcasting"],
        (Cleric, 2) => &["Channel Divinity"],
        (Cleric, 5) => &["Destroy Undead"],
        (Druid, 1) => &["Spellcasting", "Druidic"],
        (Druid, 2) => &["Wild Shape"],
        (Fighter, 1) => &["Fighting Style", "Second Wind"],
        (Fighter, 2) => &["Action Surge"],
        (Fighter, 5) => &["Extra Attack"],
        (Fighter, 9) => &["Indomitable"],
        (Fighter, 11) => &["Extra Attack (2)"],
        (Fighter, 20) => &["Extra Attack (3)"],
        (Monk, 1) => &["Martial Arts", "Unarmored Defense"],
        (Monk, 2) => &["Ki"],
        (Monk, 5) => &["Extra Attack", "Stunning Strike"],
        (Monk, 6) => &["Ki-Empowered Strikes"],
        (Paladin, 1) => &["Divine Sense", "Lay on Hands"],
        (Paladin, 2) => &["Fighting Style", "Spellcasting", "Divine Smite"],
        (Paladin, 5) => &["Extra Attack"],
        (Paladin, 11) => &["Improved Divine Smite"],
        (Ranger, 1) => &["Favored Enemy", "Natural Explorer"],
        (Ranger, 2) => &["Fighting Style", "Spellcasting"],
        (Ranger, 5) => &["Extra Attack"],
        (Rogue, 1) => &["Sneak Attack", "Expertise"],
        (Rogue, 2) => &["Cunning Action"],
        (Rogue, 5) => &["Uncanny Dodge"],
        (Rogue, 7) => &["Evasion"],
        (Sorcerer, 1) => &["Spellcasting"],
        (Sorcerer, 2) => &["Font of Magic"],
        (Sorcerer, 3) => &["Metamagic"],
        (Warlock, 1) => &["Pact Magic"],
        (Warlock, 2) => &["Eldritch Invocations"],
        (Warlock, 3) => &["Pact Boon"],
        (Warlock, 11) => &["Mystic Arcanum"],
        (Wizard, 1) => &["Spellcasting", "Arcane Recovery"],
        (Wizard, 18) => &["Spell Mastery"],
        _ => &[],
    }
}
