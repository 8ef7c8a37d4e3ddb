//! Deterministic level-by-level analysis.
//!
//! For every character level 1–20 the analyzer rescales the build's class
//! levels, looks up its progression in a [`ProgressionTables`] implementation
//! and estimates damage per round in closed form against a [`TargetCurve`].
//! No random numbers are drawn.
//!
//! # Class distribution
//!
//! A build above the analyzed level has each class scaled by
//! `level / total`, rounded down but never below 1; the final class takes
//! whatever remains. A build below the analyzed level grows its final class.
//!
//! # Damage per round
//!
//! `max(weapon, spell) + off_turn`, where
//! - weapon: Attack action with class riders (Sneak Attack, Rage, Improved
//!   Divine Smite) plus the Martial Arts bonus attack,
//! - spell: the best damage cantrip the classes provide,
//! - off-turn: opportunity attacks and Riposte, weighted by trigger chance.

pub mod tables;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use tables::{CasterProgression, PactSlots, ProgressionTables, StandardTables};

use crate::combat::{Ability, Build, CharacterClass, ClassLevel, DamageType};
use crate::config::ProgressionConfig;
use crate::dice::{Advantage, DiceExpr};
use crate::error::SimResult;
use crate::optimizer::{AttackSequence, DamageModifier};
use crate::probability::{expected_attack_damage, save_fail_probability, AttackOdds};
use tables::subclass_is;

/// Highest character level analyzed.
pub const MAX_LEVEL: u32 = 20;

/// Proficiency bonus at a character level.
#[must_use]
pub const fn proficiency_bonus(level: u32) -> u32 {
    2 + level.saturating_sub(1) / 4
}

/// Typical target armor class and save bonus per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCurve {
    /// Armor class at levels 1..=20.
    pub armor_class: Vec<f64>,
    /// Save bonus at levels 1..=20.
    pub save_bonus: Vec<f64>,
}

impl Default for TargetCurve {
    fn default() -> Self {
        let armor_class = (1..=MAX_LEVEL)
            .map(|level| match level {
                1..=3 => 13.0,
                4 => 14.0,
                5..=7 => 15.0,
                8..=9 => 16.0,
                10..=12 => 17.0,
                13..=16 => 18.0,
                _ => 19.0,
            })
            .collect();
        let save_bonus = (1..=MAX_LEVEL)
            .map(|level| f64::from(2 + (level - 1) / 3))
            .collect();
        Self {
            armor_class,
            save_bonus,
        }
    }
}

impl TargetCurve {
    /// Same AC and save bonus at every level.
    #[must_use]
    pub fn flat(armor_class: f64, save_bonus: f64) -> Self {
        Self {
            armor_class: vec![armor_class; MAX_LEVEL as usize],
            save_bonus: vec![save_bonus; MAX_LEVEL as usize],
        }
    }

    /// AC at `level`; the last entry repeats past the end.
    #[must_use]
    pub fn armor_class(&self, level: u32) -> f64 {
        lookup(&self.armor_class, level)
    }

    /// Save bonus at `level`; the last entry repeats past the end.
    #[must_use]
    pub fn save_bonus(&self, level: u32) -> f64 {
        lookup(&self.save_bonus, level)
    }
}

fn lookup(values: &[f64], level: u32) -> f64 {
    let index = (level.max(1) - 1) as usize;
    values
        .get(index)
        .or_else(|| values.last())
        .copied()
        .unwrap_or(0.0)
}

/// Damage per round split by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DprBreakdown {
    /// Attack action plus bonus-action attacks.
    pub weapon: f64,
    /// Best damage cantrip.
    pub spell: f64,
    /// Reactions on other creatures' turns.
    pub off_turn: f64,
    /// `max(weapon, spell) + off_turn`.
    pub total: f64,
}

/// Damage per round under each roll state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DprByAdvantage {
    /// Straight rolls.
    pub normal: DprBreakdown,
    /// Advantage on attack rolls.
    pub advantage: DprBreakdown,
    /// Disadvantage on attack rolls.
    pub disadvantage: DprBreakdown,
}

impl DprByAdvantage {
    /// Breakdown for one roll state.
    #[must_use]
    pub const fn get(&self, advantage: Advantage) -> &DprBreakdown {
        match advantage {
            Advantage::Normal => &self.normal,
            Advantage::Advantage => &self.advantage,
            Advantage::Disadvantage => &self.disadvantage,
        }
    }
}

/// Notable power spike at a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakpoint {
    /// Attacks per action went up.
    ExtraAttack {
        /// New attacks per action.
        attacks: u32,
    },
    /// A class reached an ASI level.
    AbilityScoreImprovement {
        /// The class.
        class: CharacterClass,
    },
    /// A higher spell slot level became available.
    SpellTier {
        /// New highest slot level.
        slot_level: u32,
    },
}

/// Snapshot of one character level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAnalysis {
    /// Character level.
    pub level: u32,
    /// Class levels at this character level.
    pub class_levels: Vec<ClassLevel>,
    /// Proficiency bonus.
    pub proficiency_bonus: u32,
    /// Hit points with average rolls after first level.
    pub average_hit_points: u32,
    /// Hit points with maximum rolls.
    pub max_hit_points: u32,
    /// Attacks per Attack action.
    pub attacks_per_action: u32,
    /// Spell slots per level, pact slots included.
    pub spell_slots: [u32; 9],
    /// Target AC used.
    pub target_armor_class: f64,
    /// Target save bonus used.
    pub target_save_bonus: f64,
    /// Damage per round.
    pub dpr: DprByAdvantage,
    /// Features gained at this level.
    pub features: Vec<String>,
    /// Power spikes at this level.
    pub breakpoints: Vec<Breakpoint>,
}

impl LevelAnalysis {
    /// Highest slot level with at least one slot (0 for none).
    #[must_use]
    pub fn highest_slot_level(&self) -> u32 {
        highest_slot(&self.spell_slots)
    }
}

fn highest_slot(slots: &[u32; 9]) -> u32 {
    slots
        .iter()
        .rposition(|&count| count > 0)
        .map_or(0, |i| i as u32 + 1)
}

/// Scale class levels to `target` total levels.
///
/// When `target` is below the number of classes, the earliest classes keep
/// one level each and the rest are dropped.
#[must_use]
pub fn distribute_levels(class_levels: &[ClassLevel], target: u32) -> Vec<ClassLevel> {
    let total: u32 = class_levels.iter().map(|c| c.level).sum();
    let Some(last) = class_levels.len().checked_sub(1) else {
        return Vec::new();
    };
    let target = target.max(1);

    if total <= target {
        let mut grown = class_levels.to_vec();
        grown[last].level += target - total;
        return grown;
    }

    if (target as usize) <= last {
        return class_levels[..target as usize]
            .iter()
            .map(|c| ClassLevel { level: 1, ..c.clone() })
            .collect();
    }

    let mut scaled: Vec<ClassLevel> = class_levels
        .iter()
        .map(|c| ClassLevel {
            level: (c.level * target / total).max(1),
            ..c.clone()
        })
        .collect();
    let others: u32 = scaled[..last].iter().map(|c| c.level).sum();
    scaled[last].level = target.saturating_sub(others).max(1);

    // Rounding every class up to 1 can overshoot; trim the largest.
    while scaled.iter().map(|c| c.level).sum::<u32>() > target {
        let Some(largest) = scaled
            .iter_mut()
            .filter(|c| c.level > 1)
            .max_by_key(|c| c.level)
        else {
            break;
        };
        largest.level -= 1;
    }
    scaled
}

fn level_in(class_levels: &[ClassLevel], class: CharacterClass) -> u32 {
    class_levels
        .iter()
        .filter(|c| c.class == class)
        .map(|c| c.level)
        .sum()
}

fn subclass_level(class_levels: &[ClassLevel], class: CharacterClass, needle: &str) -> u32 {
    class_levels
        .iter()
        .filter(|c| c.class == class && subclass_is(c.subclass.as_deref(), needle))
        .map(|c| c.level)
        .sum()
}

/// Cantrip tier by character level: 1, 2, 3 or 4.
const fn cantrip_tier(level: u32) -> u32 {
    match level {
        17.. => 4,
        11.. => 3,
        5.. => 2,
        _ => 1,
    }
}

const fn rage_damage(barbarian_level: u32) -> i32 {
    match barbarian_level {
        0 => 0,
        1..=8 => 2,
        9..=15 => 3,
        _ => 4,
    }
}

const fn martial_arts_die(monk_level: u32) -> u32 {
    match monk_level {
        17.. => 10,
        11.. => 8,
        5.. => 6,
        _ => 4,
    }
}

const fn superiority_die(battle_master_level: u32) -> u32 {
    match battle_master_level {
        18.. => 12,
        10.. => 10,
        _ => 8,
    }
}

/// Damage cantrip a class casts.
#[derive(Debug, Clone, Copy)]
enum Cantrip {
    EldritchBlast,
    FireBolt,
    ProduceFlame,
    SacredFlame,
    ViciousMockery,
}

impl Cantrip {
    fn for_class(class_level: &ClassLevel) -> Option<(Self, Ability)> {
        let subclass = class_level.subclass.as_deref();
        match class_level.class {
            CharacterClass::Warlock => Some((Self::EldritchBlast, Ability::Charisma)),
            CharacterClass::Sorcerer => Some((Self::FireBolt, Ability::Charisma)),
            CharacterClass::Wizard => Some((Self::FireBolt, Ability::Intelligence)),
            CharacterClass::Fighter if subclass_is(subclass, "eldritch knight") => {
                Some((Self::FireBolt, Ability::Intelligence))
            }
            CharacterClass::Rogue if subclass_is(subclass, "arcane trickster") => {
                Some((Self::FireBolt, Ability::Intelligence))
            }
            CharacterClass::Druid => Some((Self::ProduceFlame, Ability::Wisdom)),
            CharacterClass::Cleric => Some((Self::SacredFlame, Ability::Wisdom)),
            CharacterClass::Bard => Some((Self::ViciousMockery, Ability::Charisma)),
            _ => None,
        }
    }
}

/// Deterministic per-level analyzer.
#[derive(Debug, Clone)]
pub struct ProgressionAnalyzer<T: ProgressionTables = StandardTables> {
    tables: T,
    settings: ProgressionConfig,
    curve: TargetCurve,
}

impl Default for ProgressionAnalyzer<StandardTables> {
    fn default() -> Self {
        Self {
            tables: StandardTables,
            settings: ProgressionConfig::default(),
            curve: TargetCurve::default(),
        }
    }
}

impl ProgressionAnalyzer<StandardTables> {
    /// Analyzer over the standard tables.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a trigger chance lies outside `[0, 1]`.
    pub fn new(settings: ProgressionConfig) -> SimResult<Self> {
        Self::with_tables(StandardTables, settings)
    }
}

impl<T: ProgressionTables> ProgressionAnalyzer<T> {
    /// Analyzer over custom tables.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a trigger chance lies outside `[0, 1]`.
    pub fn with_tables(tables: T, settings: ProgressionConfig) -> SimResult<Self> {
        settings.validate()?;
        Ok(Self {
            tables,
            settings,
            curve: TargetCurve::default(),
        })
    }

    /// Replace the target curve.
    #[must_use]
    pub fn with_curve(mut self, curve: TargetCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Analyze levels 1 through 20.
    ///
    /// # Errors
    ///
    /// Returns the build's validation error.
    pub fn analyze(&self, build: &Build) -> SimResult<Vec<LevelAnalysis>> {
        build.check()?;

        let mut levels: Vec<LevelAnalysis> = Vec::with_capacity(MAX_LEVEL as usize);
        for level in 1..=MAX_LEVEL {
            let analysis = self.snapshot(build, level, levels.last());
            levels.push(analysis);
        }

        tracing::debug!(
            build = %build.name,
            dpr_1 = levels.first().map_or(0.0, |l| l.dpr.normal.total),
            dpr_20 = levels.last().map_or(0.0, |l| l.dpr.normal.total),
            "progression analyzed"
        );
        Ok(levels)
    }

    fn snapshot(&self, build: &Build, level: u32, previous: Option<&LevelAnalysis>) -> LevelAnalysis {
        let class_levels = distribute_levels(&build.class_levels, level);
        let proficiency = proficiency_bonus(level);
        let (average_hit_points, max_hit_points) = self.hit_points(build, &class_levels);
        let attacks_per_action = self.attacks_per_action(&class_levels);
        let spell_slots = self.spell_slots(&class_levels);
        let ac = self.curve.armor_class(level);
        let save = self.curve.save_bonus(level);

        let previous_classes = previous.map_or(&[][..], |p| p.class_levels.as_slice());
        let features = self.features(&class_levels, previous_classes);

        let mut breakpoints = Vec::new();
        let previous_attacks = previous.map_or(1, |p| p.attacks_per_action);
        if attacks_per_action > previous_attacks {
            breakpoints.push(Breakpoint::ExtraAttack {
                attacks: attacks_per_action,
            });
        }
        for class_level in &class_levels {
            let before = level_in(previous_classes, class_level.class);
            let now = level_in(&class_levels, class_level.class);
            if ((before + 1)..=now).any(|l| self.tables.is_asi_level(class_level.class, l)) {
                let breakpoint = Breakpoint::AbilityScoreImprovement {
                    class: class_level.class,
                };
                if !breakpoints.contains(&breakpoint) {
                    breakpoints.push(breakpoint);
                }
            }
        }
        let tier = highest_slot(&spell_slots);
        if tier > previous.map_or(0, LevelAnalysis::highest_slot_level) {
            breakpoints.push(Breakpoint::SpellTier { slot_level: tier });
        }

        let ctx = LevelContext {
            build,
            class_levels: &class_levels,
            level,
            proficiency: proficiency as i32,
            attacks: attacks_per_action,
            armor_class: ac,
            save_bonus: save,
        };
        let dpr = DprByAdvantage {
            normal: self.dpr(&ctx, Advantage::Normal),
            advantage: self.dpr(&ctx, Advantage::Advantage),
            disadvantage: self.dpr(&ctx, Advantage::Disadvantage),
        };

        LevelAnalysis {
            level,
            class_levels,
            proficiency_bonus: proficiency,
            average_hit_points,
            max_hit_points,
            attacks_per_action,
            spell_slots,
            target_armor_class: ac,
            target_save_bonus: save,
            dpr,
            features,
            breakpoints,
        }
    }

    fn hit_points(&self, build: &Build, class_levels: &[ClassLevel]) -> (u32, u32) {
        let con = build.abilities.modifier(Ability::Constitution);
        let per_level = |die: u32| (die as i32 + con).max(1) as u32;
        let average = |die: u32| (die as i32 / 2 + 1 + con).max(1) as u32;

        let mut avg_total = 0;
        let mut max_total = 0;
        for (i, class_level) in class_levels.iter().enumerate() {
            let die = self.tables.hit_die(class_level.class);
            max_total += per_level(die) * class_level.level;
            let rolled = if i == 0 {
                avg_total += per_level(die);
                class_level.level - 1
            } else {
                class_level.level
            };
            avg_total += average(die) * rolled;
        }
        (avg_total, max_total)
    }

    fn attacks_per_action(&self, class_levels: &[ClassLevel]) -> u32 {
        class_levels
            .iter()
            .map(|c| {
                self.tables
                    .attacks_per_action(c.class, c.subclass.as_deref(), c.level)
            })
            .max()
            .unwrap_or(1)
    }

    fn spell_slots(&self, class_levels: &[ClassLevel]) -> [u32; 9] {
        let casters: Vec<(CasterProgression, u32)> = class_levels
            .iter()
            .map(|c| {
                (
                    self.tables.caster_progression(c.class, c.subclass.as_deref()),
                    c.level,
                )
            })
            .filter(|(p, _)| matches!(p, CasterProgression::Full | CasterProgression::Half | CasterProgression::Third))
            .collect();

        let caster_level = match casters.as_slice() {
            [(CasterProgression::Half, level)] if *level >= 2 => level.div_ceil(2),
            [(CasterProgression::Third, level)] if *level >= 3 => level.div_ceil(3),
            [(CasterProgression::Half | CasterProgression::Third, _)] => 0,
            _ => casters
                .iter()
                .map(|(p, level)| match p {
                    CasterProgression::Half => level / 2,
                    CasterProgression::Third => level / 3,
                    _ => *level,
                })
                .sum(),
        };

        let mut slots = self.tables.spell_slots(caster_level);
        let warlock = level_in(class_levels, CharacterClass::Warlock);
        if let Some(pact) = self.tables.pact_slots(warlock) {
            if let Some(slot) = slots.get_mut(pact.slot_level.saturating_sub(1) as usize) {
                *slot += pact.count;
            }
        }
        slots
    }

    fn features(&self, class_levels: &[ClassLevel], previous: &[ClassLevel]) -> Vec<String> {
        let mut features = Vec::new();
        for class_level in class_levels {
            let before = level_in(previous, class_level.class);
            for l in (before + 1)..=class_level.level {
                features.extend(self.tables.features(
                    class_level.class,
                    class_level.subclass.as_deref(),
                    l,
                ));
            }
        }
        features
    }

    /// Attack action profile at this level, class riders included.
    fn weapon_sequence(&self, ctx: &LevelContext<'_>, attacks: u32) -> Option<AttackSequence> {
        let build = ctx.build;
        let weapon = build.weapon.as_ref()?;
        let modifier = build.abilities.modifier(weapon.ability);
        let attack_bonus = modifier + ctx.proficiency + weapon.enhancement;
        let mut flat = modifier + weapon.enhancement;
        if weapon.ability == Ability::Strength {
            flat += rage_damage(level_in(ctx.class_levels, CharacterClass::Barbarian));
        }

        let mut crit_range = weapon.crit_range;
        let champion = subclass_level(ctx.class_levels, CharacterClass::Fighter, "champion");
        if champion >= 15 {
            crit_range = crit_range.min(18);
        } else if champion >= 3 {
            crit_range = crit_range.min(19);
        }

        let mut sequence = AttackSequence::new(
            f64::from(attack_bonus),
            attacks,
            DamageModifier {
                great_weapon_fighting: weapon.great_weapon_fighting,
                ..DamageModifier::weapon(
                    weapon.name.clone(),
                    weapon.damage.clone(),
                    f64::from(flat),
                    weapon.damage_type,
                )
            },
        );
        sequence.crit_range = crit_range;
        sequence.elven_accuracy = build.features.elven_accuracy;
        sequence.halfling_luck = build.features.halfling_luck;

        let rogue = level_in(ctx.class_levels, CharacterClass::Rogue);
        if rogue > 0 {
            sequence = sequence.with_modifier(DamageModifier::feature(
                "Sneak Attack",
                DiceExpr::dice(rogue.div_ceil(2), 6),
                weapon.damage_type,
                true,
            ));
        }
        if level_in(ctx.class_levels, CharacterClass::Paladin) >= 11 {
            sequence = sequence.with_modifier(DamageModifier::feature(
                "Improved Divine Smite",
                DiceExpr::dice(1, 8),
                DamageType::Radiant,
                false,
            ));
        }
        Some(sequence)
    }

    fn weapon_dpr(&self, ctx: &LevelContext<'_>, advantage: Advantage) -> f64 {
        let ac = ctx.armor_class;
        let main = self
            .weapon_sequence(ctx, ctx.attacks)
            .map_or(0.0, |s| s.expected_damage_with(ac, advantage, |_| 1.0));

        let monk = level_in(ctx.class_levels, CharacterClass::Monk);
        if monk == 0 {
            return main;
        }
        let abilities = &ctx.build.abilities;
        let modifier = abilities
            .modifier(Ability::Strength)
            .max(abilities.modifier(Ability::Dexterity));
        let mut strike = AttackSequence::new(
            f64::from(modifier + ctx.proficiency),
            1,
            DamageModifier::weapon(
                "Martial Arts",
                DiceExpr::dice(1, martial_arts_die(monk)),
                f64::from(modifier),
                DamageType::Bludgeoning,
            ),
        );
        strike.elven_accuracy = ctx.build.features.elven_accuracy;
        strike.halfling_luck = ctx.build.features.halfling_luck;
        main + strike.expected_damage_with(ac, advantage, |_| 1.0)
    }

    fn spell_dpr(&self, ctx: &LevelContext<'_>, advantage: Advantage) -> f64 {
        let tier = f64::from(cantrip_tier(ctx.level));
        let average = |sides: u32| tier * (f64::from(sides) + 1.0) / 2.0;

        ctx.class_levels
            .iter()
            .filter_map(|c| Cantrip::for_class(c).map(|(cantrip, ability)| (c, cantrip, ability)))
            .map(|(class_level, cantrip, ability)| {
                let modifier = ctx.build.abilities.modifier(ability);
                let attack_bonus = f64::from(modifier + ctx.proficiency);
                let dc = f64::from(8 + modifier + ctx.proficiency);
                let odds = AttackOdds::roll(
                    attack_bonus,
                    ctx.armor_class,
                    20,
                    advantage,
                    ctx.build.features.elven_accuracy,
                    ctx.build.features.halfling_luck,
                );

                match cantrip {
                    Cantrip::EldritchBlast => {
                        // Agonizing Blast from warlock 2
                        let agonizing = if class_level.level >= 2 {
                            f64::from(modifier.max(0))
                        } else {
                            0.0
                        };
                        tier * expected_attack_damage(odds, 5.5, agonizing)
                    }
                    Cantrip::FireBolt => expected_attack_damage(odds, average(10), 0.0),
                    Cantrip::ProduceFlame => expected_attack_damage(odds, average(8), 0.0),
                    Cantrip::SacredFlame => average(8) * save_fail_probability(ctx.save_bonus, dc),
                    Cantrip::ViciousMockery => {
                        average(4) * save_fail_probability(ctx.save_bonus, dc)
                    }
                }
            })
            .fold(0.0, f64::max)
    }

    fn off_turn_dpr(&self, ctx: &LevelContext<'_>, advantage: Advantage) -> f64 {
        if !ctx.build.policy.opportunity_attacks {
            return 0.0;
        }
        let Some(single) = self.weapon_sequence(ctx, 1) else {
            return 0.0;
        };
        let ac = ctx.armor_class;
        let one_attack = single.expected_damage_with(ac, advantage, |_| 1.0);
        let opportunity = self.settings.opportunity_attack_chance * one_attack;

        let battle_master = subclass_level(ctx.class_levels, CharacterClass::Fighter, "battle master");
        let riposte = if battle_master >= 3 {
            let die = f64::from(superiority_die(battle_master));
            let hit = single.odds(ac, advantage).hit;
            self.settings.reaction_chance * (one_attack + hit * (die + 1.0) / 2.0)
        } else {
            0.0
        };

        opportunity + riposte
    }

    fn dpr(&self, ctx: &LevelContext<'_>, advantage: Advantage) -> DprBreakdown {
        let weapon = self.weapon_dpr(ctx, advantage);
        let spell = self.spell_dpr(ctx, advantage);
        let off_turn = self.off_turn_dpr(ctx, advantage);
        DprBreakdown {
            weapon,
            spell,
            off_turn,
            total: weapon.max(spell) + off_turn,
        }
    }
}

/// Per-level inputs shared by the damage estimates.
struct LevelContext<'a> {
    build: &'a Build,
    class_levels: &'a [ClassLevel],
    level: u32,
    proficiency: i32,
    attacks: u32,
    armor_class: f64,
    save_bonus: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::build::fixtures::fighter;

    fn fighter_levels() -> Vec<LevelAnalysis> {
        ProgressionAnalyzer::default().analyze(&fighter()).unwrap()
    }

    fn warlock() -> Build {
        let mut build = fighter();
        build.name = "Warlock".to_string();
        build.weapon = None;
        build.class_resources.clear();
        build.class_levels = vec![ClassLevel::new(CharacterClass::Warlock, 5)];
        build.abilities.charisma = 18;
        build
    }

    #[test]
    fn test_proficiency_bonus() {
        let bonuses: Vec<u32> = [1, 4, 5, 8, 9, 13, 17, 20]
            .iter()
            .map(|&l| proficiency_bonus(l))
            .collect();
        assert_eq!(bonuses, vec![2, 2, 3, 3, 4, 5, 6, 6]);
    }

    #[test]
    fn test_levels_one_through_twenty() {
        let levels = fighter_levels();
        assert_eq!(levels.len(), 20);
        assert_eq!(levels[0].level, 1);
        assert_eq!(levels[19].level, 20);
        for (i, l) in levels.iter().enumerate() {
            assert_eq!(l.class_levels[0].level, i as u32 + 1);
        }
    }

    #[test]
    fn test_hit_points() {
        let levels = fighter_levels();
        // CON 14: 10 + 2 at first level, 6 + 2 after
        assert_eq!(levels[0].average_hit_points, 12);
        assert_eq!(levels[0].max_hit_points, 12);
        assert_eq!(levels[4].average_hit_points, 12 + 4 * 8);
        assert_eq!(levels[4].max_hit_points, 5 * 12);
        for pair in levels.windows(2) {
            assert!(pair[1].average_hit_points > pair[0].average_hit_points);
        }
    }

    #[test]
    fn test_extra_attack_breakpoints() {
        let levels = fighter_levels();
        let extra: Vec<u32> = levels
            .iter()
            .filter(|l| {
                l.breakpoints
                    .iter()
                    .any(|b| matches!(b, Breakpoint::ExtraAttack { .. }))
            })
            .map(|l| l.level)
            .collect();
        assert_eq!(extra, vec![5, 11, 20]);
        assert_eq!(levels[4].attacks_per_action, 2);
        assert!(levels[4].features.contains(&"Extra Attack".to_string()));
    }

    #[test]
    fn test_asi_breakpoints() {
        let levels = fighter_levels();
        let asi: Vec<u32> = levels
            .iter()
            .filter(|l| {
                l.breakpoints
                    .iter()
                    .any(|b| matches!(b, Breakpoint::AbilityScoreImprovement { .. }))
            })
            .map(|l| l.level)
            .collect();
        assert_eq!(asi, vec![4, 6, 8, 12, 14, 16, 19]);
    }

    #[test]
    fn test_dpr_ordering_and_growth() {
        let levels = fighter_levels();
        for l in &levels {
            assert!(l.dpr.disadvantage.total <= l.dpr.normal.total);
            assert!(l.dpr.normal.total <= l.dpr.advantage.total);
            assert!(l.dpr.normal.spell.abs() < f64::EPSILON);
        }
        assert!(levels[4].dpr.normal.weapon > levels[3].dpr.normal.weapon);
    }

    #[test]
    fn test_off_turn_gated_by_chance() {
        let settings = ProgressionConfig {
            opportunity_attack_chance: 0.0,
            reaction_chance: 0.0,
        };
        let levels = ProgressionAnalyzer::new(settings)
            .unwrap()
            .analyze(&fighter())
            .unwrap();
        assert!(levels.iter().all(|l| l.dpr.normal.off_turn.abs() < f64::EPSILON));
        let default = fighter_levels();
        assert!(default[0].dpr.normal.off_turn > 0.0);
    }

    #[test]
    fn test_warlock_slots_and_cantrip() {
        let levels = ProgressionAnalyzer::default().analyze(&warlock()).unwrap();
        assert_eq!(levels[0].spell_slots, [1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(levels[4].spell_slots, [0, 0, 2, 0, 0, 0, 0, 0, 0]);
        assert!(levels[4].dpr.normal.weapon.abs() < f64::EPSILON);
        assert!(levels[4].dpr.normal.spell > levels[3].dpr.normal.spell);
        assert!((levels[4].dpr.normal.total - levels[4].dpr.normal.spell).abs() < 1e-12);
        assert!(levels[2]
            .breakpoints
            .contains(&Breakpoint::SpellTier { slot_level: 2 }));
    }

    #[test]
    fn test_half_caster_slots() {
        let mut build = fighter();
        build.class_levels = vec![ClassLevel::new(CharacterClass::Paladin, 5)];
        let levels = ProgressionAnalyzer::default().analyze(&build).unwrap();
        assert_eq!(levels[0].spell_slots, [0; 9]);
        assert_eq!(levels[1].spell_slots[0], 2);
        assert_eq!(levels[4].spell_slots, [4, 2, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_multiclass_distribution() {
        let classes = vec![
            ClassLevel::new(CharacterClass::Fighter, 2),
            ClassLevel::new(CharacterClass::Wizard, 8),
        ];
        let at_5 = distribute_levels(&classes, 5);
        assert_eq!(at_5[0].level, 1);
        assert_eq!(at_5[1].level, 4);

        let at_1 = distribute_levels(&classes, 1);
        assert_eq!(at_1.len(), 1);
        assert_eq!(at_1[0].class, CharacterClass::Fighter);

        let at_15 = distribute_levels(&classes, 15);
        assert_eq!(at_15[0].level, 2);
        assert_eq!(at_15[1].level, 13);
    }

    #[test]
    fn test_distribution_sums_to_level() {
        let classes = vec![
            ClassLevel::new(CharacterClass::Fighter, 7),
            ClassLevel::new(CharacterClass::Rogue, 7),
            ClassLevel::new(CharacterClass::Warlock, 6),
        ];
        for level in 3..=20 {
            let dist = distribute_levels(&classes, level);
            assert_eq!(dist.iter().map(|c| c.level).sum::<u32>(), level);
            assert!(dist.iter().all(|c| c.level >= 1));
        }
    }

    #[test]
    fn test_multiclass_caster_level() {
        let mut build = fighter();
        build.class_levels = vec![
            ClassLevel::new(CharacterClass::Paladin, 6),
            ClassLevel::new(CharacterClass::Sorcerer, 6),
        ];
        let levels = ProgressionAnalyzer::default().analyze(&build).unwrap();
        // Paladin 6 / Sorcerer 6: caster level 3 + 6 = 9
        assert_eq!(levels[11].spell_slots, [4, 3, 3, 3, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_flat_curve() {
        let analyzer = ProgressionAnalyzer::default().with_curve(TargetCurve::flat(15.0, 3.0));
        let levels = analyzer.analyze(&fighter()).unwrap();
        assert!(levels.iter().all(|l| (l.target_armor_class - 15.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_invalid_build_rejected() {
        let mut build = fighter();
        build.hit_points = 0;
        assert!(ProgressionAnalyzer::default().analyze(&build).is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = serde_json::to_string(&fighter_levels()).unwrap();
        let b = serde_json::to_string(&fighter_levels()).unwrap();
        assert_eq!(a, b);
    }
}
