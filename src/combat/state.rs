//! Mutable per-run combat state.
//!
//! One [`CombatState`] lives for a single simulation run. Encounters reset
//! per-encounter pieces; rests restore resources.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::build::{Build, ConcentrationRider, Recharge};
use super::{Condition, Target};
use crate::dice::Advantage;

/// What a temporary effect does while it lasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectData {
    /// Imposes a condition.
    Condition {
        /// Condition imposed.
        condition: Condition,
    },
    /// Tracks the duration of the active concentration spell.
    Concentration,
}

/// Effect that expires after a number of rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    /// Source name.
    pub name: String,
    /// Rounds remaining.
    pub duration: u32,
    /// Payload.
    pub data: EffectData,
}

/// Active concentration spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    /// Spell name.
    pub spell: String,
    /// Weapon-hit rider, if the spell has one.
    pub rider: Option<ConcentrationRider>,
}

/// Consumable and tracked resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Current hit points (0 when downed).
    pub hit_points: i64,
    /// Maximum hit points.
    pub max_hit_points: u32,
    /// Remaining spell slots per level.
    pub spell_slots: [u32; 9],
    /// Remaining class resource uses.
    pub class_resources: IndexMap<String, u32>,
    /// Active concentration spell.
    pub concentration: Option<Concentration>,
    /// Active conditions, derived from effects.
    pub conditions: Vec<Condition>,
    /// Remaining potions.
    pub potions: u32,
    /// Target's remaining legendary resistances this encounter.
    pub target_legendary_resistances: u32,
}

/// Per-turn action economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    /// Action available.
    pub action: bool,
    /// Bonus action available.
    pub bonus_action: bool,
    /// Reaction available.
    pub reaction: bool,
    /// Movement left in feet.
    pub movement: u32,
}

impl ActionEconomy {
    /// Fresh turn.
    #[must_use]
    pub const fn fresh(speed: u32) -> Self {
        Self {
            action: true,
            bonus_action: true,
            reaction: true,
            movement: speed,
        }
    }
}

/// Full state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    /// Current encounter (1-based, 0 before the first).
    pub encounter: u32,
    /// Round within the encounter (1-based, 0 before the first).
    pub round: u32,
    /// Turns taken across the whole run.
    pub turn: u32,
    /// Resources.
    pub resources: Resources,
    /// Action economy for the current turn.
    pub economy: ActionEconomy,
    /// Active temporary effects.
    pub effects: Vec<TemporaryEffect>,
    /// Dropped to 0 hit points.
    pub downed: bool,
}

impl CombatState {
    /// Fully rested state for `build`.
    #[must_use]
    pub fn new(build: &Build) -> Self {
        Self {
            encounter: 0,
            round: 0,
            turn: 0,
            resources: Resources {
                hit_points: i64::from(build.hit_points),
                max_hit_points: build.hit_points,
                spell_slots: build.spell_slots,
                class_resources: build
                    .class_resources
                    .iter()
                    .map(|(name, r)| (name.clone(), r.uses))
                    .collect(),
                concentration: None,
                conditions: Vec::new(),
                potions: build.potions,
                target_legendary_resistances: 0,
            },
            economy: ActionEconomy::fresh(build.speed),
            effects: Vec::new(),
            downed: false,
        }
    }

    /// Start encounter `encounter` against `target`.
    ///
    /// Effects and concentration end; hit points and spent resources carry over.
    /// A build downed in an earlier encounter is stabilized at 1 hit point.
    pub fn begin_encounter(&mut self, encounter: u32, target: &Target) {
        if self.downed {
            self.downed = false;
            self.resources.hit_points = 1;
        }
        self.encounter = encounter;
        self.round = 0;
        self.effects.clear();
        self.resources.concentration = None;
        self.resources.target_legendary_resistances = target.legendary_resistances;
        self.refresh_conditions();
    }

    /// Restore short-rest resources.
    pub fn short_rest(&mut self, build: &Build) {
        for (name, resource) in &build.class_resources {
            if resource.recharge == Recharge::ShortRest {
                self.resources.class_resources.insert(name.clone(), resource.uses);
            }
        }
    }

    /// Start round `round` of the current encounter.
    pub fn begin_turn(&mut self, round: u32, speed: u32) {
        self.round = round;
        self.turn += 1;
        self.economy = ActionEconomy::fresh(speed);
    }

    /// Whether the build can take actions this turn.
    #[must_use]
    pub fn can_act(&self) -> bool {
        !self.downed && !self.resources.conditions.iter().any(|c| c.prevents_actions())
    }

    /// Effective attack roll state given a baseline.
    ///
    /// Any source of advantage and any source of disadvantage cancel, no
    /// matter how many of each.
    #[must_use]
    pub fn attack_advantage(&self, base: Advantage) -> Advantage {
        let sources = std::iter::once(base)
            .chain(self.resources.conditions.iter().map(|c| c.attack_modifier()));
        let (mut adv, mut dis) = (false, false);
        for s in sources {
            match s {
                Advantage::Advantage => adv = true,
                Advantage::Disadvantage => dis = true,
                Advantage::Normal => {}
            }
        }
        match (adv, dis) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }

    /// Lowest available slot at or above `min_level` (1-based).
    #[must_use]
    pub fn lowest_slot(&self, min_level: u32) -> Option<u32> {
        let start = min_level.max(1);
        (start..=9).find(|&level| self.resources.spell_slots[(level - 1) as usize] > 0)
    }

    /// Spend the lowest available slot at or above `min_level`.
    pub fn spend_slot(&mut self, min_level: u32) -> Option<u32> {
        let level = self.lowest_slot(min_level)?;
        self.resources.spell_slots[(level - 1) as usize] -= 1;
        Some(level)
    }

    /// Remaining uses of a class resource.
    #[must_use]
    pub fn class_resource(&self, name: &str) -> u32 {
        self.resources.class_resources.get(name).copied().unwrap_or(0)
    }

    /// Spend one use of a class resource.
    pub fn spend_class_resource(&mut self, name: &str) -> bool {
        match self.resources.class_resources.get_mut(name) {
            Some(uses) if *uses > 0 => {
                *uses -= 1;
                true
            }
            _ => false,
        }
    }

    /// Whether hit points are below half.
    #[must_use]
    pub fn bloodied(&self) -> bool {
        self.resources.hit_points * 2 < i64::from(self.resources.max_hit_points)
    }

    /// Take damage. Returns `true` if this dropped the build.
    pub fn take_damage(&mut self, amount: i64) -> bool {
        if self.downed || amount <= 0 {
            return false;
        }
        self.resources.hit_points = (self.resources.hit_points - amount).max(0);
        if self.resources.hit_points == 0 {
            self.downed = true;
            self.drop_concentration();
            self.refresh_conditions();
            return true;
        }
        false
    }

    /// Heal up to maximum hit points.
    pub fn heal(&mut self, amount: i64) {
        if self.downed || amount <= 0 {
            return;
        }
        self.resources.hit_points =
            (self.resources.hit_points + amount).min(i64::from(self.resources.max_hit_points));
    }

    /// Impose a condition for `duration` rounds.
    pub fn add_condition(&mut self, name: impl Into<String>, condition: Condition, duration: u32) {
        self.effects.push(TemporaryEffect {
            name: name.into(),
            duration,
            data: EffectData::Condition { condition },
        });
        self.refresh_conditions();
    }

    /// Impose a condition from outside the build's turn.
    ///
    /// It covers the build's next `turns` turns; the end of the current round
    /// does not count against it.
    pub fn impose_condition(&mut self, name: impl Into<String>, condition: Condition, turns: u32) {
        self.add_condition(name, condition, turns.saturating_add(1));
    }

    /// Begin concentrating, ending any previous concentration.
    pub fn start_concentration(&mut self, spell: &str, rider: Option<ConcentrationRider>, duration: u32) {
        self.drop_concentration();
        self.resources.concentration = Some(Concentration {
            spell: spell.to_string(),
            rider,
        });
        self.effects.push(TemporaryEffect {
            name: spell.to_string(),
            duration,
            data: EffectData::Concentration,
        });
    }

    /// End concentration and its tracking effect.
    pub fn drop_concentration(&mut self) {
        if self.resources.concentration.take().is_some() {
            self.effects
                .retain(|e| !matches!(e.data, EffectData::Concentration));
        }
    }

    /// Tick effect durations, expiring those that reach zero.
    pub fn end_of_round(&mut self) {
        let mut concentration_expired = false;
        self.effects.retain_mut(|effect| {
            effect.duration = effect.duration.saturating_sub(1);
            let keep = effect.duration > 0;
            if !keep && matches!(effect.data, EffectData::Concentration) {
                concentration_expired = true;
            }
            keep
        });
        if concentration_expired {
            self.resources.concentration = None;
        }
        self.refresh_conditions();
    }

    fn refresh_conditions(&mut self) {
        let mut conditions: Vec<Condition> = Vec::new();
        if self.downed {
            conditions.push(Condition::Unconscious);
        }
        for effect in &self.effects {
            if let EffectData::Condition { condition } = effect.data {
                if !conditions.contains(&condition) {
                    conditions.push(condition);
                }
            }
        }
        self.resources.conditions = conditions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::build::fixtures::fighter;
    use crate::combat::build::{ClassResource, ACTION_SURGE};
    use crate::dice::DiceExpr;

    #[test]
    fn test_new_state() {
        let state = CombatState::new(&fighter());
        assert_eq!(state.resources.hit_points, 44);
        assert_eq!(state.class_resource(ACTION_SURGE), 1);
        assert!(state.can_act());
        assert!(!state.bloodied());
    }

    #[test]
    fn test_condition_expiry() {
        let mut state = CombatState::new(&fighter());
        state.add_condition("Web", Condition::Restrained, 2);
        assert_eq!(state.attack_advantage(Advantage::Normal), Advantage::Disadvantage);
        state.end_of_round();
        assert_eq!(state.resources.conditions, vec![Condition::Restrained]);
        state.end_of_round();
        assert!(state.resources.conditions.is_empty());
        assert!(state.effects.is_empty());
    }

    #[test]
    fn test_advantage_sources_cancel() {
        let mut state = CombatState::new(&fighter());
        state.add_condition("Poison", Condition::Poisoned, 3);
        state.add_condition("Prone", Condition::Prone, 3);
        assert_eq!(state.attack_advantage(Advantage::Advantage), Advantage::Normal);
        assert_eq!(state.attack_advantage(Advantage::Normal), Advantage::Disadvantage);
    }

    #[test]
    fn test_stunned_cannot_act() {
        let mut state = CombatState::new(&fighter());
        state.add_condition("Stunning Strike", Condition::Stunned, 1);
        assert!(!state.can_act());
        state.end_of_round();
        assert!(state.can_act());
    }

    #[test]
    fn test_damage_drops_and_ends_concentration() {
        let mut state = CombatState::new(&fighter());
        state.start_concentration(
            "Hunter's Mark",
            Some(ConcentrationRider {
                dice: DiceExpr::dice(1, 6),
                damage_type: crate::combat::DamageType::Force,
                duration: 10,
            }),
            10,
        );
        assert!(!state.take_damage(40));
        assert!(state.bloodied());
        assert!(state.resources.concentration.is_some());
        assert!(state.take_damage(10));
        assert!(state.downed);
        assert_eq!(state.resources.hit_points, 0);
        assert!(state.resources.concentration.is_none());
        assert!(state.resources.conditions.contains(&Condition::Unconscious));
        assert!(!state.can_act());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut state = CombatState::new(&fighter());
        state.take_damage(10);
        state.heal(100);
        assert_eq!(state.resources.hit_points, 44);
    }

    #[test]
    fn test_concentration_expires() {
        let mut state = CombatState::new(&fighter());
        state.start_concentration("Bless", None, 1);
        state.end_of_round();
        assert!(state.resources.concentration.is_none());
    }

    #[test]
    fn test_spell_slots() {
        let mut build = fighter();
        build.spell_slots = [0, 1, 1, 0, 0, 0, 0, 0, 0];
        let mut state = CombatState::new(&build);
        assert_eq!(state.spend_slot(1), Some(2));
        assert_eq!(state.spend_slot(1), Some(3));
        assert_eq!(state.spend_slot(1), None);
    }

    #[test]
    fn test_short_rest_restores_short_rest_resources() {
        let mut build = fighter();
        build.class_resources.insert(
            "lay_on_hands".to_string(),
            ClassResource {
                uses: 2,
                recharge: Recharge::LongRest,
            },
        );
        let mut state = CombatState::new(&build);
        assert!(state.spend_class_resource(ACTION_SURGE));
        assert!(state.spend_class_resource("lay_on_hands"));
        assert!(!state.spend_class_resource(ACTION_SURGE));
        state.short_rest(&build);
        assert_eq!(state.class_resource(ACTION_SURGE), 1);
        assert_eq!(state.class_resource("lay_on_hands"), 1);
    }

    #[test]
    fn test_imposed_condition_covers_next_turn() {
        let mut state = CombatState::new(&fighter());
        state.impose_condition("Stunning Strike", Condition::Stunned, 1);
        state.end_of_round();
        state.begin_turn(2, 30);
        assert!(!state.can_act());
        state.end_of_round();
        assert!(state.can_act());
    }

    #[test]
    fn test_downed_build_stabilizes_next_encounter() {
        let mut state = CombatState::new(&fighter());
        assert!(state.take_damage(100));
        assert!(!state.can_act());
        state.begin_encounter(2, &Target::new(15, 100));
        assert!(!state.downed);
        assert_eq!(state.resources.hit_points, 1);
        assert!(state.bloodied());
        assert!(state.can_act());
        assert!(!state.resources.conditions.contains(&Condition::Unconscious));
    }

    #[test]
    fn test_begin_encounter_resets_effects() {
        let mut state = CombatState::new(&fighter());
        state.add_condition("Web", Condition::Restrained, 5);
        let target = Target {
            legendary_resistances: 3,
            ..Target::new(15, 100)
        };
        state.begin_encounter(2, &target);
        assert!(state.resources.conditions.is_empty());
        assert_eq!(state.resources.target_legendary_resistances, 3);
        assert_eq!(state.encounter, 2);
    }
}
