//! Monte Carlo combat simulator.
//!
//! Each call to [`MonteCarloSimulator::simulate`] seeds one [`SimRng`] and
//! plays `iterations` independent runs from it. A run walks every encounter
//! and round of the scenario:
//!
//! 1. Reset the action economy.
//! 2. Main action, chosen by the decision rule below.
//! 3. Bonus action.
//! 4. Enemy phase: every enemy action fires independently.
//! 5. End of round: effect durations tick down.
//!
//! Inputs are validated before any random number is drawn.
//!
//! # Decision rule
//!
//! Potion below half hit points, then Action Surge in the first round of an
//! encounter, then the offensive option with the highest closed-form expected
//! damage (weapon attack wins ties), then Dash if passing is allowed.
//! Anything else is [`SimError::NoValidAction`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::aggregate::{aggregate, AggregateContext, MonteCarloResults, ResourceBudget};
use super::progress::{ProgressObserver, SimulationProgress, TracingProgress};
use crate::combat::{
    Action, ActionKind, AttackAction, Build, CombatScenario, CombatState, Condition, DamageType,
    EnemyEffect, ItemAction, MovementAction, ResourceCost, RiderTrigger, SpecialAction, Spell,
    SpellAction, SpellResolution, Target, ACTION_SURGE,
};
use crate::config::SimConfig;
use crate::dice::{Advantage, DiceExpr, Term, TermKind};
use crate::engine::{RingBuffer, SimRng};
use crate::error::{SimError, SimResult};
use crate::optimizer::AttackSequence;
use crate::probability::{
    expected_attack_damage, legendary_resistance_fail_rate, magic_resistance,
    save_fail_probability, save_spell_expected_damage, AttackOdds,
};

/// Resources consumed during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Spell slots spent per level.
    pub spell_slots: [u32; 9],
    /// Class resource uses spent.
    pub class_resources: IndexMap<String, u32>,
    /// Potions drunk.
    pub potions: u32,
    /// Reactions taken.
    pub reactions: u32,
    /// Target legendary resistances burned.
    pub legendary_resistances: u32,
    /// Concentration checks failed.
    pub concentration_broken: u32,
}

impl ResourceUsage {
    fn spend_slot(&mut self, level: u32) {
        if let Some(slot) = self.spell_slots.get_mut(level.saturating_sub(1) as usize) {
            *slot += 1;
        }
    }

    fn spend_class_resource(&mut self, name: &str) {
        *self.class_resources.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Record of one simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    /// Run index within the call.
    pub index: usize,
    /// Damage dealt over the whole run.
    pub total_damage: f64,
    /// Damage per round, encounters concatenated.
    pub damage_by_round: Vec<f64>,
    /// Damage per encounter.
    pub damage_by_encounter: Vec<f64>,
    /// Attack rolls made.
    pub attacks: u32,
    /// Attack rolls that hit.
    pub hits: u32,
    /// Attack rolls that missed.
    pub misses: u32,
    /// Attack rolls that crit.
    pub crits: u32,
    /// Resources consumed.
    pub resource_usage: ResourceUsage,
    /// Conditions active at the end.
    pub final_conditions: Vec<Condition>,
    /// Terminal state.
    pub final_state: CombatState,
    /// Dropped to 0 hit points at some point.
    pub downed: bool,
    /// Damage taken from enemy actions.
    pub damage_taken: f64,
}

impl SimulationRun {
    /// Hits over attack rolls (0 without attacks).
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            f64::from(self.hits) / f64::from(self.attacks)
        }
    }

    /// Crits over attack rolls (0 without attacks).
    #[must_use]
    pub fn crit_rate(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            f64::from(self.crits) / f64::from(self.attacks)
        }
    }

    /// Mean damage per round.
    #[must_use]
    pub fn damage_per_round(&self) -> f64 {
        if self.damage_by_round.is_empty() {
            0.0
        } else {
            self.total_damage / self.damage_by_round.len() as f64
        }
    }
}

/// One entry of the decision history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Run index.
    pub run: usize,
    /// Encounter (1-based).
    pub encounter: u32,
    /// Round (1-based).
    pub round: u32,
    /// Turn within the run (1-based).
    pub turn: u32,
    /// Chosen action.
    pub action: Action,
    /// Closed-form expected damage that drove the choice.
    pub expected_damage: f64,
}

impl DecisionRecord {
    /// Kind of the chosen action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// Raw output of a batch: every run plus the bounded decision history.
#[derive(Debug, Clone)]
pub struct SimulationBatch {
    /// Runs in order.
    pub runs: Vec<SimulationRun>,
    /// Most recent decisions.
    pub history: RingBuffer<DecisionRecord>,
}

/// Stateful combat simulator.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: SimConfig,
}

impl MonteCarloSimulator {
    /// Create a simulator from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.check()?;
        Ok(Self { config })
    }

    /// Simulator with default settings and the given seed.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self {
            config: SimConfig::builder().seed(seed).build(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run `iterations` simulations and aggregate them.
    ///
    /// Progress is reported as `tracing` debug events.
    ///
    /// # Errors
    ///
    /// Returns input errors before any sampling, `NoValidAction` when the
    /// build has nothing to do, and `NonFiniteValue` if aggregation breaks down.
    pub fn simulate(
        &self,
        build: &Build,
        target: &Target,
        scenario: &CombatScenario,
        iterations: usize,
    ) -> SimResult<MonteCarloResults> {
        self.simulate_with_progress(build, target, scenario, iterations, &mut TracingProgress)
    }

    /// [`simulate`](Self::simulate) for the configured iteration count.
    ///
    /// # Errors
    ///
    /// See [`simulate`](Self::simulate).
    pub fn simulate_configured(
        &self,
        build: &Build,
        target: &Target,
        scenario: &CombatScenario,
    ) -> SimResult<MonteCarloResults> {
        self.simulate(build, target, scenario, self.config.simulation.iterations)
    }

    /// [`simulate`](Self::simulate) with a custom progress observer.
    ///
    /// # Errors
    ///
    /// See [`simulate`](Self::simulate).
    pub fn simulate_with_progress(
        &self,
        build: &Build,
        target: &Target,
        scenario: &CombatScenario,
        iterations: usize,
        observer: &mut dyn ProgressObserver,
    ) -> SimResult<MonteCarloResults> {
        let batch = self.run_batch(build, target, scenario, iterations, observer)?;

        let stats = &self.config.statistics;
        let context = AggregateContext {
            seed: self.config.simulation.seed,
            rounds_per_encounter: scenario.rounds,
            target_hit_points: target.hit_points,
            percentiles: &stats.percentiles,
            confidence: stats.confidence,
            budget: ResourceBudget::from_build(build),
            notes: scenario.environment.notes(),
        };
        let results = aggregate(&batch.runs, &batch.history, &context);

        if !results.total_damage.mean.is_finite() {
            return Err(SimError::non_finite("simulation.total_damage.mean"));
        }

        tracing::debug!(
            build = %build.name,
            iterations,
            mean_dpr = results.damage_per_round.mean,
            "simulation finished"
        );
        Ok(results)
    }

    /// Run the simulations without aggregating.
    ///
    /// # Errors
    ///
    /// See [`simulate`](Self::simulate).
    pub fn run_batch(
        &self,
        build: &Build,
        target: &Target,
        scenario: &CombatScenario,
        iterations: usize,
        observer: &mut dyn ProgressObserver,
    ) -> SimResult<SimulationBatch> {
        validate_inputs(build, target, scenario, iterations)?;

        let seed = self.config.simulation.seed;
        tracing::debug!(build = %build.name, iterations, seed, "starting simulation");

        let mut sim = Simulation::new(
            build,
            target,
            scenario,
            SimRng::new(seed),
            self.config.simulation.decision_log_capacity,
        );
        let interval = self.config.simulation.progress_interval.max(1);
        let mut runs = Vec::with_capacity(iterations);

        for index in 0..iterations {
            runs.push(sim.run(index)?);
            let completed = index + 1;
            if completed % interval == 0 || completed == iterations {
                observer.on_progress(SimulationProgress {
                    completed,
                    total: iterations,
                });
            }
        }

        Ok(SimulationBatch {
            runs,
            history: sim.history,
        })
    }
}

fn validate_inputs(
    build: &Build,
    target: &Target,
    scenario: &CombatScenario,
    iterations: usize,
) -> SimResult<()> {
    if iterations == 0 {
        return Err(SimError::invalid_input("iterations", "must be at least 1"));
    }
    build.check()?;
    target.check()?;
    scenario.check()?;
    Ok(())
}

/// Closed-form expected damage of casting `spell` now.
fn spell_expected_damage(
    build: &Build,
    target: &Target,
    spell: &Spell,
    advantage: Advantage,
    legendary_resistances: u32,
) -> f64 {
    let factor = target.damage_factor(spell.damage_type);
    let dice = spell.damage.expected_dice_value();
    let flat = spell.damage.expected_value() - dice;
    let full = spell.damage.expected_value().max(0.0);

    let raw = match spell.resolution {
        SpellResolution::Attack => {
            let odds = AttackOdds::roll(
                f64::from(build.spell_attack_bonus),
                f64::from(target.armor_class),
                20,
                advantage,
                build.features.elven_accuracy,
                build.features.halfling_luck,
            );
            expected_attack_damage(odds, dice, flat)
        }
        SpellResolution::Save {
            ability,
            half_on_save,
        } => {
            let mut fail = save_fail_probability(
                f64::from(target.saves.get(ability)),
                f64::from(build.spell_save_dc),
            );
            if target.magic_resistance {
                fail = magic_resistance(fail);
            }
            fail = legendary_resistance_fail_rate(fail, legendary_resistances, 1);
            save_spell_expected_damage(full, fail, half_on_save)
        }
        SpellResolution::Automatic => full,
    };
    raw.max(0.0) * factor
}

fn healing_potion() -> DiceExpr {
    DiceExpr::Sum(vec![
        Term {
            negative: false,
            kind: TermKind::Dice { count: 2, sides: 4 },
        },
        Term {
            negative: false,
            kind: TermKind::Flat(2),
        },
    ])
}

/// Per-run counters.
#[derive(Debug, Default)]
struct RunTally {
    attacks: u32,
    hits: u32,
    misses: u32,
    crits: u32,
    usage: ResourceUsage,
    damage_taken: i64,
    downed: bool,
}

/// Weapon-like attack roll parameters.
struct AttackProfile<'a> {
    bonus: i32,
    damage: &'a DiceExpr,
    flat: i32,
    damage_type: DamageType,
    crit_range: u32,
    great_weapon_fighting: bool,
    riders: bool,
}

/// State shared by every run of one call.
struct Simulation<'a> {
    build: &'a Build,
    target: &'a Target,
    scenario: &'a CombatScenario,
    rng: SimRng,
    history: RingBuffer<DecisionRecord>,
    attack_sequence: Option<AttackSequence>,
    once_used: Vec<bool>,
    potion: DiceExpr,
}

impl<'a> Simulation<'a> {
    fn new(
        build: &'a Build,
        target: &'a Target,
        scenario: &'a CombatScenario,
        rng: SimRng,
        history_capacity: usize,
    ) -> Self {
        Self {
            build,
            target,
            scenario,
            rng,
            history: RingBuffer::with_capacity(history_capacity),
            attack_sequence: AttackSequence::from_build(build),
            once_used: vec![false; build.once_per_turn.len()],
            potion: healing_potion(),
        }
    }

    fn run(&mut self, index: usize) -> SimResult<SimulationRun> {
        let build = self.build;
        let scenario = self.scenario;
        let mut state = CombatState::new(build);
        let mut tally = RunTally::default();
        let mut damage_by_round = Vec::with_capacity(scenario.total_rounds() as usize);
        let mut damage_by_encounter = Vec::with_capacity(scenario.encounters as usize);

        for encounter in 1..=scenario.encounters {
            if scenario.rest_before(encounter) {
                state.short_rest(build);
            }
            state.begin_encounter(encounter, self.target);

            let mut encounter_damage = 0i64;
            for round in 1..=scenario.rounds {
                let dealt = self.play_round(index, round, &mut state, &mut tally)?;
                encounter_damage += dealt;
                damage_by_round.push(dealt as f64);
            }
            damage_by_encounter.push(encounter_damage as f64);
        }

        Ok(SimulationRun {
            index,
            total_damage: damage_by_round.iter().sum(),
            damage_by_round,
            damage_by_encounter,
            attacks: tally.attacks,
            hits: tally.hits,
            misses: tally.misses,
            crits: tally.crits,
            resource_usage: tally.usage,
            final_conditions: state.resources.conditions.clone(),
            downed: tally.downed,
            damage_taken: tally.damage_taken as f64,
            final_state: state,
        })
    }

    fn play_round(
        &mut self,
        run: usize,
        round: u32,
        state: &mut CombatState,
        tally: &mut RunTally,
    ) -> SimResult<i64> {
        state.begin_turn(round, self.build.speed);
        self.once_used.fill(false);

        let mut dealt = 0;
        if state.can_act() {
            dealt += self.take_action(run, state, tally, true)?;
            dealt += self.bonus_action(state, tally);
        }

        // The enemy's turn is a new turn for once-per-turn features.
        self.once_used.fill(false);
        dealt += self.enemy_phase(state, tally);

        state.end_of_round();
        tracing::trace!(run, encounter = state.encounter, round, dealt, "round resolved");
        Ok(dealt)
    }

    fn take_action(
        &mut self,
        run: usize,
        state: &mut CombatState,
        tally: &mut RunTally,
        allow_special: bool,
    ) -> SimResult<i64> {
        let (action, expected_damage) = self.select_action(state, allow_special)?;
        self.history.push(DecisionRecord {
            run,
            encounter: state.encounter,
            round: state.round,
            turn: state.turn,
            action,
            expected_damage,
        });
        state.economy.action = false;

        let dealt = match action {
            Action::Attack(attack) => {
                let mut total = 0;
                for _ in 0..attack.attacks {
                    total += self.weapon_attack(state, tally);
                }
                total
            }
            Action::Spell(cast) => self.cast_spell(state, tally, cast.spell),
            Action::Movement(movement) => {
                state.economy.movement += movement.feet;
                0
            }
            Action::Item(ItemAction::HealingPotion) => {
                state.resources.potions = state.resources.potions.saturating_sub(1);
                tally.usage.potions += 1;
                let healed = self.potion.roll(&mut self.rng);
                state.heal(healed);
                0
            }
            Action::Special(SpecialAction::ActionSurge) => {
                if state.spend_class_resource(ACTION_SURGE) {
                    tally.usage.spend_class_resource(ACTION_SURGE);
                    let first = self.take_action(run, state, tally, false)?;
                    let second = self.take_action(run, state, tally, false)?;
                    first + second
                } else {
                    0
                }
            }
        };
        Ok(dealt)
    }

    /// Decision rule:
    /// 1. Potion when below half hit points and potions remain.
    /// 2. Action Surge in the first round of an encounter while it remains.
    /// 3. The offensive option with the highest expected damage (ties go to
    ///    the weapon attack).
    /// 4. Dash, if the policy allows passing.
    /// 5. Otherwise there is no valid action.
    fn select_action(&self, state: &CombatState, allow_special: bool) -> SimResult<(Action, f64)> {
        let build = self.build;

        if build.policy.drink_potions && state.resources.potions > 0 && state.bloodied() {
            return Ok((Action::Item(ItemAction::HealingPotion), 0.0));
        }

        let offense = self.best_offense(state);

        if let Some((_, expected)) = offense {
            if allow_special
                && build.policy.use_action_surge
                && state.round == 1
                && state.class_resource(ACTION_SURGE) > 0
            {
                return Ok((Action::Special(SpecialAction::ActionSurge), 2.0 * expected));
            }
        }

        if let Some(choice) = offense {
            return Ok(choice);
        }

        if build.policy.allow_pass {
            return Ok((
                Action::Movement(MovementAction { feet: build.speed }),
                0.0,
            ));
        }

        Err(SimError::NoValidAction {
            round: state.round,
            turn: state.turn,
        })
    }

    fn best_offense(&self, state: &CombatState) -> Option<(Action, f64)> {
        let build = self.build;
        let advantage = state.attack_advantage(build.advantage);

        let mut best = self.attack_sequence.as_ref().map(|sequence| {
            (
                Action::Attack(AttackAction {
                    attacks: build.attacks_per_action,
                }),
                sequence.expected_damage_against(self.target, advantage),
            )
        });

        for (index, spell) in build.spells.iter().enumerate() {
            if spell.bonus_action || self.concentrating_on(state, spell) {
                continue;
            }
            let slot_level = if spell.level == 0 {
                0
            } else {
                match state.lowest_slot(spell.level) {
                    Some(level) => level,
                    None => continue,
                }
            };
            let expected = spell_expected_damage(
                build,
                self.target,
                spell,
                advantage,
                state.resources.target_legendary_resistances,
            );
            let better = match &best {
                Some((_, current)) => expected > *current,
                None => true,
            };
            if better {
                best = Some((
                    Action::Spell(SpellAction {
                        spell: index,
                        slot_level,
                    }),
                    expected,
                ));
            }
        }

        best
    }

    fn concentrating_on(&self, state: &CombatState, spell: &Spell) -> bool {
        spell.concentration.is_some()
            && state
                .resources
                .concentration
                .as_ref()
                .is_some_and(|c| c.spell == spell.name)
    }

    fn bonus_action(&mut self, state: &mut CombatState, tally: &mut RunTally) -> i64 {
        if !state.economy.bonus_action {
            return 0;
        }
        let build = self.build;

        let castable = build.spells.iter().position(|spell| {
            spell.bonus_action
                && (spell.concentration.is_none() || state.resources.concentration.is_none())
                && (spell.level == 0 || state.lowest_slot(spell.level).is_some())
        });
        if let Some(index) = castable {
            state.economy.bonus_action = false;
            return self.cast_spell(state, tally, index);
        }

        if let Some(attack) = &build.bonus_attack {
            state.economy.bonus_action = false;
            let profile = AttackProfile {
                bonus: attack.attack_bonus,
                damage: &attack.damage,
                flat: attack.damage_bonus,
                damage_type: attack.damage_type,
                crit_range: 20,
                great_weapon_fighting: false,
                riders: true,
            };
            return self.resolve_attack(state, tally, &profile);
        }

        0
    }

    fn enemy_phase(&mut self, state: &mut CombatState, tally: &mut RunTally) -> i64 {
        let scenario = self.scenario;
        let mut dealt = 0;

        for action in &scenario.enemy_actions {
            if !self.rng.chance(action.probability) {
                continue;
            }
            match &action.effect {
                EnemyEffect::Damage { dice } => {
                    let amount = dice.roll(&mut self.rng).max(0);
                    self.take_damage(state, tally, amount);
                }
                EnemyEffect::Condition {
                    condition,
                    duration,
                } => {
                    if !state.downed {
                        state.impose_condition(action.name.clone(), *condition, *duration);
                    }
                }
                EnemyEffect::Provoke => {
                    dealt += self.opportunity_attack(state, tally);
                }
            }
        }

        dealt
    }

    fn opportunity_attack(&mut self, state: &mut CombatState, tally: &mut RunTally) -> i64 {
        if !self.build.policy.opportunity_attacks
            || !state.economy.reaction
            || !state.can_act()
            || self.build.weapon.is_none()
        {
            return 0;
        }
        state.economy.reaction = false;
        tally.usage.reactions += 1;
        self.weapon_attack(state, tally)
    }

    fn take_damage(&mut self, state: &mut CombatState, tally: &mut RunTally, amount: i64) {
        if amount <= 0 || state.downed {
            return;
        }
        tally.damage_taken += amount;
        let concentrating = state.resources.concentration.is_some();

        if state.take_damage(amount) {
            tally.downed = true;
            return;
        }

        if concentrating {
            let dc = (amount / 2).max(10);
            let roll = i64::from(self.rng.roll_die(20)) + i64::from(self.build.concentration_bonus());
            if roll < dc {
                state.drop_concentration();
                tally.usage.concentration_broken += 1;
            }
        }
    }

    fn weapon_attack(&mut self, state: &mut CombatState, tally: &mut RunTally) -> i64 {
        let build = self.build;
        let Some(weapon) = &build.weapon else {
            return 0;
        };
        let profile = AttackProfile {
            bonus: build.attack_bonus,
            damage: &weapon.damage,
            flat: weapon.damage_bonus,
            damage_type: weapon.damage_type,
            crit_range: weapon.crit_range,
            great_weapon_fighting: weapon.great_weapon_fighting,
            riders: true,
        };
        self.resolve_attack(state, tally, &profile)
    }

    fn roll_d20(&mut self, advantage: Advantage) -> u32 {
        let features = self.build.features;
        let mut face = match advantage {
            Advantage::Normal => self.rng.roll_die(20),
            Advantage::Advantage if features.elven_accuracy => {
                let a = self.rng.roll_die(20);
                let b = self.rng.roll_die(20);
                let c = self.rng.roll_die(20);
                a.max(b).max(c)
            }
            Advantage::Advantage => self.rng.roll_advantage(),
            Advantage::Disadvantage => self.rng.roll_disadvantage(),
        };
        if features.halfling_luck && face == 1 {
            face = self.rng.roll_die(20);
        }
        face
    }

    fn roll(&mut self, dice: &DiceExpr, crit: bool) -> i64 {
        if crit {
            dice.roll_crit(&mut self.rng)
        } else {
            dice.roll(&mut self.rng)
        }
    }

    fn resolve_attack(
        &mut self,
        state: &mut CombatState,
        tally: &mut RunTally,
        profile: &AttackProfile<'_>,
    ) -> i64 {
        let advantage = state.attack_advantage(self.build.advantage);
        let face = self.roll_d20(advantage);
        tally.attacks += 1;

        let crit = face != 1 && face >= profile.crit_range;
        let total = i64::from(face) + i64::from(profile.bonus);
        let hit = face != 1 && (crit || face == 20 || total >= i64::from(self.target.armor_class));
        if !hit {
            tally.misses += 1;
            return 0;
        }
        tally.hits += 1;
        if crit {
            tally.crits += 1;
        }

        let dice = if profile.great_weapon_fighting {
            let multiplier = if crit { 2 } else { 1 };
            profile
                .damage
                .roll_with_rerolls_scaled(&mut self.rng, multiplier, true, true)
        } else {
            self.roll(profile.damage, crit)
        };
        let mut dealt = self
            .target
            .modify_damage((dice + i64::from(profile.flat)).max(0), profile.damage_type);

        if profile.riders {
            dealt += self.hit_riders(state, tally, crit);
        }
        dealt
    }

    fn hit_riders(&mut self, state: &mut CombatState, tally: &mut RunTally, crit: bool) -> i64 {
        let build = self.build;
        let target = self.target;
        let mut dealt = 0;

        for (index, bonus) in build.once_per_turn.iter().enumerate() {
            let used = self.once_used.get(index).copied().unwrap_or(false);
            if bonus.allow_repeat || !used {
                if let Some(flag) = self.once_used.get_mut(index) {
                    *flag = true;
                }
                let amount = self.roll(&bonus.dice, crit).max(0);
                dealt += target.modify_damage(amount, bonus.damage_type);
            }
        }

        for rider in &build.resource_damage {
            let fire = match rider.trigger {
                RiderTrigger::Never => false,
                RiderTrigger::OnCrit => crit,
                RiderTrigger::Always => true,
            };
            if !fire {
                continue;
            }
            let extra_levels = match &rider.cost {
                ResourceCost::SpellSlot { min_level } => match state.spend_slot(*min_level) {
                    Some(level) => {
                        tally.usage.spend_slot(level);
                        level - min_level
                    }
                    None => continue,
                },
                ResourceCost::ClassResource { name } => {
                    if !state.spend_class_resource(name) {
                        continue;
                    }
                    tally.usage.spend_class_resource(name);
                    0
                }
            };
            let mut amount = self.roll(&rider.dice, crit);
            if let Some(per_level) = &rider.per_slot_level {
                for _ in 0..extra_levels {
                    amount += self.roll(per_level, crit);
                }
            }
            dealt += target.modify_damage(amount.max(0), rider.damage_type);
        }

        let concentration_rider = state
            .resources
            .concentration
            .as_ref()
            .and_then(|c| c.rider.clone());
        if let Some(rider) = concentration_rider {
            let amount = self.roll(&rider.dice, crit).max(0);
            dealt += target.modify_damage(amount, rider.damage_type);
        }

        dealt
    }

    fn cast_spell(&mut self, state: &mut CombatState, tally: &mut RunTally, index: usize) -> i64 {
        let build = self.build;
        let target = self.target;
        let Some(spell) = build.spells.get(index) else {
            return 0;
        };

        if spell.level > 0 {
            match state.spend_slot(spell.level) {
                Some(level) => tally.usage.spend_slot(level),
                None => return 0,
            }
        }
        if let Some(rider) = &spell.concentration {
            state.start_concentration(&spell.name, Some(rider.clone()), rider.duration);
        }
        if spell.damage.max_value() <= 0 {
            return 0;
        }

        match spell.resolution {
            SpellResolution::Attack => {
                let profile = AttackProfile {
                    bonus: build.spell_attack_bonus,
                    damage: &spell.damage,
                    flat: 0,
                    damage_type: spell.damage_type,
                    crit_range: 20,
                    great_weapon_fighting: false,
                    riders: false,
                };
                self.resolve_attack(state, tally, &profile)
            }
            SpellResolution::Save {
                ability,
                half_on_save,
            } => {
                let face = if target.magic_resistance {
                    self.rng.roll_advantage()
                } else {
                    self.rng.roll_die(20)
                };
                let mut saved = i64::from(face) + i64::from(target.saves.get(ability))
                    >= i64::from(build.spell_save_dc);
                if !saved && state.resources.target_legendary_resistances > 0 {
                    state.resources.target_legendary_resistances -= 1;
                    tally.usage.legendary_resistances += 1;
                    saved = true;
                }
                let full = spell.damage.roll(&mut self.rng).max(0);
                let amount = match (saved, half_on_save) {
                    (false, _) => full,
                    (true, true) => full / 2,
                    (true, false) => 0,
                };
                target.modify_damage(amount, spell.damage_type)
            }
            SpellResolution::Automatic => {
                let amount = spell.damage.roll(&mut self.rng).max(0);
                target.modify_damage(amount, spell.damage_type)
            }
        }
    }
}
