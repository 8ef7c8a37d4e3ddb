//! Power-attack break-even analysis.
//!
//! Compares an [`AttackSequence`] with its power-attack variant (attack
//! penalty, flat damage bonus per hit) in closed form. Everything here is
//! deterministic.
//!
//! # Break-even search
//!
//! The expected-value delta falls as AC rises until both profiles sit on the
//! crit-range floor. The search bisects `[ac_min, ac_max]`: a positive delta
//! moves the lower bound up, a non-positive one moves the upper bound down.
//! The AC with the smallest `|delta|` seen is returned, flagged `converged`
//! only when that delta is within tolerance.
//!
//! # Example
//!
//! ```rust
//! use dprsim::combat::DamageType;
//! use dprsim::dice::DiceExpr;
//! use dprsim::optimizer::{AttackSequence, DamageModifier, PowerAttackOptimizer};
//!
//! let greatsword = AttackSequence::new(
//!     8.0,
//!     1,
//!     DamageModifier::weapon("Greatsword", DiceExpr::dice(2, 6), 5.0, DamageType::Slashing),
//! );
//! let analysis = PowerAttackOptimizer::default().analyze(&greatsword, 15.0);
//! assert!(analysis.should_use_power_attack);
//! assert!((analysis.break_even.armor_class - 18.0).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};

use super::sequence::{AttackSequence, DamageModifier};
use crate::combat::DamageType;
use crate::config::PowerAttackConfig;
use crate::dice::{Advantage, DiceExpr};
use crate::error::{SimError, SimResult};

/// Largest buff list [`PowerAttackOptimizer::sweep_buffs`] enumerates.
pub const MAX_BUFFS: usize = 12;

/// Estimated break-even armor class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakEven {
    /// AC with the smallest |delta| found.
    pub armor_class: f64,
    /// Delta at that AC.
    pub delta: f64,
    /// |delta| within tolerance.
    pub converged: bool,
    /// Bisection steps taken.
    pub iterations: u32,
}

/// Normal vs power-attack comparison at one AC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerAttackAnalysis {
    /// Armor class analyzed.
    pub armor_class: f64,
    /// Expected damage per turn without power attack.
    pub normal_dpr: f64,
    /// Expected damage per turn with power attack.
    pub power_attack_dpr: f64,
    /// `power_attack_dpr - normal_dpr`.
    pub expected_value_delta: f64,
    /// Delta reaches the configured threshold.
    pub should_use_power_attack: bool,
    /// Break-even estimate for the same profile.
    pub break_even: BreakEven,
}

/// Analysis under one roll state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvantageSweep {
    /// Roll state.
    pub advantage: Advantage,
    /// Result.
    pub analysis: PowerAttackAnalysis,
}

/// Temporary bonus to attack rolls or damage (Bless, Hunter's Mark, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    /// Display name.
    pub name: String,
    /// Flat attack bonus.
    #[serde(default)]
    pub attack_bonus: f64,
    /// Dice added to attack rolls, counted at their average.
    #[serde(default)]
    pub attack_dice: Option<DiceExpr>,
    /// Dice added to every hit.
    #[serde(default)]
    pub damage_dice: Option<DiceExpr>,
    /// Flat damage added to every hit.
    #[serde(default)]
    pub damage_bonus: f64,
    /// Damage type of the added damage.
    #[serde(default = "default_buff_damage_type")]
    pub damage_type: DamageType,
}

const fn default_buff_damage_type() -> DamageType {
    DamageType::Force
}

impl Buff {
    /// Attack-roll buff.
    #[must_use]
    pub fn attack(name: impl Into<String>, attack_bonus: f64) -> Self {
        Self {
            name: name.into(),
            attack_bonus,
            attack_dice: None,
            damage_dice: None,
            damage_bonus: 0.0,
            damage_type: default_buff_damage_type(),
        }
    }

    /// Per-hit damage buff.
    #[must_use]
    pub fn damage(name: impl Into<String>, dice: DiceExpr, damage_type: DamageType) -> Self {
        Self {
            damage_dice: Some(dice),
            damage_type,
            ..Self::attack(name, 0.0)
        }
    }

    /// Profile with this buff applied.
    #[must_use]
    pub fn apply(&self, sequence: &AttackSequence) -> AttackSequence {
        let mut buffed = sequence.clone();
        buffed.attack_bonus += self.attack_bonus
            + self
                .attack_dice
                .as_ref()
                .map_or(0.0, DiceExpr::expected_value);

        let dice = self.damage_dice.clone();
        if dice.is_some() || self.damage_bonus.abs() > 0.0 {
            buffed.modifiers.push(DamageModifier {
                flat: self.damage_bonus,
                ..DamageModifier::feature(
                    self.name.clone(),
                    dice.unwrap_or_else(|| DiceExpr::flat(0)),
                    self.damage_type,
                    false,
                )
            });
        }
        buffed
    }
}

/// Analysis of one buff subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffCombination {
    /// Names of the active buffs, in input order.
    pub buffs: Vec<String>,
    /// Result.
    pub analysis: PowerAttackAnalysis,
}

/// Closed-form power-attack optimizer.
#[derive(Debug, Clone, Default)]
pub struct PowerAttackOptimizer {
    settings: PowerAttackConfig,
}

impl PowerAttackOptimizer {
    /// Create an optimizer from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn new(settings: PowerAttackConfig) -> SimResult<Self> {
        settings.check()?;
        Ok(Self { settings })
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &PowerAttackConfig {
        &self.settings
    }

    /// Power-attack variant of a profile.
    #[must_use]
    pub fn power_attack(&self, sequence: &AttackSequence) -> AttackSequence {
        sequence.power_attack(self.settings.penalty, self.settings.damage_bonus)
    }

    /// EV delta of power attacking at `ac`.
    #[must_use]
    pub fn delta(&self, sequence: &AttackSequence, ac: f64) -> f64 {
        self.power_attack(sequence).expected_damage(ac) - sequence.expected_damage(ac)
    }

    /// Compare normal and power-attack damage at `ac` under the profile's
    /// own roll state.
    #[must_use]
    pub fn analyze(&self, sequence: &AttackSequence, ac: f64) -> PowerAttackAnalysis {
        let normal_dpr = sequence.expected_damage(ac);
        let power_attack_dpr = self.power_attack(sequence).expected_damage(ac);
        let expected_value_delta = power_attack_dpr - normal_dpr;

        PowerAttackAnalysis {
            armor_class: ac,
            normal_dpr,
            power_attack_dpr,
            expected_value_delta,
            should_use_power_attack: expected_value_delta >= self.settings.threshold,
            break_even: self.break_even(sequence),
        }
    }

    /// Bisect for the AC where power attacking stops paying off.
    #[must_use]
    pub fn break_even(&self, sequence: &AttackSequence) -> BreakEven {
        let settings = &self.settings;
        let mut lo = settings.ac_min;
        let mut hi = settings.ac_max;
        let mut best = BreakEven {
            armor_class: lo,
            delta: self.delta(sequence, lo),
            converged: false,
            iterations: 0,
        };

        for iteration in 1..=settings.max_iterations {
            let mid = (lo + hi) / 2.0;
            let delta = self.delta(sequence, mid);
            if delta.abs() < best.delta.abs() {
                best.armor_class = mid;
                best.delta = delta;
            }
            best.iterations = iteration;
            if delta.abs() <= settings.tolerance {
                break;
            }
            if delta > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        best.converged = best.delta.abs() <= settings.tolerance;
        tracing::trace!(
            ac = best.armor_class,
            delta = best.delta,
            converged = best.converged,
            "break-even search finished"
        );
        best
    }

    /// Analyze every integer AC in `[from, to]`.
    #[must_use]
    pub fn sweep_ac(&self, sequence: &AttackSequence, from: u32, to: u32) -> Vec<PowerAttackAnalysis> {
        (from..=to)
            .map(|ac| self.analyze(sequence, f64::from(ac)))
            .collect()
    }

    /// Analyze `ac` under normal, advantage and disadvantage rolls.
    #[must_use]
    pub fn sweep_advantage(&self, sequence: &AttackSequence, ac: f64) -> Vec<AdvantageSweep> {
        Advantage::ALL
            .into_iter()
            .map(|advantage| AdvantageSweep {
                advantage,
                analysis: self.analyze(&sequence.clone().with_advantage(advantage), ac),
            })
            .collect()
    }

    /// Analyze `ac` under every subset of `buffs`, empty subset first.
    ///
    /// Subset `mask` activates buff `i` when bit `i` is set.
    ///
    /// # Errors
    ///
    /// Returns `Optimization` for more than [`MAX_BUFFS`] buffs.
    pub fn sweep_buffs(
        &self,
        sequence: &AttackSequence,
        ac: f64,
        buffs: &[Buff],
    ) -> SimResult<Vec<BuffCombination>> {
        if buffs.len() > MAX_BUFFS {
            return Err(SimError::optimization(format!(
                "{} buffs exceed the limit of {MAX_BUFFS}",
                buffs.len()
            )));
        }

        let combinations = (0..1usize << buffs.len())
            .map(|mask| {
                let active: Vec<&Buff> = buffs
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, buff)| buff)
                    .collect();
                let buffed = active
                    .iter()
                    .fold(sequence.clone(), |seq, buff| buff.apply(&seq));
                BuffCombination {
                    buffs: active.iter().map(|b| b.name.clone()).collect(),
                    analysis: self.analyze(&buffed, ac),
                }
            })
            .collect();
        Ok(combinations)
    }
}
