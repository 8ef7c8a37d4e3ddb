//! Closed-form combat probability.
//!
//! Pure, stateless functions over d20 mechanics. Nothing here samples: the
//! power-attack optimizer and the level analyzer are built entirely on these
//! functions, so equal inputs must give bit-equal outputs.
//!
//! # Conventions
//!
//! - Attack rolls: natural 1 always misses, natural 20 always hits, so hit
//!   probability lives in `[0.05, 0.95]`.
//! - Saving throws have no automatic results; success lives in `[0, 1]`.
//! - Every face in the crit range hits, so an expanded crit range raises the
//!   hit floor above 0.05.
//! - Halfling Luck rerolls the kept d20 once when it shows a natural 1; the
//!   chance of that depends on how many dice were rolled.

use serde::{Deserialize, Serialize};

use crate::dice::{expected_str, Advantage};

/// Probability of any single d20 face.
pub const FACE: f64 = 0.05;
/// Lowest attack hit chance (natural 20).
pub const MIN_HIT: f64 = 0.05;
/// Highest attack hit chance (natural 1 misses).
pub const MAX_HIT: f64 = 0.95;

/// Chance that an attack with `attack_bonus` hits armor class `ac`.
///
/// Required roll is `clamp(ac - bonus, 1, 20)`, probability
/// `(21 - required) / 20`, then clamped to `[0.05, 0.95]`.
#[must_use]
pub fn hit_probability(attack_bonus: f64, ac: f64) -> f64 {
    let required = (ac - attack_bonus).clamp(1.0, 20.0);
    ((21.0 - required) / 20.0).clamp(MIN_HIT, MAX_HIT)
}

/// Chance that a d20 lands in the crit range (`crit_range..=20`).
///
/// A natural 1 never crits, so the range stops at 2.
#[must_use]
pub fn crit_probability(crit_range: u32) -> f64 {
    let range = crit_range.clamp(2, 20);
    f64::from(21 - range) / 20.0
}

/// Transform a single-roll success chance for an advantage state.
#[must_use]
pub fn apply_advantage(p: f64, state: Advantage) -> f64 {
    match state {
        Advantage::Normal => p,
        Advantage::Advantage => 1.0 - (1.0 - p).powi(2),
        Advantage::Disadvantage => p * p,
    }
}

/// Hit chance with advantage.
#[must_use]
pub fn advantage_hit_probability(attack_bonus: f64, ac: f64) -> f64 {
    apply_advantage(hit_probability(attack_bonus, ac), Advantage::Advantage)
}

/// Hit chance with disadvantage.
#[must_use]
pub fn disadvantage_hit_probability(attack_bonus: f64, ac: f64) -> f64 {
    apply_advantage(hit_probability(attack_bonus, ac), Advantage::Disadvantage)
}

/// Best of three d20 (Elven Accuracy under advantage).
#[must_use]
pub fn elven_accuracy(p: f64) -> f64 {
    1.0 - (1.0 - p).powi(3)
}

/// Reroll a natural 1 once (Halfling Luck) on a single d20.
///
/// Only the 1-in-20 natural-1 outcome gets a second attempt, so the gain is
/// `p / 20` rather than an advantage curve.
#[must_use]
pub fn halfling_luck(p: f64) -> f64 {
    halfling_luck_kept(p, p, FACE)
}

/// Halfling Luck on a kept d20.
///
/// `kept` is the success chance of the kept die, `single` that of one fresh
/// d20 and `natural_one` the chance the kept die shows a 1.
#[must_use]
pub fn halfling_luck_kept(kept: f64, single: f64, natural_one: f64) -> f64 {
    kept + natural_one * single
}

/// Chance the kept d20 shows a natural 1 under a roll state.
#[must_use]
pub fn natural_one_probability(state: Advantage, elven_accuracy: bool) -> f64 {
    match state {
        Advantage::Normal => FACE,
        Advantage::Advantage if elven_accuracy => FACE.powi(3),
        Advantage::Advantage => FACE * FACE,
        Advantage::Disadvantage => 1.0 - (1.0 - FACE).powi(2),
    }
}

/// Chance of at least one success in `n` independent attempts.
#[must_use]
pub fn multi_attack_hit_probability(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 - (1.0 - p).powi(n as i32)
}

/// Expected number of successes in `n` attempts.
#[must_use]
pub fn expected_hits(p: f64, n: u32) -> f64 {
    p * f64::from(n)
}

/// Chance a target with `save_bonus` succeeds against `dc`.
#[must_use]
pub fn save_success_probability(save_bonus: f64, dc: f64) -> f64 {
    let required = (dc - save_bonus).clamp(1.0, 21.0);
    ((21.0 - required) / 20.0).clamp(0.0, 1.0)
}

/// Chance a target with `save_bonus` fails against `dc`.
#[must_use]
pub fn save_fail_probability(save_bonus: f64, dc: f64) -> f64 {
    1.0 - save_success_probability(save_bonus, dc)
}

/// Expected damage of a save-based effect.
///
/// `full * fail + half * full * success`, where `half` is 0.5 for
/// save-for-half effects and 0 otherwise.
#[must_use]
pub fn save_spell_expected_damage(full_damage: f64, fail_probability: f64, half_on_save: bool) -> f64 {
    let half = if half_on_save { 0.5 } else { 0.0 };
    full_damage * fail_probability + half * full_damage * (1.0 - fail_probability)
}

/// Blended failure rate across `encounter_saves` saves when the first
/// `min(resistances, encounter_saves)` are forced successes.
#[must_use]
pub fn legendary_resistance_fail_rate(base_fail: f64, resistances: u32, encounter_saves: u32) -> f64 {
    if encounter_saves == 0 {
        return 0.0;
    }
    let forced = resistances.min(encounter_saves);
    f64::from(encounter_saves - forced) * base_fail / f64::from(encounter_saves)
}

/// Advantage on saves: failing requires failing twice.
#[must_use]
pub fn magic_resistance(fail_probability: f64) -> f64 {
    fail_probability * fail_probability
}

/// Closed-form expectation of a signed dice string; unparseable input is 0.
#[must_use]
pub fn bonus_dice_expectation(expr: &str) -> f64 {
    expected_str(expr)
}

/// Expected value of one die with faces 1 and 2 rerolled once.
#[must_use]
pub fn great_weapon_fighting_die_expectation(sides: u32) -> f64 {
    if sides == 0 {
        return 0.0;
    }
    let s = f64::from(sides);
    let plain = (s + 1.0) / 2.0;
    let rerolled_faces = f64::from(sides.min(2));
    let kept: f64 = (3..=sides).map(f64::from).sum();
    (rerolled_faces * plain + kept) / s
}

/// Hit and crit chance for one attack under a given roll state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackOdds {
    /// Chance to hit, crits included.
    pub hit: f64,
    /// Chance to crit.
    pub crit: f64,
}

impl AttackOdds {
    /// Odds for `attack_bonus` vs `ac` with crits on `crit_range+`.
    #[must_use]
    pub fn new(attack_bonus: f64, ac: f64, crit_range: u32, state: Advantage) -> Self {
        Self::roll(attack_bonus, ac, crit_range, state, false, false)
    }

    /// Odds rolling three dice and keeping the best (Elven Accuracy with advantage).
    #[must_use]
    pub fn elven(attack_bonus: f64, ac: f64, crit_range: u32) -> Self {
        Self::roll(attack_bonus, ac, crit_range, Advantage::Advantage, true, false)
    }

    /// Odds for one d20.
    #[must_use]
    pub fn single(attack_bonus: f64, ac: f64, crit_range: u32) -> Self {
        let crit = crit_probability(crit_range);
        // A crit-range face always hits.
        let hit = hit_probability(attack_bonus, ac).max(crit);
        Self { hit, crit }
    }

    /// Odds for the kept d20 under a roll state.
    ///
    /// Elven Accuracy only matters with advantage. Halfling Luck rerolls the
    /// kept die once on a natural 1, and the reroll is a single d20.
    #[must_use]
    pub fn roll(
        attack_bonus: f64,
        ac: f64,
        crit_range: u32,
        state: Advantage,
        elven: bool,
        lucky: bool,
    ) -> Self {
        let single = Self::single(attack_bonus, ac, crit_range);
        let elven = elven && state == Advantage::Advantage;
        let keep = |p: f64| {
            if elven {
                elven_accuracy(p)
            } else {
                apply_advantage(p, state)
            }
        };
        let kept = Self {
            hit: keep(single.hit),
            crit: keep(single.crit),
        };
        if !lucky {
            return kept;
        }
        let one = natural_one_probability(state, elven);
        Self {
            hit: halfling_luck_kept(kept.hit, single.hit, one),
            crit: halfling_luck_kept(kept.crit, single.crit, one),
        }
    }

    /// Chance of a non-crit hit.
    #[must_use]
    pub fn normal_hit(&self) -> f64 {
        (self.hit - self.crit).max(0.0)
    }
}

/// Expected damage of one attack.
///
/// `dice` is the average of the dice portion (doubled on a crit), `flat` the
/// static bonus applied once per hit.
#[must_use]
pub fn expected_attack_damage(odds: AttackOdds, dice: f64, flat: f64) -> f64 {
    odds.normal_hit() * (dice + flat) + odds.crit * (2.0 * dice + flat)
}
