//! Dice notation.
//!
//! Parses compact notation (`2d6+3`, `1d8-1`, `3*(1d4+1)`, `7`) into an
//! immutable [`DiceExpr`] and evaluates it against a [`SimRng`].
//!
//! Two entry points exist on purpose:
//! - `DiceExpr::from_str` is strict and returns a [`DiceError`], used when
//!   validating builds before a simulation starts.
//! - [`roll_str`] and [`expected_str`] are lenient: unparseable input logs a
//!   warning and evaluates to `0`.

mod expr;

pub use expr::{DiceExpr, Term, TermKind, MAX_DICE_PER_TERM, MAX_SIDES};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::rng::SimRng;

/// Dice parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    /// Input was empty or whitespace.
    #[error("Dice expression is empty")]
    Empty,

    /// Input ended where a term was expected.
    #[error("Dice expression ended unexpectedly")]
    UnexpectedEnd,

    /// Character that fits nowhere in the grammar.
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Character offset.
        position: usize,
    },

    /// Number does not fit in 32 bits.
    #[error("Invalid number at position {position}")]
    Number {
        /// Character offset.
        position: usize,
    },

    /// `NdS` with `S` missing.
    #[error("Missing die size at position {position}")]
    MissingSides {
        /// Character offset.
        position: usize,
    },

    /// `Nd0`.
    #[error("Die must have at least one side (position {position})")]
    ZeroSides {
        /// Character offset.
        position: usize,
    },

    /// Term rolls more dice than allowed.
    #[error("Too many dice in one term: {count} (max {max})")]
    TooManyDice {
        /// Requested dice.
        count: u32,
        /// Allowed maximum.
        max: u32,
    },

    /// Die has more faces than allowed.
    #[error("Too many sides on one die: {sides} (max {max})")]
    TooManySides {
        /// Requested faces.
        sides: u32,
        /// Allowed maximum.
        max: u32,
    },

    /// Scaled composite without closing parenthesis.
    #[error("Parenthesis was not closed")]
    UnclosedParenthesis,
}

/// Roll state of a d20 test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    /// Single d20.
    #[default]
    Normal,
    /// Best of two d20.
    Advantage,
    /// Worst of two d20.
    Disadvantage,
}

impl Advantage {
    /// All three states, in report order.
    pub const ALL: [Self; 3] = [Self::Normal, Self::Advantage, Self::Disadvantage];

    /// Combine two sources: advantage and disadvantage cancel to normal.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Normal, x) | (x, Self::Normal) => x,
            (Self::Advantage, Self::Advantage) => Self::Advantage,
            (Self::Disadvantage, Self::Disadvantage) => Self::Disadvantage,
            _ => Self::Normal,
        }
    }
}

/// Roll a dice string, treating parse failures as `0`.
pub fn roll_str(expr: &str, rng: &mut SimRng) -> i64 {
    match expr.parse::<DiceExpr>() {
        Ok(parsed) => parsed.roll(rng),
        Err(err) => {
            tracing::warn!(expr, error = %err, "unparseable dice expression, rolling 0");
            0
        }
    }
}

/// Closed-form expected value of a dice string, treating parse failures as `0`.
#[must_use]
pub fn expected_str(expr: &str) -> f64 {
    match expr.parse::<DiceExpr>() {
        Ok(parsed) => parsed.expected_value(),
        Err(err) => {
            tracing::warn!(expr, error = %err, "unparseable dice expression, expecting 0");
            0.0
        }
    }
}
