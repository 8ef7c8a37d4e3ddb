//! Dice expression AST, parser and evaluator.
//!
//! Grammar:
//!
//! ```text
//! expr   := INT '*' '(' expr ')' | sum
//! sum    := ['+' | '-'] term (('+' | '-') term)*
//! term   := [INT] ('d' | 'D') INT | INT
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Advantage, DiceError};
use crate::engine::rng::SimRng;

/// Upper bound on dice in one term.
pub const MAX_DICE_PER_TERM: u32 = 1_000;

/// Upper bound on faces per die.
pub const MAX_SIDES: u32 = 1_000;

/// Kind of a single summand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermKind {
    /// `count` dice with `sides` faces.
    Dice {
        /// Number of dice.
        count: u32,
        /// Faces per die.
        sides: u32,
    },
    /// Constant value.
    Flat(u32),
}

/// A signed summand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Whether the term is subtracted.
    pub negative: bool,
    /// Dice or flat value.
    pub kind: TermKind,
}

impl Term {
    const fn sign(self) -> i64 {
        if self.negative {
            -1
        } else {
            1
        }
    }

    fn expected(self) -> f64 {
        let magnitude = match self.kind {
            TermKind::Dice { count, sides } => f64::from(count) * (f64::from(sides) + 1.0) / 2.0,
            TermKind::Flat(n) => f64::from(n),
        };
        self.sign() as f64 * magnitude
    }

    fn extreme(self, high: bool) -> i64 {
        let (lo, hi) = match self.kind {
            TermKind::Dice { count, sides } => (
                i64::from(count),
                i64::from(count).saturating_mul(i64::from(sides)),
            ),
            TermKind::Flat(n) => (i64::from(n), i64::from(n)),
        };
        // Subtracted terms reach their maximum contribution at their minimum roll.
        match (high, self.negative) {
            (true, false) => hi,
            (true, true) => -lo,
            (false, false) => lo,
            (false, true) => -hi,
        }
    }
}

/// Parsed, immutable dice expression.
///
/// Serializes as its canonical string form (`"2d6+3"`, `"3*(1d4+1)"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DiceExpr {
    /// `factor * (inner)`; one roll of `inner`, multiplied.
    Scaled {
        /// Multiplier.
        factor: u32,
        /// Scaled sub-expression.
        inner: Box<DiceExpr>,
    },
    /// Signed sum of terms.
    Sum(Vec<Term>),
}

impl DiceExpr {
    /// Expression with a single dice term, e.g. `dice(2, 6)` is `2d6`.
    #[must_use]
    pub fn dice(count: u32, sides: u32) -> Self {
        Self::Sum(vec![Term {
            negative: false,
            kind: TermKind::Dice { count, sides },
        }])
    }

    /// Constant expression.
    #[must_use]
    pub fn flat(value: u32) -> Self {
        Self::Sum(vec![Term {
            negative: false,
            kind: TermKind::Flat(value),
        }])
    }

    /// Closed-form expected value.
    #[must_use]
    pub fn expected_value(&self) -> f64 {
        match self {
            Self::Scaled { factor, inner } => f64::from(*factor) * inner.expected_value(),
            Self::Sum(terms) => terms.iter().map(|t| t.expected()).sum(),
        }
    }

    /// Expected value of the dice portion only (flat terms excluded).
    #[must_use]
    pub fn expected_dice_value(&self) -> f64 {
        match self {
            Self::Scaled { factor, inner } => f64::from(*factor) * inner.expected_dice_value(),
            Self::Sum(terms) => terms
                .iter()
                .filter(|t| matches!(t.kind, TermKind::Dice { .. }))
                .map(|t| t.expected())
                .sum(),
        }
    }

    /// Expected value of the dice portion with a custom per-die mean.
    ///
    /// `die_mean(sides)` replaces `(sides + 1) / 2`, e.g. for reroll rules.
    #[must_use]
    pub fn expected_dice_value_with<F: Fn(u32) -> f64>(&self, die_mean: &F) -> f64 {
        match self {
            Self::Scaled { factor, inner } => {
                f64::from(*factor) * inner.expected_dice_value_with(die_mean)
            }
            Self::Sum(terms) => terms
                .iter()
                .map(|t| match t.kind {
                    TermKind::Dice { count, sides } => {
                        let v = f64::from(count) * die_mean(sides);
                        if t.negative {
                            -v
                        } else {
                            v
                        }
                    }
                    TermKind::Flat(_) => 0.0,
                })
                .sum(),
        }
    }

    /// Smallest possible result.
    #[must_use]
    pub fn min_value(&self) -> i64 {
        match self {
            Self::Scaled { factor, inner } => i64::from(*factor).saturating_mul(inner.min_value()),
            Self::Sum(terms) => saturating_sum(terms.iter().map(|t| t.extreme(false))),
        }
    }

    /// Largest possible result.
    #[must_use]
    pub fn max_value(&self) -> i64 {
        match self {
            Self::Scaled { factor, inner } => i64::from(*factor).saturating_mul(inner.max_value()),
            Self::Sum(terms) => saturating_sum(terms.iter().map(|t| t.extreme(true))),
        }
    }

    /// Total number of dice rolled by one evaluation.
    #[must_use]
    pub fn dice_count(&self) -> u32 {
        match self {
            Self::Scaled { inner, .. } => inner.dice_count(),
            Self::Sum(terms) => terms
                .iter()
                .map(|t| match t.kind {
                    TermKind::Dice { count, .. } => count,
                    TermKind::Flat(_) => 0,
                })
                .fold(0u32, u32::saturating_add),
        }
    }

    /// Roll the expression.
    pub fn roll(&self, rng: &mut SimRng) -> i64 {
        self.evaluate(&mut |count, sides| i64::from(rng.roll_dice(count, sides)))
    }

    /// Roll with every dice term doubled (critical hit); flat terms count once.
    pub fn roll_crit(&self, rng: &mut SimRng) -> i64 {
        self.evaluate(&mut |count, sides| i64::from(rng.roll_dice(count.saturating_mul(2), sides)))
    }

    /// Roll with single-d20 terms replaced by an advantage or disadvantage roll.
    ///
    /// Flat bonuses and penalties are kept. Expressions without a d20 roll
    /// normally.
    pub fn roll_with_advantage(&self, rng: &mut SimRng, state: Advantage) -> i64 {
        self.evaluate(&mut |count, sides| {
            if count == 1 && sides == 20 {
                let face = match state {
                    Advantage::Normal => rng.roll_die(20),
                    Advantage::Advantage => rng.roll_advantage(),
                    Advantage::Disadvantage => rng.roll_disadvantage(),
                };
                i64::from(face)
            } else {
                i64::from(rng.roll_dice(count, sides))
            }
        })
    }

    /// Roll damage, rerolling dice that land on 1 and/or 2 exactly once.
    ///
    /// The rerolled value stands even if it is another 1 or 2.
    pub fn roll_with_rerolls(&self, rng: &mut SimRng, reroll_ones: bool, reroll_twos: bool) -> i64 {
        self.roll_with_rerolls_scaled(rng, 1, reroll_ones, reroll_twos)
    }

    /// [`roll_with_rerolls`](Self::roll_with_rerolls) with dice counts multiplied
    /// by `dice_multiplier` (2 on a critical hit).
    pub fn roll_with_rerolls_scaled(
        &self,
        rng: &mut SimRng,
        dice_multiplier: u32,
        reroll_ones: bool,
        reroll_twos: bool,
    ) -> i64 {
        self.evaluate(&mut |count, sides| {
            let mut total = 0i64;
            for _ in 0..count.saturating_mul(dice_multiplier) {
                let mut face = rng.roll_die(sides);
                if (face == 1 && reroll_ones) || (face == 2 && reroll_twos) {
                    face = rng.roll_die(sides);
                }
                total = total.saturating_add(i64::from(face));
            }
            total
        })
    }

    fn evaluate<F: FnMut(u32, u32) -> i64>(&self, roll_dice: &mut F) -> i64 {
        match self {
            Self::Scaled { factor, inner } => {
                i64::from(*factor).saturating_mul(inner.evaluate(roll_dice))
            }
            Self::Sum(terms) => saturating_sum(terms.iter().map(|t| {
                let value = match t.kind {
                    TermKind::Dice { count, sides } => roll_dice(count, sides),
                    TermKind::Flat(n) => i64::from(n),
                };
                t.sign() * value
            })),
        }
    }
}

/// Sum that pins at the `i64` bounds instead of wrapping.
fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaled { factor, inner } => write!(f, "{factor}*({inner})"),
            Self::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if term.negative {
                        write!(f, "-")?;
                    } else if i > 0 {
                        write!(f, "+")?;
                    }
                    match term.kind {
                        TermKind::Dice { count, sides } => write!(f, "{count}d{sides}")?,
                        TermKind::Flat(n) => write!(f, "{n}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl FromStr for DiceExpr {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s).parse()
    }
}

impl TryFrom<String> for DiceExpr {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiceExpr> for String {
    fn from(expr: DiceExpr) -> Self {
        expr.to_string()
    }
}

struct Parser {
    input: Vec<char>,
    position: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn parse(mut self) -> Result<DiceExpr, DiceError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(DiceError::Empty);
        }
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        match self.peek() {
            None => Ok(expr),
            Some(ch) => Err(DiceError::UnexpectedChar {
                ch,
                position: self.position,
            }),
        }
    }

    fn parse_expr(&mut self) -> Result<DiceExpr, DiceError> {
        self.skip_whitespace();
        let start = self.position;
        if let Some(factor) = self.read_number()? {
            self.skip_whitespace();
            if self.peek() == Some('*') {
                self.position += 1;
                self.skip_whitespace();
                self.expect('(')?;
                let inner = self.parse_expr()?;
                self.skip_whitespace();
                if self.peek() != Some(')') {
                    return Err(DiceError::UnclosedParenthesis);
                }
                self.position += 1;
                return Ok(DiceExpr::Scaled {
                    factor,
                    inner: Box::new(inner),
                });
            }
        }
        self.position = start;
        self.parse_sum()
    }

    fn parse_sum(&mut self) -> Result<DiceExpr, DiceError> {
        let mut terms = Vec::new();
        let mut negative = match self.peek() {
            Some('+') => {
                self.position += 1;
                false
            }
            Some('-') => {
                self.position += 1;
                true
            }
            _ => false,
        };

        loop {
            self.skip_whitespace();
            terms.push(self.parse_term(negative)?);
            self.skip_whitespace();
            match self.peek() {
                Some('+') => negative = false,
                Some('-') => negative = true,
                _ => break,
            }
            self.position += 1;
        }

        Ok(DiceExpr::Sum(terms))
    }

    fn parse_term(&mut self, negative: bool) -> Result<Term, DiceError> {
        let start = self.position;
        let count = self.read_number()?;

        if matches!(self.peek(), Some('d' | 'D')) {
            self.position += 1;
            let sides_at = self.position;
            let sides = self
                .read_number()?
                .ok_or(DiceError::MissingSides { position: sides_at })?;
            if sides == 0 {
                return Err(DiceError::ZeroSides { position: sides_at });
            }
            if sides > MAX_SIDES {
                return Err(DiceError::TooManySides {
                    sides,
                    max: MAX_SIDES,
                });
            }
            let count = count.unwrap_or(1);
            if count > MAX_DICE_PER_TERM {
                return Err(DiceError::TooManyDice {
                    count,
                    max: MAX_DICE_PER_TERM,
                });
            }
            return Ok(Term {
                negative,
                kind: TermKind::Dice { count, sides },
            });
        }

        match count {
            Some(n) => Ok(Term {
                negative,
                kind: TermKind::Flat(n),
            }),
            None => match self.peek() {
                Some(ch) => Err(DiceError::UnexpectedChar {
                    ch,
                    position: start,
                }),
                None => Err(DiceError::UnexpectedEnd),
            },
        }
    }

    fn read_number(&mut self) -> Result<Option<u32>, DiceError> {
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.position += 1;
        }
        if start == self.position {
            return Ok(None);
        }
        let digits: String = self.input[start..self.position].iter().collect();
        digits
            .parse::<u32>()
            .map(Some)
            .map_err(|_| DiceError::Number { position: start })
    }

    fn expect(&mut self, expected: char) -> Result<(), DiceError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.position += 1;
                Ok(())
            }
            Some(ch) => Err(DiceError::UnexpectedChar {
                ch,
                position: self.position,
            }),
            None => Err(DiceError::UnexpectedEnd),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> DiceExpr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_standard() {
        let expr = parse("2d6+3");
        assert_eq!(
            expr,
            DiceExpr::Sum(vec![
                Term {
                    negative: false,
                    kind: TermKind::Dice { count: 2, sides: 6 }
                },
                Term {
                    negative: false,
                    kind: TermKind::Flat(3)
                },
            ])
        );
    }

    #[test]
    fn test_parse_penalty_and_implicit_count() {
        let expr = parse("d8-1");
        assert_eq!(expr.to_string(), "1d8-1");
        assert_eq!(expr.min_value(), 0);
        assert_eq!(expr.max_value(), 7);
    }

    #[test]
    fn test_parse_scaled() {
        let expr = parse("3*(1d4+1)");
        assert!(matches!(expr, DiceExpr::Scaled { factor: 3, .. }));
        assert!((expr.expected_value() - 10.5).abs() < f64::EPSILON);
        assert_eq!(expr.to_string(), "3*(1d4+1)");
    }

    #[test]
    fn test_parse_whitespace_and_case() {
        let expr = parse("  2D6 + 1d4 - 2 ");
        assert_eq!(expr.to_string(), "2d6+1d4-2");
    }

    #[test]
    fn test_parse_literal() {
        let expr = parse("7");
        assert_eq!(expr, DiceExpr::flat(7));
        let mut rng = SimRng::new(1);
        assert_eq!(expr.roll(&mut rng), 7);
    }

    #[test]
    fn test_parse_leading_minus() {
        let expr = parse("-1d4");
        assert_eq!(expr.min_value(), -4);
        assert_eq!(expr.max_value(), -1);
        assert!((expr.expected_value() + 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<DiceExpr>(), Err(DiceError::Empty));
        assert_eq!("   ".parse::<DiceExpr>(), Err(DiceError::Empty));
        assert!(matches!(
            "2d0".parse::<DiceExpr>(),
            Err(DiceError::ZeroSides { .. })
        ));
        assert!(matches!(
            "2d".parse::<DiceExpr>(),
            Err(DiceError::MissingSides { .. })
        ));
        assert!(matches!(
            "fireball".parse::<DiceExpr>(),
            Err(DiceError::UnexpectedChar { ch: 'f', .. })
        ));
        assert_eq!("2d6+".parse::<DiceExpr>(), Err(DiceError::UnexpectedEnd));
        assert_eq!(
            "3*(1d4+1".parse::<DiceExpr>(),
            Err(DiceError::UnclosedParenthesis)
        );
        assert!(matches!(
            "5000d6".parse::<DiceExpr>(),
            Err(DiceError::TooManyDice { count: 5000, .. })
        ));
        assert!(matches!(
            "99999999999d6".parse::<DiceExpr>(),
            Err(DiceError::Number { .. })
        ));
        assert!(matches!(
            "1000d4294967295".parse::<DiceExpr>(),
            Err(DiceError::TooManySides { sides: 4_294_967_295, .. })
        ));
    }

    #[test]
    fn test_largest_accepted_term_rolls_in_bounds() {
        let expr = parse("1000d1000+4294967295");
        assert_eq!(expr.max_value(), 1_000_000 + 4_294_967_295);
        let mut rng = SimRng::new(42);
        let v = expr.roll(&mut rng);
        assert!(v >= expr.min_value() && v <= expr.max_value());
        let crit = expr.roll_crit(&mut rng);
        assert!(crit > 4_294_967_295);
    }

    #[test]
    fn test_scaled_extremes_saturate() {
        let expr = DiceExpr::Scaled {
            factor: u32::MAX,
            inner: Box::new(DiceExpr::Scaled {
                factor: u32::MAX,
                inner: Box::new(DiceExpr::flat(u32::MAX)),
            }),
        };
        let mut rng = SimRng::new(1);
        assert_eq!(expr.roll(&mut rng), i64::MAX);
        assert_eq!(expr.max_value(), i64::MAX);
        assert_eq!(DiceExpr::dice(u32::MAX, u32::MAX).max_value(), i64::MAX);
    }

    #[test]
    fn test_roll_within_bounds() {
        let expr = parse("2d6+3");
        let mut rng = SimRng::new(42);
        for _ in 0..1000 {
            let v = expr.roll(&mut rng);
            assert!((5..=15).contains(&v), "2d6+3 rolled {v}");
        }
    }

    #[test]
    fn test_roll_crit_doubles_dice_only() {
        let expr = parse("1d6+4");
        let mut rng = SimRng::new(42);
        for _ in 0..500 {
            let v = expr.roll_crit(&mut rng);
            assert!((6..=16).contains(&v), "crit 1d6+4 rolled {v}");
        }
    }

    #[test]
    fn test_roll_with_advantage_keeps_bonus() {
        let expr = parse("1d20+5");
        let mut adv_rng = SimRng::new(9);
        let mut dis_rng = SimRng::new(9);
        let n = 5000;
        let adv: i64 = (0..n)
            .map(|_| expr.roll_with_advantage(&mut adv_rng, Advantage::Advantage))
            .sum();
        let dis: i64 = (0..n)
            .map(|_| expr.roll_with_advantage(&mut dis_rng, Advantage::Disadvantage))
            .sum();
        let adv_mean = adv as f64 / f64::from(n);
        let dis_mean = dis as f64 / f64::from(n);
        assert!((adv_mean - 18.825).abs() < 0.3, "advantage mean {adv_mean}");
        assert!((dis_mean - 12.175).abs() < 0.3, "disadvantage mean {dis_mean}");
    }

    #[test]
    fn test_roll_with_advantage_without_d20() {
        let expr = parse("2d6");
        let mut a = SimRng::new(4);
        let mut b = SimRng::new(4);
        assert_eq!(
            expr.roll_with_advantage(&mut a, Advantage::Advantage),
            expr.roll(&mut b)
        );
    }

    #[test]
    fn test_rerolls_raise_mean() {
        // GWF on 2d6: expected 8.333 vs 7.0
        let expr = parse("2d6");
        let mut rng = SimRng::new(21);
        let n = 20_000;
        let total: i64 = (0..n)
            .map(|_| expr.roll_with_rerolls(&mut rng, true, true))
            .sum();
        let mean = total as f64 / f64::from(n);
        assert!((mean - 8.333).abs() < 0.1, "GWF mean {mean}");
    }

    #[test]
    fn test_rerolls_disabled_matches_plain_roll() {
        let expr = parse("3d8+2");
        let mut a = SimRng::new(77);
        let mut b = SimRng::new(77);
        for _ in 0..100 {
            assert_eq!(
                expr.roll_with_rerolls(&mut a, false, false),
                expr.roll(&mut b)
            );
        }
    }

    #[test]
    fn test_dice_count() {
        assert_eq!(parse("2d6+1d4+3").dice_count(), 3);
        assert_eq!(parse("5").dice_count(), 0);
        assert_eq!(parse("3*(2d4)").dice_count(), 2);
    }

    #[test]
    fn test_expected_dice_value_excludes_flat() {
        let expr = parse("2d6+5");
        assert!((expr.expected_dice_value() - 7.0).abs() < f64::EPSILON);
        assert!((expr.expected_value() - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expected_dice_value_with_custom_mean() {
        let expr = parse("2d6+5");
        let flat_six = expr.expected_dice_value_with(&|_| 6.0);
        assert!((flat_six - 12.0).abs() < f64::EPSILON);
        let plain = expr.expected_dice_value_with(&|s| (f64::from(s) + 1.0) / 2.0);
        assert!((plain - expr.expected_dice_value()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serde_as_string() {
        let expr = parse("1d10+4");
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, "\"1d10+4\"");
        let back: DiceExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
        assert!(serde_json::from_str::<DiceExpr>("\"2d\"").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: every roll lies between the closed-form extremes.
        #[test]
        fn prop_roll_within_extremes(
            count in 1u32..6,
            sides in 1u32..21,
            flat in 0u32..10,
            negative in any::<bool>(),
            seed in any::<u32>(),
        ) {
            let sign = if negative { "-" } else { "+" };
            let expr: DiceExpr = format!("{count}d{sides}{sign}{flat}").parse().unwrap();
            let mut rng = SimRng::new(seed);
            for _ in 0..20 {
                let v = expr.roll(&mut rng);
                prop_assert!(v >= expr.min_value() && v <= expr.max_value());
            }
        }

        /// Falsification: display output parses back to the same expression.
        #[test]
        fn prop_display_reparses(count in 1u32..10, sides in 1u32..100, flat in 0u32..50, factor in 1u32..5) {
            let expr: DiceExpr = format!("{factor}*({count}d{sides}+{flat})").parse().unwrap();
            let again: DiceExpr = expr.to_string().parse().unwrap();
            prop_assert_eq!(again, expr);
        }
    }
}
