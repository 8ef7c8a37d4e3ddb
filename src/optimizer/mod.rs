//! Deterministic damage optimization.
//!
//! - Sequence: closed-form attack profiles
//! - Power attack: break-even analysis and sweeps

pub mod power_attack;
pub mod sequence;

pub use power_attack::{
    AdvantageSweep, BreakEven, Buff, BuffCombination, PowerAttackAnalysis, PowerAttackOptimizer,
    MAX_BUFFS,
};
pub use sequence::{AttackSequence, DamageModifier, DamageSource};
