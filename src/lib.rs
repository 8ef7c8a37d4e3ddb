//! # dprsim
//!
//! Reproducible damage-per-round engine for tabletop combat builds.
//!
//! A seeded, falsifiable simulation framework implementing:
//! - Deterministic dice and d20 probability mathematics
//! - Round-by-round Monte Carlo combat with resource tracking
//! - Closed-form power-attack and level progression analysis
//!
//! ## Example
//!
//! ```rust
//! use dprsim::prelude::*;
//!
//! let config = SimConfig::builder()
//!     .seed(42)
//!     .build();
//! let simulator = MonteCarloSimulator::new(config).unwrap();
//! assert_eq!(simulator.config().simulation.seed, 42);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::suboptimal_flops,  // Closed-form expressions mirror the formulas
    clippy::imprecise_flops,   // Numerical code choices are intentional
    clippy::too_many_lines,
    clippy::missing_const_for_fn,  // Many functions can't be const in stable Rust
    clippy::needless_range_loop,   // Sometimes range loops are clearer
    clippy::manual_midpoint,       // Bisection midpoint is written out
)]

pub mod combat;
pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod optimizer;
pub mod probability;
pub mod progression;
pub mod simulation;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::combat::{
        Action, Build, CombatScenario, CombatState, DamageType, Target, Weapon,
    };
    pub use crate::config::{SimConfig, SimConfigBuilder};
    pub use crate::dice::{Advantage, DiceExpr};
    pub use crate::engine::SimRng;
    pub use crate::error::{SimError, SimResult};
    pub use crate::optimizer::{AttackSequence, DamageModifier, PowerAttackOptimizer};
    pub use crate::progression::{LevelAnalysis, ProgressionAnalyzer};
    pub use crate::simulation::{MonteCarloResults, MonteCarloSimulator};
}

/// Re-export for public API
pub use error::{SimError, SimResult};
