//! Stochastic combat simulation.
//!
//! - Monte Carlo: seeded round-by-round runs with resource tracking
//! - Aggregate: pure reduction of runs into a report
//! - Progress: cooperative progress callbacks

pub mod aggregate;
pub mod monte_carlo;
pub mod progress;

pub use aggregate::{
    aggregate, AggregateContext, MonteCarloResults, ResourceBudget, ResourceUse,
    ResourceUtilization, RiskFactor, RoundSummary, TacticalInsights,
};
pub use monte_carlo::{
    DecisionRecord, MonteCarloSimulator, ResourceUsage, SimulationBatch, SimulationRun,
};
pub use progress::{ProgressObserver, SimulationProgress, TracingProgress};
