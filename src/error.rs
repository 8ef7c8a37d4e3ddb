//! Error types for dprsim.
//!
//! Every fallible entry point returns `Result<T, SimError>` instead of
//! panicking. Dice parse failures have their own [`DiceError`](crate::dice::DiceError)
//! and are recovered locally by the string evaluator.

use thiserror::Error;

/// Result type alias for dprsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all dprsim operations.
///
/// # Design
///
/// Errors are split by when they surface:
/// 1. Before simulation (configuration, validation, invalid input)
/// 2. During a run (no valid action, non-finite values)
/// 3. During deterministic analysis (optimization limits)
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Declarative validation error on an input or config struct.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Semantic input error detected before any RNG state is consumed.
    #[error("Invalid input '{field}': {reason}")]
    InvalidInput {
        /// Offending field path.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    // ===== Simulation Errors =====
    /// The action selector found nothing the build can do.
    #[error("No valid action available at round {round}, turn {turn}")]
    NoValidAction {
        /// Round within the encounter (1-based).
        round: u32,
        /// Global turn counter within the run.
        turn: u32,
    },

    /// Numerical instability detected (NaN or Inf).
    #[error("Non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location where the non-finite value was detected.
        location: String,
    },

    // ===== Analysis Errors =====
    /// Optimization error.
    #[error("Optimization error: {0}")]
    Optimization(String),

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-input error for a field.
    #[must_use]
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an optimization error.
    #[must_use]
    pub fn optimization(message: impl Into<String>) -> Self {
        Self::Optimization(message.into())
    }

    /// Create a non-finite value error.
    #[must_use]
    pub fn non_finite(location: impl Into<String>) -> Self {
        Self::NonFiniteValue {
            location: location.into(),
        }
    }

    /// Check if this error was raised before any simulation work started.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::YamlParse(_)
                | Self::Validation(_)
                | Self::InvalidInput { .. }
        )
    }
}
