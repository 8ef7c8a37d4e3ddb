//! Combat scenario: length, rests, enemy behaviour and environment.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Condition;
use crate::dice::DiceExpr;
use crate::error::{SimError, SimResult};

/// Effect of an enemy action on the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnemyEffect {
    /// Deal damage.
    Damage {
        /// Damage roll.
        dice: DiceExpr,
    },
    /// Impose a condition for a number of the build's turns.
    Condition {
        /// Condition imposed.
        condition: Condition,
        /// Build turns it covers, starting with the next one.
        duration: u32,
    },
    /// Move out of reach, offering an opportunity attack.
    Provoke,
}

/// Probabilistic enemy action resolved at the end of each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EnemyAction {
    /// Display name.
    pub name: String,
    /// Chance per round.
    #[validate(range(min = 0.0, max = 1.0))]
    pub probability: f64,
    /// What happens.
    pub effect: EnemyEffect,
}

/// Lighting conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    /// Bright light.
    #[default]
    Bright,
    /// Dim light.
    Dim,
    /// Darkness.
    Darkness,
}

/// Cover the target benefits from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cover {
    /// No cover.
    #[default]
    None,
    /// +2 AC.
    Half,
    /// +5 AC.
    ThreeQuarters,
}

/// Battlefield description. Advisory only: it feeds insight notes, not rolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Lighting.
    #[serde(default)]
    pub lighting: Lighting,
    /// Cover.
    #[serde(default)]
    pub cover: Cover,
    /// Difficult terrain.
    #[serde(default)]
    pub difficult_terrain: bool,
}

impl Environment {
    /// Human-readable caveats for the report.
    #[must_use]
    pub fn notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        match self.lighting {
            Lighting::Bright => {}
            Lighting::Dim => notes.push("Dim light: perception-based effects not modelled".to_string()),
            Lighting::Darkness => {
                notes.push("Darkness: attack advantage from unseen attackers not modelled".to_string());
            }
        }
        match self.cover {
            Cover::None => {}
            Cover::Half => notes.push("Half cover: target AC shown without +2".to_string()),
            Cover::ThreeQuarters => {
                notes.push("Three-quarters cover: target AC shown without +5".to_string());
            }
        }
        if self.difficult_terrain {
            notes.push("Difficult terrain: movement costs not modelled".to_string());
        }
        notes
    }
}

/// Combat scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CombatScenario {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Rounds per encounter.
    #[validate(range(min = 1, max = 100))]
    pub rounds: u32,
    /// Encounters per run.
    #[validate(range(min = 1, max = 20))]
    #[serde(default = "default_encounters")]
    pub encounters: u32,
    /// Short rest after every N encounters.
    #[validate(range(min = 1))]
    #[serde(default)]
    pub short_rest_every: Option<u32>,
    /// Enemy actions resolved each round.
    #[validate(nested)]
    #[serde(default)]
    pub enemy_actions: Vec<EnemyAction>,
    /// Battlefield context.
    #[serde(default)]
    pub environment: Environment,
}

const fn default_encounters() -> u32 {
    1
}

impl CombatScenario {
    /// Single encounter of `rounds` rounds with no enemy actions.
    #[must_use]
    pub fn rounds(rounds: u32) -> Self {
        Self {
            name: String::new(),
            rounds,
            encounters: 1,
            short_rest_every: None,
            enemy_actions: Vec::new(),
            environment: Environment::default(),
        }
    }

    /// Total rounds per run.
    #[must_use]
    pub const fn total_rounds(&self) -> u32 {
        self.rounds * self.encounters
    }

    /// Whether a short rest happens before `encounter` (1-based).
    #[must_use]
    pub fn rest_before(&self, encounter: u32) -> bool {
        match self.short_rest_every {
            Some(every) if every > 0 && encounter > 1 => (encounter - 1) % every == 0,
            _ => false,
        }
    }

    /// Declarative and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `InvalidInput`.
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        for (i, action) in self.enemy_actions.iter().enumerate() {
            if !action.probability.is_finite() {
                return Err(SimError::invalid_input(
                    format!("scenario.enemy_actions[{i}].probability"),
                    "must be finite",
                ));
            }
            if let EnemyEffect::Condition { duration: 0, .. } = action.effect {
                return Err(SimError::invalid_input(
                    format!("scenario.enemy_actions[{i}].effect.duration"),
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }
}
