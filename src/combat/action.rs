//! Actions the build can take with its action.

use serde::{Deserialize, Serialize};

/// Attack action: `attacks` weapon attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackAction {
    /// Weapon attacks made.
    pub attacks: u32,
}

/// Cast a spell from `Build::spells`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellAction {
    /// Index into the build's spell list.
    pub spell: usize,
    /// Slot spent (0 for cantrips).
    pub slot_level: u32,
}

/// Dash or reposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementAction {
    /// Extra feet gained.
    pub feet: u32,
}

/// Consumable item use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    /// Potion of healing, `2d4+2`.
    HealingPotion,
}

/// Class feature spent as an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialAction {
    /// Gain one extra action this turn.
    ActionSurge,
}

/// Action chosen by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Action {
    /// Weapon attacks.
    Attack(AttackAction),
    /// Spell cast.
    Spell(SpellAction),
    /// Movement.
    Movement(MovementAction),
    /// Item use.
    Item(ItemAction),
    /// Class feature.
    Special(SpecialAction),
}

/// Action variant without payload, for tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Weapon attacks.
    Attack,
    /// Spell cast.
    Spell,
    /// Movement.
    Movement,
    /// Item use.
    Item,
    /// Class feature.
    Special,
}

impl Action {
    /// Payload-free kind.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Attack(_) => ActionKind::Attack,
            Self::Spell(_) => ActionKind::Spell,
            Self::Movement(_) => ActionKind::Movement,
            Self::Item(_) => ActionKind::Item,
            Self::Special(_) => ActionKind::Special,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Attack => "attack",
            Self::Spell => "spell",
            Self::Movement => "movement",
            Self::Item => "item",
            Self::Special => "special",
        };
        f.write_str(name)
    }
}
