//! Per-turn action budget.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of action a combatant gets once per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Standard,
    Movement,
    Bonus,
    Reaction,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Standard => "action",
            ActionKind::Movement => "movement",
            ActionKind::Bonus => "bonus action",
            ActionKind::Reaction => "reaction",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a combatant has used so far this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub standard_action_taken: bool,
    pub movement_taken: bool,
    pub bonus_action_taken: bool,
    pub reaction_taken: bool,
    pub movement_remaining: u32,
}

impl TurnState {
    /// A fresh budget for a combatant with the given speed.
    pub fn new(speed: u32) -> Self {
        Self {
            movement_remaining: speed,
            ..Self::default()
        }
    }

    pub fn can_take(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Standard => !self.standard_action_taken,
            ActionKind::Movement => !self.movement_taken && self.movement_remaining > 0,
            ActionKind::Bonus => !self.bonus_action_taken,
            ActionKind::Reaction => !self.reaction_taken,
        }
    }

    /// Mark `kind` as used. Returns false, changing nothing, if it was not available.
    pub fn take(&mut self, kind: ActionKind) -> bool {
        if !self.can_take(kind) {
            return false;
        }
        match kind {
            ActionKind::Standard => self.standard_action_taken = true,
            ActionKind::Movement => self.movement_taken = true,
            ActionKind::Bonus => self.bonus_action_taken = true,
            ActionKind::Reaction => self.reaction_taken = true,
        }
        true
    }

    pub fn spend_movement(&mut self, feet: u32) {
        self.movement_remaining = self.movement_remaining.saturating_sub(feet);
    }

    /// Start-of-turn reset.
    pub fn reset(&mut self, speed: u32) {
        *self = Self::new(speed);
    }

    /// Forfeit whatever is left of the turn.
    pub fn end(&mut self) {
        self.standard_action_taken = true;
        self.movement_taken = true;
        self.bonus_action_taken = true;
    }

    /// Neither a standard action nor movement is left.
    pub fn is_exhausted(&self) -> bool {
        !self.can_take(ActionKind::Standard) && !self.can_take(ActionKind::Movement)
    }
}
