//! What a submitted intent produced, for callers and narrators.

use crate::character::CharacterId;
use crate::combatant::BattleView;
use crate::dice::RollResult;
use crate::grid::Position;
use crate::rules::{ActionError, Effect, ErrorKind, Intent, Resolution};
use serde::{Deserialize, Serialize};

/// How an accepted action turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Hit { critical: bool },
    Miss { fumble: bool },
    /// The target failed its save and took full damage.
    SaveFailed,
    /// The target made its save and took half damage.
    SaveSucceeded,
    Healed,
    Moved { from: Position, to: Position, feet: u32 },
    /// Accepted, but nothing numeric happened.
    NoEffect,
    Passed,
    /// Refused by validation; nothing changed.
    Rejected,
}

impl ActionOutcome {
    /// Misses and rejections count as failures; everything else succeeded.
    pub fn is_success(&self) -> bool {
        !matches!(self, ActionOutcome::Miss { .. } | ActionOutcome::Rejected)
    }
}

/// The structured facts a narrator is allowed to describe.
///
/// Narration is built from these alone, never from the live battle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeFacts {
    pub actor: String,
    /// Plain description of what was attempted and how it went.
    pub action: String,
    pub outcome: ActionOutcome,
    pub success: bool,
    pub amount: i32,
    pub target: Option<String>,
    pub target_hp: Option<i32>,
    pub target_max_hp: Option<i32>,
    pub target_died: bool,
    pub error: Option<String>,
}

/// Result of submitting one intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub actor_id: CharacterId,
    pub actor: String,
    pub target: Option<String>,
    pub outcome: ActionOutcome,
    /// Damage dealt, HP healed or feet moved.
    pub amount: i32,
    pub description: String,
    pub effects: Vec<Effect>,
    pub error: Option<ActionError>,
    pub facts: NarrativeFacts,
}

impl ActionResult {
    /// An intent refused before anything was rolled or spent.
    pub fn rejected(actor_id: CharacterId, actor: &str, intent: &Intent, error: ActionError) -> Self {
        let description = format!("{actor} cannot {}: {error}", intent.describe());
        let facts = NarrativeFacts {
            actor: actor.to_string(),
            action: description.clone(),
            outcome: ActionOutcome::Rejected,
            success: false,
            amount: 0,
            target: None,
            target_hp: None,
            target_max_hp: None,
            target_died: false,
            error: Some(error.to_string()),
        };
        Self {
            success: false,
            actor_id,
            actor: actor.to_string(),
            target: None,
            outcome: ActionOutcome::Rejected,
            amount: 0,
            description,
            effects: Vec::new(),
            error: Some(error),
            facts,
        }
    }

    /// Build the result of an applied resolution, reading the target's
    /// post-action HP from `state`.
    pub fn from_resolution(state: &BattleView, resolution: Resolution) -> Self {
        let actor = state
            .get(resolution.actor)
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        let target = resolution.target.and_then(|id| state.get(id));
        let target_died = resolution
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CharacterDied { .. }));
        let success = resolution.outcome.is_success();

        let facts = NarrativeFacts {
            actor: actor.clone(),
            action: resolution.narrative.clone(),
            outcome: resolution.outcome,
            success,
            amount: resolution.amount,
            target: target.map(|t| t.name().to_string()),
            target_hp: target.map(|t| t.character.current_hp()),
            target_max_hp: target.map(|t| t.character.max_hp()),
            target_died,
            error: None,
        };

        Self {
            success,
            actor_id: resolution.actor,
            actor,
            target: facts.target.clone(),
            outcome: resolution.outcome,
            amount: resolution.amount,
            description: resolution.narrative,
            effects: resolution.effects,
            error: None,
            facts,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(ActionError::kind)
    }

    pub fn target_died(&self) -> bool {
        self.facts.target_died
    }

    /// Every die roll made while resolving, in order.
    pub fn rolls(&self) -> Vec<&RollResult> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::DiceRolled { roll, .. } => Some(roll),
                Effect::SavingThrow { roll, .. } => Some(roll),
                _ => None,
            })
            .collect()
    }
}
