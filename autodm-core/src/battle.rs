//! The battle orchestrator: setup, initiative, the round loop, and
//! termination.
//!
//! A [`Battle`] owns its combatants, map, turn order and dice. Callers
//! submit intents for whoever's turn it is and call
//! [`Battle::advance_turn`] once that turn is done.

use crate::action::ActionResult;
use crate::character::{CharacterClass, CharacterId};
use crate::combatant::{BattleView, Combatant, Controller, Side};
use crate::config::BattleConfig;
use crate::dice::{DiceSource, RngDice};
use crate::grid::{Grid, GridError, Position};
use crate::initiative::{roll_initiative, InitiativeEntry, InitiativeOrder};
use crate::rules::{apply_effects, ActionError, Intent, RulesEngine};
use crate::turn::TurnState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration problems found while building or starting a battle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    #[error("{0} has no living combatants")]
    EmptyRoster(Side),
    #[error("more than one combatant is named {0}")]
    DuplicateName(String),
    #[error("{combatants} combatants do not fit on a map of {cells} cells")]
    GridTooSmall { combatants: usize, cells: usize },
    #[error("invalid map: {width}x{height} cells of {feet_per_cell} ft")]
    InvalidGrid {
        width: u32,
        height: u32,
        feet_per_cell: u32,
    },
    #[error("the battle has already started")]
    AlreadyStarted,
    #[error("the battle has not started")]
    NotStarted,
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattlePhase {
    Setup,
    InitiativeRolled,
    RoundLoop,
    Over,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    Victory(Side),
    /// Both sides were down at the same check. Single-target actions never
    /// cause this; it is kept for effects that hit several creatures at once.
    Draw,
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleOutcome::Victory(side) => write!(f, "{side} wins"),
            BattleOutcome::Draw => write!(f, "draw"),
        }
    }
}

/// Serializable view of one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: CharacterId,
    pub name: String,
    pub side: Side,
    pub controller: Controller,
    pub class: CharacterClass,
    pub level: u8,
    pub current_hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    pub alive: bool,
    pub position: Position,
    pub spell_slots: BTreeMap<u8, u8>,
    pub turn: TurnState,
}

impl From<&Combatant> for CombatantSnapshot {
    fn from(combatant: &Combatant) -> Self {
        let character = &combatant.character;
        Self {
            id: character.id,
            name: character.name.clone(),
            side: combatant.side,
            controller: combatant.controller,
            class: character.class,
            level: character.level,
            current_hp: character.current_hp(),
            max_hp: character.max_hp(),
            armor_class: character.armor_class(),
            alive: character.is_alive(),
            position: character.position,
            spell_slots: character.spell_slots.clone(),
            turn: combatant.turn.clone(),
        }
    }
}

/// Serializable view of a whole battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub phase: BattlePhase,
    pub round: u32,
    pub outcome: Option<BattleOutcome>,
    pub current_actor: Option<String>,
    pub initiative: Vec<InitiativeEntry>,
    pub combatants: Vec<CombatantSnapshot>,
}

impl BattleSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A two-sided, turn-based battle.
pub struct Battle {
    config: BattleConfig,
    state: BattleView,
    order: Option<InitiativeOrder>,
    phase: BattlePhase,
    outcome: Option<BattleOutcome>,
    dice: Box<dyn DiceSource + Send>,
    rules: RulesEngine,
}

impl Battle {
    /// Build a battle rolling dice from `config.seed`, or from the OS if unset.
    pub fn new(
        config: BattleConfig,
        side_a: Vec<Combatant>,
        side_b: Vec<Combatant>,
    ) -> Result<Self, BattleError> {
        let dice: Box<dyn DiceSource + Send> = match config.seed {
            Some(seed) => Box::new(RngDice::seeded(seed)),
            None => Box::new(RngDice::from_entropy()),
        };
        Self::with_dice(config, side_a, side_b, dice)
    }

    /// Build a battle with an explicit dice source.
    pub fn with_dice(
        config: BattleConfig,
        side_a: Vec<Combatant>,
        side_b: Vec<Combatant>,
        dice: Box<dyn DiceSource + Send>,
    ) -> Result<Self, BattleError> {
        if config.grid_width == 0 || config.grid_height == 0 || config.feet_per_cell == 0 {
            return Err(BattleError::InvalidGrid {
                width: config.grid_width,
                height: config.grid_height,
                feet_per_cell: config.feet_per_cell,
            });
        }

        let mut combatants = Vec::with_capacity(side_a.len() + side_b.len());
        for (side, roster) in [(Side::A, side_a), (Side::B, side_b)] {
            if !roster.iter().any(Combatant::is_alive) {
                return Err(BattleError::EmptyRoster(side));
            }
            combatants.extend(roster.into_iter().map(|mut c| {
                c.side = side;
                c
            }));
        }

        let mut seen = HashSet::new();
        for combatant in &combatants {
            if !seen.insert(combatant.name().trim().to_lowercase()) {
                return Err(BattleError::DuplicateName(combatant.name().to_string()));
            }
        }

        let mut grid = Grid::new(config.grid_width, config.grid_height, config.feet_per_cell);
        if combatants.len() > grid.cell_count() {
            return Err(BattleError::GridTooSmall {
                combatants: combatants.len(),
                cells: grid.cell_count(),
            });
        }
        place_combatants(&config, &mut grid, &mut combatants)?;

        info!(
            combatants = combatants.len(),
            width = config.grid_width,
            height = config.grid_height,
            "battle set up"
        );

        Ok(Self {
            config,
            state: BattleView::new(combatants, grid),
            order: None,
            phase: BattlePhase::Setup,
            outcome: None,
            dice,
            rules: RulesEngine::new(),
        })
    }

    /// Roll initiative and begin the first turn.
    ///
    /// Side A is listed before side B, so on a tie in both total and
    /// dexterity side A goes first.
    pub fn start(&mut self) -> Result<Vec<InitiativeEntry>, BattleError> {
        if self.phase != BattlePhase::Setup {
            return Err(BattleError::AlreadyStarted);
        }

        let entries = roll_initiative(
            self.state
                .combatants()
                .iter()
                .filter(|c| c.is_alive())
                .map(|c| &c.character),
            self.dice.as_mut(),
        );
        self.phase = BattlePhase::InitiativeRolled;
        for entry in &entries {
            info!(name = %entry.name, roll = entry.roll, total = entry.total, "initiative");
        }

        let mut order = InitiativeOrder::new(entries.clone());
        let state = &self.state;
        let first = order
            .settle(|id| state.get(id).is_some_and(Combatant::is_alive))
            .map(|e| e.id);
        self.order = Some(order);
        self.phase = BattlePhase::RoundLoop;

        if let Some(first) = first {
            self.begin_turn(first);
        }
        Ok(entries)
    }

    /// Resolve one intent for `actor`, who must be the current combatant.
    ///
    /// Rejections come back inside the result with nothing changed; the
    /// actor may try something else.
    pub fn submit_intent(&mut self, actor: CharacterId, intent: Intent) -> ActionResult {
        let actor_name = self
            .state
            .get(actor)
            .map(|c| c.name().to_string())
            .unwrap_or_default();

        if let Err(error) = self.check_can_act(actor, &actor_name) {
            return self.reject(actor, &actor_name, &intent, error);
        }

        let resolution = match self
            .rules
            .resolve(&self.state, actor, &intent, self.dice.as_mut())
        {
            Ok(resolution) => resolution,
            Err(error) => return self.reject(actor, &actor_name, &intent, error),
        };

        apply_effects(&mut self.state, &resolution.effects);
        let result = ActionResult::from_resolution(&self.state, resolution);
        debug!(actor = %actor_name, "{}", result.description);

        self.check_termination();
        result
    }

    fn check_can_act(&self, actor: CharacterId, actor_name: &str) -> Result<(), ActionError> {
        match self.phase {
            BattlePhase::Setup | BattlePhase::InitiativeRolled => return Err(ActionError::NotStarted),
            BattlePhase::Over => return Err(ActionError::BattleOver),
            BattlePhase::RoundLoop => {}
        }
        if self.state.get(actor).is_none() {
            return Err(ActionError::UnknownActor(actor));
        }
        if self.current_actor() != Some(actor) {
            return Err(ActionError::NotYourTurn {
                actor: actor_name.to_string(),
            });
        }
        Ok(())
    }

    fn reject(
        &self,
        actor: CharacterId,
        actor_name: &str,
        intent: &Intent,
        error: ActionError,
    ) -> ActionResult {
        debug!(actor = %actor_name, intent = %intent.describe(), error = %error, "intent rejected");
        ActionResult::rejected(actor, actor_name, intent, error)
    }

    /// Move on to the next living combatant, counting a new round when the
    /// order wraps. Returns the new current combatant, or `None` once the
    /// battle is over.
    pub fn advance_turn(&mut self) -> Option<CharacterId> {
        if self.phase != BattlePhase::RoundLoop {
            return None;
        }
        let state = &self.state;
        let order = self.order.as_mut()?;
        let round_before = order.round();
        let next = order
            .advance(|id| state.get(id).is_some_and(Combatant::is_alive))
            .map(|e| e.id);
        let round = order.round();

        match next {
            Some(id) => {
                if round != round_before {
                    info!(round, "new round");
                }
                self.begin_turn(id);
                Some(id)
            }
            None => {
                self.check_termination();
                None
            }
        }
    }

    fn begin_turn(&mut self, id: CharacterId) {
        if let Some(combatant) = self.state.get_mut(id) {
            combatant.begin_turn();
            debug!(name = %combatant.name(), "turn begins");
        }
    }

    fn check_termination(&mut self) {
        if self.phase == BattlePhase::Over {
            return;
        }
        let a_down = self.state.is_side_defeated(Side::A);
        let b_down = self.state.is_side_defeated(Side::B);
        let outcome = match (a_down, b_down) {
            (true, true) => BattleOutcome::Draw,
            (true, false) => BattleOutcome::Victory(Side::B),
            (false, true) => BattleOutcome::Victory(Side::A),
            (false, false) => return,
        };
        self.phase = BattlePhase::Over;
        self.outcome = Some(outcome);
        info!(outcome = %outcome, round = self.round(), "battle over");
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase == BattlePhase::Over
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        self.outcome
    }

    /// Current round, starting at 1; 0 before initiative.
    pub fn round(&self) -> u32 {
        self.order.as_ref().map_or(0, InitiativeOrder::round)
    }

    pub fn state(&self) -> &BattleView {
        &self.state
    }

    pub fn combatant(&self, id: CharacterId) -> Option<&Combatant> {
        self.state.get(id)
    }

    pub fn find(&self, name: &str) -> Option<&Combatant> {
        self.state.find_by_name(name)
    }

    pub fn initiative(&self) -> &[InitiativeEntry] {
        match &self.order {
            Some(order) => order.entries(),
            None => &[],
        }
    }

    /// Whose turn it is, while the round loop is running.
    pub fn current_actor(&self) -> Option<CharacterId> {
        if self.phase != BattlePhase::RoundLoop {
            return None;
        }
        self.order.as_ref()?.current().map(|e| e.id)
    }

    /// The current combatant has nothing useful left to do this turn.
    pub fn turn_finished(&self) -> bool {
        match self.current_actor().and_then(|id| self.state.get(id)) {
            Some(combatant) => !combatant.is_alive() || combatant.turn.is_exhausted(),
            None => true,
        }
    }

    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            phase: self.phase,
            round: self.round(),
            outcome: self.outcome,
            current_actor: self
                .current_actor()
                .and_then(|id| self.state.get(id))
                .map(|c| c.name().to_string()),
            initiative: self.initiative().to_vec(),
            combatants: self
                .state
                .combatants()
                .iter()
                .map(CombatantSnapshot::from)
                .collect(),
        }
    }

    /// ASCII map of the living combatants.
    pub fn render_map(&self) -> String {
        self.state.grid().render(
            self.state
                .combatants()
                .iter()
                .filter(|c| c.is_alive())
                .map(|c| (c.character.position, c.name())),
        )
    }
}

/// Keep requested positions that are on the map and free (unless the
/// config asks for randomized placement); scatter everyone else over
/// shuffled free cells. The dead are not placed.
fn place_combatants(
    config: &BattleConfig,
    grid: &mut Grid,
    combatants: &mut [Combatant],
) -> Result<(), BattleError> {
    let mut unplaced = Vec::new();
    for (index, combatant) in combatants.iter_mut().enumerate() {
        if !combatant.is_alive() {
            continue;
        }
        let wanted = combatant.character.position;
        if !config.randomize_positions && grid.is_free(wanted) {
            grid.place(combatant.id(), wanted)?;
        } else {
            if !config.randomize_positions {
                debug!(name = %combatant.name(), position = %wanted, "requested position unavailable");
            }
            unplaced.push(index);
        }
    }
    if unplaced.is_empty() {
        return Ok(());
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let cells = grid.shuffled_free_cells(&mut rng);
    if cells.len() < unplaced.len() {
        return Err(GridError::NoFreeCells.into());
    }
    for (index, cell) in unplaced.into_iter().zip(cells) {
        let combatant = &mut combatants[index];
        grid.place(combatant.id(), cell)?;
        combatant.character.position = cell;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionOutcome;
    use crate::character::{create_goblin, create_orc, create_sample_fighter, create_sample_wizard};
    use crate::rules::ErrorKind;
    use crate::testing::ScriptedDice;

    fn fixed(name: &str, x: i32, y: i32, make: fn(&str) -> crate::character::Character) -> Combatant {
        Combatant::npc(make(name).with_position(Position::new(x, y)))
    }

    fn config() -> BattleConfig {
        BattleConfig::new().with_grid(10, 10).with_fixed_positions()
    }

    #[test]
    fn test_setup_validation() {
        let err = Battle::new(config(), vec![], vec![fixed("Snag", 1, 0, create_goblin)]).err();
        assert_eq!(err, Some(BattleError::EmptyRoster(Side::A)));

        let err = Battle::new(
            config(),
            vec![fixed("Snag", 0, 0, create_sample_fighter)],
            vec![fixed("snag", 1, 0, create_goblin)],
        )
        .err();
        assert_eq!(err, Some(BattleError::DuplicateName("snag".to_string())));

        let err = Battle::new(
            BattleConfig::new().with_grid(1, 1),
            vec![fixed("Roland", 0, 0, create_sample_fighter)],
            vec![fixed("Snag", 1, 0, create_goblin)],
        )
        .err();
        assert_eq!(
            err,
            Some(BattleError::GridTooSmall {
                combatants: 2,
                cells: 1
            })
        );

        let err = Battle::new(
            BattleConfig::new().with_grid(0, 5),
            vec![fixed("Roland", 0, 0, create_sample_fighter)],
            vec![fixed("Snag", 1, 0, create_goblin)],
        )
        .err();
        assert!(matches!(err, Some(BattleError::InvalidGrid { .. })));
    }

    #[test]
    fn test_fixed_positions_kept_and_conflicts_relocated() {
        let battle = Battle::new(
            config().with_seed(3),
            vec![fixed("Roland", 2, 3, create_sample_fighter)],
            vec![
                fixed("Snag", 2, 3, create_goblin),
                fixed("Grul", 50, 50, create_orc),
            ],
        )
        .unwrap();
        let roland = battle.find("Roland").unwrap();
        assert_eq!(roland.character.position, Position::new(2, 3));

        let grid = battle.state().grid();
        for combatant in battle.state().combatants() {
            let pos = combatant.character.position;
            assert!(grid.contains(pos));
            assert_eq!(grid.occupant_at(pos), Some(combatant.id()));
        }
        assert_ne!(battle.find("Snag").unwrap().character.position, Position::new(2, 3));
    }

    #[test]
    fn test_random_placement_is_seeded() {
        let positions = || {
            let battle = Battle::new(
                BattleConfig::new().with_seed(11),
                vec![Combatant::npc(create_sample_fighter("Roland"))],
                vec![Combatant::npc(create_goblin("Snag")), Combatant::npc(create_orc("Grul"))],
            )
            .unwrap();
            battle
                .state()
                .combatants()
                .iter()
                .map(|c| c.character.position)
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(), positions());
    }

    #[test]
    fn test_lifecycle() {
        let dice = ScriptedDice::new([20, 1]);
        let mut battle = Battle::with_dice(
            config(),
            vec![fixed("Roland", 0, 0, create_sample_fighter)],
            vec![fixed("Snag", 1, 0, create_goblin)],
            Box::new(dice.clone()),
        )
        .unwrap();
        let roland = battle.find("Roland").unwrap().id();
        let snag = battle.find("Snag").unwrap().id();

        assert_eq!(battle.phase(), BattlePhase::Setup);
        let early = battle.submit_intent(roland, Intent::Pass);
        assert_eq!(early.error, Some(ActionError::NotStarted));

        let order = battle.start().unwrap();
        assert_eq!(order[0].id, roland);
        assert_eq!(battle.start(), Err(BattleError::AlreadyStarted));
        assert_eq!(battle.round(), 1);
        assert_eq!(battle.current_actor(), Some(roland));

        let wrong = battle.submit_intent(snag, Intent::attack("Roland"));
        assert_eq!(wrong.error_kind(), Some(ErrorKind::TurnBudget));

        // Longsword: 17 + 5 hits AC 13, 1d8+3 with a 4 kills the 7 HP goblin.
        dice.push(17);
        dice.push(4);
        let result = battle.submit_intent(roland, Intent::attack("Snag"));
        assert_eq!(result.outcome, ActionOutcome::Hit { critical: false });
        assert!(result.target_died());
        assert!(battle.is_over());
        assert_eq!(battle.outcome(), Some(BattleOutcome::Victory(Side::A)));
        assert_eq!(battle.current_actor(), None);

        let after = battle.submit_intent(roland, Intent::Pass);
        assert_eq!(after.error, Some(ActionError::BattleOver));
        assert_eq!(battle.advance_turn(), None);
    }

    #[test]
    fn test_both_sides_down_is_a_draw() {
        let mut battle = Battle::with_dice(
            config(),
            vec![fixed("Roland", 0, 0, create_sample_fighter)],
            vec![fixed("Snag", 1, 0, create_goblin)],
            Box::new(ScriptedDice::new([20, 1])),
        )
        .unwrap();
        battle.start().unwrap();
        let roland = battle.find("Roland").unwrap().id();
        let snag = battle.find("Snag").unwrap().id();

        for id in [roland, snag] {
            battle.state.get_mut(id).unwrap().character.take_damage(100);
        }
        battle.check_termination();

        assert!(battle.is_over());
        assert_eq!(battle.outcome(), Some(BattleOutcome::Draw));
        assert_eq!(BattleOutcome::Draw.to_string(), "draw");
        assert_eq!(battle.advance_turn(), None);
    }

    #[test]
    fn test_advance_cycles_and_counts_rounds() {
        let dice = ScriptedDice::new([20, 10, 1]);
        let mut battle = Battle::with_dice(
            config(),
            vec![
                fixed("Roland", 0, 0, create_sample_fighter),
                fixed("Elara", 0, 1, create_sample_wizard),
            ],
            vec![fixed("Snag", 9, 9, create_goblin)],
            Box::new(dice),
        )
        .unwrap();
        battle.start().unwrap();
        let names = |battle: &Battle| {
            battle
                .current_actor()
                .and_then(|id| battle.combatant(id))
                .map(|c| c.name().to_string())
        };

        assert_eq!(names(&battle).as_deref(), Some("Roland"));
        let roland = battle.current_actor().unwrap();
        assert!(!battle.turn_finished());
        battle.submit_intent(roland, Intent::Pass);
        assert!(battle.turn_finished());

        battle.advance_turn();
        assert_eq!(names(&battle).as_deref(), Some("Elara"));
        battle.advance_turn();
        assert_eq!(names(&battle).as_deref(), Some("Snag"));
        assert_eq!(battle.round(), 1);
        battle.advance_turn();
        assert_eq!(names(&battle).as_deref(), Some("Roland"));
        assert_eq!(battle.round(), 2);
        // Budget was restored for the new turn.
        assert!(!battle.turn_finished());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut battle = Battle::with_dice(
            config(),
            vec![fixed("Roland", 0, 0, create_sample_fighter)],
            vec![fixed("Snag", 3, 0, create_goblin)],
            Box::new(ScriptedDice::new([20, 1])),
        )
        .unwrap();
        battle.start().unwrap();
        let snapshot = battle.snapshot();
        assert_eq!(snapshot.round, 1);
        assert_eq!(snapshot.current_actor.as_deref(), Some("Roland"));
        assert_eq!(snapshot.combatants.len(), 2);
        assert_eq!(snapshot.combatants[1].side, Side::B);

        let json = snapshot.to_json().unwrap();
        let back: BattleSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);

        let map = battle.render_map();
        assert!(map.contains("- A: Roland (0, 0)"));
        assert!(map.contains("- B: Snag (3, 0)"));
    }
}
