//! The battle map: coordinates, distances, occupancy, and movement.
//!
//! Distances use the Chebyshev metric (diagonal steps cost the same as
//! orthogonal ones) scaled by the grid's feet-per-cell.

use crate::character::{Character, CharacterId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Feet covered by one grid cell unless configured otherwise.
pub const DEFAULT_FEET_PER_CELL: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GridError {
    #[error("{position} is outside the {width}x{height} map")]
    OutOfBounds {
        position: Position,
        width: u32,
        height: u32,
    },
    #[error("{position} is occupied")]
    Occupied { position: Position },
    #[error("moving {required} ft needs more than the {remaining} ft of movement left")]
    InsufficientMovement { required: u32, remaining: u32 },
    #[error("no free cells left on the map")]
    NoFreeCells,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance in cells.
    pub fn distance_to(&self, other: Position) -> u32 {
        distance(*self, other)
    }

    /// The neighbouring cell one step closer to `target` (diagonals allowed).
    pub fn step_toward(&self, target: Position) -> Position {
        step_toward(*self, target)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Chebyshev distance in cells: `max(|dx|, |dy|)`.
pub fn distance(from: Position, to: Position) -> u32 {
    let dx = (from.x - to.x).unsigned_abs();
    let dy = (from.y - to.y).unsigned_abs();
    dx.max(dy)
}

pub fn step_toward(from: Position, to: Position) -> Position {
    Position::new(
        from.x + (to.x - from.x).signum(),
        from.y + (to.y - from.y).signum(),
    )
}

/// A rectangular battle map with at most one combatant per cell.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    feet_per_cell: u32,
    occupants: HashMap<Position, CharacterId>,
    positions: HashMap<CharacterId, Position>,
}

impl Grid {
    pub fn new(width: u32, height: u32, feet_per_cell: u32) -> Self {
        Self {
            width,
            height,
            feet_per_cell,
            occupants: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn feet_per_cell(&self) -> u32 {
        self.feet_per_cell
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
    }

    pub fn distance_feet(&self, from: Position, to: Position) -> u32 {
        distance(from, to) * self.feet_per_cell
    }

    /// `distance * feet_per_cell <= range_feet`.
    pub fn in_range(&self, from: Position, to: Position, range_feet: u32) -> bool {
        self.distance_feet(from, to) <= range_feet
    }

    pub fn occupant_at(&self, position: Position) -> Option<CharacterId> {
        self.occupants.get(&position).copied()
    }

    pub fn position_of(&self, id: CharacterId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    pub fn is_free(&self, position: Position) -> bool {
        self.contains(position) && !self.occupants.contains_key(&position)
    }

    fn check_bounds(&self, position: Position) -> Result<(), GridError> {
        if self.contains(position) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                position,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Put a combatant on the map, replacing any earlier position it had.
    pub fn place(&mut self, id: CharacterId, position: Position) -> Result<(), GridError> {
        self.check_bounds(position)?;
        match self.occupant_at(position) {
            Some(other) if other != id => Err(GridError::Occupied { position }),
            _ => {
                self.relocate(id, position);
                Ok(())
            }
        }
    }

    /// Take a combatant off the map, returning where it stood.
    pub fn vacate(&mut self, id: CharacterId) -> Option<Position> {
        let position = self.positions.remove(&id)?;
        self.occupants.remove(&position);
        Some(position)
    }

    /// Move without validation; callers check with [`Grid::check_move`] first.
    pub(crate) fn relocate(&mut self, id: CharacterId, to: Position) {
        self.vacate(id);
        self.occupants.insert(to, id);
        self.positions.insert(id, to);
    }

    /// Validate a move and return its cost in feet.
    pub fn check_move(
        &self,
        mover: CharacterId,
        from: Position,
        to: Position,
        movement_remaining: u32,
    ) -> Result<u32, GridError> {
        self.check_bounds(to)?;
        if matches!(self.occupant_at(to), Some(other) if other != mover) {
            return Err(GridError::Occupied { position: to });
        }
        let required = self.distance_feet(from, to);
        if required > movement_remaining {
            return Err(GridError::InsufficientMovement {
                required,
                remaining: movement_remaining,
            });
        }
        Ok(required)
    }

    /// Move a character, spending its remaining movement. Returns feet moved.
    pub fn move_character(
        &mut self,
        character: &mut Character,
        destination: Position,
    ) -> Result<u32, GridError> {
        let feet = self.check_move(
            character.id,
            character.position,
            destination,
            character.movement_remaining,
        )?;
        self.relocate(character.id, destination);
        character.position = destination;
        character.movement_remaining -= feet;
        Ok(feet)
    }

    /// Unoccupied cells in row-major order.
    pub fn free_cells(&self) -> Vec<Position> {
        (0..self.height as i32)
            .flat_map(|y| (0..self.width as i32).map(move |x| Position::new(x, y)))
            .filter(|p| !self.occupants.contains_key(p))
            .collect()
    }

    /// Unoccupied cells in random order.
    pub fn shuffled_free_cells<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Position> {
        let mut cells = self.free_cells();
        cells.shuffle(rng);
        cells
    }

    /// ASCII map with column and row labels and a legend.
    ///
    /// Pieces are lettered A, B, C... in the order given; pieces off the
    /// map are listed in the legend but not drawn.
    pub fn render<'a>(&self, pieces: impl IntoIterator<Item = (Position, &'a str)>) -> String {
        let symbols: Vec<(char, Position, &str)> = ('A'..='Z')
            .chain('a'..='z')
            .zip(pieces)
            .map(|(symbol, (position, name))| (symbol, position, name))
            .collect();
        let symbol_at = |position: Position| {
            symbols
                .iter()
                .find(|(_, p, _)| *p == position)
                .map(|(s, _, _)| *s)
                .unwrap_or('.')
        };

        let mut out = String::new();
        let columns: Vec<String> = (0..self.width).map(|x| (x % 10).to_string()).collect();
        out.push_str(&format!("      {}\n", columns.join(" ")));
        for y in 0..self.height as i32 {
            let row: Vec<String> = (0..self.width as i32)
                .map(|x| symbol_at(Position::new(x, y)).to_string())
                .collect();
            out.push_str(&format!("{y:>3} | {}\n", row.join(" ")));
        }
        out.push_str("Legend:");
        for (symbol, position, name) in &symbols {
            out.push_str(&format!("\n- {symbol}: {name} {position}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_sample_fighter;

    #[test]
    fn test_chebyshev_distance() {
        let a = Position::new(1, 1);
        let b = Position::new(4, 3);
        assert_eq!(distance(a, b), 3);
        assert_eq!(distance(b, a), 3);
        assert_eq!(distance(a, a), 0);
        assert_eq!(distance(Position::new(-2, 0), Position::new(2, 1)), 4);

        let grid = Grid::new(10, 10, DEFAULT_FEET_PER_CELL);
        assert_eq!(grid.distance_feet(a, b), 15);
        assert!(grid.in_range(a, Position::new(2, 2), 5));
        assert!(!grid.in_range(a, Position::new(3, 1), 5));
    }

    #[test]
    fn test_step_toward() {
        let from = Position::new(0, 0);
        assert_eq!(step_toward(from, Position::new(5, 3)), Position::new(1, 1));
        assert_eq!(step_toward(from, Position::new(0, -4)), Position::new(0, -1));
        assert_eq!(step_toward(from, from), from);
    }

    #[test]
    fn test_place_and_occupancy() {
        let mut grid = Grid::new(3, 3, 5);
        let a = CharacterId::new();
        let b = CharacterId::new();
        grid.place(a, Position::new(1, 1)).unwrap();
        assert_eq!(grid.occupant_at(Position::new(1, 1)), Some(a));
        assert_eq!(
            grid.place(b, Position::new(1, 1)),
            Err(GridError::Occupied {
                position: Position::new(1, 1)
            })
        );
        assert!(matches!(
            grid.place(b, Position::new(3, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
        assert_eq!(grid.free_cells().len(), 8);

        assert_eq!(grid.vacate(a), Some(Position::new(1, 1)));
        assert!(grid.is_free(Position::new(1, 1)));
    }

    #[test]
    fn test_move_character() {
        let mut grid = Grid::new(10, 10, 5);
        let mut fighter = create_sample_fighter("Roland").with_position(Position::new(0, 0));
        grid.place(fighter.id, fighter.position).unwrap();

        let feet = grid.move_character(&mut fighter, Position::new(3, 2)).unwrap();
        assert_eq!(feet, 15);
        assert_eq!(fighter.position, Position::new(3, 2));
        assert_eq!(fighter.movement_remaining, 15);
        assert_eq!(grid.occupant_at(Position::new(3, 2)), Some(fighter.id));
        assert!(grid.is_free(Position::new(0, 0)));

        assert_eq!(
            grid.move_character(&mut fighter, Position::new(7, 2)),
            Err(GridError::InsufficientMovement {
                required: 20,
                remaining: 15
            })
        );
        assert!(matches!(
            grid.move_character(&mut fighter, Position::new(-1, 2)),
            Err(GridError::OutOfBounds { .. })
        ));
        assert_eq!(fighter.position, Position::new(3, 2));
        assert_eq!(fighter.movement_remaining, 15);
    }

    #[test]
    fn test_move_into_occupied_cell() {
        let mut grid = Grid::new(5, 5, 5);
        let mut fighter = create_sample_fighter("Roland");
        grid.place(fighter.id, fighter.position).unwrap();
        grid.place(CharacterId::new(), Position::new(1, 0)).unwrap();
        assert!(matches!(
            grid.move_character(&mut fighter, Position::new(1, 0)),
            Err(GridError::Occupied { .. })
        ));
    }

    #[test]
    fn test_shuffled_cells_cover_free_cells() {
        use rand::SeedableRng;
        let grid = Grid::new(4, 4, 5);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut cells = grid.shuffled_free_cells(&mut rng);
        assert_eq!(cells.len(), 16);
        cells.sort_by_key(|p| (p.y, p.x));
        assert_eq!(cells, grid.free_cells());
    }

    #[test]
    fn test_render() {
        let grid = Grid::new(3, 2, 5);
        let map = grid.render([(Position::new(0, 0), "Roland"), (Position::new(2, 1), "Snag")]);
        assert_eq!(
            map,
            "      0 1 2\n  0 | A . .\n  1 | . . B\nLegend:\n- A: Roland (0, 0)\n- B: Snag (2, 1)"
        );
    }
}
