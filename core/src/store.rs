//! Persistence contract consumed by the resolver and game setup.
//!
//! A [`Store`] hands out [`Transaction`]s. Reads observe the committed state
//! overlaid with the transaction's own staged writes; nothing becomes
//! visible to other transactions until [`Transaction::commit`] succeeds.
//! Commits are all-or-nothing and compare the version carried by every staged
//! unit and game against the committed one, rejecting the whole batch on any
//! mismatch. Cells read through [`Transaction::units_at`] are guarded the same
//! way: if any unit entered or left such a cell before the commit, the batch
//! is rejected. A commit that would leave two games active is rejected too.

use std::fmt;

use thiserror::Error;

use crate::{CellCoord, Color, CommandRecord, Game, GameId, Unit, UnitId};

/// Record touched by a failed commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordRef {
    /// A unit record.
    Unit(UnitId),
    /// A game record.
    Game(GameId),
    /// The occupants of one cell.
    Cell {
        /// Game the cell belongs to.
        game: GameId,
        /// Cell whose occupants changed.
        cell: CellCoord,
    },
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "unit {id}"),
            Self::Game(id) => write!(f, "game {id}"),
            Self::Cell { game, cell } => write!(f, "cell {cell} of game {game}"),
        }
    }
}

/// Failures reported by the persistence layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The record changed since it was read.
    #[error("{record} was modified concurrently (read version {expected}, stored version {found})")]
    Conflict {
        /// Record whose version moved.
        record: RecordRef,
        /// Version observed when the record was read.
        expected: u64,
        /// Version currently committed.
        found: u64,
    },
    /// Another game became active first.
    #[error("game {staged} cannot become active while game {active} is active")]
    ActiveGameTaken {
        /// Game the batch tried to activate.
        staged: GameId,
        /// Game already committed as active.
        active: GameId,
    },
    /// A write referenced a game that does not exist.
    #[error("game {0} does not exist")]
    MissingGame(GameId),
}

/// Unit of work against the persistent state.
pub trait Transaction {
    /// Loads a unit by identifier.
    fn unit(&self, id: UnitId) -> Option<Unit>;

    /// Loads every unit of `color` in `game`, ordered by identifier.
    fn units_by_color(&self, game: GameId, color: Color) -> Vec<Unit>;

    /// Loads every unit of `game` standing on `cell`, ordered by identifier.
    ///
    /// The cell stays guarded until commit: a concurrent change to its
    /// occupants makes the commit fail with a conflict.
    fn units_at(&self, game: GameId, cell: CellCoord) -> Vec<Unit>;

    /// Loads a game by identifier.
    fn game(&self, id: GameId) -> Option<Game>;

    /// Loads the game currently flagged as active.
    fn active_game(&self) -> Option<Game>;

    /// Lists every game.
    fn games(&self) -> Vec<Game>;

    /// Stages a unit write.
    fn save_unit(&mut self, unit: Unit);

    /// Stages a game write.
    fn save_game(&mut self, game: Game);

    /// Stages an append to the command log.
    fn save_command(&mut self, record: CommandRecord);

    /// Stages removal of a game together with its units and commands.
    fn delete_game(&mut self, id: GameId);

    /// Applies every staged write, or none of them.
    fn commit(self) -> Result<(), StoreError>;
}

/// Source of transactions.
pub trait Store: Send + Sync {
    /// Transaction type handed out by the store.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Opens a new transaction.
    fn begin(&self) -> Self::Transaction<'_>;
}
