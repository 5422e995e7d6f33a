#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Game setup system that opens a fresh game and deploys both armies.
//!
//! A new game replaces whichever game was active before it: every existing
//! game is deactivated, the new one is stored as active, and the configured
//! number of units per kind is placed for each side on distinct random cells.
//! All of it commits in one transaction.

use std::collections::HashSet;

use rand::Rng;
use skirmish_core::{
    Board, CellCoord, Color, CommandError, Game, GameId, Missing, Store, StoreError, Transaction,
    Unit, UnitCounts,
};
use skirmish_system_rules::SharedRng;
use thiserror::Error;

/// Failures raised while preparing a new game.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    /// The board has no cells.
    #[error("board {width}x{height} has no cells")]
    EmptyBoard {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Both armies together need more cells than the board offers.
    #[error("{required} units cannot be placed on {available} cells")]
    BoardTooSmall {
        /// Units to place across both sides.
        required: u64,
        /// Cells available on the board.
        available: u64,
    },
    /// The store rejected the setup batch.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deactivates every existing game and starts a new populated one.
///
/// Units are placed side by side in the order White then Black, and within
/// a side in [`skirmish_core::UnitKind::ALL`] order. Returns the identifier
/// of the new active game.
pub fn create_new_game<S: Store>(
    store: &S,
    rng: &SharedRng,
    counts: UnitCounts,
    board: Board,
) -> Result<GameId, SetupError> {
    if board.is_empty() {
        return Err(SetupError::EmptyBoard {
            width: board.width(),
            height: board.height(),
        });
    }
    let required = counts.per_side().saturating_mul(2);
    if required > board.cell_count() {
        return Err(SetupError::BoardTooSmall {
            required,
            available: board.cell_count(),
        });
    }

    let mut tx = store.begin();

    let mut retired = 0_usize;
    for mut game in tx.games().into_iter().filter(|game| game.active) {
        game.active = false;
        tx.save_game(game);
        retired += 1;
    }

    let game = Game::new(board);
    let id = game.id;
    tx.save_game(game);

    let units = rng.with(|rng| deploy(id, board, counts, rng));
    for unit in &units {
        log::debug!(
            "placed {} {} {} at {}",
            unit.color,
            unit.kind,
            unit.id,
            unit.cell
        );
    }
    let placed = units.len();
    for unit in units {
        tx.save_unit(unit);
    }

    tx.commit()?;
    log::info!(
        "started game {id} on a {}x{} board with {placed} unit(s); retired {retired} game(s)",
        board.width(),
        board.height()
    );
    Ok(id)
}

/// Lists every unit of `color` in the active game, ordered by identifier.
///
/// Destroyed units are included so callers can see the full roster.
pub fn list_units<S: Store>(store: &S, color: Color) -> Result<Vec<Unit>, CommandError> {
    let tx = store.begin();
    let game = tx
        .active_game()
        .ok_or(CommandError::NotFound(Missing::ActiveGame))?;
    Ok(tx.units_by_color(game.id, color))
}

/// Draws a distinct cell for every configured unit.
///
/// Callers guarantee the board holds at least as many cells as units.
fn deploy<R: Rng + ?Sized>(
    game: GameId,
    board: Board,
    counts: UnitCounts,
    rng: &mut R,
) -> Vec<Unit> {
    let mut occupied = HashSet::new();
    let mut units = Vec::new();

    for color in Color::ALL {
        for (kind, count) in counts.iter() {
            for _ in 0..count {
                let cell = loop {
                    let candidate = CellCoord::new(
                        rng.gen_range(0..board.width()),
                        rng.gen_range(0..board.height()),
                    );
                    if occupied.insert(candidate) {
                        break candidate;
                    }
                };
                units.push(Unit::new(game, kind, color, cell));
            }
        }
    }

    units
}
