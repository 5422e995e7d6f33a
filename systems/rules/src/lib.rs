#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure rule engine deciding which unit actions are legal.
//!
//! Legality is a function of the acting unit's type, its cell, and the target
//! cell only; other units never influence it. The random helpers synthesise
//! commands for automated play. They are best-effort: a synthesised target
//! is drawn in the shape the unit type prefers but is not guaranteed to pass
//! [`is_valid`], so callers must validate it like any other request.

mod shared_rng;

use rand::{seq::SliceRandom, Rng};
use skirmish_core::{Board, CellCoord, CommandKind, Unit, UnitKind};

pub use shared_rng::SharedRng;

const TRANSPORT_RANGE: u32 = 3;

/// Reports whether `unit` may perform `command` against `target`.
#[must_use]
pub fn is_valid(unit: &Unit, command: CommandKind, target: CellCoord) -> bool {
    let origin = unit.cell;
    let aligned = origin.is_aligned_with(target);
    let distance = origin.manhattan_distance(target);

    match (unit.kind, command) {
        (UnitKind::Transport, CommandKind::Move) => aligned && distance <= TRANSPORT_RANGE,
        (UnitKind::Transport, CommandKind::Shoot) => false,
        (UnitKind::Archer, CommandKind::Move) => aligned && distance == 1,
        (UnitKind::Archer, CommandKind::Shoot) => aligned,
        (UnitKind::Cannon, CommandKind::Move) => false,
        (UnitKind::Cannon, CommandKind::Shoot) => true,
    }
}

/// Picks one of the unit type's command kinds uniformly at random.
pub fn random_command<R: Rng + ?Sized>(unit: &Unit, rng: &mut R) -> CommandKind {
    unit.kind
        .commands()
        .choose(rng)
        .copied()
        .unwrap_or(CommandKind::Move)
}

/// Draws a target cell for `command` shaped after the unit type's range rules.
///
/// The result always lies on `board`.
pub fn random_target<R: Rng + ?Sized>(
    unit: &Unit,
    command: CommandKind,
    board: Board,
    rng: &mut R,
) -> CellCoord {
    let mut x = i64::from(unit.cell.x());
    let mut y = i64::from(unit.cell.y());

    match unit.kind {
        UnitKind::Archer => {
            let distance = match command {
                CommandKind::Move => 1,
                CommandKind::Shoot => board_distance(board, rng),
            };
            step_along_random_axis(&mut x, &mut y, distance, rng);
        }
        UnitKind::Transport => {
            let distance = rng.gen_range(1..=TRANSPORT_RANGE);
            step_along_random_axis(&mut x, &mut y, distance, rng);
        }
        UnitKind::Cannon => {
            let distance = board_distance(board, rng);
            if rng.gen_bool(0.5) {
                step_along_random_axis(&mut x, &mut y, distance, rng);
            } else {
                x += signed(distance, rng);
                let second = board_distance(board, rng);
                y += signed(second, rng);
            }
        }
    }

    board.clamp(x, y)
}

/// Distance in `[1, max(width, height) - 1]`, or exactly 1 when that range is empty.
fn board_distance<R: Rng + ?Sized>(board: Board, rng: &mut R) -> u32 {
    let reach = board.width().max(board.height()).saturating_sub(1);
    if reach <= 1 {
        return 1;
    }
    rng.gen_range(1..=reach)
}

fn step_along_random_axis<R: Rng + ?Sized>(x: &mut i64, y: &mut i64, distance: u32, rng: &mut R) {
    if rng.gen_bool(0.5) {
        *x += signed(distance, rng);
    } else {
        *y += signed(distance, rng);
    }
}

fn signed<R: Rng + ?Sized>(distance: u32, rng: &mut R) -> i64 {
    let distance = i64::from(distance);
    if rng.gen_bool(0.5) {
        distance
    } else {
        -distance
    }
}
