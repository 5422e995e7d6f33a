#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command resolver that validates and applies one command at a time.
//!
//! Every command runs inside a single store transaction. The resolver loads
//! the acting unit, checks ownership and cooldown, gathers the active units
//! standing on the target cell (the actor included when it targets its own
//! cell), consults the rule engine, applies the combat
//! or movement effects, appends the audit record, and commits. A failed
//! check aborts before anything is staged; a failed commit discards the whole
//! batch, so no partial effect is ever observable.

use std::time::SystemTime;

use skirmish_core::{
    Board, CellCoord, Clock, Color, CommandError, CommandKind, CommandRecord, CommandRequest,
    InvalidReason, Missing, Outcome, Store, Transaction, Unit, UnitId,
};
use skirmish_system_rules::{is_valid, random_command, random_target, SharedRng};

/// Resolves player commands against a store.
pub struct Resolver<'a, S: Store> {
    store: &'a S,
    clock: &'a dyn Clock,
    rng: &'a SharedRng,
}

impl<'a, S: Store> Resolver<'a, S> {
    /// Creates a resolver reading time from `clock` and randomness from `rng`.
    #[must_use]
    pub fn new(store: &'a S, clock: &'a dyn Clock, rng: &'a SharedRng) -> Self {
        Self { store, clock, rng }
    }

    /// Validates and applies `request` atomically.
    pub fn execute(&self, request: CommandRequest) -> Result<Outcome, CommandError> {
        let result = self.resolve(request);
        match &result {
            Ok(outcome) => log::debug!("unit {}: {}", request.unit, outcome.summary),
            Err(CommandError::Conflict) => {
                log::warn!("unit {}: {} lost a concurrent update", request.unit, request.kind);
            }
            Err(error) => log::debug!("unit {}: rejected: {error}", request.unit),
        }
        result
    }

    /// Synthesises a random command for the unit and executes it.
    ///
    /// The synthesised command goes through the same validation as
    /// [`Resolver::execute`] and may therefore be rejected as invalid.
    pub fn execute_random(&self, unit: UnitId, color: Color) -> Result<Outcome, CommandError> {
        let (actor, board) = {
            let tx = self.store.begin();
            let actor = tx
                .unit(unit)
                .ok_or(CommandError::NotFound(Missing::Unit(unit)))?;
            let game = tx
                .game(actor.game)
                .ok_or(CommandError::NotFound(Missing::Game(actor.game)))?;
            (actor, game.board)
        };

        let (kind, target) = self.rng.with(|rng| {
            let kind = random_command(&actor, rng);
            (kind, random_target(&actor, kind, board, rng))
        });
        log::debug!("unit {unit}: drew random {kind} to {target}");

        self.execute(CommandRequest {
            unit,
            kind,
            target,
            color,
        })
    }

    fn resolve(&self, request: CommandRequest) -> Result<Outcome, CommandError> {
        let mut tx = self.store.begin();

        let mut actor = tx
            .unit(request.unit)
            .ok_or(CommandError::NotFound(Missing::Unit(request.unit)))?;

        if actor.color != request.color {
            return Err(CommandError::Unauthorized {
                unit: actor.id,
                owner: actor.color,
                requester: request.color,
            });
        }

        let now = self.clock.now();
        if !actor.is_cooldown_elapsed(request.kind, now) {
            return Err(CommandError::CooldownActive {
                unit: actor.id,
                command: request.kind,
                ends_at: actor.cooldown_ends_at(request.kind).unwrap_or(now),
            });
        }

        let targets: Vec<Unit> = tx
            .units_at(actor.game, request.target)
            .into_iter()
            .filter(Unit::is_active)
            .collect();

        let board = tx
            .game(actor.game)
            .ok_or(CommandError::NotFound(Missing::Game(actor.game)))?
            .board;
        validate(&actor, board, request.kind, request.target)?;

        let outcome = match request.kind {
            CommandKind::Move => resolve_move(&mut tx, &mut actor, targets, request.target, now),
            CommandKind::Shoot => resolve_shot(&mut tx, &mut actor, targets, request.target),
        };

        tx.save_command(CommandRecord::new(&actor, request.kind, request.target, now));
        actor.touch(now);
        tx.save_unit(actor);
        tx.commit()?;

        Ok(outcome)
    }
}

fn validate(
    actor: &Unit,
    board: Board,
    command: CommandKind,
    target: CellCoord,
) -> Result<(), CommandError> {
    let reason = if !actor.is_active() {
        Some(InvalidReason::ActorDestroyed)
    } else if !board.contains(target) {
        Some(InvalidReason::OutOfBounds)
    } else if !is_valid(actor, command, target) {
        Some(InvalidReason::Illegal)
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CommandError::InvalidCommand {
            unit_kind: actor.kind,
            command,
            target,
            reason,
        }),
        None => Ok(()),
    }
}

fn resolve_move<T: Transaction>(
    tx: &mut T,
    actor: &mut Unit,
    targets: Vec<Unit>,
    target: CellCoord,
    now: SystemTime,
) -> Outcome {
    if targets.iter().any(|unit| unit.color == actor.color) {
        return Outcome {
            summary: format!("Move to {target} blocked by a friendly unit"),
            ..Outcome::default()
        };
    }

    let destroyed = destroy_all(tx, actor, targets);
    actor.move_to(target, now);

    let summary = if destroyed.is_empty() {
        format!("Unit moved to {target}")
    } else {
        format!(
            "Unit moved to {target}, destroying {} enemy unit(s)",
            destroyed.len()
        )
    };

    Outcome {
        summary,
        unit_destroyed: !destroyed.is_empty(),
        moved: true,
        shot_executed: false,
        destroyed,
    }
}

fn resolve_shot<T: Transaction>(
    tx: &mut T,
    actor: &mut Unit,
    targets: Vec<Unit>,
    target: CellCoord,
) -> Outcome {
    let destroyed = destroy_all(tx, actor, targets);

    let summary = if destroyed.is_empty() {
        format!("Unit shot to {target}, nothing was hit")
    } else {
        format!("Unit shot to {target}, destroying {} unit(s)", destroyed.len())
    };

    Outcome {
        summary,
        unit_destroyed: !destroyed.is_empty(),
        moved: false,
        shot_executed: true,
        destroyed,
    }
}

/// Destroys every target. The actor is staged by the caller, so a shot at its
/// own cell marks `actor` itself instead of saving a second copy.
fn destroy_all<T: Transaction>(tx: &mut T, actor: &mut Unit, targets: Vec<Unit>) -> Vec<UnitId> {
    targets
        .into_iter()
        .map(|mut unit| {
            let id = unit.id;
            if id == actor.id {
                actor.destroy();
            } else {
                unit.destroy();
                tx.save_unit(unit);
            }
            id
        })
        .collect()
}
