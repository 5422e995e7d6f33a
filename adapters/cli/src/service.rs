//! Command API over an in-memory store.

use std::sync::Arc;

use skirmish_core::{
    CellCoord, Clock, Color, CommandError, CommandKind, CommandRequest, GameId, Outcome, Unit,
    UnitId,
};
use skirmish_system_resolver::Resolver;
use skirmish_system_rules::SharedRng;
use skirmish_system_setup::{create_new_game, list_units, SetupError};
use skirmish_world::MemoryStore;

use crate::config::GameConfig;

/// Entry point used by every front end to drive games.
pub(crate) struct GameService {
    store: MemoryStore,
    rng: SharedRng,
    clock: Arc<dyn Clock>,
    config: GameConfig,
}

impl GameService {
    /// Creates a service with an empty store.
    pub(crate) fn new(config: GameConfig, rng: SharedRng, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: MemoryStore::new(),
            rng,
            clock,
            config,
        }
    }

    /// Starts a new game with the configured board and armies.
    pub(crate) fn new_game(&self) -> Result<GameId, SetupError> {
        create_new_game(
            &self.store,
            &self.rng,
            self.config.units,
            self.config.board(),
        )
    }

    /// Lists the units of `color` in the active game.
    pub(crate) fn list_units(&self, color: Color) -> Result<Vec<Unit>, CommandError> {
        list_units(&self.store, color)
    }

    /// Executes a command on behalf of `color`.
    pub(crate) fn execute(
        &self,
        unit: UnitId,
        kind: CommandKind,
        x: u32,
        y: u32,
        color: Color,
    ) -> Result<Outcome, CommandError> {
        self.resolver().execute(CommandRequest {
            unit,
            kind,
            target: CellCoord::new(x, y),
            color,
        })
    }

    /// Executes a randomly drawn command on behalf of `color`.
    pub(crate) fn execute_random(
        &self,
        unit: UnitId,
        color: Color,
    ) -> Result<Outcome, CommandError> {
        self.resolver().execute_random(unit, color)
    }

    fn resolver(&self) -> Resolver<'_, MemoryStore> {
        Resolver::new(&self.store, self.clock.as_ref(), &self.rng)
    }
}
