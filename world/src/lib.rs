#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative in-memory state for Skirmish.
//!
//! [`MemoryStore`] implements the persistence contract from
//! `skirmish-core`. Tables sit behind a single reader-writer lock that is held
//! only while a read clones its result or while a commit validates and
//! applies its batch, so transactions touching disjoint units never wait on
//! each other for longer than one commit.
//!
//! Every cell carries an occupancy version that moves whenever a committed
//! unit enters it, leaves it, or changes status there. A transaction
//! remembers the version of each cell it listed through `units_at` and fails
//! to commit if any of them moved, so two units racing into the same empty
//! cell cannot both land there.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use parking_lot::RwLock;
use skirmish_core::{
    CellCoord, Color, CommandRecord, Game, GameId, RecordRef, Store, StoreError, Transaction,
    Unit, UnitId,
};

type CellKey = (GameId, CellCoord);

/// In-memory store holding every game, unit, and command record.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            store: self,
            units: BTreeMap::new(),
            games: BTreeMap::new(),
            commands: Vec::new(),
            deleted: BTreeSet::new(),
            watched: RefCell::new(BTreeMap::new()),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    games: BTreeMap<GameId, Game>,
    units: BTreeMap<UnitId, Unit>,
    commands: Vec<CommandRecord>,
    cells: BTreeMap<CellKey, u64>,
}

impl Tables {
    fn cell_version(&self, key: &CellKey) -> u64 {
        self.cells.get(key).copied().unwrap_or(0)
    }

    fn touch_cell(&mut self, key: CellKey) {
        let version = self.cells.entry(key).or_insert(0);
        *version = version.saturating_add(1);
    }
}

/// Transaction staging writes against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    units: BTreeMap<UnitId, Unit>,
    games: BTreeMap<GameId, Game>,
    commands: Vec<CommandRecord>,
    deleted: BTreeSet<GameId>,
    watched: RefCell<BTreeMap<CellKey, u64>>,
}

impl MemoryTransaction<'_> {
    fn merged_units(&self, tables: &Tables, keep: impl Fn(&Unit) -> bool) -> Vec<Unit> {
        let committed = tables
            .units
            .values()
            .filter(|unit| !self.units.contains_key(&unit.id));
        committed
            .chain(self.units.values())
            .filter(|unit| !self.deleted.contains(&unit.game) && keep(*unit))
            .map(|unit| (unit.id, unit.clone()))
            .collect::<BTreeMap<UnitId, Unit>>()
            .into_values()
            .collect()
    }

    fn merged_games(&self) -> Vec<Game> {
        let tables = self.store.tables.read();
        let committed = tables
            .games
            .values()
            .filter(|game| !self.games.contains_key(&game.id));
        committed
            .chain(self.games.values())
            .filter(|game| !self.deleted.contains(&game.id))
            .map(|game| (game.id, game.clone()))
            .collect::<BTreeMap<GameId, Game>>()
            .into_values()
            .collect()
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn unit(&self, id: UnitId) -> Option<Unit> {
        let unit = match self.units.get(&id) {
            Some(staged) => staged.clone(),
            None => self.store.tables.read().units.get(&id)?.clone(),
        };
        (!self.deleted.contains(&unit.game)).then_some(unit)
    }

    fn units_by_color(&self, game: GameId, color: Color) -> Vec<Unit> {
        let tables = self.store.tables.read();
        self.merged_units(&tables, |unit| unit.game == game && unit.color == color)
    }

    fn units_at(&self, game: GameId, cell: CellCoord) -> Vec<Unit> {
        let tables = self.store.tables.read();
        let key = (game, cell);
        let _ = self
            .watched
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| tables.cell_version(&key));
        self.merged_units(&tables, |unit| unit.game == game && unit.cell == cell)
    }

    fn game(&self, id: GameId) -> Option<Game> {
        if self.deleted.contains(&id) {
            return None;
        }
        match self.games.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self.store.tables.read().games.get(&id).cloned(),
        }
    }

    fn active_game(&self) -> Option<Game> {
        self.merged_games().into_iter().find(|game| game.active)
    }

    fn games(&self) -> Vec<Game> {
        self.merged_games()
    }

    fn save_unit(&mut self, unit: Unit) {
        let _ = self.units.insert(unit.id, unit);
    }

    fn save_game(&mut self, game: Game) {
        let _ = self.games.insert(game.id, game);
    }

    fn save_command(&mut self, record: CommandRecord) {
        self.commands.push(record);
    }

    fn delete_game(&mut self, id: GameId) {
        let _ = self.deleted.insert(id);
        let _ = self.games.remove(&id);
        self.units.retain(|_, unit| unit.game != id);
        self.commands.retain(|record| record.game != id);
    }

    fn commit(self) -> Result<(), StoreError> {
        let Self {
            store,
            units,
            games,
            commands,
            deleted,
            watched,
        } = self;
        let mut tables = store.tables.write();

        for game in games.values() {
            let found = tables.games.get(&game.id).map_or(0, |stored| stored.version);
            if found != game.version {
                return Err(StoreError::Conflict {
                    record: RecordRef::Game(game.id),
                    expected: game.version,
                    found,
                });
            }
        }

        let game_exists = |id: &GameId| tables.games.contains_key(id) || games.contains_key(id);
        for unit in units.values() {
            if !game_exists(&unit.game) {
                return Err(StoreError::MissingGame(unit.game));
            }
            let found = tables.units.get(&unit.id).map_or(0, |stored| stored.version);
            if found != unit.version {
                return Err(StoreError::Conflict {
                    record: RecordRef::Unit(unit.id),
                    expected: unit.version,
                    found,
                });
            }
        }
        if let Some(record) = commands.iter().find(|record| !game_exists(&record.game)) {
            return Err(StoreError::MissingGame(record.game));
        }

        for (&(game, cell), &expected) in watched.into_inner().iter() {
            let found = tables.cell_version(&(game, cell));
            if found != expected {
                return Err(StoreError::Conflict {
                    record: RecordRef::Cell { game, cell },
                    expected,
                    found,
                });
            }
        }

        let mut activating = games.values().filter(|game| game.active);
        if let Some(staged) = activating.next() {
            let committed_active = tables
                .games
                .values()
                .filter(|game| !games.contains_key(&game.id) && !deleted.contains(&game.id))
                .find(|game| game.active);
            if let Some(active) = committed_active.or_else(|| activating.next()) {
                return Err(StoreError::ActiveGameTaken {
                    staged: staged.id,
                    active: active.id,
                });
            }
        }

        log::debug!(
            "committing {} game(s), {} unit(s), {} command(s), {} deletion(s)",
            games.len(),
            units.len(),
            commands.len(),
            deleted.len()
        );

        for (id, mut game) in games {
            game.version = game.version.saturating_add(1);
            let _ = tables.games.insert(id, game);
        }
        for (id, mut unit) in units {
            let previous = tables.units.get(&id).map(|stored| (stored.cell, stored.status));
            match previous {
                Some((cell, status)) if cell == unit.cell && status == unit.status => {}
                Some((cell, _)) => {
                    tables.touch_cell((unit.game, cell));
                    tables.touch_cell((unit.game, unit.cell));
                }
                None => tables.touch_cell((unit.game, unit.cell)),
            }
            unit.version = unit.version.saturating_add(1);
            let _ = tables.units.insert(id, unit);
        }
        tables.commands.extend(commands);

        if !deleted.is_empty() {
            tables.games.retain(|id, _| !deleted.contains(id));
            tables.units.retain(|_, unit| !deleted.contains(&unit.game));
            tables.commands.retain(|record| !deleted.contains(&record.game));
            tables.cells.retain(|(game, _), _| !deleted.contains(game));
        }

        Ok(())
    }
}

/// Query functions that provide read-only access to committed state.
pub mod query {
    use skirmish_core::{CommandRecord, Game, GameId, Unit};

    use super::MemoryStore;

    /// Lists every committed game, ordered by identifier.
    #[must_use]
    pub fn games(store: &MemoryStore) -> Vec<Game> {
        store.tables.read().games.values().cloned().collect()
    }

    /// Lists every committed unit of `game`, ordered by identifier.
    #[must_use]
    pub fn units(store: &MemoryStore, game: GameId) -> Vec<Unit> {
        store
            .tables
            .read()
            .units
            .values()
            .filter(|unit| unit.game == game)
            .cloned()
            .collect()
    }

    /// Returns the command log of `game` in execution order.
    #[must_use]
    pub fn command_log(store: &MemoryStore, game: GameId) -> Vec<CommandRecord> {
        store
            .tables
            .read()
            .commands
            .iter()
            .filter(|record| record.game == game)
            .cloned()
            .collect()
    }
}
