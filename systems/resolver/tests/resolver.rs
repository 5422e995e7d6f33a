use std::{
    sync::{Barrier, Mutex},
    thread,
    time::{Duration, SystemTime},
};

use skirmish_core::{
    Board, CellCoord, Clock, Color, CommandError, CommandKind, CommandRecord, CommandRequest,
    ErrorKind, Game, GameId, InvalidReason, ManualClock, Outcome, Store, StoreError, Transaction,
    Unit, UnitId, UnitKind, UnitStatus,
};
use skirmish_system_resolver::Resolver;
use skirmish_system_rules::SharedRng;
use skirmish_world::{query, MemoryStore, MemoryTransaction};

struct Fixture {
    store: MemoryStore,
    clock: ManualClock,
    rng: SharedRng,
    game: Game,
}

impl Fixture {
    fn new(width: u32, height: u32) -> Self {
        let store = MemoryStore::new();
        let game = Game::new(Board::new(width, height));
        let mut tx = store.begin();
        tx.save_game(game.clone());
        tx.commit().expect("game commit");
        Self {
            store,
            clock: ManualClock::starting_at(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000)),
            rng: SharedRng::seeded(0x5eed),
            game,
        }
    }

    fn place(&self, kind: UnitKind, color: Color, x: u32, y: u32) -> UnitId {
        let unit = Unit::new(self.game.id, kind, color, CellCoord::new(x, y));
        let id = unit.id;
        let mut tx = self.store.begin();
        tx.save_unit(unit);
        tx.commit().expect("unit commit");
        id
    }

    fn resolver(&self) -> Resolver<'_, MemoryStore> {
        Resolver::new(&self.store, &self.clock, &self.rng)
    }

    fn execute(
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

    fn unit(&self, id: UnitId) -> Unit {
        self.store.begin().unit(id).expect("unit exists")
    }
}

#[test]
fn archer_steps_to_an_adjacent_cell() {
    let fixture = Fixture::new(5, 5);
    let archer = fixture.place(UnitKind::Archer, Color::White, 2, 2);

    let outcome = fixture
        .execute(archer, CommandKind::Move, 3, 2, Color::White)
        .expect("legal move");

    assert!(outcome.moved);
    assert!(!outcome.unit_destroyed);
    assert!(!outcome.shot_executed);
    assert!(outcome.summary.contains("moved to (3,2)"));

    let unit = fixture.unit(archer);
    assert_eq!(unit.cell, CellCoord::new(3, 2));
    assert_eq!(unit.command_count, 1);
    assert_eq!(unit.last_command_at, Some(fixture.clock.now()));

    let log = query::command_log(&fixture.store, fixture.game.id);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].unit, archer);
    assert_eq!(log[0].kind, CommandKind::Move);
    assert_eq!(log[0].color, Color::White);
    assert_eq!(log[0].target, CellCoord::new(3, 2));
    assert_eq!(log[0].executed_at, fixture.clock.now());
}

#[test]
fn cannon_bombards_a_distant_transport() {
    let fixture = Fixture::new(5, 5);
    let cannon = fixture.place(UnitKind::Cannon, Color::White, 1, 1);
    let transport = fixture.place(UnitKind::Transport, Color::Black, 4, 4);

    let outcome = fixture
        .execute(cannon, CommandKind::Shoot, 4, 4, Color::White)
        .expect("cannons may always shoot");

    assert!(outcome.shot_executed);
    assert!(outcome.unit_destroyed);
    assert!(!outcome.moved);
    assert_eq!(outcome.destroyed, vec![transport]);
    assert!(outcome.summary.contains("shot to (4,4)"));
    assert_eq!(fixture.unit(transport).status, UnitStatus::Destroyed);
    assert_eq!(fixture.unit(cannon).cell, CellCoord::new(1, 1));
}

#[test]
fn friendly_units_block_a_move_but_consume_the_cooldown() {
    let fixture = Fixture::new(5, 5);
    let archer = fixture.place(UnitKind::Archer, Color::White, 2, 2);
    let friend = fixture.place(UnitKind::Transport, Color::White, 3, 2);

    let outcome = fixture
        .execute(archer, CommandKind::Move, 3, 2, Color::White)
        .expect("blocked moves still resolve");

    assert!(!outcome.moved);
    assert!(!outcome.unit_destroyed);
    assert!(outcome.summary.contains("blocked"));

    let unit = fixture.unit(archer);
    assert_eq!(unit.cell, CellCoord::new(2, 2));
    assert_eq!(unit.command_count, 0);
    assert_eq!(unit.last_command_at, Some(fixture.clock.now()));
    assert_eq!(fixture.unit(friend).status, UnitStatus::Active);
    assert_eq!(query::command_log(&fixture.store, fixture.game.id).len(), 1);

    let retry = fixture.execute(archer, CommandKind::Move, 2, 1, Color::White);
    assert_eq!(retry.map_err(|error| error.kind()), Err(ErrorKind::CooldownActive));
}

#[test]
fn moving_onto_enemies_destroys_them_all() {
    let fixture = Fixture::new(6, 6);
    let transport = fixture.place(UnitKind::Transport, Color::White, 0, 0);
    let first = fixture.place(UnitKind::Archer, Color::Black, 2, 0);
    let second = fixture.place(UnitKind::Cannon, Color::Black, 2, 0);

    let outcome = fixture
        .execute(transport, CommandKind::Move, 2, 0, Color::White)
        .expect("legal move");

    assert!(outcome.moved);
    assert!(outcome.unit_destroyed);
    assert_eq!(outcome.destroyed.len(), 2);
    assert_eq!(fixture.unit(first).status, UnitStatus::Destroyed);
    assert_eq!(fixture.unit(second).status, UnitStatus::Destroyed);

    let unit = fixture.unit(transport);
    assert_eq!(unit.cell, CellCoord::new(2, 0));
    assert_eq!(unit.command_count, 1);
}

#[test]
fn shots_hit_friend_and_foe_alike() {
    let fixture = Fixture::new(5, 5);
    let archer = fixture.place(UnitKind::Archer, Color::White, 0, 0);
    let friend = fixture.place(UnitKind::Transport, Color::White, 0, 3);
    let foe = fixture.place(UnitKind::Cannon, Color::Black, 0, 3);

    let outcome = fixture
        .execute(archer, CommandKind::Shoot, 0, 3, Color::White)
        .expect("aligned shot");

    assert!(outcome.shot_executed);
    assert!(outcome.unit_destroyed);
    assert_eq!(outcome.destroyed.len(), 2);
    assert_eq!(fixture.unit(friend).status, UnitStatus::Destroyed);
    assert_eq!(fixture.unit(foe).status, UnitStatus::Destroyed);

    let unit = fixture.unit(archer);
    assert_eq!(unit.cell, CellCoord::new(0, 0));
    assert_eq!(unit.command_count, 0);
    assert_eq!(unit.last_command_at, Some(fixture.clock.now()));
}

#[test]
fn shooting_an_empty_cell_only_logs_and_restarts_the_cooldown() {
    let fixture = Fixture::new(5, 5);
    let cannon = fixture.place(UnitKind::Cannon, Color::Black, 2, 2);

    let outcome = fixture
        .execute(cannon, CommandKind::Shoot, 0, 4, Color::Black)
        .expect("legal shot");

    assert!(outcome.shot_executed);
    assert!(!outcome.unit_destroyed);
    assert!(outcome.destroyed.is_empty());
    assert_eq!(query::command_log(&fixture.store, fixture.game.id).len(), 1);
    assert_eq!(fixture.unit(cannon).last_command_at, Some(fixture.clock.now()));
}

#[test]
fn destroyed_units_neither_block_nor_die_twice() {
    let fixture = Fixture::new(5, 5);
    let cannon = fixture.place(UnitKind::Cannon, Color::Black, 4, 4);
    let archer = fixture.place(UnitKind::Archer, Color::White, 1, 2);
    let wreck = fixture.place(UnitKind::Transport, Color::White, 2, 2);

    let _ = fixture
        .execute(cannon, CommandKind::Shoot, 2, 2, Color::Black)
        .expect("shot");
    let wreck_version = fixture.unit(wreck).version;

    let outcome = fixture
        .execute(archer, CommandKind::Move, 2, 2, Color::White)
        .expect("move over a wreck");

    assert!(outcome.moved);
    assert!(!outcome.unit_destroyed);
    assert_eq!(fixture.unit(wreck).version, wreck_version);
}

#[test]
fn rejected_commands_leave_the_unit_untouched() {
    let fixture = Fixture::new(5, 5);
    let archer = fixture.place(UnitKind::Archer, Color::White, 2, 2);
    let before = fixture.unit(archer);

    let unauthorized = fixture.execute(archer, CommandKind::Move, 3, 2, Color::Black);
    assert!(matches!(
        unauthorized,
        Err(CommandError::Unauthorized {
            owner: Color::White,
            requester: Color::Black,
            ..
        })
    ));

    let illegal = fixture.execute(archer, CommandKind::Move, 4, 2, Color::White);
    assert!(matches!(
        illegal,
        Err(CommandError::InvalidCommand {
            reason: InvalidReason::Illegal,
            ..
        })
    ));

    let off_board = fixture.execute(archer, CommandKind::Shoot, 2, 7, Color::White);
    assert!(matches!(
        off_board,
        Err(CommandError::InvalidCommand {
            reason: InvalidReason::OutOfBounds,
            ..
        })
    ));

    let missing = fixture.execute(UnitId::random(), CommandKind::Move, 3, 2, Color::White);
    assert_eq!(missing.map_err(|error| error.kind()), Err(ErrorKind::NotFound));

    assert_eq!(fixture.unit(archer), before);
    assert!(query::command_log(&fixture.store, fixture.game.id).is_empty());
}

#[test]
fn cooldown_rejections_leave_the_unit_untouched() {
    let fixture = Fixture::new(5, 5);
    let archer = fixture.place(UnitKind::Archer, Color::White, 2, 2);
    let _ = fixture
        .execute(archer, CommandKind::Move, 3, 2, Color::White)
        .expect("first move");
    let after_first = fixture.unit(archer);

    fixture.clock.advance(Duration::from_secs(5));
    let at_boundary = fixture.execute(archer, CommandKind::Move, 4, 2, Color::White);
    assert!(matches!(
        at_boundary,
        Err(CommandError::CooldownActive {
            command: CommandKind::Move,
            ..
        })
    ));
    assert_eq!(fixture.unit(archer), after_first);

    fixture.clock.advance(Duration::from_millis(1));
    let _ = fixture
        .execute(archer, CommandKind::Move, 4, 2, Color::White)
        .expect("cooldown elapsed");
    assert_eq!(fixture.unit(archer).command_count, 2);
}

#[test]
fn destroyed_actors_cannot_act() {
    let fixture = Fixture::new(5, 5);
    let cannon = fixture.place(UnitKind::Cannon, Color::Black, 0, 0);
    let archer = fixture.place(UnitKind::Archer, Color::White, 3, 3);
    let _ = fixture
        .execute(cannon, CommandKind::Shoot, 3, 3, Color::Black)
        .expect("shot");

    let error = fixture
        .execute(archer, CommandKind::Move, 3, 2, Color::White)
        .expect_err("destroyed archer");
    assert!(matches!(
        error,
        CommandError::InvalidCommand {
            reason: InvalidReason::ActorDestroyed,
            ..
        }
    ));
}

#[test]
fn random_commands_for_transports_and_cannons_always_resolve() {
    let convoy = Fixture::new(6, 4);
    let transport = convoy.place(UnitKind::Transport, Color::White, 3, 2);
    let battery = Fixture::new(6, 4);
    let cannon = battery.place(UnitKind::Cannon, Color::Black, 0, 0);

    let mut moves = 0;
    for _ in 0..50 {
        let outcome = convoy
            .resolver()
            .execute_random(transport, Color::White)
            .expect("transport targets are always legal");
        assert!(!outcome.shot_executed);
        if outcome.moved {
            moves += 1;
        }
        convoy.clock.advance(Duration::from_secs(6));
    }

    assert_eq!(convoy.unit(transport).command_count, moves);
    assert!(Board::new(6, 4).contains(convoy.unit(transport).cell));
    assert_eq!(query::command_log(&convoy.store, convoy.game.id).len(), 50);

    let mut shots = 0;
    for _ in 0..50 {
        let outcome = battery
            .resolver()
            .execute_random(cannon, Color::Black)
            .expect("cannon targets are always legal");
        assert!(outcome.shot_executed);
        shots += 1;
        if outcome.destroyed.contains(&cannon) {
            break;
        }
        battery.clock.advance(Duration::from_secs(14));
    }

    assert_eq!(query::command_log(&battery.store, battery.game.id).len(), shots);
}

#[test]
fn moving_onto_its_own_cell_is_blocked_by_the_mover() {
    let fixture = Fixture::new(6, 6);
    let transport = fixture.place(UnitKind::Transport, Color::White, 3, 3);

    let outcome = fixture
        .execute(transport, CommandKind::Move, 3, 3, Color::White)
        .expect("a blocked move still resolves");

    assert!(!outcome.moved);
    assert!(!outcome.unit_destroyed);
    assert!(outcome.summary.contains("blocked"));

    let unit = fixture.unit(transport);
    assert_eq!(unit.cell, CellCoord::new(3, 3));
    assert_eq!(unit.status, UnitStatus::Active);
    assert_eq!(unit.command_count, 0);
    assert!(unit.last_command_at.is_some());
    assert_eq!(query::command_log(&fixture.store, fixture.game.id).len(), 1);
}

#[test]
fn shooting_its_own_cell_destroys_the_shooter_too() {
    let fixture = Fixture::new(6, 6);
    let cannon = fixture.place(UnitKind::Cannon, Color::White, 0, 0);
    let archer = fixture.place(UnitKind::Archer, Color::Black, 0, 0);

    let outcome = fixture
        .execute(cannon, CommandKind::Shoot, 0, 0, Color::White)
        .expect("cannons may shoot their own cell");

    assert!(outcome.shot_executed);
    assert!(outcome.unit_destroyed);
    assert_eq!(outcome.destroyed.len(), 2);
    assert!(outcome.destroyed.contains(&cannon));
    assert!(outcome.destroyed.contains(&archer));

    let shooter = fixture.unit(cannon);
    assert_eq!(shooter.status, UnitStatus::Destroyed);
    assert!(shooter.last_command_at.is_some());
    assert_eq!(fixture.unit(archer).status, UnitStatus::Destroyed);
    assert_eq!(query::command_log(&fixture.store, fixture.game.id).len(), 1);

    fixture.clock.advance(Duration::from_secs(14));
    let error = fixture
        .execute(cannon, CommandKind::Shoot, 1, 1, Color::White)
        .expect_err("the shooter went down with its target");
    assert!(matches!(
        error,
        CommandError::InvalidCommand {
            reason: InvalidReason::ActorDestroyed,
            ..
        }
    ));
}

#[test]
fn synthesised_commands_can_fail_validation() {
    let fixture = Fixture::new(1, 1);
    let archer = fixture.place(UnitKind::Archer, Color::White, 0, 0);

    let mut invalid = 0;
    let mut resolved = 0;
    for _ in 0..40 {
        match fixture.resolver().execute_random(archer, Color::White) {
            Ok(outcome) => {
                assert!(outcome.shot_executed);
                resolved += 1;
            }
            Err(error) => {
                assert_eq!(error.kind(), ErrorKind::InvalidCommand);
                invalid += 1;
            }
        }
        fixture.clock.advance(Duration::from_secs(11));
    }

    assert!(invalid > 0, "pinned archer moves must be rejected");
    assert!(resolved > 0, "pinned archer shots must resolve");
}

#[test]
fn random_commands_inherit_authorization_and_lookup() {
    let fixture = Fixture::new(5, 5);
    let transport = fixture.place(UnitKind::Transport, Color::White, 2, 2);

    let stolen = fixture.resolver().execute_random(transport, Color::Black);
    assert_eq!(stolen.map_err(|error| error.kind()), Err(ErrorKind::Unauthorized));

    let missing = fixture.resolver().execute_random(UnitId::random(), Color::Black);
    assert_eq!(missing.map_err(|error| error.kind()), Err(ErrorKind::NotFound));
}

#[test]
fn racing_commands_on_one_unit_apply_once() {
    let fixture = Fixture::new(8, 8);
    let transport = fixture.place(UnitKind::Transport, Color::White, 4, 4);
    let contenders = 8;
    let barrier = Barrier::new(contenders);

    let results: Vec<Result<Outcome, CommandError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                scope.spawn(|| {
                    let _ = barrier.wait();
                    fixture.execute(transport, CommandKind::Move, 4, 5, Color::White)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    let applied = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(applied, 1);
    for error in results.iter().filter_map(|result| result.as_ref().err()) {
        assert!(matches!(
            error.kind(),
            ErrorKind::Conflict | ErrorKind::CooldownActive
        ));
    }

    assert_eq!(fixture.unit(transport).command_count, 1);
    assert_eq!(query::command_log(&fixture.store, fixture.game.id).len(), 1);
}

#[test]
fn commands_on_different_units_run_side_by_side() {
    let fixture = Fixture::new(8, 8);
    let units: Vec<UnitId> = (0..8)
        .map(|column| fixture.place(UnitKind::Transport, Color::Black, column, 0))
        .collect();

    thread::scope(|scope| {
        for (column, unit) in (0u32..).zip(units.iter().copied()) {
            let fixture = &fixture;
            let _ = scope.spawn(move || {
                fixture
                    .execute(unit, CommandKind::Move, column, 3, Color::Black)
                    .expect("independent move");
            });
        }
    });

    for (column, unit) in (0u32..).zip(units) {
        assert_eq!(fixture.unit(unit).cell, CellCoord::new(column, 3));
    }
}

type Rival = Box<dyn FnOnce(&MemoryStore) + Send>;

/// Store that lets a rival writer commit just before the next commit.
struct RacingStore {
    inner: MemoryStore,
    rival: Mutex<Option<Rival>>,
}

struct RacingTransaction<'a> {
    store: &'a RacingStore,
    inner: MemoryTransaction<'a>,
}

impl Store for RacingStore {
    type Transaction<'a> = RacingTransaction<'a>;

    fn begin(&self) -> RacingTransaction<'_> {
        RacingTransaction {
            store: self,
            inner: self.inner.begin(),
        }
    }
}

impl Transaction for RacingTransaction<'_> {
    fn unit(&self, id: UnitId) -> Option<Unit> {
        self.inner.unit(id)
    }

    fn units_by_color(&self, game: GameId, color: Color) -> Vec<Unit> {
        self.inner.units_by_color(game, color)
    }

    fn units_at(&self, game: GameId, cell: CellCoord) -> Vec<Unit> {
        self.inner.units_at(game, cell)
    }

    fn game(&self, id: GameId) -> Option<Game> {
        self.inner.game(id)
    }

    fn active_game(&self) -> Option<Game> {
        self.inner.active_game()
    }

    fn games(&self) -> Vec<Game> {
        self.inner.games()
    }

    fn save_unit(&mut self, unit: Unit) {
        self.inner.save_unit(unit);
    }

    fn save_game(&mut self, game: Game) {
        self.inner.save_game(game);
    }

    fn save_command(&mut self, record: CommandRecord) {
        self.inner.save_command(record);
    }

    fn delete_game(&mut self, id: GameId) {
        self.inner.delete_game(id);
    }

    fn commit(self) -> Result<(), StoreError> {
        let rival = self.store.rival.lock().expect("rival lock").take();
        if let Some(rival) = rival {
            rival(&self.store.inner);
        }
        self.inner.commit()
    }
}

#[test]
fn interleaved_writer_turns_the_command_into_a_conflict() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        rival: Mutex::new(None),
    };
    let game = Game::new(Board::new(5, 5));
    let archer = Unit::new(game.id, UnitKind::Archer, Color::White, CellCoord::new(2, 2));
    let target = Unit::new(game.id, UnitKind::Cannon, Color::Black, CellCoord::new(2, 4));
    let mut tx = store.inner.begin();
    tx.save_game(game.clone());
    tx.save_unit(archer.clone());
    tx.save_unit(target.clone());
    tx.commit().expect("seed commit");

    let target_id = target.id;
    *store.rival.lock().expect("rival lock") = Some(Box::new(move |inner: &MemoryStore| {
        let mut tx = inner.begin();
        let mut moved = tx.unit(target_id).expect("target");
        moved.cell = CellCoord::new(2, 3);
        tx.save_unit(moved);
        tx.commit().expect("rival commit");
    }));

    let clock = ManualClock::default();
    let rng = SharedRng::seeded(7);
    let result = Resolver::new(&store, &clock, &rng).execute(CommandRequest {
        unit: archer.id,
        kind: CommandKind::Shoot,
        target: CellCoord::new(2, 4),
        color: Color::White,
    });
    assert_eq!(result, Err(CommandError::Conflict));

    let tx = store.inner.begin();
    assert_eq!(tx.unit(archer.id).map(|unit| unit.last_command_at), Some(None));
    assert_eq!(tx.unit(target_id).map(|unit| unit.status), Some(UnitStatus::Active));
    assert!(query::command_log(&store.inner, game.id).is_empty());
}

#[test]
fn a_rival_entering_the_target_cell_turns_the_move_into_a_conflict() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        rival: Mutex::new(None),
    };
    let game = Game::new(Board::new(5, 5));
    let mover = Unit::new(game.id, UnitKind::Transport, Color::White, CellCoord::new(1, 1));
    let rival = Unit::new(game.id, UnitKind::Transport, Color::Black, CellCoord::new(3, 3));
    let mut tx = store.inner.begin();
    tx.save_game(game.clone());
    tx.save_unit(mover.clone());
    tx.save_unit(rival.clone());
    tx.commit().expect("seed commit");

    let rival_id = rival.id;
    *store.rival.lock().expect("rival lock") = Some(Box::new(move |inner: &MemoryStore| {
        let mut tx = inner.begin();
        let mut entering = tx.unit(rival_id).expect("rival");
        entering.cell = CellCoord::new(2, 2);
        tx.save_unit(entering);
        tx.commit().expect("rival commit");
    }));

    let clock = ManualClock::default();
    let rng = SharedRng::seeded(7);
    let result = Resolver::new(&store, &clock, &rng).execute(CommandRequest {
        unit: mover.id,
        kind: CommandKind::Move,
        target: CellCoord::new(2, 2),
        color: Color::White,
    });
    assert_eq!(result, Err(CommandError::Conflict));

    let tx = store.inner.begin();
    assert_eq!(tx.unit(mover.id).map(|unit| unit.cell), Some(CellCoord::new(1, 1)));
    assert_eq!(tx.unit(rival_id).map(|unit| unit.status), Some(UnitStatus::Active));
    assert_eq!(tx.units_at(game.id, CellCoord::new(2, 2)).len(), 1);
}
