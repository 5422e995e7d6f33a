#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Skirmish engine.
//!
//! This crate defines the records and message surface that connect adapters,
//! the authoritative store, and the pure systems. Adapters submit
//! [`CommandRequest`] values describing what a player wants a unit to do, the
//! resolver validates them against the per-type tables exposed here, mutates
//! [`Unit`] records through a [`Transaction`], appends a [`CommandRecord`] to
//! the audit log, and answers with an [`Outcome`].

mod clock;
mod store;

use std::{fmt, str::FromStr, time::Duration, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{RecordRef, Store, StoreError, Transaction};

/// Unique identifier assigned to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(Uuid);

impl UnitId {
    /// Allocates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UnitId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Unique identifier assigned to a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(Uuid);

impl GameId {
    /// Allocates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier assigned to an audit log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Allocates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Side a unit fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// The white army.
    White,
    /// The black army.
    Black,
}

impl Color {
    /// Every side, in placement order.
    pub const ALL: [Color; 2] = [Color::White, Color::Black];
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::White => "white",
            Self::Black => "black",
        })
    }
}

impl FromStr for Color {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            _ => Err(ParseEnumError::new("color", value)),
        }
    }
}

/// Types of units that can be fielded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Mobile ranged unit that moves one cell and shoots along its row or column.
    Archer,
    /// Static artillery that can bombard any cell.
    Cannon,
    /// Unarmed carrier that moves up to three cells in a straight line.
    Transport,
}

impl UnitKind {
    /// Every unit kind, in placement order.
    pub const ALL: [UnitKind; 3] = [UnitKind::Archer, UnitKind::Cannon, UnitKind::Transport];

    /// Cooldown that must pass after any command before this kind may issue `command`.
    ///
    /// Returns `None` when the command is not available to the kind at all.
    #[must_use]
    pub const fn cooldown(self, command: CommandKind) -> Option<Duration> {
        match (self, command) {
            (Self::Archer, CommandKind::Move) => Some(Duration::from_secs(5)),
            (Self::Archer, CommandKind::Shoot) => Some(Duration::from_secs(10)),
            (Self::Cannon, _) => Some(Duration::from_secs(13)),
            (Self::Transport, CommandKind::Move) => Some(Duration::from_secs(5)),
            (Self::Transport, CommandKind::Shoot) => None,
        }
    }

    /// Command kinds the unit kind is able to issue.
    #[must_use]
    pub const fn commands(self) -> &'static [CommandKind] {
        match self {
            Self::Archer => &[CommandKind::Move, CommandKind::Shoot],
            Self::Cannon => &[CommandKind::Shoot],
            Self::Transport => &[CommandKind::Move],
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Archer => "archer",
            Self::Cannon => "cannon",
            Self::Transport => "transport",
        })
    }
}

impl FromStr for UnitKind {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "archer" => Ok(Self::Archer),
            "cannon" => Ok(Self::Cannon),
            "transport" => Ok(Self::Transport),
            _ => Err(ParseEnumError::new("unit kind", value)),
        }
    }
}

/// Actions a unit may be ordered to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Relocate the unit to the target cell.
    Move,
    /// Destroy whatever occupies the target cell.
    Shoot,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Move => "move",
            Self::Shoot => "shoot",
        })
    }
}

impl FromStr for CommandKind {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(Self::Move),
            "shoot" => Ok(Self::Shoot),
            _ => Err(ParseEnumError::new("command kind", value)),
        }
    }
}

/// Life-cycle state of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// The unit may receive commands.
    Active,
    /// The unit was destroyed and is inert.
    Destroyed,
}

/// Reports that a textual enum value was not recognised.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {what} `{value}`")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}

/// Location of a single board cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: u32,
    y: u32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the cell.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row of the cell.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Reports whether both cells share a row or a column.
    #[must_use]
    pub fn is_aligned_with(self, other: CellCoord) -> bool {
        self.x == other.x || self.y == other.y
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Extent of a rectangular game board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    width: u32,
    height: u32,
}

impl Board {
    /// Creates a board description with the provided dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of columns on the board.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows on the board.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub const fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Reports whether the board has no cells at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reports whether the cell lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Pulls arbitrary signed coordinates back onto the board.
    ///
    /// Boards with a zero dimension clamp everything to the origin.
    #[must_use]
    pub fn clamp(&self, x: i64, y: i64) -> CellCoord {
        CellCoord::new(
            clamp_axis(x, self.width),
            clamp_axis(y, self.height),
        )
    }
}

fn clamp_axis(value: i64, extent: u32) -> u32 {
    let max = i64::from(extent.saturating_sub(1));
    let clamped = value.clamp(0, max);
    u32::try_from(clamped).unwrap_or(0)
}

/// Authoritative state of a single unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable identifier of the unit.
    pub id: UnitId,
    /// Game that owns the unit.
    pub game: GameId,
    /// Type tag selecting cooldown and legality rules.
    pub kind: UnitKind,
    /// Side the unit fights for.
    pub color: Color,
    /// Cell currently occupied by the unit.
    pub cell: CellCoord,
    /// Whether the unit is still in play.
    pub status: UnitStatus,
    /// Number of commands that relocated the unit.
    pub command_count: u32,
    /// Instant of the unit's last command, if it ever received one.
    pub last_command_at: Option<SystemTime>,
    /// Optimistic concurrency counter maintained by the store.
    pub version: u64,
}

impl Unit {
    /// Creates a fresh, active unit that has never received a command.
    #[must_use]
    pub fn new(game: GameId, kind: UnitKind, color: Color, cell: CellCoord) -> Self {
        Self {
            id: UnitId::random(),
            game,
            kind,
            color,
            cell,
            status: UnitStatus::Active,
            command_count: 0,
            last_command_at: None,
            version: 0,
        }
    }

    /// Reports whether the unit is still in play.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UnitStatus::Active
    }

    /// Instant at which the cooldown for `command` ends.
    ///
    /// `None` when the unit never acted or the command has no cooldown.
    #[must_use]
    pub fn cooldown_ends_at(&self, command: CommandKind) -> Option<SystemTime> {
        let last = self.last_command_at?;
        let cooldown = self.kind.cooldown(command)?;
        last.checked_add(cooldown)
    }

    /// Reports whether the unit may issue `command` at `now`.
    ///
    /// The cooldown boundary itself still counts as cooling down.
    #[must_use]
    pub fn is_cooldown_elapsed(&self, command: CommandKind, now: SystemTime) -> bool {
        match self.cooldown_ends_at(command) {
            Some(ends_at) => now > ends_at,
            None => true,
        }
    }

    /// Relocates the unit, counting the command and restarting its cooldown.
    pub fn move_to(&mut self, cell: CellCoord, now: SystemTime) {
        self.cell = cell;
        self.command_count = self.command_count.saturating_add(1);
        self.last_command_at = Some(now);
    }

    /// Restarts the cooldown without any other change.
    pub fn touch(&mut self, now: SystemTime) {
        self.last_command_at = Some(now);
    }

    /// Marks the unit as destroyed. Position and cooldown are left untouched.
    pub fn destroy(&mut self) {
        self.status = UnitStatus::Destroyed;
    }
}

/// A single game session and the board it is played on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Stable identifier of the game.
    pub id: GameId,
    /// Board extent shared by every unit of the game.
    pub board: Board,
    /// Whether this is the game currently being played.
    pub active: bool,
    /// Optimistic concurrency counter maintained by the store.
    pub version: u64,
}

impl Game {
    /// Creates a new active game on the provided board.
    #[must_use]
    pub fn new(board: Board) -> Self {
        Self {
            id: GameId::random(),
            board,
            active: true,
            version: 0,
        }
    }
}

/// Immutable audit record of a resolved command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Identifier of the log entry.
    pub id: CommandId,
    /// Game the command was issued in.
    pub game: GameId,
    /// Unit that acted.
    pub unit: UnitId,
    /// Requested action.
    pub kind: CommandKind,
    /// Side that issued the command.
    pub color: Color,
    /// Cell the command was aimed at.
    pub target: CellCoord,
    /// Instant the command was executed.
    pub executed_at: SystemTime,
}

impl CommandRecord {
    /// Records `kind` aimed at `target` as executed by `unit` at `executed_at`.
    #[must_use]
    pub fn new(unit: &Unit, kind: CommandKind, target: CellCoord, executed_at: SystemTime) -> Self {
        Self {
            id: CommandId::random(),
            game: unit.game,
            unit: unit.id,
            kind,
            color: unit.color,
            target,
            executed_at,
        }
    }
}

/// Request issued by a player for one of their units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Unit that should act.
    pub unit: UnitId,
    /// Requested action.
    pub kind: CommandKind,
    /// Cell the action is aimed at.
    pub target: CellCoord,
    /// Side issuing the request.
    pub color: Color,
}

/// Structured result of a resolved command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Human-readable description of what happened.
    pub summary: String,
    /// Whether at least one unit was destroyed.
    pub unit_destroyed: bool,
    /// Whether the acting unit changed cells.
    pub moved: bool,
    /// Whether a shot was fired.
    pub shot_executed: bool,
    /// Units destroyed by the command.
    pub destroyed: Vec<UnitId>,
}

/// Number of units of each kind fielded per side when a game starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitCounts {
    /// Archers per side.
    pub archer: u32,
    /// Cannons per side.
    pub cannon: u32,
    /// Transports per side.
    pub transport: u32,
}

impl UnitCounts {
    /// Creates a count table.
    #[must_use]
    pub const fn new(archer: u32, cannon: u32, transport: u32) -> Self {
        Self {
            archer,
            cannon,
            transport,
        }
    }

    /// Number of units of `kind` per side.
    #[must_use]
    pub const fn get(&self, kind: UnitKind) -> u32 {
        match kind {
            UnitKind::Archer => self.archer,
            UnitKind::Cannon => self.cannon,
            UnitKind::Transport => self.transport,
        }
    }

    /// Units fielded by a single side.
    #[must_use]
    pub fn per_side(&self) -> u64 {
        UnitKind::ALL
            .iter()
            .map(|kind| u64::from(self.get(*kind)))
            .sum()
    }

    /// Iterates over kinds with a non-zero count, in placement order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitKind, u32)> + '_ {
        UnitKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Entity that could not be located.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Missing {
    /// No unit with this identifier exists.
    Unit(UnitId),
    /// No game with this identifier exists.
    Game(GameId),
    /// No game is currently active.
    ActiveGame,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "unit {id}"),
            Self::Game(id) => write!(f, "game {id}"),
            Self::ActiveGame => f.write_str("active game"),
        }
    }
}

/// Reasons a command fails the legality step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum InvalidReason {
    /// The unit type's range rules forbid the action.
    #[error("the unit cannot perform this action on that cell")]
    Illegal,
    /// The target lies outside the unit's board.
    #[error("the target lies outside the board")]
    OutOfBounds,
    /// The acting unit has been destroyed.
    #[error("the unit has been destroyed")]
    ActorDestroyed,
}

/// Coarse classification of [`CommandError`] values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A unit or game is absent.
    NotFound,
    /// The requester does not own the unit.
    Unauthorized,
    /// The unit's cooldown window has not elapsed.
    CooldownActive,
    /// The action fails the legality rules.
    InvalidCommand,
    /// The state changed concurrently between read and commit.
    Conflict,
}

/// Terminal failures of a single command attempt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A unit or game could not be located.
    #[error("{0} not found")]
    NotFound(Missing),
    /// The requesting side does not own the unit.
    #[error("unit {unit} belongs to {owner}, not {requester}")]
    Unauthorized {
        /// Unit the request addressed.
        unit: UnitId,
        /// Side owning the unit.
        owner: Color,
        /// Side that issued the request.
        requester: Color,
    },
    /// The unit acted too recently.
    #[error("cooldown for {command} on unit {unit} has not elapsed")]
    CooldownActive {
        /// Unit the request addressed.
        unit: UnitId,
        /// Requested action.
        command: CommandKind,
        /// Instant after which the unit may act again.
        ends_at: SystemTime,
    },
    /// The action is not permitted for this unit.
    #[error("{unit_kind} cannot {command} to {target}: {reason}")]
    InvalidCommand {
        /// Type of the acting unit.
        unit_kind: UnitKind,
        /// Requested action.
        command: CommandKind,
        /// Requested target cell.
        target: CellCoord,
        /// Specific rule that failed.
        reason: InvalidReason,
    },
    /// Another command modified the same records first.
    #[error("state was modified by another command; retry")]
    Conflict,
}

impl CommandError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::CooldownActive { .. } => ErrorKind::CooldownActive,
            Self::InvalidCommand { .. } => ErrorKind::InvalidCommand,
            Self::Conflict => ErrorKind::Conflict,
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { .. } | StoreError::ActiveGameTaken { .. } => Self::Conflict,
            StoreError::MissingGame(id) => Self::NotFound(Missing::Game(id)),
        }
    }
}
