//! Line-oriented interactive session.
//!
//! Each input line holds one request:
//!
//! ```text
//! new
//! units <color>
//! exec <unit> <move|shoot> <x> <y> <color>
//! random <unit> <color>
//! quit
//! ```
//!
//! Unit listings are printed as JSON, outcomes as their summary text, and
//! failures as a single `error:` line. A malformed line never ends the session.

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use skirmish_core::{Color, CommandError, CommandKind, Outcome, Unit, UnitId, UnitKind, UnitStatus};

use crate::service::GameService;

/// One parsed request line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Request {
    NewGame,
    Units(Color),
    Execute {
        unit: UnitId,
        kind: CommandKind,
        x: u32,
        y: u32,
        color: Color,
    },
    Random {
        unit: UnitId,
        color: Color,
    },
    Quit,
}

/// JSON shape of a listed unit.
#[derive(Debug, Serialize)]
struct UnitView {
    id: String,
    kind: UnitKind,
    color: Color,
    x: u32,
    y: u32,
    status: UnitStatus,
    command_count: u32,
}

impl From<&Unit> for UnitView {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.to_string(),
            kind: unit.kind,
            color: unit.color,
            x: unit.cell.x(),
            y: unit.cell.y(),
            status: unit.status,
            command_count: unit.command_count,
        }
    }
}

/// Serves requests from `input` until it ends or a `quit` line arrives.
pub(crate) fn run<R: BufRead, W: Write>(
    service: &GameService,
    input: R,
    mut output: W,
) -> Result<()> {
    for line in input.lines() {
        let line = line.context("failed to read request line")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let request = match parse(line) {
            Ok(request) => request,
            Err(error) => {
                writeln!(output, "error: {error:#}")?;
                continue;
            }
        };
        if request == Request::Quit {
            break;
        }
        respond(service, request, &mut output)?;
    }
    output.flush()?;
    Ok(())
}

fn respond<W: Write>(service: &GameService, request: Request, output: &mut W) -> Result<()> {
    match request {
        Request::NewGame => match service.new_game() {
            Ok(game) => writeln!(output, "game {game}")?,
            Err(error) => writeln!(output, "error: {error}")?,
        },
        Request::Units(color) => match service.list_units(color) {
            Ok(units) => {
                let views: Vec<UnitView> = units.iter().map(UnitView::from).collect();
                let json = serde_json::to_string(&views).context("failed to encode units")?;
                writeln!(output, "{json}")?;
            }
            Err(error) => writeln!(output, "error: {error}")?,
        },
        Request::Execute {
            unit,
            kind,
            x,
            y,
            color,
        } => report(output, service.execute(unit, kind, x, y, color))?,
        Request::Random { unit, color } => report(output, service.execute_random(unit, color))?,
        Request::Quit => {}
    }
    Ok(())
}

fn report<W: Write>(output: &mut W, result: Result<Outcome, CommandError>) -> Result<()> {
    match result {
        Ok(outcome) => writeln!(output, "{}", outcome.summary)?,
        Err(error) => writeln!(output, "error: {error}")?,
    }
    Ok(())
}

fn parse(line: &str) -> Result<Request> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let request = match words.as_slice() {
        ["new"] => Request::NewGame,
        ["quit"] | ["exit"] => Request::Quit,
        ["units", color] => Request::Units(parse_color(color)?),
        ["exec", unit, kind, x, y, color] => Request::Execute {
            unit: parse_unit(unit)?,
            kind: kind
                .parse()
                .with_context(|| format!("unknown command `{kind}`"))?,
            x: parse_coordinate(x)?,
            y: parse_coordinate(y)?,
            color: parse_color(color)?,
        },
        ["random", unit, color] => Request::Random {
            unit: parse_unit(unit)?,
            color: parse_color(color)?,
        },
        [verb, ..] => bail!("unrecognised request `{verb}` with {} argument(s)", words.len() - 1),
        [] => bail!("empty request"),
    };
    Ok(request)
}

fn parse_unit(word: &str) -> Result<UnitId> {
    word.parse()
        .with_context(|| format!("`{word}` is not a unit identifier"))
}

fn parse_color(word: &str) -> Result<Color> {
    word.parse()
        .with_context(|| format!("unknown color `{word}`"))
}

fn parse_coordinate(word: &str) -> Result<u32> {
    word.parse()
        .with_context(|| format!("`{word}` is not a board coordinate"))
}
