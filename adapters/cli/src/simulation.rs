//! Automated play where every unit issues random commands.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use skirmish_core::{Color, ManualClock, Unit};

use crate::service::GameService;

/// Totals gathered over a simulated game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Report {
    /// Identifier of the simulated game.
    pub(crate) game: String,
    /// Rounds played.
    pub(crate) rounds: u32,
    /// Commands that resolved.
    pub(crate) resolved: u32,
    /// Commands that relocated their unit.
    pub(crate) moves: u32,
    /// Commands that fired a shot.
    pub(crate) shots: u32,
    /// Units destroyed over the whole game.
    pub(crate) destroyed: u32,
    /// Commands that were refused.
    pub(crate) rejected: u32,
    /// Active white units at the end.
    pub(crate) white_survivors: usize,
    /// Active black units at the end.
    pub(crate) black_survivors: usize,
}

/// Starts a game and lets every active unit act once per round.
///
/// The clock advances by `round_length` after each round.
pub(crate) fn run(
    service: &GameService,
    clock: &ManualClock,
    rounds: u32,
    round_length: Duration,
) -> Result<Report> {
    let game = service.new_game().context("failed to start simulated game")?;
    let mut report = Report {
        game: game.to_string(),
        ..Report::default()
    };

    for round in 1..=rounds {
        for color in Color::ALL {
            for unit in active_units(service, color)? {
                match service.execute_random(unit.id, color) {
                    Ok(outcome) => {
                        report.resolved += 1;
                        report.moves += u32::from(outcome.moved);
                        report.shots += u32::from(outcome.shot_executed);
                        report.destroyed +=
                            u32::try_from(outcome.destroyed.len()).unwrap_or(u32::MAX);
                    }
                    Err(error) => {
                        log::debug!("round {round}: {error}");
                        report.rejected += 1;
                    }
                }
            }
        }

        clock.advance(round_length);
        report.rounds = round;
        log::info!(
            "round {round}: {} resolved, {} rejected, {} destroyed so far",
            report.resolved,
            report.rejected,
            report.destroyed
        );
    }

    report.white_survivors = active_units(service, Color::White)?.len();
    report.black_survivors = active_units(service, Color::Black)?.len();
    Ok(report)
}

fn active_units(service: &GameService, color: Color) -> Result<Vec<Unit>> {
    Ok(service
        .list_units(color)?
        .into_iter()
        .filter(Unit::is_active)
        .collect())
}
