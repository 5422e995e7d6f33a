//! Game configuration loaded from a TOML file.

use std::{fs, io, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use skirmish_core::{Board, UnitCounts};

const DEFAULT_WIDTH: u32 = 10;
const DEFAULT_HEIGHT: u32 = 10;
const DEFAULT_UNITS: UnitCounts = UnitCounts::new(3, 1, 2);

/// Board dimensions and starting armies for every new game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    /// Dimensions of the board.
    pub(crate) board: BoardConfig,
    /// Units fielded per side.
    pub(crate) units: UnitCounts,
}

/// `[board]` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct BoardConfig {
    /// Number of columns.
    pub(crate) width: u32,
    /// Number of rows.
    pub(crate) height: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            units: DEFAULT_UNITS,
        }
    }
}

impl GameConfig {
    /// Reads the configuration at `path`, falling back to defaults when the
    /// file does not exist.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display())),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!("{} not found; using built-in defaults", path.display());
                Ok(Self::default())
            }
            Err(error) => {
                Err(error).with_context(|| format!("failed to read {}", path.display()))
            }
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse configuration toml contents")
    }

    /// Board every new game is played on.
    #[must_use]
    pub(crate) fn board(&self) -> Board {
        Board::new(self.board.width, self.board.height)
    }
}
