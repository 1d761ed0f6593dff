use serde::{Deserialize, Serialize};

pub use engine::*;
pub use error::*;
pub use events::*;
pub use generator::*;
pub use timer::*;
pub use token::*;
pub use types::*;

mod engine;
mod error;
mod events;
mod generator;
mod timer;
mod token;
mod types;

/// Grid dimensions for a game. The product must be even — tokens come in
/// pairs — and malformed grids are rejected, never silently corrected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub cols: Coord,
    pub rows: Coord,
}

impl GameConfig {
    pub const fn new(cols: Coord, rows: Coord) -> Self {
        Self { cols, rows }
    }

    pub const fn total_tokens(&self) -> TokenCount {
        mult(self.cols, self.rows)
    }

    pub const fn total_pairs(&self) -> TokenCount {
        self.total_tokens() / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.cols == 0 || self.rows == 0 || self.total_tokens() % 2 != 0 {
            Err(GameError::InvalidConfiguration {
                cols: self.cols,
                rows: self.rows,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(4, 4)
    }
}
