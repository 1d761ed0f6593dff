use thiserror::Error;

use crate::Coord;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Grid {cols}x{rows} does not split into pairs")]
    InvalidConfiguration { cols: Coord, rows: Coord },
}

pub type Result<T> = core::result::Result<T, GameError>;
