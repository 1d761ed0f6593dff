use serde::{Deserialize, Serialize};

/// Single grid axis used for column and row counts.
pub type Coord = u8;

/// Count type used for token and pair totals.
pub type TokenCount = u16;

/// Identifies a token's physical grid position, stable for the deck's lifetime.
pub type TokenId = u16;

pub const fn mult(a: Coord, b: Coord) -> TokenCount {
    let a = a as TokenCount;
    let b = b as TokenCount;
    a.saturating_mul(b)
}

/// Face palette. Pair values index into this table; a deck needing more
/// pairs than the palette holds wraps around (degenerate, but allowed).
pub const PALETTE: [&str; 20] = [
    "#FF5733", // vibrant red
    "#33FF57", // bright green
    "#3357FF", // bold blue
    "#FF33A1", // hot pink
    "#33FFF5", // aqua
    "#F5FF33", // yellow
    "#FF8C33", // orange
    "#8C33FF", // purple
    "#33FF8C", // mint green
    "#FF3333", // crimson
    "#33A1FF", // sky blue
    "#A1FF33", // lime
    "#FF33F5", // magenta
    "#F533FF", // neon pink
    "#33F5FF", // cyan
    "#F5A833", // amber
    "#A833FF", // violet
    "#33FFA8", // teal
    "#FF5734", // coral
    "#5733FF", // deep purple
];

/// Opaque comparable key shared by exactly two tokens of a deck.
///
/// Stored as an index into [`PALETTE`] so payloads stay compact while a
/// presentation layer can still fetch a concrete face color.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairValue(u8);

impl PairValue {
    /// Value assigned to the `nth` pair of a deck, wrapping past the
    /// palette end.
    pub const fn of_pair(nth: TokenCount) -> Self {
        Self((nth % PALETTE.len() as TokenCount) as u8)
    }

    pub const fn color(self) -> &'static str {
        PALETTE[self.0 as usize]
    }
}
