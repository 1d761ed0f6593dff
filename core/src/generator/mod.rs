use crate::*;
pub use shuffled::*;

mod shuffled;

/// Builds the face-down deck for a fresh game. Called again on every
/// restart, so implementations keep whatever state they need to produce a
/// new ordering each time.
pub trait DeckGenerator {
    fn generate(&mut self, config: GameConfig) -> Vec<Token>;
}
