use rand::prelude::*;
use rand::rngs::SmallRng;

use super::*;

/// Uniform random deck generation: every pair value placed exactly twice,
/// then a Fisher-Yates permutation over the full sequence so no position
/// is biased.
#[derive(Clone, Debug)]
pub struct ShuffledDeckGenerator {
    rng: SmallRng,
}

impl ShuffledDeckGenerator {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for ShuffledDeckGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeckGenerator for ShuffledDeckGenerator {
    fn generate(&mut self, config: GameConfig) -> Vec<Token> {
        let pairs = config.total_pairs();

        if usize::from(pairs) > PALETTE.len() {
            log::warn!(
                "Palette exhausted, repeating face values, requested {} distinct pairs but palette holds {}",
                pairs,
                PALETTE.len()
            );
        }

        let mut values: Vec<PairValue> = (0..pairs)
            .flat_map(|nth| {
                let value = PairValue::of_pair(nth);
                [value, value]
            })
            .collect();
        values.shuffle(&mut self.rng);

        values
            .into_iter()
            .enumerate()
            .map(|(position, value)| Token::new(position as TokenId, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(cols: Coord, rows: Coord) -> GameConfig {
        GameConfig::new(cols, rows)
    }

    #[test]
    fn deck_holds_two_tokens_per_pair_value() {
        let mut generator = ShuffledDeckGenerator::from_seed(7);
        let deck = generator.generate(config(4, 4));

        assert_eq!(deck.len(), 16);

        let mut counts: HashMap<PairValue, u32> = HashMap::new();
        for token in &deck {
            *counts.entry(token.pair_value()).or_default() += 1;
        }
        assert_eq!(counts.len(), 8);
        assert!(counts.values().all(|&count| count == 2));
    }

    #[test]
    fn ids_follow_grid_positions() {
        let mut generator = ShuffledDeckGenerator::from_seed(7);
        let deck = generator.generate(config(2, 3));

        for (position, token) in deck.iter().enumerate() {
            assert_eq!(usize::from(token.id()), position);
        }
        assert!(deck.iter().all(|token| !token.is_matched()));
    }

    #[test]
    fn same_seed_reproduces_the_layout() {
        let deck_a = ShuffledDeckGenerator::from_seed(42).generate(config(4, 4));
        let deck_b = ShuffledDeckGenerator::from_seed(42).generate(config(4, 4));
        assert_eq!(deck_a, deck_b);
    }

    #[test]
    fn consecutive_generations_reshuffle() {
        let mut generator = ShuffledDeckGenerator::from_seed(42);
        let values = |deck: &[Token]| deck.iter().map(Token::pair_value).collect::<Vec<_>>();

        // 12 tokens have 12!/2^6 layouts, a repeat here means the rng stalled
        let first = values(&generator.generate(config(4, 3)));
        let second = values(&generator.generate(config(4, 3)));
        assert_ne!(first, second);
    }

    #[test]
    fn partner_position_is_not_biased_to_a_fixed_offset() {
        let mut generator = ShuffledDeckGenerator::from_seed(99);
        let mut partner_at = [0u32; 4];

        for _ in 0..300 {
            let deck = generator.generate(config(2, 2));
            let first_value = deck[0].pair_value();
            let partner = deck[1..]
                .iter()
                .position(|token| token.pair_value() == first_value)
                .expect("pair partner must exist")
                + 1;
            partner_at[partner] += 1;
        }

        // each slot expects ~100 hits, a dead slot or a dominant one means bias
        for &count in &partner_at[1..] {
            assert!(count > 50, "partner distribution skewed: {partner_at:?}");
            assert!(count < 200, "partner distribution skewed: {partner_at:?}");
        }
    }

    #[test]
    fn oversized_grid_wraps_palette_values() {
        // 12x4 = 24 pairs over a 20-entry palette
        let mut generator = ShuffledDeckGenerator::from_seed(1);
        let deck = generator.generate(config(12, 4));

        let wrapped = deck
            .iter()
            .filter(|token| token.pair_value() == PairValue::of_pair(0))
            .count();
        assert_eq!(wrapped, 4);
    }
}
