use serde::{Deserialize, Serialize};

use crate::{PairValue, TokenId};

/// A single placed card: stable identity, pair key, and a matched flag
/// that only ever moves from false to true.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    id: TokenId,
    pair_value: PairValue,
    matched: bool,
}

impl Token {
    pub const fn new(id: TokenId, pair_value: PairValue) -> Self {
        Self {
            id,
            pair_value,
            matched: false,
        }
    }

    pub const fn id(&self) -> TokenId {
        self.id
    }

    pub const fn pair_value(&self) -> PairValue {
        self.pair_value
    }

    pub const fn is_matched(&self) -> bool {
        self.matched
    }

    /// Idempotent; a matched token stays matched until the deck is rebuilt.
    pub const fn set_matched(&mut self) {
        self.matched = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_matched_is_idempotent() {
        let mut token = Token::new(3, PairValue::of_pair(1));
        assert!(!token.is_matched());

        token.set_matched();
        token.set_matched();

        assert!(token.is_matched());
        assert_eq!(token.id(), 3);
        assert_eq!(token.pair_value(), PairValue::of_pair(1));
    }
}
