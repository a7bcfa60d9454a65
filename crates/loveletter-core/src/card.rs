//! Card catalog for the 16-card deck.
//!
//! Each of the eight card identities has a fixed value (1-8), a fixed name,
//! and a fixed number of copies in the deck. Cards serialize as their numeric
//! value, which is also the wire format clients see.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A card value outside 1-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid card value {0}")]
pub struct InvalidCardValue(pub u8);

/// The eight card identities, ordered by value.
///
/// `Ord` follows card value, so `Card::Baron < Card::Princess` holds and the
/// Baron comparison can use `<`/`>` directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Card {
    Guard,
    Priest,
    Baron,
    Handmaid,
    Prince,
    King,
    Countess,
    Princess,
}

impl Card {
    /// All cards in value order.
    pub const ALL: [Card; 8] = [
        Card::Guard,
        Card::Priest,
        Card::Baron,
        Card::Handmaid,
        Card::Prince,
        Card::King,
        Card::Countess,
        Card::Princess,
    ];

    /// Numeric value (1-8).
    pub fn value(self) -> u8 {
        match self {
            Card::Guard => 1,
            Card::Priest => 2,
            Card::Baron => 3,
            Card::Handmaid => 4,
            Card::Prince => 5,
            Card::King => 6,
            Card::Countess => 7,
            Card::Princess => 8,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Card::Guard => "Guard",
            Card::Priest => "Priest",
            Card::Baron => "Baron",
            Card::Handmaid => "Handmaid",
            Card::Prince => "Prince",
            Card::King => "King",
            Card::Countess => "Countess",
            Card::Princess => "Princess",
        }
    }

    /// Look up a card by value.
    pub fn from_value(value: u8) -> Option<Card> {
        match value {
            1 => Some(Card::Guard),
            2 => Some(Card::Priest),
            3 => Some(Card::Baron),
            4 => Some(Card::Handmaid),
            5 => Some(Card::Prince),
            6 => Some(Card::King),
            7 => Some(Card::Countess),
            8 => Some(Card::Princess),
            _ => None,
        }
    }

    /// Number of copies in the 16-card deck.
    pub fn copies(self) -> usize {
        match self {
            Card::Guard => 5,
            Card::Priest | Card::Baron | Card::Handmaid | Card::Prince => 2,
            Card::King | Card::Countess | Card::Princess => 1,
        }
    }

    /// Whether playing this card names another seat.
    pub fn requires_target(self) -> bool {
        matches!(
            self,
            Card::Guard | Card::Priest | Card::Baron | Card::Prince | Card::King
        )
    }

    /// Whether playing this card also names a guessed value (Guard only).
    pub fn requires_guess(self) -> bool {
        matches!(self, Card::Guard)
    }

    /// Build the standard 16-card deck (unshuffled).
    pub fn standard_deck() -> Vec<Card> {
        let mut deck = Vec::with_capacity(16);
        for card in Card::ALL {
            deck.extend(std::iter::repeat(card).take(card.copies()));
        }
        deck
    }

    /// Shuffle a deck with a uniform permutation.
    pub fn shuffle_deck<R: Rng>(deck: &mut [Card], rng: &mut R) {
        deck.shuffle(rng);
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> u8 {
        card.value()
    }
}

impl TryFrom<u8> for Card {
    type Error = InvalidCardValue;

    fn try_from(value: u8) -> Result<Card, InvalidCardValue> {
        Card::from_value(value).ok_or(InvalidCardValue(value))
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_deck_composition() {
        let deck = Card::standard_deck();
        assert_eq!(deck.len(), 16);

        let guards = deck.iter().filter(|c| **c == Card::Guard).count();
        assert_eq!(guards, 5);

        for card in [Card::King, Card::Countess, Card::Princess] {
            assert_eq!(deck.iter().filter(|c| **c == card).count(), 1);
        }
    }

    #[test]
    fn test_value_round_trip() {
        for card in Card::ALL {
            assert_eq!(Card::from_value(card.value()), Some(card));
        }
        assert_eq!(Card::from_value(0), None);
        assert_eq!(Card::from_value(9), None);
    }

    #[test]
    fn test_ordering_matches_value() {
        assert!(Card::Guard < Card::Priest);
        assert!(Card::Countess < Card::Princess);
    }

    #[test]
    fn test_targeting_metadata() {
        assert!(Card::Guard.requires_target());
        assert!(Card::Guard.requires_guess());
        assert!(Card::King.requires_target());
        assert!(!Card::Handmaid.requires_target());
        assert!(!Card::Princess.requires_target());
        assert!(!Card::Prince.requires_guess());
    }

    #[test]
    fn test_serde_as_value() {
        let json = serde_json::to_string(&Card::Princess).unwrap();
        assert_eq!(json, "8");
        let card: Card = serde_json::from_str("3").unwrap();
        assert_eq!(card, Card::Baron);
        assert!(serde_json::from_str::<Card>("9").is_err());
    }
}
