//! Draw pile and removed cards.

use crate::card::Card;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The draw pile plus the cards removed from play before dealing.
///
/// One card is always removed face-down. With exactly 2 players, 3 more are
/// removed face-up and stay public knowledge for the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    /// Remaining cards, top of the pile at the end.
    pub draw_pile: Vec<Card>,
    /// The hidden removed card. Consumed at most once, by a Prince
    /// replacement draw against an empty pile.
    pub removed_face_down: Option<Card>,
    /// Publicly visible removed cards (exactly 3 in 2-player rounds, else empty).
    pub removed_face_up: Vec<Card>,
}

impl Deck {
    /// Shuffle the 16-card deck and remove the out-of-play cards.
    pub fn setup<R: Rng>(player_count: usize, rng: &mut R) -> Self {
        let mut draw_pile = Card::standard_deck();
        Card::shuffle_deck(&mut draw_pile, rng);

        let removed_face_down = draw_pile.pop();

        let mut removed_face_up = Vec::new();
        if player_count == 2 {
            for _ in 0..3 {
                removed_face_up.push(draw_pile.pop().unwrap());
            }
        }

        Self {
            draw_pile,
            removed_face_down,
            removed_face_up,
        }
    }

    /// Remove and return the top card, or `None` when the pile is empty.
    ///
    /// The caller decides whether an empty pile ends the round or substitutes
    /// the face-down removed card.
    pub fn draw(&mut self) -> Option<Card> {
        self.draw_pile.pop()
    }

    /// Consume the face-down removed card.
    pub fn take_removed_face_down(&mut self) -> Option<Card> {
        self.removed_face_down.take()
    }

    /// Number of cards left in the draw pile.
    pub fn len(&self) -> usize {
        self.draw_pile.len()
    }

    /// Whether the draw pile is exhausted.
    pub fn is_empty(&self) -> bool {
        self.draw_pile.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_two_players() {
        let mut rng = rand::thread_rng();
        let deck = Deck::setup(2, &mut rng);

        assert_eq!(deck.len(), 12);
        assert!(deck.removed_face_down.is_some());
        assert_eq!(deck.removed_face_up.len(), 3);
    }

    #[test]
    fn test_setup_three_and_four_players() {
        let mut rng = rand::thread_rng();
        for count in [3, 4] {
            let deck = Deck::setup(count, &mut rng);
            assert_eq!(deck.len(), 15);
            assert!(deck.removed_face_down.is_some());
            assert!(deck.removed_face_up.is_empty());
        }
    }

    #[test]
    fn test_draw_is_lifo() {
        let mut deck = Deck {
            draw_pile: vec![Card::Guard, Card::Princess],
            removed_face_down: None,
            removed_face_up: Vec::new(),
        };

        assert_eq!(deck.draw(), Some(Card::Princess));
        assert_eq!(deck.draw(), Some(Card::Guard));
        assert_eq!(deck.draw(), None);
        assert!(deck.is_empty());
    }

    #[test]
    fn test_face_down_card_consumed_once() {
        let mut deck = Deck {
            draw_pile: Vec::new(),
            removed_face_down: Some(Card::King),
            removed_face_up: Vec::new(),
        };

        assert_eq!(deck.take_removed_face_down(), Some(Card::King));
        assert_eq!(deck.take_removed_face_down(), None);
    }
}
