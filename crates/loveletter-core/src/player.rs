//! Per-seat state.

use crate::card::Card;
use serde::{Deserialize, Serialize};

/// A seat to deal into a round: stable session identity plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub session_id: String,
    pub name: String,
}

impl Seat {
    pub fn new(session_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            name: name.into(),
        }
    }
}

/// One player's round state.
///
/// A live player holds exactly 1 card at rest and exactly 2 between the
/// start-of-turn draw and the discard of that same turn. An eliminated
/// player's hand is always empty. Protection is round state, not seat state,
/// and lives on the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable session identifier, independent of any particular connection.
    pub session_id: String,
    /// Display name.
    pub name: String,
    /// Held cards, owned exclusively by this player.
    pub hand: Vec<Card>,
    /// Cards this player has discarded, in order. Public, append-only.
    pub discards: Vec<Card>,
    /// Whether this player is out of the round.
    pub eliminated: bool,
}

impl Player {
    pub fn new(session_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            name: name.into(),
            hand: Vec::new(),
            discards: Vec::new(),
            eliminated: false,
        }
    }

    /// The seat identity, for re-dealing the same players.
    pub fn seat(&self) -> Seat {
        Seat::new(self.session_id.clone(), self.name.clone())
    }

    /// The single card a live player holds at rest.
    pub fn held_card(&self) -> Option<Card> {
        self.hand.first().copied()
    }

    /// Sum of discard values, the reveal tie-break metric.
    pub fn discard_sum(&self) -> u32 {
        self.discards.iter().map(|c| c.value() as u32).sum()
    }
}
