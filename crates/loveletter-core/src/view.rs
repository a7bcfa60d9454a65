//! Per-viewer projection of the shared state.
//!
//! A view is a pure function of (full state, viewer identity), recomputed on
//! demand and never stored, so it can never drift from the authoritative
//! state. Every viewer sees the same public facts; hand contents appear only
//! for the viewer's own seat.

use crate::actions::LogEntry;
use crate::card::Card;
use crate::game::{GameState, Winner};
use serde::{Deserialize, Serialize};

/// One seat as a given viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub session_id: String,
    pub name: String,
    pub eliminated: bool,
    pub protected: bool,
    /// Public discard history, in order.
    pub discards: Vec<Card>,
    /// Always populated; deduction works off hand sizes.
    pub hand_size: usize,
    /// Populated only for the viewer's own seat, empty otherwise.
    pub hand: Vec<Card>,
}

/// A projected snapshot of the round for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub players: Vec<PlayerView>,
    pub current_player_index: usize,
    pub deck_size: usize,
    /// Face-up removed cards (2-player rounds only).
    pub public_removed_cards: Vec<Card>,
    pub game_over: bool,
    pub winner: Option<Winner>,
    pub log: Vec<LogEntry>,
}

impl GameView {
    /// Project the state for a viewer. `None` hides every hand.
    pub fn project(state: &GameState, viewer_session_id: Option<&str>) -> Self {
        Self {
            players: state
                .players
                .iter()
                .map(|p| PlayerView {
                    session_id: p.session_id.clone(),
                    name: p.name.clone(),
                    eliminated: p.eliminated,
                    protected: state.is_protected(&p.session_id),
                    discards: p.discards.clone(),
                    hand_size: p.hand.len(),
                    hand: if viewer_session_id == Some(p.session_id.as_str()) {
                        p.hand.clone()
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
            current_player_index: state.current_player_index,
            deck_size: state.deck.len(),
            public_removed_cards: state.deck.removed_face_up.clone(),
            game_over: state.game_over,
            winner: state.winner.clone(),
            log: state.log.clone(),
        }
    }
}

impl GameState {
    /// Projected snapshot for one viewer (see [`GameView::project`]).
    pub fn view(&self, viewer_session_id: Option<&str>) -> GameView {
        GameView::project(self, viewer_session_id)
    }
}
