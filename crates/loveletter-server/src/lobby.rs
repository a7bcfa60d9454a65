//! Lobby management: one engine instance per lobby.
//!
//! The lobby is the engine's owning collaborator. Every engine call goes
//! through the lobby's exclusive map entry, so moves are serialized per
//! lobby and the engine never sees concurrent mutation.

use loveletter_core::{GameError, GameState, GameView, MoveOutcome, PlayedMove, Seat};
use thiserror::Error;

use crate::protocol::{LobbyInfo, LobbyStatus, SeatInfo};

/// Engine seat limit, also the lobby seat limit.
pub const MAX_SEATS: usize = 4;

#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("Lobby is full")]
    LobbyFull,

    #[error("Player not in lobby")]
    PlayerNotInLobby,

    #[error("Only the lobby owner can do that")]
    NotOwner,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("No active game")]
    NoActiveGame,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// A session holding a seat in a lobby.
#[derive(Debug, Clone)]
pub struct LobbySeat {
    pub session_id: String,
    pub name: String,
    pub connected: bool,
}

impl LobbySeat {
    pub fn new(session_id: String, name: String) -> Self {
        Self {
            session_id,
            name,
            connected: true,
        }
    }

    pub fn to_info(&self) -> SeatInfo {
        SeatInfo {
            session_id: self.session_id.clone(),
            name: self.name.clone(),
            connected: self.connected,
        }
    }
}

/// A lobby that holds at most one running game.
pub struct Lobby {
    pub id: String,
    pub owner_session_id: String,
    pub status: LobbyStatus,
    /// Seats in join order; this is also the deal order.
    pub seats: Vec<LobbySeat>,
    /// The engine instance (once started)
    pub game: Option<GameState>,
    /// Bumped on every membership change; a scheduled cleanup only fires if
    /// the epoch it captured is still current.
    pub cleanup_epoch: u64,
}

impl Lobby {
    pub fn new(id: String, owner_session_id: String, owner_name: String) -> Self {
        Self {
            id,
            owner_session_id: owner_session_id.clone(),
            status: LobbyStatus::Waiting,
            seats: vec![LobbySeat::new(owner_session_id, owner_name)],
            game: None,
            cleanup_epoch: 0,
        }
    }

    pub fn seat_index(&self, session_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.session_id == session_id)
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= MAX_SEATS
    }

    /// Whether any seat still has a live connection.
    pub fn has_connected_seats(&self) -> bool {
        self.seats.iter().any(|s| s.connected)
    }

    pub fn bump_epoch(&mut self) -> u64 {
        self.cleanup_epoch += 1;
        self.cleanup_epoch
    }

    /// Seat a session, or rebind a returning one. Joining is idempotent per
    /// session id; a reconnect keeps the seat and name.
    pub fn join(&mut self, session_id: &str, name: String) -> Result<(), LobbyError> {
        if let Some(idx) = self.seat_index(session_id) {
            self.seats[idx].connected = true;
            return Ok(());
        }
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::GameAlreadyStarted);
        }
        if self.is_full() {
            return Err(LobbyError::LobbyFull);
        }
        self.seats
            .push(LobbySeat::new(session_id.to_string(), name));
        Ok(())
    }

    /// Handle a dropped connection. While waiting the seat is released;
    /// mid-game it is kept for reconnection and only marked disconnected.
    pub fn disconnect(&mut self, session_id: &str) {
        let Some(idx) = self.seat_index(session_id) else {
            return;
        };
        if self.status == LobbyStatus::Waiting {
            self.seats.remove(idx);
            if self.owner_session_id == session_id {
                if let Some(first) = self.seats.first() {
                    self.owner_session_id = first.session_id.clone();
                }
            }
        } else {
            self.seats[idx].connected = false;
        }
    }

    pub fn rename(&mut self, session_id: &str, new_name: &str) -> Result<(), LobbyError> {
        let idx = self
            .seat_index(session_id)
            .ok_or(LobbyError::PlayerNotInLobby)?;
        self.seats[idx].name = new_name.to_string();
        if let Some(game) = self.game.as_mut() {
            if let Some(p) = game.player_index(session_id) {
                game.players[p].name = new_name.to_string();
            }
        }
        Ok(())
    }

    /// Start a round with the current seats (owner only).
    pub fn start_game(&mut self, requester_id: &str) -> Result<(), LobbyError> {
        if requester_id != self.owner_session_id {
            return Err(LobbyError::NotOwner);
        }
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::GameAlreadyStarted);
        }

        let seats: Vec<Seat> = self
            .seats
            .iter()
            .map(|s| Seat::new(s.session_id.clone(), s.name.clone()))
            .collect();
        self.game = Some(GameState::new(seats)?);
        self.status = LobbyStatus::Playing;
        Ok(())
    }

    /// Re-deal the same seats after a round (owner only).
    pub fn play_again(&mut self, requester_id: &str) -> Result<(), LobbyError> {
        if requester_id != self.owner_session_id {
            return Err(LobbyError::NotOwner);
        }
        let game = self.game.as_mut().ok_or(LobbyError::NoActiveGame)?;
        game.reset();
        self.status = LobbyStatus::Playing;
        Ok(())
    }

    /// Drop the game and return to the waiting screen (owner only).
    pub fn back_to_lobby(&mut self, requester_id: &str) -> Result<(), LobbyError> {
        if requester_id != self.owner_session_id {
            return Err(LobbyError::NotOwner);
        }
        self.game = None;
        self.status = LobbyStatus::Waiting;
        Ok(())
    }

    /// Reset the running game in place.
    pub fn reset_game(&mut self) -> Result<(), LobbyError> {
        let game = self.game.as_mut().ok_or(LobbyError::NoActiveGame)?;
        game.reset();
        self.status = LobbyStatus::Playing;
        Ok(())
    }

    /// Forward one move into the engine.
    pub fn make_move(
        &mut self,
        session_id: &str,
        mv: &PlayedMove,
    ) -> Result<MoveOutcome, LobbyError> {
        if self.seat_index(session_id).is_none() {
            return Err(LobbyError::PlayerNotInLobby);
        }
        let game = self.game.as_mut().ok_or(LobbyError::NoActiveGame)?;

        let outcome = game.make_move(session_id, mv)?;
        if outcome.game_over {
            self.status = LobbyStatus::Finished;
        }
        Ok(outcome)
    }

    /// One projected snapshot per seat, for fan-out after a state change.
    pub fn views(&self) -> Vec<(String, GameView)> {
        let Some(game) = self.game.as_ref() else {
            return Vec::new();
        };
        self.seats
            .iter()
            .map(|s| (s.session_id.clone(), game.view(Some(&s.session_id))))
            .collect()
    }

    /// This seat's own projection (reconnection mid-game).
    pub fn view_for(&self, session_id: &str) -> Option<GameView> {
        self.game.as_ref().map(|g| g.view(Some(session_id)))
    }

    pub fn to_info(&self) -> LobbyInfo {
        LobbyInfo {
            id: self.id.clone(),
            players: self.seats.iter().map(|s| s.to_info()).collect(),
            owner_session_id: self.owner_session_id.clone(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby_with(seats: usize) -> Lobby {
        let mut lobby = Lobby::new("abc123".into(), "s0".into(), "Player 1".into());
        for i in 1..seats {
            lobby
                .join(&format!("s{}", i), format!("Player {}", i + 1))
                .unwrap();
        }
        lobby
    }

    #[test]
    fn test_create_lobby() {
        let lobby = lobby_with(1);
        assert_eq!(lobby.seat_count(), 1);
        assert!(!lobby.is_full());
        assert_eq!(lobby.owner_session_id, "s0");
        assert_eq!(lobby.status, LobbyStatus::Waiting);
    }

    #[test]
    fn test_join_is_idempotent_per_session() {
        let mut lobby = lobby_with(2);
        lobby.join("s1", "ignored".into()).unwrap();
        assert_eq!(lobby.seat_count(), 2);
        assert_eq!(lobby.seats[1].name, "Player 2");
    }

    #[test]
    fn test_lobby_capacity() {
        let mut lobby = lobby_with(4);
        assert!(lobby.is_full());
        assert!(matches!(
            lobby.join("s4", "Player 5".into()),
            Err(LobbyError::LobbyFull)
        ));
    }

    #[test]
    fn test_start_game_rules() {
        let mut lobby = lobby_with(1);

        // Engine rejects a single seat
        assert!(matches!(
            lobby.start_game("s0"),
            Err(LobbyError::Game(GameError::InvalidPlayerCount))
        ));
        assert_eq!(lobby.status, LobbyStatus::Waiting);
        assert!(lobby.game.is_none());

        lobby.join("s1", "Player 2".into()).unwrap();

        // Non-owner can't start
        assert!(matches!(lobby.start_game("s1"), Err(LobbyError::NotOwner)));

        lobby.start_game("s0").unwrap();
        assert_eq!(lobby.status, LobbyStatus::Playing);
        assert!(lobby.game.is_some());

        // Can't start twice
        assert!(matches!(
            lobby.start_game("s0"),
            Err(LobbyError::GameAlreadyStarted)
        ));
    }

    #[test]
    fn test_views_hide_other_hands() {
        let mut lobby = lobby_with(3);
        lobby.start_game("s0").unwrap();

        let views = lobby.views();
        assert_eq!(views.len(), 3);
        for (viewer, view) in views {
            for player in &view.players {
                if player.session_id == viewer {
                    assert_eq!(player.hand.len(), player.hand_size);
                } else {
                    assert!(player.hand.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_disconnect_while_waiting_releases_seat() {
        let mut lobby = lobby_with(2);
        lobby.disconnect("s0");

        assert_eq!(lobby.seat_count(), 1);
        assert_eq!(lobby.owner_session_id, "s1");
    }

    #[test]
    fn test_disconnect_mid_game_keeps_seat() {
        let mut lobby = lobby_with(2);
        lobby.start_game("s0").unwrap();
        lobby.disconnect("s1");

        assert_eq!(lobby.seat_count(), 2);
        assert!(!lobby.seats[1].connected);

        // Rejoin rebinds the same seat
        lobby.join("s1", "whatever".into()).unwrap();
        assert!(lobby.seats[1].connected);
        assert_eq!(lobby.seat_count(), 2);
    }

    #[test]
    fn test_moves_require_a_running_game() {
        let mut lobby = lobby_with(2);
        let mv = PlayedMove::card(0);
        assert!(matches!(
            lobby.make_move("s0", &mv),
            Err(LobbyError::NoActiveGame)
        ));
        assert!(matches!(
            lobby.make_move("nobody", &mv),
            Err(LobbyError::PlayerNotInLobby)
        ));
    }

    #[test]
    fn test_play_again_is_owner_only() {
        let mut lobby = lobby_with(2);
        lobby.start_game("s0").unwrap();

        assert!(matches!(lobby.play_again("s1"), Err(LobbyError::NotOwner)));

        lobby.play_again("s0").unwrap();
        assert_eq!(lobby.status, LobbyStatus::Playing);
        let game = lobby.game.as_ref().unwrap();
        assert_eq!(game.players[0].hand.len(), 2);
        assert!(game.log.is_empty());
    }
}
