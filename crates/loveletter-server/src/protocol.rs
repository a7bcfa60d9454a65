//! WebSocket protocol messages for the lobby server.

use loveletter_core::{Card, GameView};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Bind this connection to a stable session. Must come first; a session
    /// reconnecting keeps its seat and name.
    Identify {
        session_id: String,
        name: Option<String>,
    },

    /// Create a new lobby with this session as owner
    CreateLobby,

    /// Join an existing lobby (idempotent per session)
    JoinLobby { lobby_id: String },

    /// Change display name
    ChangeName { new_name: String },

    /// Start the game (owner only)
    StartGame,

    /// Re-deal the same seats after a finished round (owner only)
    PlayAgain,

    /// Abandon the game and return to the lobby screen (owner only)
    BackToLobby,

    /// Play a card
    MakeMove {
        card_index: usize,
        target_session_id: Option<String>,
        guess: Option<u8>,
    },

    /// Reset the running game in place
    ResetGame,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Connection accepted; waiting for Identify
    Welcome,

    /// Lobby created successfully
    LobbyCreated { lobby: LobbyInfo },

    /// Lobby membership or status changed
    LobbyUpdated { lobby: LobbyInfo },

    /// Game started; state is this viewer's projection
    GameStarted { state: GameView },

    /// A move was accepted; state is this viewer's projection
    MoveMade { state: GameView, game_over: bool },

    /// One-shot reveal delivered to the acting viewer only (Priest)
    PrivateReveal {
        target_session_id: String,
        card: Card,
    },

    /// Game was reset in place
    GameReset { state: GameView },

    /// Error occurred; sent to the requesting viewer only
    Error { message: String },

    /// Pong response
    Pong,
}

/// Lobby information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub id: String,
    pub players: Vec<SeatInfo>,
    pub owner_session_id: String,
    pub status: LobbyStatus,
}

/// One seat in a lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInfo {
    pub session_id: String,
    pub name: String,
    pub connected: bool,
}

/// Lobby status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyStatus {
    Waiting,
    Playing,
    Finished,
}
