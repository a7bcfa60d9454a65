//! WebSocket server and connection handling.

use crate::lobby::Lobby;
use crate::protocol::{ClientMessage, LobbyStatus, ServerMessage};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use loveletter_core::PlayedMove;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How long an empty lobby survives before cleanup.
const LOBBY_CLEANUP_DELAY: Duration = Duration::from_secs(5 * 60);

/// Server state shared across all connections.
pub struct ServerState {
    /// All active lobbies
    pub lobbies: DashMap<String, Lobby>,
    /// Mapping from session id to lobby id
    pub session_lobbies: DashMap<String, String>,
    /// Mapping from connection id to its message sender
    pub connections: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    /// Mapping from session id to its latest connection
    pub session_connections: DashMap<String, Uuid>,
    /// Names remembered per session, across lobbies
    pub session_names: DashMap<String, String>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            lobbies: DashMap::new(),
            session_lobbies: DashMap::new(),
            connections: DashMap::new(),
            session_connections: DashMap::new(),
            session_names: DashMap::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to_connection(&self, connection_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.connections.get(&connection_id) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to a session's latest connection.
    pub fn send_to_session(&self, session_id: &str, msg: ServerMessage) {
        let conn = self.session_connections.get(session_id).map(|c| *c.value());
        if let Some(conn) = conn {
            self.send_to_connection(conn, msg);
        }
    }

    /// Broadcast a message to every seat in a lobby.
    pub fn broadcast_to_lobby(&self, lobby_id: &str, msg: ServerMessage) {
        let seats: Vec<String> = match self.lobbies.get(lobby_id) {
            Some(lobby) => lobby.seats.iter().map(|s| s.session_id.clone()).collect(),
            None => return,
        };
        for session_id in seats {
            self.send_to_session(&session_id, msg.clone());
        }
    }

    /// The lobby a session currently sits in.
    fn lobby_of(&self, session_id: &str) -> Option<String> {
        self.session_lobbies
            .get(session_id)
            .map(|l| l.value().clone())
    }

    /// Remembered display name for a session, or a positional default.
    fn name_for(&self, session_id: &str, seat_number: usize) -> String {
        if let Some(name) = self.session_names.get(session_id) {
            return name.value().clone();
        }
        let name = format!("Player {}", seat_number);
        self.session_names
            .insert(session_id.to_string(), name.clone());
        name
    }

    fn send_error(&self, session_id: &str, message: impl Into<String>) {
        self.send_to_session(
            session_id,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Love Letter server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connections.insert(connection_id, tx);

    let welcome = serde_json::to_string(&ServerMessage::Welcome)?;
    ws_sender.send(Message::Text(welcome.into())).await?;

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // The session this connection has identified as
    let mut session_id: Option<String> = None;

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_message(connection_id, &mut session_id, client_msg, &state);
                } else {
                    warn!("Invalid message on connection {}: {}", connection_id, text);
                }
            }
            Ok(Message::Close(_)) => {
                info!("Connection {} closing", connection_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to_connection(connection_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error on connection {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(connection_id, session_id.as_deref(), &state);
    state.connections.remove(&connection_id);
    send_task.abort();

    info!("Connection {} closed", connection_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(
    connection_id: Uuid,
    session: &mut Option<String>,
    msg: ClientMessage,
    state: &Arc<ServerState>,
) {
    let msg = match msg {
        ClientMessage::Identify { session_id, name } => {
            handle_identify(connection_id, session, session_id, name, state);
            return;
        }
        other => other,
    };

    // Everything else requires an identified session
    let Some(session_id) = session.clone() else {
        state.send_to_connection(
            connection_id,
            ServerMessage::Error {
                message: "Identify first".to_string(),
            },
        );
        return;
    };

    match msg {
        // Handled above
        ClientMessage::Identify { .. } => {}

        ClientMessage::CreateLobby => {
            let lobby_id = Uuid::new_v4().simple().to_string()[..8].to_string();
            let name = state.name_for(&session_id, 1);
            let lobby = Lobby::new(lobby_id.clone(), session_id.clone(), name);
            let info = lobby.to_info();

            state.lobbies.insert(lobby_id.clone(), lobby);
            state
                .session_lobbies
                .insert(session_id.clone(), lobby_id.clone());

            info!("Lobby {} created by session {}", lobby_id, session_id);
            state.send_to_session(&session_id, ServerMessage::LobbyCreated { lobby: info });
        }

        ClientMessage::JoinLobby { lobby_id } => {
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                let name = state.name_for(&session_id, lobby.seat_count() + 1);
                match lobby.join(&session_id, name) {
                    Ok(()) => {
                        lobby.bump_epoch();
                        state
                            .session_lobbies
                            .insert(session_id.clone(), lobby_id.clone());

                        let info = lobby.to_info();
                        let playing = lobby.status != LobbyStatus::Waiting;
                        let view = lobby.view_for(&session_id);
                        drop(lobby);

                        state.broadcast_to_lobby(
                            &lobby_id,
                            ServerMessage::LobbyUpdated { lobby: info },
                        );
                        // A session rejoining a running game goes straight back in
                        if playing {
                            if let Some(view) = view {
                                state.send_to_session(
                                    &session_id,
                                    ServerMessage::GameStarted { state: view },
                                );
                            }
                        }
                        info!("Session {} joined lobby {}", session_id, lobby_id);
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            } else {
                state.send_error(&session_id, "Lobby not found");
            }
        }

        ClientMessage::ChangeName { new_name } => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.rename(&session_id, &new_name) {
                    Ok(()) => {
                        state
                            .session_names
                            .insert(session_id.clone(), new_name.clone());
                        let info = lobby.to_info();
                        drop(lobby);
                        state.broadcast_to_lobby(
                            &lobby_id,
                            ServerMessage::LobbyUpdated { lobby: info },
                        );
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::StartGame => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.start_game(&session_id) {
                    Ok(()) => {
                        let info = lobby.to_info();
                        let views = lobby.views();
                        drop(lobby);

                        info!("Game started in lobby {}", lobby_id);
                        state.broadcast_to_lobby(
                            &lobby_id,
                            ServerMessage::LobbyUpdated { lobby: info },
                        );
                        for (viewer, view) in views {
                            state.send_to_session(
                                &viewer,
                                ServerMessage::GameStarted { state: view },
                            );
                        }
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::PlayAgain => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.play_again(&session_id) {
                    Ok(()) => {
                        let views = lobby.views();
                        drop(lobby);

                        info!("Round restarted in lobby {}", lobby_id);
                        for (viewer, view) in views {
                            state.send_to_session(
                                &viewer,
                                ServerMessage::GameStarted { state: view },
                            );
                        }
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::BackToLobby => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.back_to_lobby(&session_id) {
                    Ok(()) => {
                        let info = lobby.to_info();
                        drop(lobby);
                        state.broadcast_to_lobby(
                            &lobby_id,
                            ServerMessage::LobbyUpdated { lobby: info },
                        );
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::MakeMove {
            card_index,
            target_session_id,
            guess,
        } => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            let mv = PlayedMove {
                card_index,
                target_session_id,
                guess,
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.make_move(&session_id, &mv) {
                    Ok(outcome) => {
                        let views = lobby.views();
                        drop(lobby);

                        for (viewer, view) in views {
                            state.send_to_session(
                                &viewer,
                                ServerMessage::MoveMade {
                                    state: view,
                                    game_over: outcome.game_over,
                                },
                            );
                        }
                        // Viewer-private information goes to the actor only
                        if let Some(reveal) = outcome.private_reveal {
                            state.send_to_session(
                                &session_id,
                                ServerMessage::PrivateReveal {
                                    target_session_id: reveal.target_session_id,
                                    card: reveal.card,
                                },
                            );
                        }
                        info!("Move made in lobby {}", lobby_id);
                    }
                    Err(e) => {
                        drop(lobby);
                        // Rejected moves notify the requester only
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::ResetGame => {
            let Some(lobby_id) = state.lobby_of(&session_id) else {
                state.send_error(&session_id, "Not in a lobby");
                return;
            };
            if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
                match lobby.reset_game() {
                    Ok(()) => {
                        let views = lobby.views();
                        drop(lobby);

                        info!("Game reset in lobby {}", lobby_id);
                        for (viewer, view) in views {
                            state
                                .send_to_session(&viewer, ServerMessage::GameReset { state: view });
                        }
                    }
                    Err(e) => {
                        drop(lobby);
                        state.send_error(&session_id, e.to_string());
                    }
                }
            }
        }

        ClientMessage::Ping => {
            state.send_to_session(&session_id, ServerMessage::Pong);
        }
    }
}

/// Bind a connection to a session, replacing any previous connection, and
/// put a rejoining session back into its lobby.
fn handle_identify(
    connection_id: Uuid,
    session: &mut Option<String>,
    session_id: String,
    name: Option<String>,
    state: &Arc<ServerState>,
) {
    *session = Some(session_id.clone());
    state
        .session_connections
        .insert(session_id.clone(), connection_id);
    if let Some(name) = name {
        state.session_names.insert(session_id.clone(), name);
    }

    // Reconnection: rebind the seat and return the player to their game
    if let Some(lobby_id) = state.lobby_of(&session_id) {
        if let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) {
            if let Some(idx) = lobby.seat_index(&session_id) {
                lobby.seats[idx].connected = true;
                lobby.bump_epoch();
                let info = lobby.to_info();
                let view = lobby.view_for(&session_id);
                let playing = lobby.status != LobbyStatus::Waiting;
                drop(lobby);

                state.broadcast_to_lobby(&lobby_id, ServerMessage::LobbyUpdated { lobby: info });
                if playing {
                    if let Some(view) = view {
                        state.send_to_session(
                            &session_id,
                            ServerMessage::GameStarted { state: view },
                        );
                    }
                }
            }
        }
    }

    info!(
        "Connection {} identified as session {}",
        connection_id, session_id
    );
}

/// Handle a dropped connection.
fn handle_disconnect(connection_id: Uuid, session_id: Option<&str>, state: &Arc<ServerState>) {
    let Some(session_id) = session_id else {
        return;
    };

    // A newer connection may have taken over the session; leave it alone
    let current = state
        .session_connections
        .get(session_id)
        .map(|c| *c.value());
    if current != Some(connection_id) {
        return;
    }
    state.session_connections.remove(session_id);

    let Some(lobby_id) = state.lobby_of(session_id) else {
        return;
    };
    let Some(mut lobby) = state.lobbies.get_mut(&lobby_id) else {
        return;
    };

    lobby.disconnect(session_id);
    if lobby.status == LobbyStatus::Waiting {
        state.session_lobbies.remove(session_id);
    }

    if lobby.has_connected_seats() {
        let info = lobby.to_info();
        drop(lobby);
        state.broadcast_to_lobby(&lobby_id, ServerMessage::LobbyUpdated { lobby: info });
    } else {
        // Last connection gone: give the lobby a grace period before cleanup
        let epoch = lobby.bump_epoch();
        drop(lobby);
        info!(
            "Lobby {} is empty, scheduling cleanup in {:?}",
            lobby_id, LOBBY_CLEANUP_DELAY
        );
        schedule_lobby_cleanup(Arc::clone(state), lobby_id, epoch);
    }
}

/// Remove a lobby after the grace period, unless someone came back (which
/// bumps the epoch) in the meantime.
fn schedule_lobby_cleanup(state: Arc<ServerState>, lobby_id: String, epoch: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(LOBBY_CLEANUP_DELAY).await;

        let should_remove = state
            .lobbies
            .get(&lobby_id)
            .map(|l| l.cleanup_epoch == epoch && !l.has_connected_seats())
            .unwrap_or(false);

        if should_remove {
            if let Some((_, lobby)) = state.lobbies.remove(&lobby_id) {
                for seat in &lobby.seats {
                    state.session_lobbies.remove(&seat.session_id);
                }
                info!("Lobby {} deleted after grace period", lobby_id);
            }
        }
    });
}
