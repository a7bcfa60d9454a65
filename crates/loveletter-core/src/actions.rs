//! Moves players submit and the outcomes and log entries they produce.

use crate::card::Card;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single inbound move: which held card to play, and the target/guess the
/// card may require.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedMove {
    /// Index into the acting player's 2-card hand.
    pub card_index: usize,
    /// Session id of the targeted seat, for cards that take one.
    pub target_session_id: Option<String>,
    /// Guessed card value (Guard only).
    pub guess: Option<u8>,
}

impl PlayedMove {
    /// A move with no target or guess (Handmaid, Countess, Princess).
    pub fn card(card_index: usize) -> Self {
        Self {
            card_index,
            target_session_id: None,
            guess: None,
        }
    }

    /// A targeted move (Priest, Baron, Prince, King).
    pub fn targeting(card_index: usize, target: impl Into<String>) -> Self {
        Self {
            card_index,
            target_session_id: Some(target.into()),
            guess: None,
        }
    }

    /// A Guard move with target and guess.
    pub fn guessing(card_index: usize, target: impl Into<String>, guess: u8) -> Self {
        Self {
            card_index,
            target_session_id: Some(target.into()),
            guess: Some(guess),
        }
    }
}

/// Who came out ahead in a Baron comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaronOutcome {
    TargetEliminated,
    ActorEliminated,
    Tie,
}

/// What an accepted move's effect did, in public terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EffectOutcome {
    /// Every other live seat was protected; the card was discarded to no effect.
    NoValidTargets,
    GuardHit { guess: Card },
    GuardMiss { guess: Card },
    /// The revealed card itself travels only in [`PrivateReveal`].
    PriestReveal,
    Baron { outcome: BaronOutcome },
    HandmaidProtected,
    PrinceDiscard { discarded: Card, eliminated: bool },
    KingSwap,
    CountessPlayed,
    PrincessDiscarded,
}

/// One-shot payload for effects that reveal information to the acting player
/// only. Never stored in shared state or the log; the orchestrator delivers
/// it to the actor's connection and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateReveal {
    pub target_session_id: String,
    pub card: Card,
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub effect: EffectOutcome,
    pub game_over: bool,
    pub target_session_id: Option<String>,
    pub private_reveal: Option<PrivateReveal>,
}

/// Structured identification of a log event. Session ids name the seats
/// involved; card fields only ever carry values already public by rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LogMeta {
    Play {
        actor_session_id: String,
        target_session_id: Option<String>,
        card: Card,
        guess: Option<Card>,
    },
    ProtectionEnd {
        actor_session_id: String,
    },
    NoTargets {
        actor_session_id: String,
        card: Card,
    },
    GuardCorrect {
        actor_session_id: String,
        target_session_id: String,
        guess: Card,
    },
    GuardWrong {
        actor_session_id: String,
        target_session_id: String,
        guess: Card,
    },
    /// Deliberately carries no card value.
    Priest {
        actor_session_id: String,
        target_session_id: String,
    },
    Baron {
        actor_session_id: String,
        target_session_id: String,
        actor_card: Card,
        target_card: Card,
        outcome: BaronOutcome,
    },
    Handmaid {
        actor_session_id: String,
    },
    Prince {
        actor_session_id: String,
        target_session_id: String,
        discarded: Card,
    },
    PrinceElim {
        actor_session_id: String,
        target_session_id: String,
    },
    King {
        actor_session_id: String,
        target_session_id: String,
    },
    PrincessElim {
        actor_session_id: String,
    },
    WinLast {
        winner_session_id: String,
    },
    WinHighest {
        winner_session_id: String,
        card: Card,
    },
    WinTiebreak {
        winner_session_id: String,
        discard_total: u32,
    },
    Tie,
}

/// One entry in the shared, append-only round log. Identical for every
/// viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub timestamp_ms: u64,
    pub meta: LogMeta,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, meta: LogMeta) -> Self {
        Self {
            message: message.into(),
            timestamp_ms: now_ms(),
            meta,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
