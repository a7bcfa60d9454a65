//! Core game engine: turn validation, card effects, round resolution.
//!
//! One `GameState` instance is one round of Love Letter. The owning caller
//! (a lobby) serializes all calls into it; the engine itself is synchronous
//! and never shares state between instances.

use crate::actions::{
    BaronOutcome, EffectOutcome, LogEntry, LogMeta, MoveOutcome, PlayedMove, PrivateReveal,
};
use crate::card::Card;
use crate::deck::Deck;
use crate::player::{Player, Seat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can reject a move or a round construction.
///
/// Every rejection leaves the round state exactly as it was: validation runs
/// to completion against a read-only view before any mutation happens.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Love Letter requires 2-4 players")]
    InvalidPlayerCount,

    #[error("Game is over")]
    GameOver,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("You are eliminated")]
    Eliminated,

    #[error("You must draw before playing")]
    MustDrawFirst,

    #[error("Invalid card index")]
    InvalidCardIndex,

    #[error("Must play Countess when also holding King or Prince")]
    MustPlayCountess,

    #[error("{0} requires a target")]
    TargetRequired(Card),

    #[error("Guard requires a guess")]
    GuessRequired,

    #[error("Guess must be a card value from 2 to 8")]
    InvalidGuess,

    #[error("Invalid target")]
    InvalidTarget,

    #[error("Target is protected")]
    TargetProtected,

    #[error("Cannot target yourself while another player can be targeted")]
    SelfTargetNotAllowed,
}

/// The seat that won the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub session_id: String,
    pub name: String,
}

/// Fully validated effect, ready to apply. Produced by planning against the
/// unmutated state so a rejected move never needs a rollback.
enum EffectPlan {
    NoValidTargets,
    GuardGuess { target: usize, guess: Card },
    PriestReveal { target: usize },
    BaronCompare { target: usize },
    Protect,
    PrinceDiscard { target: usize },
    KingSwap { target: usize },
    Inert,
    SelfEliminate,
}

/// The complete state of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Players in seat order.
    pub players: Vec<Player>,
    /// Draw pile and removed cards.
    pub deck: Deck,
    /// All discarded cards in play order, across every seat.
    pub discard_pile: Vec<Card>,
    /// Index of the seat whose turn it is.
    pub current_player_index: usize,
    /// Session ids protected by a Handmaid until their own next turn.
    pub protected: HashSet<String>,
    /// Whether the round has ended.
    pub game_over: bool,
    /// Round winner, if any. `None` with `game_over` set means a tie.
    pub winner: Option<Winner>,
    /// Shared, append-only round log.
    pub log: Vec<LogEntry>,
}

impl GameState {
    /// Start a round with the given seats.
    ///
    /// Deals one card to every seat, then performs the first seat's
    /// start-of-turn draw so the first actor begins holding 2 cards. Fails
    /// without any state for seat counts outside 2-4.
    pub fn new(seats: Vec<Seat>) -> Result<Self, GameError> {
        if !(2..=4).contains(&seats.len()) {
            return Err(GameError::InvalidPlayerCount);
        }

        let mut rng = rand::thread_rng();
        let mut deck = Deck::setup(seats.len(), &mut rng);

        let mut players: Vec<Player> = seats
            .into_iter()
            .map(|s| Player::new(s.session_id, s.name))
            .collect();
        for player in &mut players {
            // 16 cards minus removals always covers the opening deal
            player.hand.push(deck.draw().unwrap());
        }

        let mut state = Self {
            players,
            deck,
            discard_pile: Vec::new(),
            current_player_index: 0,
            protected: HashSet::new(),
            game_over: false,
            winner: None,
            log: Vec::new(),
        };
        state.start_turn_draw();
        Ok(state)
    }

    /// Re-deal the same seats into a fresh round ("play again").
    pub fn reset(&mut self) {
        let seats: Vec<Seat> = self.players.iter().map(Player::seat).collect();
        *self = Self::new(seats).expect("seat count already validated");
    }

    /// The seat whose turn it is.
    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player_index]
    }

    /// Find a seat by session id.
    pub fn player_index(&self, session_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.session_id == session_id)
    }

    /// Whether a seat is currently Handmaid-protected.
    pub fn is_protected(&self, session_id: &str) -> bool {
        self.protected.contains(session_id)
    }

    /// Total cards across the draw pile, removals, hands, and discards.
    /// Stays at 16 for the whole round.
    pub fn total_cards(&self) -> usize {
        self.deck.len()
            + self.deck.removed_face_down.iter().count()
            + self.deck.removed_face_up.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
            + self.players.iter().map(|p| p.discards.len()).sum::<usize>()
    }

    /// Apply one move. The sole mutating entry point once a round is running.
    ///
    /// Validation order: round over, turn ownership, elimination, card index,
    /// the Countess rule, then the card's own target/guess rules. The first
    /// failure wins and the state is left untouched.
    pub fn make_move(
        &mut self,
        session_id: &str,
        mv: &PlayedMove,
    ) -> Result<MoveOutcome, GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }

        let actor = self.current_player_index;
        if self.players[actor].session_id != session_id {
            return Err(GameError::NotYourTurn);
        }
        if self.players[actor].eliminated {
            return Err(GameError::Eliminated);
        }
        if self.players[actor].hand.len() < 2 {
            return Err(GameError::MustDrawFirst);
        }
        if mv.card_index >= self.players[actor].hand.len() {
            return Err(GameError::InvalidCardIndex);
        }

        let card = self.players[actor].hand[mv.card_index];
        if self.countess_forced(actor) && card != Card::Countess {
            return Err(GameError::MustPlayCountess);
        }

        let plan = self.plan_effect(actor, card, mv)?;
        Ok(self.commit(actor, card, mv, plan))
    }

    /// The Countess rule: holding the Countess alongside the Prince or the
    /// King forces the Countess.
    fn countess_forced(&self, actor: usize) -> bool {
        let hand = &self.players[actor].hand;
        hand.contains(&Card::Countess)
            && (hand.contains(&Card::Prince) || hand.contains(&Card::King))
    }

    /// Seats a hostile effect may legally target: everyone else still in the
    /// round and not protected.
    fn valid_targets(&self, actor: usize) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != actor && !p.eliminated && !self.protected.contains(&p.session_id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Validate the whole effect against the read-only state.
    fn plan_effect(
        &self,
        actor: usize,
        card: Card,
        mv: &PlayedMove,
    ) -> Result<EffectPlan, GameError> {
        match card {
            Card::Guard => {
                if self.valid_targets(actor).is_empty() {
                    return Ok(EffectPlan::NoValidTargets);
                }
                let target = self.required_other_target(actor, card, mv)?;
                let guess = mv
                    .guess
                    .and_then(Card::from_value)
                    .ok_or(match mv.guess {
                        None => GameError::GuessRequired,
                        Some(_) => GameError::InvalidGuess,
                    })?;
                if guess == Card::Guard {
                    return Err(GameError::InvalidGuess);
                }
                Ok(EffectPlan::GuardGuess { target, guess })
            }
            Card::Priest => {
                if self.valid_targets(actor).is_empty() {
                    return Ok(EffectPlan::NoValidTargets);
                }
                let target = self.required_other_target(actor, card, mv)?;
                Ok(EffectPlan::PriestReveal { target })
            }
            Card::Baron => {
                if self.valid_targets(actor).is_empty() {
                    return Ok(EffectPlan::NoValidTargets);
                }
                let target = self.required_other_target(actor, card, mv)?;
                Ok(EffectPlan::BaronCompare { target })
            }
            Card::Handmaid => Ok(EffectPlan::Protect),
            Card::Prince => self.plan_prince(actor, mv),
            Card::King => {
                if self.valid_targets(actor).is_empty() {
                    return Ok(EffectPlan::NoValidTargets);
                }
                let target = self.required_other_target(actor, card, mv)?;
                Ok(EffectPlan::KingSwap { target })
            }
            Card::Countess => Ok(EffectPlan::Inert),
            Card::Princess => Ok(EffectPlan::SelfEliminate),
        }
    }

    /// The Prince may never sit idle: when every other live seat is
    /// protected it falls back to the actor, otherwise it must name another
    /// eligible seat.
    fn plan_prince(&self, actor: usize, mv: &PlayedMove) -> Result<EffectPlan, GameError> {
        let others = self.valid_targets(actor);
        let target = match mv.target_session_id.as_deref() {
            None => {
                if others.is_empty() {
                    actor
                } else {
                    return Err(GameError::TargetRequired(Card::Prince));
                }
            }
            Some(sid) => {
                let target = self.player_index(sid).ok_or(GameError::InvalidTarget)?;
                if target == actor {
                    if !others.is_empty() {
                        return Err(GameError::SelfTargetNotAllowed);
                    }
                    actor
                } else if self.players[target].eliminated {
                    return Err(GameError::InvalidTarget);
                } else if self.protected.contains(sid) {
                    return Err(GameError::TargetProtected);
                } else {
                    target
                }
            }
        };
        Ok(EffectPlan::PrinceDiscard { target })
    }

    /// Resolve and validate a mandatory non-self target.
    fn required_other_target(
        &self,
        actor: usize,
        card: Card,
        mv: &PlayedMove,
    ) -> Result<usize, GameError> {
        let sid = mv
            .target_session_id
            .as_deref()
            .ok_or(GameError::TargetRequired(card))?;
        let target = self.player_index(sid).ok_or(GameError::InvalidTarget)?;
        if target == actor || self.players[target].eliminated {
            return Err(GameError::InvalidTarget);
        }
        if self.protected.contains(sid) {
            return Err(GameError::TargetProtected);
        }
        Ok(target)
    }

    /// Apply a validated move: discard the played card, run the effect, then
    /// resolve end-of-round conditions.
    fn commit(
        &mut self,
        actor: usize,
        card: Card,
        mv: &PlayedMove,
        plan: EffectPlan,
    ) -> MoveOutcome {
        let played = self.players[actor].hand.remove(mv.card_index);
        self.players[actor].discards.push(played);
        self.discard_pile.push(played);

        let actor_sid = self.players[actor].session_id.clone();
        let actor_name = self.players[actor].name.clone();

        let (guess, target_sid) = match &plan {
            EffectPlan::GuardGuess { guess, .. } => (Some(*guess), mv.target_session_id.clone()),
            EffectPlan::NoValidTargets | EffectPlan::Protect | EffectPlan::Inert
            | EffectPlan::SelfEliminate => (None, None),
            _ => (None, mv.target_session_id.clone()),
        };
        let targeting = target_sid
            .as_deref()
            .and_then(|sid| self.player_index(sid))
            .map(|i| format!(" targeting {}", self.players[i].name))
            .unwrap_or_default();
        self.push_log(
            format!("{} played {}{}.", actor_name, card, targeting),
            LogMeta::Play {
                actor_session_id: actor_sid.clone(),
                target_session_id: target_sid,
                card,
                guess,
            },
        );

        let (effect, effect_target, private_reveal) = self.apply_effect(actor, card, plan);

        let live: Vec<usize> = (0..self.players.len())
            .filter(|&i| !self.players[i].eliminated)
            .collect();
        if live.len() == 1 {
            let last = &self.players[live[0]];
            self.winner = Some(Winner {
                session_id: last.session_id.clone(),
                name: last.name.clone(),
            });
            self.game_over = true;
            let (name, sid) = (last.name.clone(), last.session_id.clone());
            self.push_log(
                format!("{} wins by being the last player standing.", name),
                LogMeta::WinLast {
                    winner_session_id: sid,
                },
            );
        } else if self.deck.is_empty() {
            self.resolve_reveal();
        } else {
            self.advance_turn();
        }

        MoveOutcome {
            effect,
            game_over: self.game_over,
            target_session_id: effect_target,
            private_reveal,
        }
    }

    /// Run one effect. Only called with a fully validated plan.
    fn apply_effect(
        &mut self,
        actor: usize,
        card: Card,
        plan: EffectPlan,
    ) -> (EffectOutcome, Option<String>, Option<PrivateReveal>) {
        let actor_sid = self.players[actor].session_id.clone();
        let actor_name = self.players[actor].name.clone();

        match plan {
            EffectPlan::NoValidTargets => {
                self.push_log(
                    format!(
                        "{} played {} but there are no valid targets.",
                        actor_name, card
                    ),
                    LogMeta::NoTargets {
                        actor_session_id: actor_sid,
                        card,
                    },
                );
                (EffectOutcome::NoValidTargets, None, None)
            }

            EffectPlan::GuardGuess { target, guess } => {
                let target_sid = self.players[target].session_id.clone();
                let target_name = self.players[target].name.clone();
                if self.players[target].held_card() == Some(guess) {
                    self.eliminate(target);
                    self.push_log(
                        format!(
                            "{} guessed correctly. {} is eliminated.",
                            actor_name, target_name
                        ),
                        LogMeta::GuardCorrect {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            guess,
                        },
                    );
                    (EffectOutcome::GuardHit { guess }, Some(target_sid), None)
                } else {
                    self.push_log(
                        format!("{} guessed wrong. {} is safe.", actor_name, target_name),
                        LogMeta::GuardWrong {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            guess,
                        },
                    );
                    (EffectOutcome::GuardMiss { guess }, Some(target_sid), None)
                }
            }

            EffectPlan::PriestReveal { target } => {
                let target_sid = self.players[target].session_id.clone();
                let target_name = self.players[target].name.clone();
                let revealed = self.players[target].held_card().unwrap();
                self.push_log(
                    format!("{} looked at {}'s hand.", actor_name, target_name),
                    LogMeta::Priest {
                        actor_session_id: actor_sid,
                        target_session_id: target_sid.clone(),
                    },
                );
                (
                    EffectOutcome::PriestReveal,
                    Some(target_sid.clone()),
                    Some(PrivateReveal {
                        target_session_id: target_sid,
                        card: revealed,
                    }),
                )
            }

            EffectPlan::BaronCompare { target } => {
                let target_sid = self.players[target].session_id.clone();
                let target_name = self.players[target].name.clone();
                let actor_card = self.players[actor].held_card().unwrap();
                let target_card = self.players[target].held_card().unwrap();

                let outcome = if actor_card > target_card {
                    self.eliminate(target);
                    self.push_log(
                        format!(
                            "{} ({}) beat {} ({}). {} is eliminated.",
                            actor_name, actor_card, target_name, target_card, target_name
                        ),
                        LogMeta::Baron {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            actor_card,
                            target_card,
                            outcome: BaronOutcome::TargetEliminated,
                        },
                    );
                    BaronOutcome::TargetEliminated
                } else if target_card > actor_card {
                    self.eliminate(actor);
                    self.push_log(
                        format!(
                            "{} ({}) beat {} ({}). {} is eliminated.",
                            target_name, target_card, actor_name, actor_card, actor_name
                        ),
                        LogMeta::Baron {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            actor_card,
                            target_card,
                            outcome: BaronOutcome::ActorEliminated,
                        },
                    );
                    BaronOutcome::ActorEliminated
                } else {
                    self.push_log(
                        format!("{} and {} tied ({}).", actor_name, target_name, actor_card),
                        LogMeta::Baron {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            actor_card,
                            target_card,
                            outcome: BaronOutcome::Tie,
                        },
                    );
                    BaronOutcome::Tie
                };
                (EffectOutcome::Baron { outcome }, Some(target_sid), None)
            }

            EffectPlan::Protect => {
                self.protected.insert(actor_sid.clone());
                self.push_log(
                    format!("{} is protected until their next turn.", actor_name),
                    LogMeta::Handmaid {
                        actor_session_id: actor_sid,
                    },
                );
                (EffectOutcome::HandmaidProtected, None, None)
            }

            EffectPlan::PrinceDiscard { target } => {
                let target_sid = self.players[target].session_id.clone();
                let target_name = self.players[target].name.clone();

                let discarded = self.players[target].hand.pop().unwrap();
                self.players[target].discards.push(discarded);
                self.discard_pile.push(discarded);

                if discarded == Card::Princess {
                    self.players[target].eliminated = true;
                    self.push_log(
                        format!("{} discarded Princess and is eliminated!", target_name),
                        LogMeta::PrinceElim {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                        },
                    );
                    (
                        EffectOutcome::PrinceDiscard {
                            discarded,
                            eliminated: true,
                        },
                        Some(target_sid),
                        None,
                    )
                } else {
                    // Replacement comes from the pile, or the face-down
                    // removed card when the pile is already empty.
                    let replacement = self
                        .deck
                        .draw()
                        .or_else(|| self.deck.take_removed_face_down());
                    if let Some(card) = replacement {
                        self.players[target].hand.push(card);
                    }
                    self.push_log(
                        format!(
                            "{} discarded {} and drew a new card.",
                            target_name, discarded
                        ),
                        LogMeta::Prince {
                            actor_session_id: actor_sid,
                            target_session_id: target_sid.clone(),
                            discarded,
                        },
                    );
                    (
                        EffectOutcome::PrinceDiscard {
                            discarded,
                            eliminated: false,
                        },
                        Some(target_sid),
                        None,
                    )
                }
            }

            EffectPlan::KingSwap { target } => {
                let target_sid = self.players[target].session_id.clone();
                let target_name = self.players[target].name.clone();
                let actor_hand = std::mem::take(&mut self.players[actor].hand);
                let target_hand = std::mem::replace(&mut self.players[target].hand, actor_hand);
                self.players[actor].hand = target_hand;
                self.push_log(
                    format!("{} and {} swapped hands.", actor_name, target_name),
                    LogMeta::King {
                        actor_session_id: actor_sid,
                        target_session_id: target_sid.clone(),
                    },
                );
                (EffectOutcome::KingSwap, Some(target_sid), None)
            }

            EffectPlan::Inert => (EffectOutcome::CountessPlayed, None, None),

            EffectPlan::SelfEliminate => {
                self.eliminate(actor);
                self.push_log(
                    format!("{} discarded Princess and is eliminated!", actor_name),
                    LogMeta::PrincessElim {
                        actor_session_id: actor_sid,
                    },
                );
                (EffectOutcome::PrincessDiscarded, None, None)
            }
        }
    }

    /// Knock a seat out of the round. Whatever they still hold goes to their
    /// discards face-up.
    fn eliminate(&mut self, index: usize) {
        self.players[index].eliminated = true;
        while let Some(card) = self.players[index].hand.pop() {
            self.players[index].discards.push(card);
            self.discard_pile.push(card);
        }
    }

    /// Move to the next non-eliminated seat and perform its start-of-turn
    /// draw.
    fn advance_turn(&mut self) {
        loop {
            self.current_player_index = (self.current_player_index + 1) % self.players.len();
            if !self.players[self.current_player_index].eliminated {
                break;
            }
        }
        self.start_turn_draw();
    }

    /// Draw into the current seat's hand. Protection ends at the start of the
    /// protected seat's own turn, never anyone else's.
    fn start_turn_draw(&mut self) {
        let sid = self.players[self.current_player_index].session_id.clone();
        if self.protected.remove(&sid) {
            let name = self.players[self.current_player_index].name.clone();
            self.push_log(
                format!("{}'s protection has ended.", name),
                LogMeta::ProtectionEnd {
                    actor_session_id: sid,
                },
            );
        }
        if let Some(card) = self.deck.draw() {
            self.players[self.current_player_index].hand.push(card);
        }
    }

    /// Deck exhaustion: highest held card wins, ties break by discard total,
    /// a still-tied round ends with no winner.
    fn resolve_reveal(&mut self) {
        let mut best_value = -1i32;
        let mut candidates: Vec<usize> = Vec::new();
        for (i, p) in self.players.iter().enumerate() {
            if p.eliminated {
                continue;
            }
            let value = p.held_card().map(|c| c.value() as i32).unwrap_or(-1);
            if value > best_value {
                best_value = value;
                candidates = vec![i];
            } else if value == best_value {
                candidates.push(i);
            }
        }

        if candidates.len() == 1 {
            let winner = &self.players[candidates[0]];
            let card = winner.held_card().unwrap();
            self.winner = Some(Winner {
                session_id: winner.session_id.clone(),
                name: winner.name.clone(),
            });
            let (name, sid) = (winner.name.clone(), winner.session_id.clone());
            self.push_log(
                format!("{} wins the round with {}.", name, card),
                LogMeta::WinHighest {
                    winner_session_id: sid,
                    card,
                },
            );
        } else {
            let mut best_sum = -1i64;
            let mut tie_winners: Vec<usize> = Vec::new();
            for &i in &candidates {
                let sum = self.players[i].discard_sum() as i64;
                if sum > best_sum {
                    best_sum = sum;
                    tie_winners = vec![i];
                } else if sum == best_sum {
                    tie_winners.push(i);
                }
            }

            if tie_winners.len() == 1 {
                let winner = &self.players[tie_winners[0]];
                self.winner = Some(Winner {
                    session_id: winner.session_id.clone(),
                    name: winner.name.clone(),
                });
                let (name, sid) = (winner.name.clone(), winner.session_id.clone());
                self.push_log(
                    format!("{} wins the tie-breaker (discard total {}).", name, best_sum),
                    LogMeta::WinTiebreak {
                        winner_session_id: sid,
                        discard_total: best_sum as u32,
                    },
                );
            } else {
                self.winner = None;
                self.push_log("Round ended in a tie.", LogMeta::Tie);
            }
        }
        self.game_over = true;
    }

    fn push_log(&mut self, message: impl Into<String>, meta: LogMeta) {
        self.log.push(LogEntry::new(message, meta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(n: usize) -> Vec<Seat> {
        (0..n)
            .map(|i| Seat::new(format!("s{}", i), format!("Player {}", i + 1)))
            .collect()
    }

    #[test]
    fn test_new_rejects_bad_player_counts() {
        assert_eq!(GameState::new(seats(1)), Err(GameError::InvalidPlayerCount));
        assert_eq!(GameState::new(seats(5)), Err(GameError::InvalidPlayerCount));
    }

    #[test]
    fn test_new_deals_and_draws_for_first_seat() {
        for n in 2..=4 {
            let game = GameState::new(seats(n)).unwrap();
            assert_eq!(game.players[0].hand.len(), 2);
            for p in &game.players[1..] {
                assert_eq!(p.hand.len(), 1);
            }
            assert_eq!(game.total_cards(), 16);
        }
    }

    #[test]
    fn test_countess_forced() {
        let mut game = GameState::new(seats(2)).unwrap();
        game.players[0].hand = vec![Card::Countess, Card::King];
        assert!(game.countess_forced(0));

        game.players[0].hand = vec![Card::Prince, Card::Countess];
        assert!(game.countess_forced(0));

        game.players[0].hand = vec![Card::Countess, Card::Guard];
        assert!(!game.countess_forced(0));
    }

    #[test]
    fn test_valid_targets_excludes_protected_and_eliminated() {
        let mut game = GameState::new(seats(4)).unwrap();
        game.players[1].eliminated = true;
        game.protected.insert("s2".to_string());

        assert_eq!(game.valid_targets(0), vec![3]);
    }

    #[test]
    fn test_reset_keeps_seats_and_rebuilds_round() {
        let mut game = GameState::new(seats(3)).unwrap();
        game.players[1].eliminated = true;
        game.game_over = true;

        game.reset();

        assert_eq!(game.players.len(), 3);
        assert_eq!(game.players[1].session_id, "s1");
        assert!(!game.players[1].eliminated);
        assert!(!game.game_over);
        assert_eq!(game.total_cards(), 16);
        assert_eq!(game.players[0].hand.len(), 2);
    }
}
