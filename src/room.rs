//! Pure room transitions.
//!
//! Every function here mutates a `Room` in place or fails without touching
//! it. Persistence and notification live in `state`.

use crate::error::{GameError, GameResult};
use crate::types::*;
use chrono::Utc;
use std::collections::HashMap;

/// Validate and clean a user-supplied display name
pub fn clean_player_name(name: &str) -> GameResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::InvalidInput("Player name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(GameError::InvalidInput(format!(
            "Player name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

/// What happened to the room when a player left
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The player is gone, the room carries on
    Left(GameOutcome),
    /// The room has no reason to exist anymore
    Closed,
}

impl Room {
    /// A fresh lobby with the host as sole player
    pub fn new(code: RoomCode, host_id: PlayerId, host_name: String) -> Self {
        let host = Player::new(host_id.clone(), host_name, true);
        Self {
            code,
            status: RoomStatus::Lobby,
            host_id: host_id.clone(),
            players: HashMap::from([(host_id, host)]),
            words: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| !p.is_eliminated)
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    /// A game is over once at most one player is left standing
    pub fn is_game_over(&self) -> bool {
        self.status == RoomStatus::Playing && self.active_count() <= 1
    }

    /// Compute whether the game just ended and who won
    pub fn outcome(&self) -> GameOutcome {
        if !self.is_game_over() {
            return GameOutcome::ongoing();
        }
        GameOutcome {
            game_ended: true,
            winner: self.active_players().next().map(|p| p.id.clone()),
        }
    }

    pub fn add_player(&mut self, id: PlayerId, name: String) -> GameResult<&Player> {
        if self.status != RoomStatus::Lobby {
            return Err(GameError::InvalidState(
                "Game has already started".to_string(),
            ));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::RoomFull(MAX_PLAYERS));
        }
        if self.players.contains_key(&id) {
            return Err(GameError::InvalidInput(format!(
                "Player {} is already in this room",
                id
            )));
        }

        let player = Player::new(id.clone(), name, false);
        Ok(self.players.entry(id).or_insert(player))
    }

    /// Move from lobby to playing with the given word assignment.
    ///
    /// The assignment must cover exactly the current player set.
    pub fn start(
        &mut self,
        requester_id: &str,
        words: HashMap<PlayerId, String>,
    ) -> GameResult<()> {
        self.check_can_start(requester_id)?;
        if words.len() != self.players.len() || !self.players.keys().all(|id| words.contains_key(id))
        {
            return Err(GameError::InvalidState(
                "Word assignment does not match the player list".to_string(),
            ));
        }

        self.words = words;
        self.status = RoomStatus::Playing;
        Ok(())
    }

    pub fn check_can_start(&self, requester_id: &str) -> GameResult<()> {
        if self.status != RoomStatus::Lobby {
            return Err(GameError::InvalidState(
                "Game has already started".to_string(),
            ));
        }
        if requester_id != self.host_id {
            return Err(GameError::Forbidden(
                "Only the host can start the game".to_string(),
            ));
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(GameError::InvalidState(format!(
                "Need at least {} players to start",
                MIN_PLAYERS_TO_START
            )));
        }
        Ok(())
    }

    /// Eliminate `target_id` and report whether that ended the game.
    ///
    /// The outcome is computed on the updated player set, so callers that
    /// persist the room atomically never see two different endings.
    pub fn eliminate(&mut self, target_id: &str) -> GameResult<GameOutcome> {
        if self.status != RoomStatus::Playing {
            return Err(GameError::InvalidState("Game not in progress".to_string()));
        }
        let target = self
            .players
            .get_mut(target_id)
            .filter(|p| !p.is_eliminated)
            .ok_or_else(|| {
                GameError::InvalidTarget("Player not found or already eliminated".to_string())
            })?;

        target.is_eliminated = true;
        Ok(self.outcome())
    }

    /// Back to the lobby with the same players
    pub fn reset(&mut self) {
        self.status = RoomStatus::Lobby;
        self.words.clear();
        for player in self.players.values_mut() {
            player.is_eliminated = false;
        }
    }

    /// Remove a player. The host leaving closes the room.
    pub fn remove_player(&mut self, player_id: &str) -> GameResult<Departure> {
        if self.players.remove(player_id).is_none() {
            return Err(GameError::player_not_found());
        }
        self.words.remove(player_id);

        if player_id == self.host_id || self.players.is_empty() {
            self.players.clear();
            self.words.clear();
            return Ok(Departure::Closed);
        }
        Ok(Departure::Left(self.outcome()))
    }
}
