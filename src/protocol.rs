use crate::credential::Credential;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ========== Requests ==========

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(alias = "playerName")]
    pub player_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(alias = "roomCode")]
    pub room_code: String,
    #[serde(alias = "playerName")]
    pub player_name: String,
}

/// An action on an existing room, one variant per operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoomAction {
    Start {
        #[serde(alias = "playerId")]
        player_id: PlayerId,
    },
    Catch {
        /// The catcher
        #[serde(alias = "playerId", alias = "catcher_id", alias = "catcherId")]
        player_id: PlayerId,
        #[serde(alias = "targetId")]
        target_id: PlayerId,
    },
    Sound {
        #[serde(alias = "playerId")]
        player_id: PlayerId,
        #[serde(alias = "soundId")]
        sound_id: SoundId,
    },
    Reset {
        #[serde(alias = "playerId")]
        player_id: PlayerId,
    },
    Leave {
        #[serde(alias = "playerId")]
        player_id: PlayerId,
    },
}

impl RoomAction {
    /// The player issuing the action
    pub fn player_id(&self) -> &str {
        match self {
            Self::Start { player_id }
            | Self::Catch { player_id, .. }
            | Self::Sound { player_id, .. }
            | Self::Reset { player_id }
            | Self::Leave { player_id } => player_id,
        }
    }
}

// ========== Room snapshots ==========

/// A room as one particular client is allowed to see it.
///
/// While a game runs, `words` holds only the viewer's own word. Once the
/// game is over every word is revealed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomView {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub host_id: PlayerId,
    pub players: HashMap<PlayerId, Player>,
    pub words: HashMap<PlayerId, String>,
    pub created_at: DateTime<Utc>,
    pub game_over: bool,
}

impl RoomView {
    pub fn for_viewer(room: &Room, viewer: Option<&str>) -> Self {
        let game_over = room.is_game_over();
        let words = if game_over {
            room.words.clone()
        } else {
            viewer
                .and_then(|id| room.words.get_key_value(id))
                .map(|(id, word)| HashMap::from([(id.clone(), word.clone())]))
                .unwrap_or_default()
        };

        Self {
            code: room.code.clone(),
            status: room.status,
            host_id: room.host_id.clone(),
            players: room.players.clone(),
            words,
            created_at: room.created_at,
            game_over,
        }
    }

    /// Snapshot safe to broadcast to everybody in the room
    pub fn public(room: &Room) -> Self {
        Self::for_viewer(room, None)
    }
}

// ========== Responses ==========

/// Returned to whoever created or joined a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub room: RoomView,
    pub player_id: PlayerId,
    pub credential: Credential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room: RoomView,
}

/// Result of a room action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ActionResponse {
    /// Room state after the action; game fields are set for catch and leave
    Room {
        room: RoomView,
        #[serde(skip_serializing_if = "Option::is_none")]
        game_ended: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<PlayerId>,
    },
    /// The room no longer exists
    Closed { closed: bool, code: RoomCode },
    /// Ephemeral actions with nothing to report
    Ok { ok: bool },
}

impl ActionResponse {
    pub fn room(room: RoomView) -> Self {
        Self::Room {
            room,
            game_ended: None,
            winner: None,
        }
    }

    pub fn with_outcome(room: RoomView, outcome: GameOutcome) -> Self {
        Self::Room {
            room,
            game_ended: Some(outcome.game_ended),
            winner: outcome.winner,
        }
    }
}

// ========== Events ==========

/// Events published on a room's topic.
///
/// Clients replace their local snapshot with `room` rather than diffing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", content = "data", rename_all = "kebab-case")]
pub enum RoomEvent {
    PlayerJoined {
        room: RoomView,
        player_id: PlayerId,
    },
    GameStarted {
        room: RoomView,
    },
    PlayerCaught {
        room: RoomView,
        target_id: PlayerId,
        catcher_id: PlayerId,
        game_ended: bool,
        winner: Option<PlayerId>,
    },
    Sound {
        sender_id: PlayerId,
        sound_id: SoundId,
    },
    RoomReset {
        room: RoomView,
    },
    PlayerLeft {
        room: RoomView,
        left_id: PlayerId,
        game_ended: bool,
        winner: Option<PlayerId>,
    },
    RoomClosed {
        code: RoomCode,
    },
}

impl RoomEvent {
    /// Event name as seen on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "player-joined",
            Self::GameStarted { .. } => "game-started",
            Self::PlayerCaught { .. } => "player-caught",
            Self::Sound { .. } => "sound",
            Self::RoomReset { .. } => "room-reset",
            Self::PlayerLeft { .. } => "player-left",
            Self::RoomClosed { .. } => "room-closed",
        }
    }

    /// Event payload without the name wrapper
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}
