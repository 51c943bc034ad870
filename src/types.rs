use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type RoomCode = String;

/// Maximum number of players in a single room
pub const MAX_PLAYERS: usize = 20;

/// Minimum number of players needed to start a game
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Maximum display name length, in characters
pub const MAX_NAME_CHARS: usize = 20;

/// Rooms are gone this long after their last write
pub const ROOM_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Upper bound for a configured room lifetime
pub const MAX_ROOM_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Playing,
    /// Never persisted; clients may use it for a finished game
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub is_eliminated: bool,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, is_host: bool) -> Self {
        Self {
            id,
            name,
            is_host,
            is_eliminated: false,
            joined_at: Utc::now(),
        }
    }
}

/// One game session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub host_id: PlayerId,
    pub players: HashMap<PlayerId, Player>,
    /// Secret word per player, only populated while playing
    #[serde(default)]
    pub words: HashMap<PlayerId, String>,
    pub created_at: DateTime<Utc>,
}

/// How a game ended after an elimination or a departure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    pub game_ended: bool,
    /// None when the game continues, or when nobody is left standing
    pub winner: Option<PlayerId>,
}

impl GameOutcome {
    pub fn ongoing() -> Self {
        Self {
            game_ended: false,
            winner: None,
        }
    }
}

/// Sounds a player can blast to the whole room
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SoundId {
    Airhorn,
    Sad,
    Drumroll,
    Fart,
    Laser,
    Applause,
}

/// Capabilities a scoped credential can grant on a room topic
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Subscribe,
    Publish,
    Presence,
}

/// Every capability a room member gets, and nothing more
pub const MEMBER_CAPABILITIES: &[Capability] = &[
    Capability::Subscribe,
    Capability::Publish,
    Capability::Presence,
];

/// Pub/sub topic for a room
pub fn room_topic(code: &str) -> String {
    format!("room:{}", code)
}

/// Room code a topic belongs to, if it is a room topic
pub fn topic_room_code(topic: &str) -> Option<&str> {
    topic.strip_prefix("room:").filter(|code| !code.is_empty())
}
