use super::{CasOutcome, RoomStore, Versioned};
use crate::error::{GameError, GameResult};
use crate::types::Room;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    room: Room,
    version: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Single-instance room store backed by a process-local map.
///
/// Writes happen under the map's write lock, which is what makes
/// compare-and-swap atomic here. Versions come from one counter for the
/// whole store so a recycled code never reuses an old version.
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, Entry>>,
    next_version: AtomicU64,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of records held, live or not
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

fn expiry(now: Instant, ttl: Duration) -> GameResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| GameError::Configuration(format!("room TTL {:?} is too long", ttl)))
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn insert_new(&self, room: &Room, ttl: Duration) -> GameResult<bool> {
        let now = Instant::now();
        let expires_at = expiry(now, ttl)?;
        let mut rooms = self.rooms.write().await;

        if rooms.get(&room.code).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }

        let entry = Entry {
            room: room.clone(),
            version: self.bump_version(),
            expires_at,
        };
        rooms.insert(room.code.clone(), entry);
        Ok(true)
    }

    async fn load(&self, code: &str) -> GameResult<Option<Versioned<Room>>> {
        let now = Instant::now();
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(code)
            .filter(|e| e.is_live(now))
            .map(|e| Versioned {
                value: e.room.clone(),
                version: e.version,
            }))
    }

    async fn compare_and_swap(
        &self,
        code: &str,
        expected_version: u64,
        room: &Room,
        ttl: Duration,
    ) -> GameResult<CasOutcome> {
        let now = Instant::now();
        let expires_at = expiry(now, ttl)?;
        let mut rooms = self.rooms.write().await;

        let Some(entry) = rooms.get_mut(code).filter(|e| e.is_live(now)) else {
            return Ok(CasOutcome::Missing);
        };
        if entry.version != expected_version {
            return Ok(CasOutcome::Conflict);
        }

        entry.room = room.clone();
        entry.version = self.bump_version();
        entry.expires_at = expires_at;
        Ok(CasOutcome::Committed(entry.version))
    }

    async fn delete_if_version(&self, code: &str, expected_version: u64) -> GameResult<CasOutcome> {
        let now = Instant::now();
        let mut rooms = self.rooms.write().await;

        let version = match rooms.get(code).filter(|e| e.is_live(now)) {
            None => return Ok(CasOutcome::Missing),
            Some(e) if e.version != expected_version => return Ok(CasOutcome::Conflict),
            Some(e) => e.version,
        };
        rooms.remove(code);
        Ok(CasOutcome::Committed(version))
    }

    async fn purge_expired(&self) -> GameResult<usize> {
        let now = Instant::now();
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, e| e.is_live(now));
        Ok(before - rooms.len())
    }
}
