//! Room persistence.
//!
//! Backends only know how to store versioned records with an expiry.
//! `RoomRepository` layers the room semantics on top: code allocation,
//! case-insensitive lookup, and the optimistic load/mutate/compare-and-swap
//! loop that every state change goes through.

mod memory;
mod postgres;

pub use memory::MemoryRoomStore;
pub use postgres::PostgresRoomStore;

use crate::code::{generate_room_code, normalize_room_code};
use crate::error::{GameError, GameResult};
use crate::types::*;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// How many fresh codes to try before giving up on room creation
const MAX_CODE_ATTEMPTS: usize = 32;

/// Compare-and-swap attempts per update. Every lost race means another
/// writer committed, so this comfortably covers a full room acting at once.
const MAX_CAS_ATTEMPTS: usize = 24;

/// Attempts for a single backend call failing with an infrastructure error
const MAX_BACKEND_ATTEMPTS: usize = 3;

/// A stored value and the revision it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Written; carries the new version
    Committed(u64),
    /// Someone else wrote first
    Conflict,
    /// The record is gone or expired
    Missing,
}

/// Storage backend for room records
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Store a brand new room unless a live room already has its code
    async fn insert_new(&self, room: &Room, ttl: Duration) -> GameResult<bool>;

    /// Load a live room. Reading never extends its TTL.
    async fn load(&self, code: &str) -> GameResult<Option<Versioned<Room>>>;

    /// Replace the room if it is still at `expected_version`, resetting its TTL
    async fn compare_and_swap(
        &self,
        code: &str,
        expected_version: u64,
        room: &Room,
        ttl: Duration,
    ) -> GameResult<CasOutcome>;

    /// Delete the room if it is still at `expected_version`
    async fn delete_if_version(&self, code: &str, expected_version: u64) -> GameResult<CasOutcome>;

    /// Drop expired records, returning how many were removed
    async fn purge_expired(&self) -> GameResult<usize>;
}

/// Result of a successful `update`
#[derive(Debug, Clone)]
pub struct Updated<T> {
    /// The room as committed (or as it was when it was closed)
    pub room: Room,
    /// Whatever the mutation returned
    pub value: T,
    /// The mutation emptied the room and the record was deleted
    pub closed: bool,
}

/// The only sanctioned way to read and write rooms
#[derive(Clone)]
pub struct RoomRepository {
    store: Arc<dyn RoomStore>,
    ttl: Duration,
}

impl RoomRepository {
    pub fn new(store: Arc<dyn RoomStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRoomStore::new()), ROOM_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    /// Create a lobby with the host as its only player under a fresh code
    pub async fn create(&self, host_id: PlayerId, host_name: String) -> GameResult<Room> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let room = Room::new(generate_room_code(), host_id.clone(), host_name.clone());
            let inserted = match self.store.insert_new(&room, self.ttl).await {
                Ok(inserted) => inserted,
                Err(GameError::Infrastructure(msg)) => {
                    tracing::warn!(code = %room.code, "Room insert unacknowledged, checking: {}", msg);
                    self.confirm_write(&room.code, Some(&room), GameError::Infrastructure(msg))
                        .await?;
                    true
                }
                Err(e) => return Err(e),
            };
            if inserted {
                return Ok(room);
            }
            tracing::debug!(code = %room.code, "Room code collision, retrying");
        }
        Err(GameError::Infrastructure(
            "could not allocate a free room code".to_string(),
        ))
    }

    /// Look up a live room; codes are case-insensitive
    pub async fn get(&self, code: &str) -> GameResult<Option<Room>> {
        let Some(code) = normalize_room_code(code) else {
            return Ok(None);
        };
        let loaded = with_backend_retry(|| self.store.load(&code)).await?;
        Ok(loaded.map(|v| v.value))
    }

    /// Apply `mutation` to the room and commit it atomically.
    ///
    /// The mutation sees an owned copy of the room; if it fails nothing is
    /// written. When another writer commits in between, the room is reloaded
    /// and the mutation re-applied to the fresh copy. Returns None when the
    /// room does not exist.
    pub async fn update<T, F>(&self, code: &str, mut mutation: F) -> GameResult<Option<Updated<T>>>
    where
        F: FnMut(&mut Room) -> GameResult<T>,
    {
        let Some(code) = normalize_room_code(code) else {
            return Ok(None);
        };

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(current) = with_backend_retry(|| self.store.load(&code)).await? else {
                return Ok(None);
            };

            let mut room = current.value.clone();
            let value = mutation(&mut room)?;

            let closed = room.players.is_empty();
            // Never retried as-is; see `confirm_write`
            let written = if closed {
                self.store.delete_if_version(&code, current.version).await
            } else {
                self.store
                    .compare_and_swap(&code, current.version, &room, self.ttl)
                    .await
            };
            let outcome = match written {
                Ok(outcome) => outcome,
                Err(GameError::Infrastructure(msg)) => {
                    tracing::warn!(%code, "Room write unacknowledged, checking: {}", msg);
                    let intended = (!closed).then_some(&room);
                    self.confirm_write(&code, intended, GameError::Infrastructure(msg))
                        .await?
                }
                Err(e) => return Err(e),
            };

            match outcome {
                CasOutcome::Committed(_) => {
                    return Ok(Some(Updated {
                        room: if closed { current.value } else { room },
                        value,
                        closed,
                    }));
                }
                CasOutcome::Missing => return Ok(None),
                CasOutcome::Conflict => {
                    tracing::debug!(%code, attempt, "Concurrent room update, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
            }
        }

        tracing::warn!(%code, "Giving up on room update after repeated conflicts");
        Err(GameError::Conflict(code))
    }

    /// Find out whether a write whose reply was lost went through.
    ///
    /// `intended` is the room that was written, or None for a delete. The
    /// write counts as committed when the stored state is exactly what it
    /// would have produced; otherwise the original `error` is returned.
    async fn confirm_write(
        &self,
        code: &str,
        intended: Option<&Room>,
        error: GameError,
    ) -> GameResult<CasOutcome> {
        let stored = with_backend_retry(|| self.store.load(code)).await?;
        match (intended, stored) {
            (Some(room), Some(stored)) if stored.value == *room => {
                Ok(CasOutcome::Committed(stored.version))
            }
            (None, None) => Ok(CasOutcome::Committed(0)),
            _ => Err(error),
        }
    }
}

/// Retry a backend call a few times when it fails for infrastructure reasons
async fn with_backend_retry<T, F, Fut>(mut call: F) -> GameResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GameResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Err(GameError::Infrastructure(msg)) if attempt < MAX_BACKEND_ATTEMPTS => {
                tracing::warn!(attempt, "Room store call failed: {}", msg);
                tokio::time::sleep(backoff(attempt)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Short jittered backoff so racing writers spread out
fn backoff(attempt: usize) -> Duration {
    let base = 2u64.saturating_pow(attempt.min(6) as u32);
    let jitter = rand::rng().random_range(0..=base);
    Duration::from_millis(base + jitter)
}
