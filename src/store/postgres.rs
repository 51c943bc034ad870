use super::{CasOutcome, RoomStore, Versioned};
use crate::error::{GameError, GameResult};
use crate::types::Room;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;

/// Multi-instance room store on PostgreSQL.
///
/// Each row holds the JSON room, a version drawn from a sequence and an
/// expiry. Conditional writes are single statements guarded on the version,
/// so concurrent instances can't clobber each other.
#[derive(Clone)]
pub struct PostgresRoomStore {
    db: PgPool,
}

impl PostgresRoomStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connect a small pool and bring the schema up to date
    pub async fn connect(database_url: &str) -> GameResult<Self> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self::new(db);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> GameResult<()> {
        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
        MIGRATOR
            .run(&self.db)
            .await
            .map_err(|e| GameError::Infrastructure(format!("migration failed: {}", e)))
    }

    /// Version of the live row, if any
    async fn live_version(&self, code: &str) -> GameResult<Option<i64>> {
        let row = sqlx::query("SELECT version FROM rooms WHERE code = $1 AND expires_at > now()")
            .bind(code)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("version")))
    }

    /// A failed conditional write is either a lost race or a vanished room
    async fn classify_miss(&self, code: &str) -> GameResult<CasOutcome> {
        Ok(match self.live_version(code).await? {
            Some(_) => CasOutcome::Conflict,
            None => CasOutcome::Missing,
        })
    }
}

fn encode(room: &Room) -> GameResult<String> {
    serde_json::to_string(room).map_err(|e| GameError::Corrupt {
        code: room.code.clone(),
        reason: e.to_string(),
    })
}

fn decode(code: &str, payload: &str) -> GameResult<Room> {
    serde_json::from_str(payload).map_err(|e| GameError::Corrupt {
        code: code.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RoomStore for PostgresRoomStore {
    async fn insert_new(&self, room: &Room, ttl: Duration) -> GameResult<bool> {
        // An expired row with the same code is fair game
        let result = sqlx::query(
            r#"
            INSERT INTO rooms (code, payload, expires_at)
            VALUES ($1, $2, now() + $3 * interval '1 second')
            ON CONFLICT (code) DO UPDATE SET
                payload = EXCLUDED.payload,
                version = nextval('room_versions'),
                expires_at = EXCLUDED.expires_at
            WHERE rooms.expires_at <= now()
            "#,
        )
        .bind(&room.code)
        .bind(encode(room)?)
        .bind(ttl.as_secs_f64())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn load(&self, code: &str) -> GameResult<Option<Versioned<Room>>> {
        let row = sqlx::query(
            "SELECT payload, version FROM rooms WHERE code = $1 AND expires_at > now()",
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload")?;
        let version: i64 = row.try_get("version")?;

        Ok(Some(Versioned {
            value: decode(code, &payload)?,
            version: version as u64,
        }))
    }

    async fn compare_and_swap(
        &self,
        code: &str,
        expected_version: u64,
        room: &Room,
        ttl: Duration,
    ) -> GameResult<CasOutcome> {
        let row = sqlx::query(
            r#"
            UPDATE rooms SET
                payload = $3,
                version = nextval('room_versions'),
                expires_at = now() + $4 * interval '1 second'
            WHERE code = $1 AND version = $2 AND expires_at > now()
            RETURNING version
            "#,
        )
        .bind(code)
        .bind(expected_version as i64)
        .bind(encode(room)?)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(CasOutcome::Committed(row.try_get::<i64, _>("version")? as u64)),
            None => self.classify_miss(code).await,
        }
    }

    async fn delete_if_version(&self, code: &str, expected_version: u64) -> GameResult<CasOutcome> {
        let row = sqlx::query(
            r#"
            DELETE FROM rooms
            WHERE code = $1 AND version = $2 AND expires_at > now()
            RETURNING version
            "#,
        )
        .bind(code)
        .bind(expected_version as i64)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(CasOutcome::Committed(row.try_get::<i64, _>("version")? as u64)),
            None => self.classify_miss(code).await,
        }
    }

    async fn purge_expired(&self) -> GameResult<usize> {
        let result = sqlx::query("DELETE FROM rooms WHERE expires_at <= now()")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
