//! Runtime configuration from environment variables.

use crate::credential::MAX_CREDENTIAL_LIFETIME;
use crate::error::{GameError, GameResult};
use crate::types::{MAX_ROOM_TTL, ROOM_TTL};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(60 * 60);

/// Where rooms live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map; only correct with a single server instance
    Memory,
    Postgres { database_url: String },
}

/// How events reach clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayBackend {
    /// Built-in broadcast over `/ws`
    Local,
    /// Hosted pub/sub REST API
    Http { url: String, api_key: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub room_ttl: Duration,
    pub sweep_interval: Duration,
    pub gateway: GatewayBackend,
    /// None = random per-process secret
    pub credential_secret: Option<String>,
    pub credential_ttl: Duration,
    pub words_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000))),
            store: StoreBackend::Memory,
            room_ttl: ROOM_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            gateway: GatewayBackend::Local,
            credential_secret: None,
            credential_ttl: DEFAULT_CREDENTIAL_TTL,
            words_file: None,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_secs(key: &str, default: Duration) -> GameResult<Duration> {
    match env_string(key) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| GameError::Configuration(format!("{} must be a number of seconds", key))),
    }
}

/// Like `env_secs`, but zero and anything above `max` are rejected
fn env_secs_within(key: &str, default: Duration, max: Duration) -> GameResult<Duration> {
    let value = env_secs(key, default)?;
    if value.is_zero() || value > max {
        return Err(GameError::Configuration(format!(
            "{} must be between 1 and {} seconds",
            key,
            max.as_secs()
        )));
    }
    Ok(value)
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> GameResult<Self> {
        let defaults = Self::default();

        let bind_addr = match env_string("BIND_ADDR") {
            Some(addr) => addr
                .parse()
                .map_err(|_| GameError::Configuration(format!("invalid BIND_ADDR '{}'", addr)))?,
            None => defaults.bind_addr,
        };

        let store = match env_string("ROOM_STORE").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres {
                database_url: env_string("DATABASE_URL").ok_or_else(|| {
                    GameError::Configuration(
                        "ROOM_STORE=postgres requires DATABASE_URL".to_string(),
                    )
                })?,
            },
            Some(other) => {
                return Err(GameError::Configuration(format!(
                    "unknown ROOM_STORE '{}' (expected memory or postgres)",
                    other
                )))
            }
        };

        let gateway = match env_string("GATEWAY").as_deref() {
            None | Some("local") => GatewayBackend::Local,
            Some("http") => {
                let url = env_string("GATEWAY_URL").ok_or_else(|| {
                    GameError::Configuration("GATEWAY=http requires GATEWAY_URL".to_string())
                })?;
                let api_key = env_string("GATEWAY_KEY").ok_or_else(|| {
                    GameError::Configuration("GATEWAY=http requires GATEWAY_KEY".to_string())
                })?;
                GatewayBackend::Http { url, api_key }
            }
            Some(other) => {
                return Err(GameError::Configuration(format!(
                    "unknown GATEWAY '{}' (expected local or http)",
                    other
                )))
            }
        };

        let room_ttl = env_secs_within("ROOM_TTL_SECS", defaults.room_ttl, MAX_ROOM_TTL)?;
        let credential_ttl = env_secs_within(
            "CREDENTIAL_TTL_SECS",
            defaults.credential_ttl,
            MAX_CREDENTIAL_LIFETIME,
        )?;

        let sweep_interval = env_secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval)?;
        if sweep_interval.is_zero() {
            return Err(GameError::Configuration(
                "SWEEP_INTERVAL_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            store,
            room_ttl,
            sweep_interval,
            gateway,
            credential_secret: env_string("CREDENTIAL_SECRET"),
            credential_ttl,
            words_file: env_string("WORDS_FILE").map(PathBuf::from),
        })
    }
}
