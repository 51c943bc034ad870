use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type GameResult<T> = Result<T, GameError>;

/// Everything a room operation can fail with
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InvalidTarget(String),

    #[error("Room is full (max {0} players)")]
    RoomFull(usize),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Concurrent update on room {0}, try again")]
    Conflict(String),

    #[error("Backend unavailable: {0}")]
    Infrastructure(String),

    #[error("Stored room {code} is corrupt: {reason}")]
    Corrupt { code: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl GameError {
    pub fn room_not_found() -> Self {
        Self::NotFound("Room not found".to_string())
    }

    pub fn player_not_found() -> Self {
        Self::NotFound("Player not found in this room".to_string())
    }

    /// Conflict and Infrastructure failures may succeed on a second try;
    /// everything else needs different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Infrastructure(_))
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InvalidTarget(_) => "INVALID_TARGET",
            Self::RoomFull(_) => "ROOM_FULL",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Conflict(_) => "CONFLICT",
            Self::Infrastructure(_) => "INFRASTRUCTURE",
            Self::Corrupt { .. } => "CORRUPT",
            Self::Configuration(_) => "CONFIGURATION",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidState(_) | Self::InvalidTarget(_) | Self::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::RoomFull(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Corrupt { .. } | Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GameError {
    fn from(e: sqlx::Error) -> Self {
        Self::Infrastructure(e.to_string())
    }
}

/// JSON error envelope
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
