mod game;
mod lobby;

use crate::credential::{Credential, CredentialIssuer};
use crate::error::GameResult;
use crate::gateway::{publish_best_effort, Gateway, LocalGateway};
use crate::protocol::RoomEvent;
use crate::store::RoomRepository;
use crate::types::*;
use crate::words::Vocabulary;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
///
/// Holds no rooms itself: every read and write goes through the repository,
/// so any number of instances can serve the same rooms.
#[derive(Clone)]
pub struct AppState {
    pub repo: RoomRepository,
    pub vocabulary: Arc<Vocabulary>,
    pub gateway: Arc<dyn Gateway>,
    /// Set when events are fanned out in-process and served over `/ws`
    pub local: Option<Arc<LocalGateway>>,
    pub credentials: CredentialIssuer,
}

impl AppState {
    pub fn new(
        repo: RoomRepository,
        vocabulary: Vocabulary,
        gateway: Arc<dyn Gateway>,
        credentials: CredentialIssuer,
    ) -> Self {
        Self {
            repo,
            vocabulary: Arc::new(vocabulary),
            gateway,
            local: None,
            credentials,
        }
    }

    /// State wired to the in-process gateway, which also serves `/ws`
    pub fn with_local_gateway(
        repo: RoomRepository,
        vocabulary: Vocabulary,
        credentials: CredentialIssuer,
    ) -> Self {
        let local = Arc::new(LocalGateway::new());
        Self {
            repo,
            vocabulary: Arc::new(vocabulary),
            gateway: local.clone(),
            local: Some(local),
            credentials,
        }
    }

    /// Everything in memory with the built-in words
    pub fn in_memory() -> GameResult<Self> {
        Ok(Self::with_local_gateway(
            RoomRepository::in_memory(),
            Vocabulary::builtin()?,
            CredentialIssuer::ephemeral(Duration::from_secs(60 * 60))?,
        ))
    }

    /// Push an event to everyone subscribed to the room
    pub(crate) async fn publish(&self, code: &str, event: RoomEvent) {
        publish_best_effort(self.gateway.as_ref(), &room_topic(code), &event).await;
    }

    pub(crate) fn member_credential(&self, code: &str, player_id: &str) -> GameResult<Credential> {
        self.credentials
            .issue(player_id, &room_topic(code), MEMBER_CAPABILITIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use crate::protocol::{ActionResponse, RoomAction};

    async fn room_with_guests(
        state: &AppState,
        guests: &[&str],
    ) -> (RoomCode, PlayerId, Vec<PlayerId>) {
        let created = state.create_room("Host").await.unwrap();
        let code = created.room.code.clone();
        let mut ids = Vec::new();
        for name in guests {
            let joined = state.join_room(&code, name).await.unwrap();
            ids.push(joined.player_id);
        }
        (code, created.player_id, ids)
    }

    #[tokio::test]
    async fn test_create_room() {
        let state = AppState::in_memory().unwrap();
        let created = state.create_room("  Alice ").await.unwrap();

        assert_eq!(created.room.status, RoomStatus::Lobby);
        assert_eq!(created.room.host_id, created.player_id);
        assert_eq!(created.room.players[&created.player_id].name, "Alice");
        assert_eq!(created.credential.topic, room_topic(&created.room.code));
        assert_eq!(created.credential.client_id, created.player_id);
    }

    #[tokio::test]
    async fn test_create_room_rejects_bad_names() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            state.create_room("   ").await,
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            state.create_room(&"x".repeat(21)).await,
            Err(GameError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_join_room_is_case_insensitive() {
        let state = AppState::in_memory().unwrap();
        let created = state.create_room("Host").await.unwrap();

        let joined = state
            .join_room(&created.room.code.to_lowercase(), "Bob")
            .await
            .unwrap();
        assert_eq!(joined.room.players.len(), 2);
        assert!(!joined.room.players[&joined.player_id].is_host);
    }

    #[tokio::test]
    async fn test_join_unknown_room() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            state.join_room("ZZZZ", "Bob").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_join_after_start_fails() {
        let state = AppState::in_memory().unwrap();
        let (code, host, _) = room_with_guests(&state, &["Bob"]).await;
        state.start(&code, &host).await.unwrap();

        assert!(matches!(
            state.join_room(&code, "Late").await,
            Err(GameError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_room_full() {
        let state = AppState::in_memory().unwrap();
        let created = state.create_room("Host").await.unwrap();
        for i in 1..MAX_PLAYERS {
            state
                .join_room(&created.room.code, &format!("P{}", i))
                .await
                .unwrap();
        }
        assert!(matches!(
            state.join_room(&created.room.code, "Extra").await,
            Err(GameError::RoomFull(MAX_PLAYERS))
        ));
    }

    #[tokio::test]
    async fn test_start_assigns_distinct_words() {
        let state = AppState::in_memory().unwrap();
        let (code, host, guests) = room_with_guests(&state, &["Bob", "Cat"]).await;

        let view = state.start(&code, &host).await.unwrap();
        assert_eq!(view.status, RoomStatus::Playing);
        // The host only sees their own word
        assert_eq!(view.words.len(), 1);
        assert!(view.words.contains_key(&host));

        let room = state.repo.get(&code).await.unwrap().unwrap();
        let mut words: Vec<&String> = room.words.values().collect();
        words.sort();
        words.dedup();
        assert_eq!(words.len(), 3);
        for id in guests.iter().chain([&host]) {
            assert!(state.vocabulary.contains(&room.words[id]));
        }
    }

    #[tokio::test]
    async fn test_start_checks_order() {
        let state = AppState::in_memory().unwrap();
        let (code, host, _) = room_with_guests(&state, &[]).await;

        // Too few players
        assert!(matches!(
            state.start(&code, &host).await,
            Err(GameError::InvalidState(_))
        ));

        let bob = state.join_room(&code, "Bob").await.unwrap().player_id;
        assert!(matches!(
            state.start(&code, &bob).await,
            Err(GameError::Forbidden(_))
        ));

        state.start(&code, &host).await.unwrap();
        // Already playing beats "not the host"
        assert!(matches!(
            state.start(&code, &bob).await,
            Err(GameError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_catch_until_winner() {
        let state = AppState::in_memory().unwrap();
        let (code, host, guests) = room_with_guests(&state, &["Bob", "Cat"]).await;
        state.start(&code, &host).await.unwrap();

        let (_, outcome) = state.catch(&code, &host, &guests[0]).await.unwrap();
        assert!(!outcome.game_ended);

        let (view, outcome) = state.catch(&code, &host, &guests[1]).await.unwrap();
        assert!(outcome.game_ended);
        assert_eq!(outcome.winner.as_deref(), Some(host.as_str()));
        assert!(view.game_over);
        assert_eq!(view.words.len(), 3);
    }

    #[tokio::test]
    async fn test_catch_rejections() {
        let state = AppState::in_memory().unwrap();
        let (code, host, guests) = room_with_guests(&state, &["Bob", "Cat"]).await;

        assert!(matches!(
            state.catch(&code, &host, &guests[0]).await,
            Err(GameError::InvalidState(_))
        ));

        state.start(&code, &host).await.unwrap();
        state.catch(&code, &host, &guests[0]).await.unwrap();
        assert!(matches!(
            state.catch(&code, &host, &guests[0]).await,
            Err(GameError::InvalidTarget(_))
        ));
        assert!(matches!(
            state.catch(&code, &host, "ghost").await,
            Err(GameError::InvalidTarget(_))
        ));
        assert!(matches!(
            state.catch("ZZZZ", &host, &guests[1]).await,
            Err(GameError::NotFound(_))
        ));
        // Only members can catch
        assert!(matches!(
            state.catch(&code, "stranger", &guests[1]).await,
            Err(GameError::NotFound(_))
        ));
        let room = state.repo.get(&code).await.unwrap().unwrap();
        assert!(!room.players[&guests[1]].is_eliminated);
    }

    #[tokio::test]
    async fn test_reset_restores_lobby() {
        let state = AppState::in_memory().unwrap();
        let (code, host, guests) = room_with_guests(&state, &["Bob", "Cat"]).await;
        state.start(&code, &host).await.unwrap();
        state.catch(&code, &host, &guests[0]).await.unwrap();

        let view = state.reset(&code, &guests[1]).await.unwrap();
        assert_eq!(view.status, RoomStatus::Lobby);
        assert!(view.words.is_empty());
        assert_eq!(view.players.len(), 3);
        assert!(view.players.values().all(|p| !p.is_eliminated));
        assert_eq!(view.host_id, host);

        let room = state.repo.get(&code).await.unwrap().unwrap();
        assert!(room.words.is_empty());

        assert!(matches!(
            state.reset(&code, "stranger").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sound_requires_membership() {
        let state = AppState::in_memory().unwrap();
        let (code, host, _) = room_with_guests(&state, &["Bob"]).await;

        assert!(state.sound(&code, &host, SoundId::Airhorn).await.is_ok());
        assert!(matches!(
            state.sound(&code, "stranger", SoundId::Airhorn).await,
            Err(GameError::NotFound(_))
        ));
        assert!(matches!(
            state.sound("ZZZZ", &host, SoundId::Airhorn).await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_host_leaving_closes_room() {
        let state = AppState::in_memory().unwrap();
        let (code, host, _) = room_with_guests(&state, &["Bob"]).await;

        let response = state
            .dispatch(&code, RoomAction::Leave { player_id: host })
            .await
            .unwrap();
        assert!(matches!(response, ActionResponse::Closed { closed: true, .. }));
        assert!(state.repo.get(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guest_leaving_mid_game_can_end_it() {
        let state = AppState::in_memory().unwrap();
        let (code, host, guests) = room_with_guests(&state, &["Bob"]).await;
        state.start(&code, &host).await.unwrap();

        let response = state
            .dispatch(
                &code,
                RoomAction::Leave {
                    player_id: guests[0].clone(),
                },
            )
            .await
            .unwrap();
        match response {
            ActionResponse::Room {
                room,
                game_ended,
                winner,
            } => {
                assert_eq!(game_ended, Some(true));
                assert_eq!(winner, Some(host.clone()));
                assert_eq!(room.players.len(), 1);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_leave_unknown_player() {
        let state = AppState::in_memory().unwrap();
        let (code, _, _) = room_with_guests(&state, &[]).await;
        assert!(matches!(
            state.leave(&code, "ghost").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_credential_only_for_members() {
        let state = AppState::in_memory().unwrap();
        let (code, host, _) = room_with_guests(&state, &[]).await;

        let credential = state.issue_credential(&code, &host).await.unwrap();
        let claims = state.credentials.verify(&credential.token).unwrap();
        assert!(claims.allows(&room_topic(&code), Capability::Subscribe));

        assert!(matches!(
            state.issue_credential(&code, "stranger").await,
            Err(GameError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let state = AppState::in_memory().unwrap();
        let created = state.create_room("Host").await.unwrap();
        let code = created.room.code.clone();
        let local = state.local.clone().unwrap();
        let mut rx = local.subscribe(&room_topic(&code)).await;

        let bob = state.join_room(&code, "Bob").await.unwrap().player_id;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "player-joined");

        state.start(&code, &created.player_id).await.unwrap();
        match rx.recv().await.unwrap() {
            RoomEvent::GameStarted { room } => assert!(room.words.is_empty()),
            other => panic!("unexpected event {:?}", other),
        }

        state.catch(&code, &created.player_id, &bob).await.unwrap();
        match rx.recv().await.unwrap() {
            RoomEvent::PlayerCaught {
                room,
                game_ended,
                winner,
                ..
            } => {
                assert!(game_ended);
                assert_eq!(winner, Some(created.player_id.clone()));
                // Game over reveals every word to everybody
                assert_eq!(room.words.len(), 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
