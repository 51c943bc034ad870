use super::AppState;
use crate::credential::Credential;
use crate::error::{GameError, GameResult};
use crate::protocol::{ActionResponse, JoinResponse, RoomEvent, RoomView};
use crate::room::{clean_player_name, Departure};
use crate::types::*;

impl AppState {
    /// Open a new room with the caller as host
    pub async fn create_room(&self, player_name: &str) -> GameResult<JoinResponse> {
        let name = clean_player_name(player_name)?;
        let player_id = ulid::Ulid::new().to_string();

        let room = self.repo.create(player_id.clone(), name).await?;
        let credential = self.member_credential(&room.code, &player_id)?;

        tracing::info!(code = %room.code, %player_id, "Room created");
        Ok(JoinResponse {
            room: RoomView::for_viewer(&room, Some(&player_id)),
            player_id,
            credential,
        })
    }

    /// Add a player to a lobby
    pub async fn join_room(&self, code: &str, player_name: &str) -> GameResult<JoinResponse> {
        let name = clean_player_name(player_name)?;
        let player_id = ulid::Ulid::new().to_string();

        let updated = self
            .repo
            .update(code, |room| {
                room.add_player(player_id.clone(), name.clone())?;
                Ok(())
            })
            .await?
            .ok_or_else(GameError::room_not_found)?;
        let room = updated.room;

        tracing::info!(code = %room.code, %player_id, players = room.players.len(), "Player joined");
        self.publish(
            &room.code,
            RoomEvent::PlayerJoined {
                room: RoomView::public(&room),
                player_id: player_id.clone(),
            },
        )
        .await;

        let credential = self.member_credential(&room.code, &player_id)?;
        Ok(JoinResponse {
            room: RoomView::for_viewer(&room, Some(&player_id)),
            player_id,
            credential,
        })
    }

    /// Current room as `viewer` may see it
    pub async fn get_room(&self, code: &str, viewer: Option<&str>) -> GameResult<RoomView> {
        let room = self
            .repo
            .get(code)
            .await?
            .ok_or_else(GameError::room_not_found)?;
        Ok(RoomView::for_viewer(&room, viewer))
    }

    /// Re-issue the realtime credential of a room member
    pub async fn issue_credential(&self, code: &str, client_id: &str) -> GameResult<Credential> {
        let room = self.member_room(code, client_id).await?;
        self.member_credential(&room.code, client_id)
    }

    /// The room, provided `player_id` is still in it
    pub async fn member_room(&self, code: &str, player_id: &str) -> GameResult<Room> {
        let room = self
            .repo
            .get(code)
            .await?
            .ok_or_else(GameError::room_not_found)?;
        if !room.players.contains_key(player_id) {
            return Err(GameError::player_not_found());
        }
        Ok(room)
    }

    /// Remove a player; the host leaving closes the room
    pub async fn leave(&self, code: &str, player_id: &str) -> GameResult<ActionResponse> {
        let updated = self
            .repo
            .update(code, |room| room.remove_player(player_id))
            .await?
            .ok_or_else(GameError::room_not_found)?;
        let room = updated.room;

        match updated.value {
            Departure::Closed => {
                tracing::info!(code = %room.code, %player_id, "Room closed");
                self.publish(
                    &room.code,
                    RoomEvent::RoomClosed {
                        code: room.code.clone(),
                    },
                )
                .await;
                Ok(ActionResponse::Closed {
                    closed: true,
                    code: room.code,
                })
            }
            Departure::Left(outcome) => {
                tracing::info!(
                    code = %room.code,
                    %player_id,
                    game_ended = outcome.game_ended,
                    "Player left"
                );
                self.publish(
                    &room.code,
                    RoomEvent::PlayerLeft {
                        room: RoomView::public(&room),
                        left_id: player_id.to_string(),
                        game_ended: outcome.game_ended,
                        winner: outcome.winner.clone(),
                    },
                )
                .await;
                Ok(ActionResponse::with_outcome(
                    RoomView::public(&room),
                    outcome,
                ))
            }
        }
    }
}
