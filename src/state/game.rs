use super::AppState;
use crate::error::{GameError, GameResult};
use crate::protocol::{ActionResponse, RoomAction, RoomEvent, RoomView};
use crate::types::*;

impl AppState {
    /// Route an action to its handler
    pub async fn dispatch(&self, code: &str, action: RoomAction) -> GameResult<ActionResponse> {
        tracing::debug!(%code, player_id = action.player_id(), ?action, "Room action");
        match action {
            RoomAction::Start { player_id } => {
                let room = self.start(code, &player_id).await?;
                Ok(ActionResponse::room(room))
            }
            RoomAction::Catch {
                player_id,
                target_id,
            } => {
                let (room, outcome) = self.catch(code, &player_id, &target_id).await?;
                Ok(ActionResponse::with_outcome(room, outcome))
            }
            RoomAction::Sound {
                player_id,
                sound_id,
            } => {
                self.sound(code, &player_id, sound_id).await?;
                Ok(ActionResponse::Ok { ok: true })
            }
            RoomAction::Reset { player_id } => {
                let room = self.reset(code, &player_id).await?;
                Ok(ActionResponse::room(room))
            }
            RoomAction::Leave { player_id } => self.leave(code, &player_id).await,
        }
    }

    /// Hand out words and begin the game. Host only.
    pub async fn start(&self, code: &str, requester_id: &str) -> GameResult<RoomView> {
        let updated = self
            .repo
            .update(code, |room| {
                room.check_can_start(requester_id)?;
                let player_ids: Vec<PlayerId> = room.players.keys().cloned().collect();
                let words = self.vocabulary.assign(&player_ids, &mut rand::rng())?;
                room.start(requester_id, words)
            })
            .await?
            .ok_or_else(GameError::room_not_found)?;
        let room = updated.room;

        tracing::info!(code = %room.code, players = room.players.len(), "Game started");
        self.publish(
            &room.code,
            RoomEvent::GameStarted {
                room: RoomView::public(&room),
            },
        )
        .await;

        Ok(RoomView::for_viewer(&room, Some(requester_id)))
    }

    /// Eliminate `target_id` for saying their word
    pub async fn catch(
        &self,
        code: &str,
        catcher_id: &str,
        target_id: &str,
    ) -> GameResult<(RoomView, GameOutcome)> {
        let updated = self
            .repo
            .update(code, |room| {
                if !room.players.contains_key(catcher_id) {
                    return Err(GameError::player_not_found());
                }
                room.eliminate(target_id)
            })
            .await?
            .ok_or_else(GameError::room_not_found)?;
        let room = updated.room;
        let outcome = updated.value;

        tracing::info!(
            code = %room.code,
            catcher_id,
            target_id,
            remaining = room.active_count(),
            "Player caught"
        );
        if let Some(winner) = &outcome.winner {
            tracing::info!(code = %room.code, winner = %winner, "Game over");
        } else if outcome.game_ended {
            tracing::info!(code = %room.code, "Game over without a winner");
        }

        self.publish(
            &room.code,
            RoomEvent::PlayerCaught {
                room: RoomView::public(&room),
                target_id: target_id.to_string(),
                catcher_id: catcher_id.to_string(),
                game_ended: outcome.game_ended,
                winner: outcome.winner.clone(),
            },
        )
        .await;

        Ok((RoomView::for_viewer(&room, Some(catcher_id)), outcome))
    }

    /// Blast a sound to the room. Nothing is written.
    pub async fn sound(&self, code: &str, sender_id: &str, sound_id: SoundId) -> GameResult<()> {
        let room = self.member_room(code, sender_id).await?;

        tracing::debug!(code = %room.code, sender_id, ?sound_id, "Sound");
        self.publish(
            &room.code,
            RoomEvent::Sound {
                sender_id: sender_id.to_string(),
                sound_id,
            },
        )
        .await;
        Ok(())
    }

    /// Back to the lobby with everybody still in
    pub async fn reset(&self, code: &str, requester_id: &str) -> GameResult<RoomView> {
        let updated = self
            .repo
            .update(code, |room| {
                if !room.players.contains_key(requester_id) {
                    return Err(GameError::player_not_found());
                }
                room.reset();
                Ok(())
            })
            .await?
            .ok_or_else(GameError::room_not_found)?;
        let room = updated.room;

        tracing::info!(code = %room.code, requester_id, "Room reset");
        self.publish(
            &room.code,
            RoomEvent::RoomReset {
                room: RoomView::public(&room),
            },
        )
        .await;

        Ok(RoomView::for_viewer(&room, Some(requester_id)))
    }
}
