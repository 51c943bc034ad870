use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rooms_expired: usize,
    pub topics_pruned: usize,
}

/// Drop expired rooms and idle event topics once
pub async fn sweep_once(state: &AppState) -> SweepReport {
    let rooms_expired = match state.repo.store().purge_expired().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!("Failed to purge expired rooms: {}", e);
            0
        }
    };
    let topics_pruned = match &state.local {
        Some(local) => local.prune().await,
        None => 0,
    };

    SweepReport {
        rooms_expired,
        topics_pruned,
    }
}

/// Spawn a background task that sweeps every `every`
pub fn spawn_room_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;

            let report = sweep_once(&state).await;
            if report.rooms_expired > 0 || report.topics_pruned > 0 {
                tracing::debug!(
                    rooms_expired = report.rooms_expired,
                    topics_pruned = report.topics_pruned,
                    "Sweep finished"
                );
            }
        }
    })
}
