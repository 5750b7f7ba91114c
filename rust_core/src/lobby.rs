// rust_core/src/lobby.rs
// Find-or-create a match, then sit in the waiting room until an opponent joins.

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::MatchApi;
use crate::error::Result;
use crate::models::{MatchMode, MatchSnapshot, MatchStatus};

pub async fn find_match(
    api: &dyn MatchApi,
    deck_id: i64,
    mode: MatchMode,
) -> Result<MatchSnapshot> {
    let snapshot = api.find_match(deck_id, mode).await?;
    info!(
        match_id = snapshot.id,
        mode = mode.as_str(),
        status = ?snapshot.status,
        "matchmaking answered"
    );
    Ok(snapshot)
}

/// Polls the match every `every` until it leaves WAITING. Failed polls are
/// logged and retried on the next tick. Cancel by dropping the future.
pub async fn wait_for_start(
    api: &dyn MatchApi,
    snapshot: MatchSnapshot,
    every: Duration,
) -> MatchSnapshot {
    if snapshot.status != MatchStatus::Waiting {
        return snapshot;
    }
    let match_id = snapshot.id;
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match api.fetch_match(match_id).await {
            Ok(latest) if latest.status != MatchStatus::Waiting => {
                info!(match_id, status = ?latest.status, "opponent joined");
                return latest;
            }
            Ok(_) => debug!(match_id, "still waiting for an opponent"),
            Err(err) => warn!(match_id, error = %err, "waiting-room poll failed"),
        }
    }
}
