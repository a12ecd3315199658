use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use livepoll_gateway::snapshot::build_snapshot;
use livepoll_types::api::{CastVoteRequest, VoteResponse};
use livepoll_types::time::parse_sqlite_datetime;

use crate::auth::AppStateInner;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct VoterQuery {
    pub user_id: Uuid,
}

/// Record the vote (or its idempotent repeat), then rebuild the poll
/// snapshot and fan it out. The response depends only on the ledger
/// outcome — observer delivery failures stay in the gateway.
pub async fn cast_vote(
    State(state): State<Arc<AppStateInner>>,
    Query(query): Query<VoterQuery>,
    Json(req): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let vote_id = Uuid::new_v4();
    let db = state.db.clone();
    let user_key = query.user_id.to_string();
    let option_key = req.option_id.to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        db.cast_vote(&vote_id.to_string(), &user_key, &option_key)
    })
    .await??;

    let poll_id: Uuid = outcome.vote.poll_id.parse().unwrap_or_else(|e| {
        warn!(
            "Corrupt poll id '{}' on vote '{}': {}",
            outcome.vote.poll_id, outcome.vote.id, e
        );
        Uuid::default()
    });

    // Vote committed; snapshot + broadcast come after, even for the
    // idempotent repeat case.
    let db = state.db.clone();
    match tokio::task::spawn_blocking(move || build_snapshot(&db, poll_id)).await {
        Ok(Ok(snapshot)) => {
            let report = state.broadcaster.broadcast(poll_id, snapshot).await;
            debug!(
                "vote {} on poll {}: {} observers updated, {} dropped",
                outcome.vote.id, poll_id, report.delivered, report.dropped
            );
        }
        Ok(Err(err)) if err.is_not_found() => {
            // Poll vanished between commit and snapshot read; nothing to push
        }
        Ok(Err(err)) => error!("snapshot rebuild for poll {} failed: {}", poll_id, err),
        Err(err) => error!("snapshot task join error: {}", err),
    }

    Ok(Json(VoteResponse {
        user_id: query.user_id,
        option_id: req.option_id,
        poll_id,
        created_at: parse_sqlite_datetime(&outcome.vote.created_at).unwrap_or_else(|| {
            warn!(
                "Corrupt created_at '{}' on vote '{}'",
                outcome.vote.created_at, outcome.vote.id
            );
            chrono::DateTime::default()
        }),
    }))
}
