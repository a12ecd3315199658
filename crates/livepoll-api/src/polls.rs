use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use livepoll_db::StoreError;
use livepoll_gateway::snapshot::{build_snapshot, project};
use livepoll_types::api::CreatePollRequest;
use livepoll_types::models::PollSnapshot;

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::users::Pagination;

#[derive(Debug, Deserialize)]
pub struct CreatorQuery {
    pub creator_id: Uuid,
}

pub async fn create_poll(
    State(state): State<Arc<AppStateInner>>,
    Query(query): Query<CreatorQuery>,
    Json(req): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::Invalid("question must not be empty"));
    }
    if req.options.is_empty() {
        return Err(ApiError::Invalid("a poll needs at least one option"));
    }
    if req.options.iter().any(|o| o.text.trim().is_empty()) {
        return Err(ApiError::Invalid("option text must not be empty"));
    }

    let poll_id = Uuid::new_v4();
    let options: Vec<(String, String)> = req
        .options
        .iter()
        .map(|o| (Uuid::new_v4().to_string(), o.text.clone()))
        .collect();

    let db = state.db.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        db.create_poll(
            &poll_id.to_string(),
            &query.creator_id.to_string(),
            &req.question,
            req.is_published,
            &options,
        )?;
        build_snapshot(&db, poll_id)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_poll(
    State(state): State<Arc<AppStateInner>>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<PollSnapshot>, ApiError> {
    let db = state.db.clone();
    let snapshot = tokio::task::spawn_blocking(move || build_snapshot(&db, poll_id)).await??;

    Ok(Json(snapshot))
}

pub async fn list_polls(
    State(state): State<Arc<AppStateInner>>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let limit = page.limit.min(200);
    let snapshots = tokio::task::spawn_blocking(move || {
        let rows = db.list_published_polls(page.skip, limit)?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for poll in rows {
            let tallies = db.options_with_tallies(&poll.id)?;
            snapshots.push(project(poll, tallies));
        }
        Ok::<_, StoreError>(snapshots)
    })
    .await??;

    Ok(Json(snapshots))
}
