use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use livepoll_db::StoreError;
use livepoll_db::models::UserRow;
use livepoll_types::api::{CreateUserRequest, UserResponse};
use livepoll_types::time::parse_sqlite_datetime;

use crate::auth::{self, AppStateInner};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

pub async fn create_user(
    State(state): State<Arc<AppStateInner>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Invalid("name must not be empty"));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Invalid("email is not valid"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Invalid("password must be at least 8 characters"));
    }

    let password_hash = auth::hash_password(&req.password).map_err(|err| {
        error!("password hashing failed: {}", err);
        ApiError::Internal
    })?;

    let user_id = Uuid::new_v4();
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.create_user(&user_id.to_string(), &req.name, &req.email, &password_hash)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(to_response(row))))
}

pub async fn get_user(
    State(state): State<Arc<AppStateInner>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let row = tokio::task::spawn_blocking(move || db.get_user(&user_id.to_string()))
        .await??
        .ok_or_else(|| ApiError::Store(StoreError::UserNotFound(user_id.to_string())))?;

    Ok(Json(to_response(row)))
}

pub async fn list_users(
    State(state): State<Arc<AppStateInner>>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let limit = page.limit.min(200);
    let rows = tokio::task::spawn_blocking(move || db.list_users(page.skip, limit)).await??;

    let users: Vec<UserResponse> = rows.into_iter().map(to_response).collect();
    Ok(Json(users))
}

fn to_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt user id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: parse_sqlite_datetime(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on user '{}'", row.created_at, row.id);
            chrono::DateTime::default()
        }),
        name: row.name,
        email: row.email,
    }
}
