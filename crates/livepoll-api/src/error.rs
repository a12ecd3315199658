use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use livepoll_db::StoreError;

/// Rejected operations surface as JSON `{"error": ...}` with a mapped
/// status. Internal failures are logged here and keep a generic body.
#[derive(Debug)]
pub enum ApiError {
    /// Request failed validation before touching the store.
    Invalid(&'static str),
    Store(StoreError),
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("blocking task join error: {}", err);
        Self::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Store(err) if err.is_not_found() => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Store(
                err @ (StoreError::DuplicateVote { .. } | StoreError::AlreadyRegistered(_)),
            ) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Store(err) => {
                error!("store failure: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into()),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            status_of(ApiError::Store(StoreError::PollNotFound("p".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::DuplicateVote {
                user_id: "u".into(),
                poll_id: "p".into(),
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::AlreadyRegistered("e".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Invalid("nope")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::LockPoisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
