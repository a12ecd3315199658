use thiserror::Error;

/// Failures surfaced by the poll store. `NotFound`-class and
/// `DuplicateVote`/`AlreadyRegistered` variants are rejections the caller
/// can act on; the rest are internal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("poll {0} not found")]
    PollNotFound(String),

    #[error("poll option {0} not found")]
    OptionNotFound(String),

    #[error("user {user_id} has already voted on poll {poll_id}")]
    DuplicateVote { user_id: String, poll_id: String },

    #[error("email {0} is already registered")]
    AlreadyRegistered(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::PollNotFound(_) | Self::OptionNotFound(_)
        )
    }
}
