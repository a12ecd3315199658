/// Database row types — these map directly to SQLite rows.
/// Distinct from the livepoll-types wire models to keep the store layer
/// independent of response shapes.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

pub struct PollRow {
    pub id: String,
    pub question: String,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub creator_id: String,
}

pub struct OptionRow {
    pub id: String,
    pub poll_id: String,
    pub text: String,
    pub position: i64,
    pub created_at: String,
}

/// A vote is a fact: once recorded it is never mutated.
#[derive(Debug)]
pub struct VoteRow {
    pub id: String,
    pub user_id: String,
    pub option_id: String,
    pub poll_id: String,
    pub created_at: String,
}

/// One option joined with its current vote count, in creation order.
pub struct OptionTallyRow {
    pub id: String,
    pub text: String,
    pub vote_count: i64,
}

/// Result of a cast-vote attempt that did not fail. `newly_recorded` is
/// false for the idempotent repeat of an identical (user, option) vote.
#[derive(Debug)]
pub struct VoteOutcome {
    pub vote: VoteRow,
    pub newly_recorded: bool,
}
