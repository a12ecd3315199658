use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One selectable answer with its current tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTally {
    pub id: Uuid,
    pub text: String,
    pub vote_count: u64,
}

/// Point-in-time projection of a poll plus its options' vote counts.
/// Derived from store state on demand — never persisted. `options` keeps
/// the order the options were created in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub id: Uuid,
    pub question: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_id: Uuid,
    pub options: Vec<OptionTally>,
}
