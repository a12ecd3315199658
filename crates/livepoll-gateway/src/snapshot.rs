use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use livepoll_db::models::{OptionTallyRow, PollRow};
use livepoll_db::{Database, StoreError};
use livepoll_types::models::{OptionTally, PollSnapshot};
use livepoll_types::time::parse_sqlite_datetime;

/// Project the current store state for one poll into the wire-ready
/// snapshot. Reads committed state at call time, so a snapshot built right
/// after a vote commit reflects that vote. No caching.
pub fn build_snapshot(db: &Database, poll_id: Uuid) -> Result<PollSnapshot, StoreError> {
    let key = poll_id.to_string();
    let poll = db
        .get_poll(&key)?
        .ok_or_else(|| StoreError::PollNotFound(key.clone()))?;
    let tallies = db.options_with_tallies(&key)?;

    Ok(project(poll, tallies))
}

/// Assemble a snapshot from rows already read from the store. `tallies`
/// arrive in option creation order and keep it.
pub fn project(poll: PollRow, tallies: Vec<OptionTallyRow>) -> PollSnapshot {
    let options = tallies
        .into_iter()
        .map(|row| OptionTally {
            id: parse_id(&row.id),
            text: row.text,
            vote_count: row.vote_count.max(0) as u64,
        })
        .collect();

    PollSnapshot {
        id: parse_id(&poll.id),
        question: poll.question,
        is_published: poll.is_published,
        created_at: parse_timestamp(&poll.created_at, &poll.id),
        updated_at: parse_timestamp(&poll.updated_at, &poll.id),
        creator_id: parse_id(&poll.creator_id),
        options,
    }
}

fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, poll_id: &str) -> DateTime<Utc> {
    parse_sqlite_datetime(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on poll '{}'", raw, poll_id);
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, Uuid, Uuid, Vec<Uuid>) {
        let db = Database::open_in_memory().unwrap();

        let creator = Uuid::new_v4();
        db.create_user(&creator.to_string(), "ada", "ada@example.com", "hash")
            .unwrap();

        let poll_id = Uuid::new_v4();
        let option_ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let options: Vec<(String, String)> = option_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), format!("Option {i}")))
            .collect();
        db.create_poll(&poll_id.to_string(), &creator.to_string(), "Q?", true, &options)
            .unwrap();

        (db, poll_id, creator, option_ids)
    }

    #[test]
    fn snapshot_reflects_committed_votes_in_creation_order() {
        let (db, poll_id, creator, option_ids) = seeded();

        let voter = Uuid::new_v4();
        db.create_user(&voter.to_string(), "bob", "bob@example.com", "hash")
            .unwrap();
        db.cast_vote(
            &Uuid::new_v4().to_string(),
            &voter.to_string(),
            &option_ids[2].to_string(),
        )
        .unwrap();

        let snapshot = build_snapshot(&db, poll_id).unwrap();
        assert_eq!(snapshot.id, poll_id);
        assert_eq!(snapshot.creator_id, creator);
        assert!(snapshot.is_published);

        let ids: Vec<Uuid> = snapshot.options.iter().map(|o| o.id).collect();
        assert_eq!(ids, option_ids);
        let counts: Vec<u64> = snapshot.options.iter().map(|o| o.vote_count).collect();
        assert_eq!(counts, vec![0, 0, 1]);
    }

    #[test]
    fn unknown_poll_is_not_found() {
        let (db, ..) = seeded();
        let err = build_snapshot(&db, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::PollNotFound(_)));
    }

    #[test]
    fn timestamps_parse_to_utc() {
        let (db, poll_id, ..) = seeded();
        let snapshot = build_snapshot(&db, poll_id).unwrap();
        // datetime('now') rows survive the round-trip without the warn path
        assert!(snapshot.created_at.timestamp() > 0);
        assert!(snapshot.updated_at >= snapshot.created_at);
    }
}
