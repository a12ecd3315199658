use rusqlite::Connection;

use crate::Database;
use crate::error::StoreError;
use crate::models::{OptionTallyRow, PollRow, UserRow, VoteOutcome, VoteRow};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            );
            if let Err(err) = inserted {
                if is_constraint_violation(&err) {
                    return Err(StoreError::AlreadyRegistered(email.to_string()));
                }
                return Err(err.into());
            }

            query_user_by_id(conn, id)?.ok_or_else(|| StoreError::UserNotFound(id.to_string()))
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password_hash, created_at FROM users
                 ORDER BY created_at, id
                 LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![limit, skip], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Polls --

    /// Insert a poll and its options in one transaction. `options` is
    /// (option id, text) in display order; the ordinal is recorded as
    /// `position` and drives snapshot ordering from then on.
    pub fn create_poll(
        &self,
        id: &str,
        creator_id: &str,
        question: &str,
        is_published: bool,
        options: &[(String, String)],
    ) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let creator: Option<String> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", [creator_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if creator.is_none() {
                return Err(StoreError::UserNotFound(creator_id.to_string()));
            }

            tx.execute(
                "INSERT INTO polls (id, question, is_published, creator_id) VALUES (?1, ?2, ?3, ?4)",
                (id, question, is_published, creator_id),
            )?;

            for (position, (option_id, text)) in options.iter().enumerate() {
                tx.execute(
                    "INSERT INTO poll_options (id, poll_id, text, position) VALUES (?1, ?2, ?3, ?4)",
                    (option_id, id, text, position as i64),
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_poll(&self, id: &str) -> Result<Option<PollRow>, StoreError> {
        self.with_conn(|conn| query_poll_by_id(conn, id))
    }

    pub fn list_published_polls(&self, skip: u32, limit: u32) -> Result<Vec<PollRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question, is_published, created_at, updated_at, creator_id FROM polls
                 WHERE is_published = 1
                 ORDER BY created_at, id
                 LIMIT ?1 OFFSET ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![limit, skip], map_poll_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Options of a poll joined with their vote counts, in creation order.
    pub fn options_with_tallies(&self, poll_id: &str) -> Result<Vec<OptionTallyRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT o.id, o.text, COUNT(v.id)
                 FROM poll_options o
                 LEFT JOIN votes v ON v.option_id = o.id
                 WHERE o.poll_id = ?1
                 GROUP BY o.id, o.text
                 ORDER BY o.position",
            )?;

            let rows = stmt
                .query_map([poll_id], |row| {
                    Ok(OptionTallyRow {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        vote_count: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Votes --

    /// Cast a vote for `option_id` on behalf of `user_id`.
    ///
    /// The whole check-then-insert runs while this store's connection mutex
    /// is held, inside one transaction. A repeat vote for the option the
    /// user already chose returns the existing fact with
    /// `newly_recorded: false`; a vote for a sibling option fails with
    /// `DuplicateVote`. Recording a new vote also advances the parent
    /// poll's `updated_at`.
    pub fn cast_vote(
        &self,
        vote_id: &str,
        user_id: &str,
        option_id: &str,
    ) -> Result<VoteOutcome, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let user: Option<String> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", [user_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if user.is_none() {
                return Err(StoreError::UserNotFound(user_id.to_string()));
            }

            let poll_id: Option<String> = tx
                .query_row(
                    "SELECT poll_id FROM poll_options WHERE id = ?1",
                    [option_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(poll_id) = poll_id else {
                return Err(StoreError::OptionNotFound(option_id.to_string()));
            };

            if let Some(vote) = query_vote_for_poll(&tx, user_id, &poll_id)? {
                if vote.option_id == option_id {
                    return Ok(VoteOutcome {
                        vote,
                        newly_recorded: false,
                    });
                }
                return Err(StoreError::DuplicateVote {
                    user_id: user_id.to_string(),
                    poll_id,
                });
            }

            let inserted = tx.execute(
                "INSERT INTO votes (id, user_id, option_id, poll_id) VALUES (?1, ?2, ?3, ?4)",
                (vote_id, user_id, option_id, &poll_id),
            );
            if let Err(err) = inserted {
                // UNIQUE(user_id, poll_id) surfaces here if a second writer
                // slipped in through another store handle
                if is_constraint_violation(&err) {
                    return Err(StoreError::DuplicateVote {
                        user_id: user_id.to_string(),
                        poll_id,
                    });
                }
                return Err(err.into());
            }

            tx.execute(
                "UPDATE polls SET updated_at = datetime('now') WHERE id = ?1",
                [&poll_id],
            )?;

            let vote = query_vote_for_poll(&tx, user_id, &poll_id)?
                .ok_or(StoreError::Database(rusqlite::Error::QueryReturnedNoRows))?;

            tx.commit()?;
            Ok(VoteOutcome {
                vote,
                newly_recorded: true,
            })
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_poll_by_id(conn: &Connection, id: &str) -> Result<Option<PollRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, question, is_published, created_at, updated_at, creator_id
         FROM polls WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], map_poll_row).optional()?;

    Ok(row)
}

fn map_poll_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PollRow> {
    Ok(PollRow {
        id: row.get(0)?,
        question: row.get(1)?,
        is_published: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        creator_id: row.get(5)?,
    })
}

fn query_vote_for_poll(
    conn: &Connection,
    user_id: &str,
    poll_id: &str,
) -> Result<Option<VoteRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, option_id, poll_id, created_at
         FROM votes WHERE user_id = ?1 AND poll_id = ?2",
    )?;

    let row = stmt
        .query_row([user_id, poll_id], |row| {
            Ok(VoteRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                option_id: row.get(2)?,
                poll_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
