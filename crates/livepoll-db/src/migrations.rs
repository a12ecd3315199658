use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS polls (
            id           TEXT PRIMARY KEY,
            question     TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT NOT NULL DEFAULT (datetime('now')),
            creator_id   TEXT NOT NULL REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS poll_options (
            id          TEXT PRIMARY KEY,
            poll_id     TEXT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            position    INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_options_poll
            ON poll_options(poll_id, position);

        -- poll_id is denormalized from the option so the store itself can
        -- hold the one-vote-per-user-per-poll constraint
        CREATE TABLE IF NOT EXISTS votes (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            option_id   TEXT NOT NULL REFERENCES poll_options(id) ON DELETE CASCADE,
            poll_id     TEXT NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, poll_id)
        );

        CREATE INDEX IF NOT EXISTS idx_votes_option
            ON votes(option_id);
        ",
    )?;

    info!("Store migrations complete");
    Ok(())
}
