use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            revoked     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS accounts (
            id                  TEXT PRIMARY KEY,
            username            TEXT NOT NULL UNIQUE,
            email               TEXT NOT NULL UNIQUE,
            password            TEXT NOT NULL,
            display_name        TEXT,
            bio                 TEXT,
            whispers_created    INTEGER NOT NULL DEFAULT 0,
            whispers_discovered INTEGER NOT NULL DEFAULT 0,
            reactions_given     INTEGER NOT NULL DEFAULT 0,
            likes_received      INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- creator_id is deliberately not a foreign key: deleting an account
        -- orphans its whispers instead of removing or blocking them.
        CREATE TABLE IF NOT EXISTS whispers (
            id                  TEXT PRIMARY KEY,
            text                TEXT NOT NULL,
            tone                TEXT NOT NULL,
            lat                 REAL NOT NULL,
            lng                 REAL NOT NULL,
            why_here            TEXT,
            session_id          TEXT NOT NULL,
            creator_id          TEXT,
            proximity_required  REAL NOT NULL DEFAULT 100,
            dwell_time          INTEGER NOT NULL DEFAULT 60,
            created_at          TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_whispers_lat_lng
            ON whispers(lat, lng);
        CREATE INDEX IF NOT EXISTS idx_whispers_session
            ON whispers(session_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_whispers_creator
            ON whispers(creator_id);

        -- Discovery ledger. whisper_id is not a foreign key: entries for
        -- deleted whispers go dangling and readers skip them via joins.
        CREATE TABLE IF NOT EXISTS discoveries (
            whisper_id  TEXT NOT NULL,
            identity    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(whisper_id, identity)
        );

        CREATE INDEX IF NOT EXISTS idx_discoveries_identity
            ON discoveries(identity);

        CREATE TABLE IF NOT EXISTS account_whispers (
            account_id  TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            whisper_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(account_id, whisper_id)
        );

        CREATE TABLE IF NOT EXISTS account_discoveries (
            account_id  TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            whisper_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(account_id, whisper_id)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            whisper_id  TEXT NOT NULL REFERENCES whispers(id) ON DELETE CASCADE,
            session_id  TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'acknowledgement',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(whisper_id, session_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_whisper
            ON reactions(whisper_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
