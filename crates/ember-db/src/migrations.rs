use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id                TEXT PRIMARY KEY,
            match_id          TEXT NOT NULL,
            sender_id         TEXT NOT NULL,
            sender_nickname   TEXT NOT NULL,
            text              TEXT NOT NULL,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_match
            ON messages(match_id, created_at);

        CREATE TABLE IF NOT EXISTS reports (
            id                  TEXT PRIMARY KEY,
            reporter_id         TEXT NOT NULL,
            reporter_nickname   TEXT NOT NULL,
            reported_id         TEXT NOT NULL,
            reported_nickname   TEXT NOT NULL,
            match_id            TEXT NOT NULL,
            reason              TEXT NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_reported
            ON reports(reported_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
