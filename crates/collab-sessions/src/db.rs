use rusqlite::Connection;

use crate::error::Result;

/// Initialise the embedded tier of the persistent store. The sqlite
/// tier backs every namespace unconditionally; redis, when configured and
/// reachable, is layered on top as the preferred read/write path.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_entries (
            namespace   TEXT NOT NULL,
            id          TEXT NOT NULL,
            value       TEXT NOT NULL,
            expires_at  TEXT NOT NULL,
            PRIMARY KEY (namespace, id)
        );
        CREATE TABLE IF NOT EXISTS active_sessions (
            id TEXT PRIMARY KEY
        );",
    )?;
    Ok(())
}
