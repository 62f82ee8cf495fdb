use rusqlite::{Connection, Result};

/// Initialise the audit log table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_log (
            audit_id            TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL,
            action_type         TEXT NOT NULL,
            action_name         TEXT NOT NULL,
            input_params        TEXT NOT NULL,
            compensable         INTEGER NOT NULL,
            compensation_action TEXT,
            status              TEXT NOT NULL,
            result              TEXT,
            error               TEXT,
            created_at          TEXT NOT NULL,
            completed_at        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_user
            ON audit_log(user_id, created_at DESC);",
    )
}
