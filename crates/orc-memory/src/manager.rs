use std::sync::Mutex;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::MemoryError;
use crate::types::{MemoryStats, Message, Role};

/// Bounded, per-tenant, per-user sliding window of chat turns (§4.C).
///
/// Wraps a single SQLite connection in a `Mutex`, same concurrency model as
/// the teacher's memory manager: SQLite serializes writers anyway, so one
/// lock around the connection is simpler than per-row locking.
pub struct MemoryManager {
    db: Mutex<Connection>,
    default_ttl: Duration,
}

impl MemoryManager {
    pub fn new(conn: Connection, default_ttl_secs: i64) -> Self {
        Self {
            db: Mutex::new(conn),
            default_ttl: Duration::seconds(default_ttl_secs),
        }
    }

    /// Append one turn, trim to `max_context_messages`, and reset the TTL
    /// on the whole window (§3 ConversationMemory: "TTL resets on write").
    pub fn append(
        &self,
        company_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        max_context_messages: usize,
    ) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        let now = Utc::now();
        let expires_at = (now + self.default_ttl).to_rfc3339();
        let created_at = now.to_rfc3339();

        db.execute(
            "INSERT INTO messages (company_id, user_id, role, content, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![company_id, user_id, role.to_string(), content, created_at, expires_at],
        )?;

        db.execute(
            "UPDATE messages SET expires_at = ?1 WHERE company_id = ?2 AND user_id = ?3",
            params![expires_at, company_id, user_id],
        )?;

        db.execute(
            "DELETE FROM messages
             WHERE company_id = ?1 AND user_id = ?2
             AND id NOT IN (
                 SELECT id FROM messages
                 WHERE company_id = ?1 AND user_id = ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3
             )",
            params![company_id, user_id, max_context_messages as i64],
        )?;

        Ok(())
    }

    /// Read the window, oldest first. Never mutates beyond a lazy expiry
    /// sweep (§4.C: "Reads never mutate" refers to window contents, not
    /// expired-row cleanup).
    pub fn get(&self, company_id: &str, user_id: &str) -> Result<Vec<Message>, MemoryError> {
        let db = self.db.lock().unwrap();
        sweep_expired(&db, company_id, user_id)?;

        let mut stmt = db.prepare(
            "SELECT role, content, created_at FROM messages
             WHERE company_id = ?1 AND user_id = ?2
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![company_id, user_id], |row| {
            let role_str: String = row.get(0)?;
            let content: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((role_str, content, created_at))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role_str, content, created_at) = row?;
            let role = role_str.parse().unwrap_or(Role::User);
            let timestamp = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            messages.push(Message { role, content, timestamp });
        }
        Ok(messages)
    }

    pub fn clear(&self, company_id: &str, user_id: &str) -> Result<(), MemoryError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM messages WHERE company_id = ?1 AND user_id = ?2",
            params![company_id, user_id],
        )?;
        Ok(())
    }

    pub fn stats(&self, company_id: &str) -> Result<MemoryStats, MemoryError> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "DELETE FROM messages WHERE company_id = ?1 AND expires_at <= ?2",
            params![company_id, now],
        )?;

        let message_count: i64 = db.query_row(
            "SELECT COUNT(*) FROM messages WHERE company_id = ?1",
            params![company_id],
            |row| row.get(0),
        )?;
        let user_count: i64 = db.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM messages WHERE company_id = ?1",
            params![company_id],
            |row| row.get(0),
        )?;

        Ok(MemoryStats {
            company_id: company_id.to_string(),
            user_count: user_count.max(0) as u64,
            message_count: message_count.max(0) as u64,
        })
    }
}

fn sweep_expired(db: &Connection, company_id: &str, user_id: &str) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    let removed = db.execute(
        "DELETE FROM messages WHERE company_id = ?1 AND user_id = ?2 AND expires_at <= ?3",
        params![company_id, user_id, now],
    )?;
    if removed > 0 {
        debug!(company_id, user_id, removed, "swept expired conversation memory rows");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn manager(ttl_secs: i64) -> MemoryManager {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        MemoryManager::new(conn, ttl_secs)
    }

    #[test]
    fn append_and_get_round_trips_in_order() {
        let mgr = manager(3600);
        mgr.append("benova", "u1", Role::User, "hola", 10).unwrap();
        mgr.append("benova", "u1", Role::Assistant, "hi", 10).unwrap();
        let msgs = mgr.get("benova", "u1").unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "hola");
        assert_eq!(msgs[1].content, "hi");
    }

    #[test]
    fn append_trims_to_sliding_window() {
        let mgr = manager(3600);
        for i in 0..15 {
            mgr.append("benova", "u1", Role::User, &format!("msg {i}"), 5)
                .unwrap();
        }
        let msgs = mgr.get("benova", "u1").unwrap();
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs.last().unwrap().content, "msg 14");
        assert_eq!(msgs.first().unwrap().content, "msg 10");
    }

    #[test]
    fn clear_removes_all_messages_for_user() {
        let mgr = manager(3600);
        mgr.append("benova", "u1", Role::User, "hola", 10).unwrap();
        mgr.clear("benova", "u1").unwrap();
        assert!(mgr.get("benova", "u1").unwrap().is_empty());
    }

    #[test]
    fn tenant_isolation_is_enforced_by_key() {
        let mgr = manager(3600);
        mgr.append("benova", "u1", Role::User, "benova msg", 10).unwrap();
        mgr.append("other-tenant", "u1", Role::User, "other msg", 10)
            .unwrap();
        let msgs = mgr.get("benova", "u1").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "benova msg");
    }

    #[test]
    fn expired_window_is_swept_on_read() {
        let mgr = manager(-1);
        mgr.append("benova", "u1", Role::User, "stale", 10).unwrap();
        let msgs = mgr.get("benova", "u1").unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn stats_counts_messages_and_distinct_users() {
        let mgr = manager(3600);
        mgr.append("benova", "u1", Role::User, "a", 10).unwrap();
        mgr.append("benova", "u2", Role::User, "b", 10).unwrap();
        mgr.append("benova", "u2", Role::Assistant, "c", 10).unwrap();
        let stats = mgr.stats("benova").unwrap();
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.user_count, 2);
    }
}
