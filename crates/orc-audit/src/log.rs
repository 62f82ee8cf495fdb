use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::error::{AuditError, Result};
use crate::types::{AuditEntry, AuditStatus};

/// Durable, append-only log of tool invocations (§4.I).
///
/// Never on the critical path for the reply: every public method here
/// swallows its own database error into a `tracing::error!` and still
/// returns a best-effort id, matching the spec's "failures logged, not
/// raised" instruction — a saga step's compensation must not itself be
/// blocked by an audit write failing.
pub struct AuditLog {
    db: Mutex<Connection>,
}

impl AuditLog {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    pub fn log(
        &self,
        user_id: &str,
        action_type: &str,
        action_name: &str,
        input_params: &Value,
        compensable: bool,
        compensation_action: Option<&str>,
    ) -> String {
        let audit_id = Uuid::new_v4().to_string();
        if let Err(err) = self.insert(&audit_id, user_id, action_type, action_name, input_params, compensable, compensation_action) {
            error!(audit_id, user_id, action_name, error = %err, "failed to write audit log entry");
        }
        audit_id
    }

    fn insert(
        &self,
        audit_id: &str,
        user_id: &str,
        action_type: &str,
        action_name: &str,
        input_params: &Value,
        compensable: bool,
        compensation_action: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let params_json = serde_json::to_string(input_params)?;
        db.execute(
            "INSERT INTO audit_log
             (audit_id, user_id, action_type, action_name, input_params,
              compensable, compensation_action, status, result, error, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', NULL, NULL, ?8, NULL)",
            params![
                audit_id,
                user_id,
                action_type,
                action_name,
                params_json,
                compensable as i64,
                compensation_action,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn mark_success(&self, audit_id: &str, result: &Value) {
        if let Err(err) = self.complete(audit_id, AuditStatus::Success, Some(result), None) {
            error!(audit_id, error = %err, "failed to mark audit entry successful");
        }
    }

    pub fn mark_failed(&self, audit_id: &str, error_message: &str) {
        if let Err(err) = self.complete(audit_id, AuditStatus::Failed, None, Some(error_message)) {
            error!(audit_id, error = %err, "failed to mark audit entry failed");
        }
    }

    fn complete(&self, audit_id: &str, status: AuditStatus, result: Option<&Value>, error_message: Option<&str>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let result_json = result.map(serde_json::to_string).transpose()?;
        let rows = db.execute(
            "UPDATE audit_log SET status = ?1, result = ?2, error = ?3, completed_at = ?4 WHERE audit_id = ?5",
            params![status.to_string(), result_json, error_message, now, audit_id],
        )?;
        if rows == 0 {
            return Err(AuditError::NotFound { audit_id: audit_id.to_string() });
        }
        Ok(())
    }

    pub fn get(&self, audit_id: &str) -> Result<Option<AuditEntry>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT audit_id, user_id, action_type, action_name, input_params,
                    compensable, compensation_action, status, result, error, created_at, completed_at
             FROM audit_log WHERE audit_id = ?1",
            params![audit_id],
            row_to_entry,
        ) {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AuditError::Database(e)),
        }
    }

    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT audit_id, user_id, action_type, action_name, input_params,
                    compensable, compensation_action, status, result, error, created_at, completed_at
             FROM audit_log WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], row_to_entry)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let input_params_str: String = row.get(4)?;
    let status_str: String = row.get(7)?;
    let result_str: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(10)?;
    let completed_at_str: Option<String> = row.get(11)?;

    Ok(AuditEntry {
        audit_id: row.get(0)?,
        user_id: row.get(1)?,
        action_type: row.get(2)?,
        action_name: row.get(3)?,
        input_params: serde_json::from_str(&input_params_str).unwrap_or(Value::Null),
        compensable: row.get::<_, i64>(5)? != 0,
        compensation_action: row.get(6)?,
        status: status_str.parse().unwrap_or(AuditStatus::Pending),
        result: result_str.and_then(|s| serde_json::from_str(&s).ok()),
        error: row.get(9)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at_str.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))
        }),
    })
}
