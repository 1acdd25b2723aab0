//! SQLite-backed persistence gateway.

use rusqlite::Connection;
use uuid::Uuid;

use super::error::AuditError;
use super::traits::AuditSink;
use crate::db;
use crate::models::{AppendOutcome, AuditRecord};

/// Writes audit records to the `ae_audits` table.
pub struct SqliteAuditSink;

impl SqliteAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for SqliteAuditSink {
    fn append(
        &self,
        conn: &Connection,
        batch_id: &Uuid,
        records: &[AuditRecord],
    ) -> Result<AppendOutcome, AuditError> {
        let outcome = db::append_audits(conn, batch_id, records)?;
        if outcome.skipped_duplicates > 0 {
            tracing::warn!(
                %batch_id,
                skipped = outcome.skipped_duplicates,
                "Audit rows already present; append looks like a retry"
            );
        }
        tracing::info!(%batch_id, inserted = outcome.inserted, "Audit batch appended");
        Ok(outcome)
    }
}
