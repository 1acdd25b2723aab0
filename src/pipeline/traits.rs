//! Trait seam for the persistence gateway.
//!
//! The review session finalizes through `AuditSink`, so tests and other
//! backends can stand in for the SQLite audit table.

use rusqlite::Connection;
use uuid::Uuid;

use super::error::AuditError;
use crate::models::{AppendOutcome, AuditRecord};

/// Appends finalized audit records.
pub trait AuditSink: Send + Sync {
    /// Append `records` for `batch_id`. Implementations must be idempotent
    /// per record `idempotency_key`.
    fn append(
        &self,
        conn: &Connection,
        batch_id: &Uuid,
        records: &[AuditRecord],
    ) -> Result<AppendOutcome, AuditError>;
}
