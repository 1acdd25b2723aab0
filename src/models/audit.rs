use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supervisor::SupervisorAssignment;

/// The unit of review and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Stable per (batch, patient_mrn, note_text, note_date); guards re-appends.
    pub idempotency_key: String,
    pub audit_date: NaiveDateTime,
    pub auditor: String,
    pub note_type: Option<String>,
    pub patient_mrn: String,
    pub patient_alt_id: Option<String>,
    pub note_text: String,
    pub matched_keywords: Vec<String>,
    pub unreported_ae: bool,
    pub note_date: NaiveDateTime,
    pub responsible_agent: String,
    pub noted_ae: bool,
    pub supervisor: SupervisorAssignment,
    pub backup_supervisor: SupervisorAssignment,
    pub facility_code: String,
}

/// An audit record read back from the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAudit {
    pub id: i64,
    pub batch_id: Uuid,
    pub record: AuditRecord,
}

/// Result of appending a batch to the audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendOutcome {
    pub inserted: usize,
    /// Rows whose idempotency key was already present (retried append).
    pub skipped_duplicates: usize,
}

impl AppendOutcome {
    /// Turn skipped rows into an error for callers that treat a retried
    /// append as suspicious.
    pub fn check_duplicates(self) -> Result<Self, crate::pipeline::AuditError> {
        if self.skipped_duplicates > 0 {
            return Err(crate::pipeline::AuditError::DuplicateAppendRisk {
                skipped: self.skipped_duplicates,
            });
        }
        Ok(self)
    }
}
