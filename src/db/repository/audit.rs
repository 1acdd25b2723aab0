use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::*;

/// Append a finalized batch to the audit table in one transaction.
///
/// Rows whose idempotency key already exists are skipped, so replaying the
/// same batch after a partial failure cannot duplicate rows.
pub fn append_audits(
    conn: &Connection,
    batch_id: &Uuid,
    records: &[AuditRecord],
) -> Result<AppendOutcome, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut outcome = AppendOutcome::default();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO ae_audits
             (idempotency_key, batch_id, audit_date, auditor, note_type_name, patient_mrn,
              patient_alt_id, note_text, matched_keywords, unreported_ae, note_date,
              responsible_agent, noted_ae, supervisor, backup_supervisor, facility_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(idempotency_key) DO NOTHING",
        )?;

        for record in records {
            let keywords = serde_json::to_string(&record.matched_keywords)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
            let changed = stmt.execute(params![
                record.idempotency_key,
                batch_id.to_string(),
                format_datetime(&record.audit_date),
                record.auditor,
                record.note_type,
                record.patient_mrn,
                record.patient_alt_id,
                record.note_text,
                keywords,
                record.unreported_ae as i32,
                format_datetime(&record.note_date),
                record.responsible_agent,
                record.noted_ae as i32,
                record.supervisor.to_column(),
                record.backup_supervisor.to_column(),
                record.facility_code,
            ])?;
            if changed == 0 {
                outcome.skipped_duplicates += 1;
            } else {
                outcome.inserted += 1;
            }
        }
    }

    tx.commit()?;
    Ok(outcome)
}

/// Audits for one facility whose audit date falls in `[start, end)`.
pub fn query_audits(
    conn: &Connection,
    facility_code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PersistedAudit>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, batch_id, idempotency_key, audit_date, auditor, note_type_name,
                patient_mrn, patient_alt_id, note_text, matched_keywords, unreported_ae,
                note_date, responsible_agent, noted_ae, supervisor, backup_supervisor,
                facility_code
         FROM ae_audits
         WHERE facility_code = ?1 AND audit_date >= ?2 AND audit_date < ?3
         ORDER BY audit_date, id",
    )?;

    let rows = stmt.query_map(
        params![
            facility_code,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
        ],
        |row| {
            Ok(AuditRow {
                id: row.get(0)?,
                batch_id: row.get(1)?,
                idempotency_key: row.get(2)?,
                audit_date: row.get(3)?,
                auditor: row.get(4)?,
                note_type: row.get(5)?,
                patient_mrn: row.get(6)?,
                patient_alt_id: row.get(7)?,
                note_text: row.get(8)?,
                matched_keywords: row.get(9)?,
                unreported_ae: row.get(10)?,
                note_date: row.get(11)?,
                responsible_agent: row.get(12)?,
                noted_ae: row.get(13)?,
                supervisor: row.get(14)?,
                backup_supervisor: row.get(15)?,
                facility_code: row.get(16)?,
            })
        },
    )?;

    let mut audits = Vec::new();
    for row in rows {
        audits.push(audit_from_row(row?)?);
    }
    Ok(audits)
}

pub fn count_audits(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM ae_audits", [], |row| row.get(0))?;
    Ok(count)
}

// Internal row type for audit mapping
struct AuditRow {
    id: i64,
    batch_id: String,
    idempotency_key: String,
    audit_date: String,
    auditor: String,
    note_type: Option<String>,
    patient_mrn: String,
    patient_alt_id: Option<String>,
    note_text: String,
    matched_keywords: String,
    unreported_ae: i32,
    note_date: String,
    responsible_agent: String,
    noted_ae: i32,
    supervisor: Option<String>,
    backup_supervisor: Option<String>,
    facility_code: String,
}

fn audit_from_row(row: AuditRow) -> Result<PersistedAudit, DatabaseError> {
    let matched_keywords: Vec<String> = serde_json::from_str(&row.matched_keywords)
        .map_err(|_| DatabaseError::InvalidValue {
            field: "matched_keywords".into(),
            value: format!("row {}", row.id),
        })?;

    Ok(PersistedAudit {
        id: row.id,
        batch_id: Uuid::parse_str(&row.batch_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        record: AuditRecord {
            idempotency_key: row.idempotency_key,
            audit_date: parse_datetime("audit_date", &row.audit_date)?,
            auditor: row.auditor,
            note_type: row.note_type,
            patient_mrn: row.patient_mrn,
            patient_alt_id: row.patient_alt_id,
            note_text: row.note_text,
            matched_keywords,
            unreported_ae: row.unreported_ae != 0,
            note_date: parse_datetime("note_date", &row.note_date)?,
            responsible_agent: row.responsible_agent,
            noted_ae: row.noted_ae != 0,
            supervisor: SupervisorAssignment::from_column(row.supervisor),
            backup_supervisor: SupervisorAssignment::from_column(row.backup_supervisor),
            facility_code: row.facility_code,
        },
    })
}
