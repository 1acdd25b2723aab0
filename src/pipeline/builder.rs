//! Audit record builder: turns resolved matches into reviewable audit records.

use std::collections::HashSet;

use base64::Engine;
use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::types::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::AuditError;
use crate::models::{AuditRecord, ResolvedNote};

/// Matched terms that set `noted_ae` on their own. Exact, case-sensitive
/// element comparison: "adverse event" does not qualify.
pub const NOTED_AE_TERMS: [&str; 2] = ["ADVERSE EVENT", "Adverse Event"];

/// Normalized MRNs keep at most this many characters.
pub const MRN_LENGTH: usize = 6;

/// Per-build values stamped on every record.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub batch_id: Uuid,
    pub auditor: &'a str,
    pub facility_code: &'a str,
    pub audit_date: NaiveDateTime,
}

impl<'a> BuildContext<'a> {
    /// Context stamped with the current local time (whole seconds).
    pub fn now(batch_id: Uuid, auditor: &'a str, facility_code: &'a str) -> Self {
        let now = Local::now().naive_local();
        Self {
            batch_id,
            auditor,
            facility_code,
            audit_date: now.with_nanosecond(0).unwrap_or(now),
        }
    }
}

/// Strip commas and keep the first [`MRN_LENGTH`] characters.
///
/// Integers and reals are rendered as text first (`1234567.0` keeps its
/// trailing `.0`). Null and binary values have no text form and fail.
pub fn normalize_mrn(raw: &Value) -> Result<String, AuditError> {
    let text = match raw {
        Value::Text(text) => text.clone(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => real_to_text(*value),
        Value::Null => {
            return Err(AuditError::Normalization("patient identifier is missing".into()))
        }
        Value::Blob(_) => {
            return Err(AuditError::Normalization("patient identifier is binary".into()))
        }
    };
    Ok(text.chars().filter(|c| *c != ',').take(MRN_LENGTH).collect())
}

fn real_to_text(value: f64) -> String {
    if value.is_nan() {
        "nan".into()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".into() } else { "-inf".into() }
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn has_noted_ae_term(matched_keywords: &[String]) -> bool {
    matched_keywords
        .iter()
        .any(|keyword| NOTED_AE_TERMS.contains(&keyword.as_str()))
}

/// Key that identifies one audit row across append retries.
pub fn idempotency_key(
    batch_id: &Uuid,
    patient_mrn: &str,
    note_text: &str,
    note_date: &NaiveDateTime,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(batch_id.as_bytes());
    let stamp = note_date.format("%Y-%m-%d %H:%M:%S").to_string();
    for part in [patient_mrn, note_text, stamp.as_str()] {
        hasher.update([0x1f]);
        hasher.update(part.as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Build audit records from resolved notes.
///
/// Keeps only the context's facility, drops repeats of
/// (patient_mrn, note_text, note_date) after the first, and preserves input
/// order otherwise.
pub fn build_records(
    notes: Vec<ResolvedNote>,
    ctx: &BuildContext<'_>,
) -> Result<Vec<AuditRecord>, AuditError> {
    let total = notes.len();
    let mut other_facility = 0usize;
    let mut duplicates = 0usize;
    let mut seen: HashSet<(String, String, NaiveDateTime)> = HashSet::new();
    let mut records = Vec::with_capacity(total);

    for resolved in notes {
        let ResolvedNote {
            matched,
            supervisor,
            backup_supervisor,
        } = resolved;
        let note = matched.note;

        if note.facility_code != ctx.facility_code {
            other_facility += 1;
            continue;
        }

        let patient_mrn = normalize_mrn(&note.patient_id)?;
        let note_text = note.text.unwrap_or_default();

        if !seen.insert((patient_mrn.clone(), note_text.clone(), note.note_date)) {
            duplicates += 1;
            continue;
        }

        let noted_ae = has_noted_ae_term(&matched.matched_keywords);
        records.push(AuditRecord {
            idempotency_key: idempotency_key(&ctx.batch_id, &patient_mrn, &note_text, &note.note_date),
            audit_date: ctx.audit_date,
            auditor: ctx.auditor.to_string(),
            note_type: note.note_type,
            patient_mrn,
            patient_alt_id: note.patient_alt_id,
            note_text,
            matched_keywords: matched.matched_keywords,
            unreported_ae: false,
            note_date: note.note_date,
            responsible_agent: note.author,
            noted_ae,
            supervisor,
            backup_supervisor,
            facility_code: note.facility_code,
        });
    }

    if other_facility > 0 {
        tracing::warn!(other_facility, "Dropped matches outside the requested facility");
    }
    tracing::info!(
        batch_id = %ctx.batch_id,
        input = total,
        built = records.len(),
        duplicates,
        "Audit records built"
    );
    Ok(records)
}
