//! CSV export of records marked as unreported adverse events.

use std::borrow::Cow;

use chrono::NaiveDate;

use crate::models::AuditRecord;

/// Export columns in output order. The unreported flag itself is not
/// exported; every exported row has it set.
pub const EXPORT_COLUMNS: [&str; 13] = [
    "AUDIT_DATE",
    "AUDITOR",
    "NOTE_TYPE_NAME",
    "Patient MRN",
    "PATIENT_ALT_PATIENT_ID",
    "AE_PQC",
    "matched_keyword",
    "AE_PQC_Date",
    "Agent Responsible",
    "NOTED_AE",
    "Supervisor of RA",
    "BackUp Supervisor for Agent",
    "ORDER_FACILITY_CODE",
];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A generated CSV ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: Vec<u8>,
    /// Data rows, excluding the header.
    pub rows: usize,
}

/// `Unreported_AEs<MM-DD-YYYY>.csv`, stamped with the batch start date.
pub fn export_file_name(start: NaiveDate) -> String {
    format!("Unreported_AEs{}.csv", start.format("%m-%d-%Y"))
}

/// Write every record with `unreported_ae` set, in batch order.
///
/// An export with no flagged records still carries the header row.
pub fn export_unreported(records: &[AuditRecord], start: NaiveDate) -> ExportFile {
    let mut out = String::new();
    push_row(&mut out, EXPORT_COLUMNS.iter().copied());

    let mut rows = 0usize;
    for record in records.iter().filter(|r| r.unreported_ae) {
        let audit_date = record.audit_date.format(DATETIME_FORMAT).to_string();
        let note_date = record.note_date.format(DATETIME_FORMAT).to_string();
        let keywords = record.matched_keywords.join("; ");
        push_row(
            &mut out,
            [
                audit_date.as_str(),
                record.auditor.as_str(),
                record.note_type.as_deref().unwrap_or(""),
                record.patient_mrn.as_str(),
                record.patient_alt_id.as_deref().unwrap_or(""),
                record.note_text.as_str(),
                keywords.as_str(),
                note_date.as_str(),
                record.responsible_agent.as_str(),
                bool_field(record.noted_ae),
                record.supervisor.display_value(),
                record.backup_supervisor.display_value(),
                record.facility_code.as_str(),
            ],
        );
        rows += 1;
    }

    let file_name = export_file_name(start);
    tracing::info!(file = %file_name, rows, "Built unreported AE export");
    ExportFile {
        file_name,
        contents: out.into_bytes(),
        rows,
    }
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(field));
    }
    out.push('\n');
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
