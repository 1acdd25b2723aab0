//! Batch runner: one review request through query → match → resolve → build.
//!
//! Every store read happens in the query stage, so an outage is reported as
//! `StoreUnavailable` at that stage and never confused with "no notes". A
//! stored row that cannot be read is `MalformedData`, not an outage.

use rusqlite::Connection;
use uuid::Uuid;

use super::builder::{build_records, BuildContext};
use super::error::AuditError;
use super::matcher::{match_notes, KeywordSet};
use super::resolver::{resolve, SupervisorRoster};
use super::types::{BatchOutcome, BatchRequest, PipelineStage};
use crate::config::PortalConfig;
use crate::db::{self, NoteQuery};
use crate::models::{Keyword, Note, SupervisorEntry};
use crate::review::AuditBatch;

/// Everything the pipeline reads from the reference store.
struct ReferenceSnapshot {
    keywords: Vec<Keyword>,
    roster: Vec<SupervisorEntry>,
    notes: Vec<Note>,
}

fn load_snapshot(
    conn: &Connection,
    config: &PortalConfig,
    request: &BatchRequest,
) -> Result<ReferenceSnapshot, AuditError> {
    let keywords = db::list_keywords(conn)?;
    let roster = db::list_supervisors(conn)?;
    let notes = db::fetch_notes(
        conn,
        &NoteQuery {
            facility_code: &request.facility_code,
            start: request.range.start(),
            end: request.range.end(),
            excluded_authors: &config.system_authors,
            excluded_texts: &config.boilerplate_notes,
        },
    )?;
    Ok(ReferenceSnapshot {
        keywords,
        roster,
        notes,
    })
}

/// Run one batch review request against the store.
///
/// Errors are tagged with the failing [`PipelineStage`]. Nothing outside the
/// returned value is modified.
pub fn run_batch(
    conn: &Connection,
    config: &PortalConfig,
    request: &BatchRequest,
) -> Result<BatchOutcome, AuditError> {
    let batch_id = Uuid::new_v4();
    tracing::info!(
        %batch_id,
        facility = %request.facility_code,
        range = %request.range,
        "Starting batch review"
    );

    let snapshot = load_snapshot(conn, config, request).map_err(|e| {
        tracing::error!(%batch_id, error = %e, "Reference store query failed");
        e.at_stage(PipelineStage::Query)
    })?;

    if snapshot.notes.is_empty() {
        tracing::info!(%batch_id, "No notes for this facility and date range");
        return Ok(BatchOutcome::NoNotes);
    }
    let notes_scanned = snapshot.notes.len();

    let keywords = KeywordSet::from_rows(&snapshot.keywords)
        .map_err(|e| e.at_stage(PipelineStage::Match))?;
    let matched =
        match_notes(snapshot.notes, &keywords).map_err(|e| e.at_stage(PipelineStage::Match))?;

    let roster = SupervisorRoster::from_entries(&snapshot.roster);
    let resolved = resolve(matched, &roster);

    let ctx = BuildContext::now(batch_id, &request.auditor, &request.facility_code);
    let records = build_records(resolved, &ctx).map_err(|e| e.at_stage(PipelineStage::Build))?;

    if records.is_empty() {
        tracing::info!(%batch_id, notes_scanned, "No keyword matches");
        return Ok(BatchOutcome::NoMatches { notes_scanned });
    }

    tracing::info!(%batch_id, notes_scanned, records = records.len(), "Batch ready for review");
    Ok(BatchOutcome::Ready(AuditBatch::new(
        batch_id,
        request.clone(),
        ctx.audit_date,
        records,
    )))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rusqlite::types::Value;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::SupervisorAssignment;
    use crate::pipeline::types::DateRange;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn request() -> BatchRequest {
        let range = DateRange::new(day("2024-03-01"), day("2024-03-02")).unwrap();
        BatchRequest::new("101", range, "eid123").unwrap()
    }

    fn seed_note(conn: &Connection, author: &str, time: &str, mrn: Value, text: Option<&str>) {
        db::insert_note(
            conn,
            &Note {
                facility_code: "101".into(),
                author: author.into(),
                note_type: Some("Clinical".into()),
                note_date: NaiveDateTime::parse_from_str(
                    &format!("2024-03-01 {time}"),
                    "%Y-%m-%d %H:%M:%S",
                )
                .unwrap(),
                patient_id: mrn,
                patient_alt_id: Some("ALT-9".into()),
                text: text.map(str::to_string),
            },
        )
        .unwrap();
    }

    fn seeded() -> Connection {
        let conn = open_memory_database().unwrap();
        db::insert_keyword(&conn, "fall").unwrap();
        db::insert_keyword(&conn, "ADVERSE EVENT").unwrap();
        db::insert_supervisor(&conn, "alice", Some("Bob"), Some("Carol")).unwrap();
        conn
    }

    #[test]
    fn three_notes_one_match() {
        let conn = seeded();
        seed_note(&conn, "alice", "08:00:00", Value::Text("1,234,567".into()), Some("Patient had a fall in the hallway"));
        seed_note(&conn, "alice", "09:00:00", Value::Text("7654321".into()), Some("Refill approved"));
        seed_note(&conn, "alice", "10:00:00", Value::Text("1111111".into()), None);

        let batch = run_batch(&conn, &PortalConfig::default(), &request())
            .unwrap()
            .into_batch()
            .unwrap();

        assert_eq!(batch.len(), 1);
        let record = &batch.records()[0];
        assert_eq!(record.matched_keywords, vec!["fall"]);
        assert!(!record.unreported_ae);
        assert!(!record.noted_ae);
        assert_eq!(record.patient_mrn, "123456");
        assert_eq!(record.auditor, "eid123");
        assert_eq!(record.supervisor, SupervisorAssignment::Assigned("Bob".into()));
        assert_eq!(record.backup_supervisor, SupervisorAssignment::Assigned("Carol".into()));
    }

    #[test]
    fn explicit_adverse_event_is_auto_flagged() {
        let conn = seeded();
        seed_note(&conn, "dave", "08:00:00", Value::Text("42".into()), Some("ADVERSE EVENT reported by caller"));
        seed_note(&conn, "dave", "09:00:00", Value::Text("43".into()), Some("possible adverse event"));

        let batch = run_batch(&conn, &PortalConfig::default(), &request())
            .unwrap()
            .into_batch()
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert!(batch.records()[0].noted_ae);
        // matched case-insensitively, but not flagged
        assert_eq!(batch.records()[1].matched_keywords, vec!["adverse event"]);
        assert!(!batch.records()[1].noted_ae);
        assert_eq!(batch.records()[0].supervisor, SupervisorAssignment::Unresolved);
    }

    #[test]
    fn no_notes_is_a_value_not_an_error() {
        let conn = seeded();
        let outcome = run_batch(&conn, &PortalConfig::default(), &request()).unwrap();
        assert!(matches!(outcome, BatchOutcome::NoNotes));
    }

    #[test]
    fn no_matches_reports_scanned_count() {
        let conn = seeded();
        seed_note(&conn, "alice", "08:00:00", Value::Text("1".into()), Some("Routine call"));
        seed_note(&conn, "SYSADM", "09:00:00", Value::Text("2".into()), Some("fall"));

        let outcome = run_batch(&conn, &PortalConfig::default(), &request()).unwrap();
        assert!(matches!(outcome, BatchOutcome::NoMatches { notes_scanned: 1 }));
    }

    #[test]
    fn text_and_integer_mrns_build_together() {
        let conn = seeded();
        seed_note(&conn, "alice", "08:00:00", Value::Text("1,234,567".into()), Some("fall at home"));
        seed_note(&conn, "alice", "09:00:00", Value::Integer(7654321), Some("second fall"));

        let batch = run_batch(&conn, &PortalConfig::default(), &request())
            .unwrap()
            .into_batch()
            .unwrap();

        let mrns: Vec<&str> = batch.records().iter().map(|r| r.patient_mrn.as_str()).collect();
        assert_eq!(mrns, vec!["123456", "765432"]);
    }

    #[test]
    fn garbled_note_date_is_malformed_data_not_an_outage() {
        let conn = seeded();
        seed_note(&conn, "alice", "08:00:00", Value::Text("1".into()), Some("fall"));
        conn.execute(
            "INSERT INTO patient_notes
             (facility_code, note_add_user, note_type_name, note_add_date, patient_id, note)
             VALUES ('101', 'alice', 'Clinical', '2024-03-01 not-a-time', '2', 'fall')",
            [],
        )
        .unwrap();

        let err = run_batch(&conn, &PortalConfig::default(), &request()).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Query));
        assert!(!err.is_store_unavailable());
        match err {
            AuditError::StageFailed { source, .. } => {
                assert!(matches!(*source, AuditError::MalformedData { .. }))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn outage_is_store_unavailable_at_query_stage() {
        let conn = Connection::open_in_memory().unwrap();
        let err = run_batch(&conn, &PortalConfig::default(), &request()).unwrap_err();

        assert_eq!(err.stage(), Some(PipelineStage::Query));
        assert!(err.is_store_unavailable());
    }

    #[test]
    fn empty_keyword_list_fails_at_match_stage() {
        let conn = open_memory_database().unwrap();
        seed_note(&conn, "alice", "08:00:00", Value::Text("1".into()), Some("fall"));

        let err = run_batch(&conn, &PortalConfig::default(), &request()).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Match));
        assert!(!err.is_store_unavailable());
    }

    #[test]
    fn unnormalizable_mrn_fails_at_build_stage() {
        let conn = seeded();
        seed_note(&conn, "alice", "08:00:00", Value::Null, Some("fall"));

        let err = run_batch(&conn, &PortalConfig::default(), &request()).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Build));
    }
}
