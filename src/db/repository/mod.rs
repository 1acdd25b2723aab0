//! Repository layer: entity-scoped database operations.
//!
//! Every statement binds its values as parameters; no SQL is built from
//! user-supplied text.

mod audit;
mod facility;
mod keyword;
mod note;
mod supervisor;

use chrono::{NaiveDate, NaiveDateTime};

use super::DatabaseError;

pub use audit::*;
pub use facility::*;
pub use keyword::*;
pub use note::*;
pub use supervisor::*;

/// Storage format for timestamps.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the storage format, ISO `T`
/// separators, fractional seconds and bare dates (midnight).
pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: value.into(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rusqlite::types::Value;
    use uuid::Uuid;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATETIME_FORMAT).unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    fn note(facility: &str, author: &str, when: NaiveDateTime, text: Option<&str>) -> Note {
        Note {
            facility_code: facility.into(),
            author: author.into(),
            note_type: Some("Clinical".into()),
            note_date: when,
            patient_id: Value::Text("1,234,567".into()),
            patient_alt_id: Some("ALT-1".into()),
            text: text.map(str::to_string),
        }
    }

    fn record(key: &str, unreported: bool) -> AuditRecord {
        AuditRecord {
            idempotency_key: key.into(),
            audit_date: at("2024-03-02", "09:30:00"),
            auditor: "eid123".into(),
            note_type: Some("Clinical".into()),
            patient_mrn: "123456".into(),
            patient_alt_id: None,
            note_text: "Patient reported a fall".into(),
            matched_keywords: vec!["fall".into()],
            unreported_ae: unreported,
            note_date: at("2024-03-01", "14:00:00"),
            responsible_agent: "alice".into(),
            noted_ae: false,
            supervisor: SupervisorAssignment::Assigned("Bob".into()),
            backup_supervisor: SupervisorAssignment::Unresolved,
            facility_code: "101".into(),
        }
    }

    // ── timestamps ──────────────────────────────────────

    #[test]
    fn parse_datetime_accepts_common_shapes() {
        let expected = at("2024-03-01", "14:00:00");
        assert_eq!(parse_datetime("f", "2024-03-01 14:00:00").unwrap(), expected);
        assert_eq!(parse_datetime("f", "2024-03-01T14:00:00").unwrap(), expected);
        assert_eq!(parse_datetime("f", "2024-03-01 14:00:00.000").unwrap(), expected);
        assert_eq!(
            parse_datetime("f", "2024-03-01").unwrap(),
            at("2024-03-01", "00:00:00")
        );
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        let err = parse_datetime("note_add_date", "yesterday").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidValue { .. }));
    }

    // ── keywords ────────────────────────────────────────

    #[test]
    fn keyword_crud_round_trip() {
        let conn = open_memory_database().unwrap();
        let id = insert_keyword(&conn, "fall").unwrap();
        insert_keyword(&conn, "hospitalized").unwrap();

        update_keyword(&conn, id, "fell").unwrap();
        let keywords = list_keywords(&conn).unwrap();
        assert_eq!(keywords.len(), 2);
        assert_eq!(keywords[0].keyword, "fell");

        delete_keyword(&conn, id).unwrap();
        assert_eq!(list_keywords(&conn).unwrap().len(), 1);
    }

    #[test]
    fn keyword_text_is_bound_not_interpolated() {
        let conn = open_memory_database().unwrap();
        let hostile = "patient's fall'); DROP TABLE keywords; --";
        insert_keyword(&conn, hostile).unwrap();

        let keywords = list_keywords(&conn).unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].keyword, hostile);
    }

    #[test]
    fn blank_keyword_rejected() {
        let conn = open_memory_database().unwrap();
        let err = insert_keyword(&conn, "   ").unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn update_unknown_keyword_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_keyword(&conn, 42, "fall").unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        let err = delete_keyword(&conn, 42).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    // ── supervisors ─────────────────────────────────────

    #[test]
    fn supervisor_crud_round_trip() {
        let conn = open_memory_database().unwrap();
        let id = insert_supervisor(&conn, "alice", Some("Bob"), Some("Carol")).unwrap();
        insert_supervisor(&conn, "dave", None, None).unwrap();

        update_supervisor(&conn, id, "alice", Some("Erin"), None).unwrap();
        let roster = list_supervisors(&conn).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].supervisor.as_deref(), Some("Erin"));
        assert_eq!(roster[0].backup_supervisor, None);
        assert_eq!(roster[1].employee_name, "dave");

        delete_supervisor(&conn, id).unwrap();
        assert_eq!(list_supervisors(&conn).unwrap().len(), 1);
        assert!(matches!(
            delete_supervisor(&conn, id),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    // ── facilities ──────────────────────────────────────

    #[test]
    fn facilities_are_distinct_and_numerically_sorted() {
        let conn = open_memory_database().unwrap();
        for code in ["20", "3", "100", "3", "ABC"] {
            conn.execute(
                "INSERT INTO patient_facilities (facility_code) VALUES (?1)",
                [code],
            )
            .unwrap();
        }
        conn.execute("INSERT INTO patient_facilities (facility_code) VALUES (NULL)", [])
            .unwrap();

        assert_eq!(list_facilities(&conn).unwrap(), vec!["3", "20", "100", "ABC"]);
    }

    // ── notes ───────────────────────────────────────────

    #[test]
    fn fetch_notes_applies_range_facility_and_exclusions() {
        let conn = open_memory_database().unwrap();
        let keep = note("101", "alice", at("2024-03-01", "08:00:00"), Some("fall"));
        insert_note(&conn, &keep).unwrap();
        // upper bound is exclusive
        insert_note(&conn, &note("101", "alice", at("2024-03-02", "00:00:00"), Some("x"))).unwrap();
        // other facility
        insert_note(&conn, &note("202", "alice", at("2024-03-01", "09:00:00"), Some("x"))).unwrap();
        // system author
        insert_note(&conn, &note("101", "SYSADM", at("2024-03-01", "10:00:00"), Some("x"))).unwrap();
        // boilerplate
        insert_note(&conn, &note("101", "bob", at("2024-03-01", "11:00:00"), Some("--- boiler ---")))
            .unwrap();
        // null body survives the query
        insert_note(&conn, &note("101", "bob", at("2024-03-01", "12:00:00"), None)).unwrap();

        let authors = vec!["SYSADM".to_string()];
        let texts = vec!["--- boiler ---".to_string()];
        let notes = fetch_notes(
            &conn,
            &NoteQuery {
                facility_code: "101",
                start: day("2024-03-01"),
                end: day("2024-03-02"),
                excluded_authors: &authors,
                excluded_texts: &texts,
            },
        )
        .unwrap();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], keep);
        assert_eq!(notes[1].text, None);
    }

    #[test]
    fn non_text_note_body_reads_as_absent() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO patient_notes
             (facility_code, note_add_user, note_add_date, patient_id, note)
             VALUES ('101', 'alice', '2024-03-01 08:00:00', 1234567, 42)",
            [],
        )
        .unwrap();

        let notes = fetch_notes(
            &conn,
            &NoteQuery {
                facility_code: "101",
                start: day("2024-03-01"),
                end: day("2024-03-02"),
                excluded_authors: &[],
                excluded_texts: &[],
            },
        )
        .unwrap();

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, None);
        assert_eq!(notes[0].patient_id, Value::Integer(1234567));
    }

    #[test]
    fn fetch_notes_without_schema_is_an_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let result = fetch_notes(
            &conn,
            &NoteQuery {
                facility_code: "101",
                start: day("2024-03-01"),
                end: day("2024-03-02"),
                excluded_authors: &[],
                excluded_texts: &[],
            },
        );
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    // ── audits ──────────────────────────────────────────

    #[test]
    fn append_then_query_round_trip() {
        let conn = open_memory_database().unwrap();
        let batch_id = Uuid::new_v4();
        let records = vec![record("k1", true), record("k2", false)];

        let outcome = append_audits(&conn, &batch_id, &records).unwrap();
        assert_eq!(outcome, AppendOutcome { inserted: 2, skipped_duplicates: 0 });

        let stored = query_audits(&conn, "101", day("2024-03-02"), day("2024-03-03")).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].batch_id, batch_id);
        assert_eq!(stored[0].record, records[0]);
        assert_eq!(stored[1].record.backup_supervisor, SupervisorAssignment::Unresolved);
    }

    #[test]
    fn re_append_skips_existing_keys() {
        let conn = open_memory_database().unwrap();
        let batch_id = Uuid::new_v4();
        append_audits(&conn, &batch_id, &[record("k1", false)]).unwrap();

        let outcome =
            append_audits(&conn, &batch_id, &[record("k1", false), record("k2", false)]).unwrap();
        assert_eq!(outcome, AppendOutcome { inserted: 1, skipped_duplicates: 1 });
        assert_eq!(count_audits(&conn).unwrap(), 2);
    }

    #[test]
    fn query_audits_filters_facility_and_dates() {
        let conn = open_memory_database().unwrap();
        let mut other = record("k2", false);
        other.facility_code = "202".into();
        append_audits(&conn, &Uuid::new_v4(), &[record("k1", false), other]).unwrap();

        assert_eq!(
            query_audits(&conn, "101", day("2024-03-02"), day("2024-03-03")).unwrap().len(),
            1
        );
        assert!(query_audits(&conn, "101", day("2024-03-03"), day("2024-03-04"))
            .unwrap()
            .is_empty());
    }
}
