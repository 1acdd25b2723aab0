use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::*;

/// Filter for pulling notes for one facility over `[start, end)`.
#[derive(Debug, Clone)]
pub struct NoteQuery<'a> {
    pub facility_code: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Automated accounts whose notes are never audited.
    pub excluded_authors: &'a [String],
    /// Boilerplate note bodies that are never audited.
    pub excluded_texts: &'a [String],
}

/// Fetch the notes matching `query`, oldest first.
///
/// Notes with a null body are kept; the matcher drops them.
pub fn fetch_notes(conn: &Connection, query: &NoteQuery<'_>) -> Result<Vec<Note>, DatabaseError> {
    let mut sql = String::from(
        "SELECT facility_code, note_add_user, note_type_name, note_add_date,
                patient_id, patient_alt_id, note
         FROM patient_notes
         WHERE facility_code = ?1
           AND note_add_date >= ?2
           AND note_add_date < ?3",
    );
    let mut bound: Vec<Value> = vec![
        Value::Text(query.facility_code.to_string()),
        Value::Text(query.start.format("%Y-%m-%d").to_string()),
        Value::Text(query.end.format("%Y-%m-%d").to_string()),
    ];

    if !query.excluded_authors.is_empty() {
        let placeholders = placeholders(bound.len() + 1, query.excluded_authors.len());
        sql.push_str(&format!(" AND note_add_user NOT IN ({placeholders})"));
        bound.extend(query.excluded_authors.iter().cloned().map(Value::Text));
    }
    if !query.excluded_texts.is_empty() {
        let placeholders = placeholders(bound.len() + 1, query.excluded_texts.len());
        sql.push_str(&format!(" AND (note IS NULL OR note NOT IN ({placeholders}))"));
        bound.extend(query.excluded_texts.iter().cloned().map(Value::Text));
    }
    sql.push_str(" ORDER BY note_add_date, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
        Ok(NoteRow {
            facility_code: row.get(0)?,
            author: row.get(1)?,
            note_type: row.get(2)?,
            note_date: row.get(3)?,
            patient_id: row.get(4)?,
            patient_alt_id: row.get(5)?,
            text: row.get(6)?,
        })
    })?;

    let mut notes = Vec::new();
    for row in rows {
        notes.push(note_from_row(row?)?);
    }
    Ok(notes)
}

/// Load a note into the store. Used by data loaders and tests.
pub fn insert_note(conn: &Connection, note: &Note) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_notes
         (facility_code, note_add_user, note_type_name, note_add_date,
          patient_id, patient_alt_id, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            note.facility_code,
            note.author,
            note.note_type,
            format_datetime(&note.note_date),
            note.patient_id,
            note.patient_alt_id,
            note.text,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// Internal row type for Note mapping
struct NoteRow {
    facility_code: String,
    author: String,
    note_type: Option<String>,
    note_date: String,
    patient_id: Value,
    patient_alt_id: Option<String>,
    text: Value,
}

fn note_from_row(row: NoteRow) -> Result<Note, DatabaseError> {
    let text = match row.text {
        Value::Text(text) => Some(text),
        _ => None,
    };
    Ok(Note {
        facility_code: row.facility_code,
        author: row.author,
        note_type: row.note_type,
        note_date: parse_datetime("note_add_date", &row.note_date)?,
        patient_id: row.patient_id,
        patient_alt_id: row.patient_alt_id,
        text,
    })
}

/// `?n, ?n+1, ...` for `count` parameters starting at index `first`.
fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
