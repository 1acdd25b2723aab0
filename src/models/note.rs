use chrono::NaiveDateTime;
use rusqlite::types::Value;

/// A clinical case note as read from the reference store.
///
/// `patient_id` keeps the raw stored value because upstream feeds mix
/// integers, text and nulls in that column. `text` is `None` when the
/// stored note body is null or not a string.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub facility_code: String,
    pub author: String,
    pub note_type: Option<String>,
    pub note_date: NaiveDateTime,
    pub patient_id: Value,
    pub patient_alt_id: Option<String>,
    pub text: Option<String>,
}

/// A note whose text matched at least one keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedNote {
    pub note: Note,
    /// Matched substrings in text order, duplicates and original casing kept.
    pub matched_keywords: Vec<String>,
}
