use std::cmp::Ordering;

use rusqlite::Connection;

use crate::db::DatabaseError;

/// Distinct, non-null facility codes. Numeric codes sort numerically and
/// come before any non-numeric ones.
pub fn list_facilities(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT TRIM(facility_code) FROM patient_facilities
         WHERE facility_code IS NOT NULL AND TRIM(facility_code) != ''",
    )?;

    let mut codes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    codes.sort_by(|a, b| compare_codes(a, b));
    codes.dedup();
    Ok(codes)
}

fn compare_codes(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
