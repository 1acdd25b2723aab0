use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::*;

pub fn list_keywords(conn: &Connection) -> Result<Vec<Keyword>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, keyword FROM keywords ORDER BY id")?;

    let rows = stmt.query_map([], |row| {
        Ok(Keyword {
            id: row.get(0)?,
            keyword: row.get(1)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn insert_keyword(conn: &Connection, keyword: &str) -> Result<i64, DatabaseError> {
    require_keyword_text(keyword)?;
    conn.execute("INSERT INTO keywords (keyword) VALUES (?1)", params![keyword])?;
    Ok(conn.last_insert_rowid())
}

pub fn update_keyword(conn: &Connection, id: i64, keyword: &str) -> Result<(), DatabaseError> {
    require_keyword_text(keyword)?;
    let changed = conn.execute(
        "UPDATE keywords SET keyword = ?1 WHERE id = ?2",
        params![keyword, id],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn delete_keyword(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM keywords WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn require_keyword_text(keyword: &str) -> Result<(), DatabaseError> {
    if keyword.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "keyword must not be blank".into(),
        ));
    }
    Ok(())
}

fn not_found(id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "keyword".into(),
        id: id.to_string(),
    }
}
