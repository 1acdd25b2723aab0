use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::*;

/// Roster rows in row-id order. Resolution depends on this order when an
/// employee appears more than once.
pub fn list_supervisors(conn: &Connection) -> Result<Vec<SupervisorEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_name, supervisor, backup_supervisor
         FROM supervisors ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(SupervisorEntry {
            id: row.get(0)?,
            employee_name: row.get(1)?,
            supervisor: row.get(2)?,
            backup_supervisor: row.get(3)?,
        })
    })?;

    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn insert_supervisor(
    conn: &Connection,
    employee_name: &str,
    supervisor: Option<&str>,
    backup_supervisor: Option<&str>,
) -> Result<i64, DatabaseError> {
    require_employee_name(employee_name)?;
    conn.execute(
        "INSERT INTO supervisors (employee_name, supervisor, backup_supervisor)
         VALUES (?1, ?2, ?3)",
        params![employee_name, supervisor, backup_supervisor],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_supervisor(
    conn: &Connection,
    id: i64,
    employee_name: &str,
    supervisor: Option<&str>,
    backup_supervisor: Option<&str>,
) -> Result<(), DatabaseError> {
    require_employee_name(employee_name)?;
    let changed = conn.execute(
        "UPDATE supervisors
         SET employee_name = ?1, supervisor = ?2, backup_supervisor = ?3
         WHERE id = ?4",
        params![employee_name, supervisor, backup_supervisor, id],
    )?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub fn delete_supervisor(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM supervisors WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn require_employee_name(employee_name: &str) -> Result<(), DatabaseError> {
    if employee_name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "employee name must not be blank".into(),
        ));
    }
    Ok(())
}

fn not_found(id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "supervisor".into(),
        id: id.to_string(),
    }
}
