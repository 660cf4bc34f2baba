//! Embedded schema migrations.
//!
//! Each step runs in its own transaction together with its `schema_version`
//! row, so a failed step leaves no trace and a rerun only applies what is
//! missing.

use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

/// `(version, name, sql)`, ascending by version.
const STEPS: &[(u32, &str, &str)] = &[(
    1,
    "networks, buffers, messages, session data and session state",
    include_str!("v001_schema.sql"),
)];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    applied_at  TEXT    NOT NULL DEFAULT (datetime('now'))
)";

fn failed(step: &str, e: &rusqlite::Error) -> StoreError {
    StoreError::Migration {
        message: format!("{step}: {e}"),
    }
}

/// Bring the schema up to date. Returns how many steps ran.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let _ = conn
        .execute(VERSION_TABLE, [])
        .map_err(|e| failed("creating schema_version", &e))?;
    let from = current_version(conn)?;

    let mut ran = 0;
    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > from) {
        info!(version, step = name, "migrating schema");
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| failed(&format!("v{version} begin"), &e))?;
        tx.execute_batch(sql)
            .map_err(|e| failed(&format!("v{version} ({name})"), &e))?;
        let _ = tx
            .execute(
                "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
                params![version, name],
            )
            .map_err(|e| failed(&format!("v{version} record"), &e))?;
        tx.commit().map_err(|e| failed(&format!("v{version} commit"), &e))?;
        ran += 1;
    }

    if ran == 0 {
        debug!(version = from, "schema up to date");
    }
    Ok(ran)
}

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row("SELECT IFNULL(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })
    .map_err(|e| failed("reading schema_version", &e))
}

/// Version the code expects.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |&(version, _, _)| version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    #[test]
    fn fresh_database_gets_every_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), latest_version());
        assert_eq!(
            table_names(&conn),
            [
                "buffers",
                "messages",
                "networks",
                "schema_version",
                "session_data",
                "session_state",
            ]
        );
    }

    #[test]
    fn second_run_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), latest_version());

        let recorded: String = conn
            .query_row("SELECT name FROM schema_version WHERE version = 1", [], |row| row.get(0))
            .unwrap();
        assert!(recorded.starts_with("networks"));
    }
}
