//! Session state repository: one JSON snapshot per user.

use relay_core::UserId;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::errors::Result;

/// Session state repository. Stateless, every method takes `&Connection`.
pub struct SessionStateRepo;

impl SessionStateRepo {
    /// Replace the stored snapshot.
    pub fn save(conn: &Connection, user: UserId, state: &Value) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO session_state (user_id, state, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET state = excluded.state, saved_at = excluded.saved_at",
            params![user.get(), raw, now],
        )?;
        Ok(())
    }

    /// Load the stored snapshot, if any.
    pub fn load(conn: &Connection, user: UserId) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM session_state WHERE user_id = ?1",
                params![user.get()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use serde_json::json;

    #[test]
    fn save_then_load_replaces() {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        let user = UserId::new(1);
        assert_eq!(SessionStateRepo::load(&conn, user).unwrap(), None);
        SessionStateRepo::save(&conn, user, &json!({"networks": [1]})).unwrap();
        SessionStateRepo::save(&conn, user, &json!({"networks": [2]})).unwrap();
        assert_eq!(
            SessionStateRepo::load(&conn, user).unwrap(),
            Some(json!({"networks": [2]}))
        );
    }
}
