//! Session data repository: per-user key/value rows with JSON values.

use std::collections::BTreeMap;

use relay_core::{SessionValue, UserId};
use rusqlite::{Connection, params};

use crate::errors::Result;

/// Session data repository. Stateless, every method takes `&Connection`.
pub struct SessionDataRepo;

impl SessionDataRepo {
    /// Load every entry of a user.
    pub fn load_all(conn: &Connection, user: UserId) -> Result<BTreeMap<String, SessionValue>> {
        let mut stmt = conn.prepare("SELECT key, value FROM session_data WHERE user_id = ?1")?;
        let rows = stmt
            .query_map(params![user.get()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries = BTreeMap::new();
        for (key, raw) in rows {
            let value: SessionValue = serde_json::from_str(&raw)?;
            let _ = entries.insert(key, value);
        }
        Ok(entries)
    }

    /// Insert or replace one entry.
    pub fn upsert(conn: &Connection, user: UserId, key: &str, value: &SessionValue) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO session_data (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![user.get(), key, raw, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_overwrites() {
        let conn = setup();
        let user = UserId::new(1);
        SessionDataRepo::upsert(&conn, user, "theme", &"dark".into()).unwrap();
        SessionDataRepo::upsert(&conn, user, "theme", &"light".into()).unwrap();
        let all = SessionDataRepo::load_all(&conn, user).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["theme"], SessionValue::from("light"));
    }

    #[test]
    fn entries_are_per_user() {
        let conn = setup();
        SessionDataRepo::upsert(&conn, UserId::new(1), "k", &SessionValue::from(1_i64)).unwrap();
        assert!(SessionDataRepo::load_all(&conn, UserId::new(2)).unwrap().is_empty());
    }

    #[test]
    fn nested_values_survive() {
        let conn = setup();
        let mut map = BTreeMap::new();
        let _ = map.insert("width".to_owned(), SessionValue::from(800_i64));
        let _ = map.insert("tabs".to_owned(), SessionValue::List(vec!["#rust".into()]));
        let value = SessionValue::Map(map);
        SessionDataRepo::upsert(&conn, UserId::new(1), "layout", &value).unwrap();
        let all = SessionDataRepo::load_all(&conn, UserId::new(1)).unwrap();
        assert_eq!(all["layout"], value);
    }
}
