//! Network repository: name ↔ id resolution for the `networks` table.

use relay_core::{NetworkId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::traits::NetworkInfo;

/// Network repository. Stateless, every method takes `&Connection`.
pub struct NetworkRepo;

impl NetworkRepo {
    /// Look up a network id by name.
    pub fn resolve(conn: &Connection, user: UserId, name: &str) -> Result<Option<NetworkId>> {
        let id = conn
            .query_row(
                "SELECT id FROM networks WHERE user_id = ?1 AND name = ?2",
                params![user.get(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(NetworkId::new))
    }

    /// Return the id for `name`, registering the network if needed.
    pub fn ensure(conn: &Connection, user: UserId, name: &str) -> Result<NetworkId> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT OR IGNORE INTO networks (user_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user.get(), name, now],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM networks WHERE user_id = ?1 AND name = ?2",
            params![user.get(), name],
            |row| row.get(0),
        )?;
        Ok(NetworkId::new(id))
    }

    /// All networks of a user ordered by id.
    pub fn list(conn: &Connection, user: UserId) -> Result<Vec<NetworkInfo>> {
        let mut stmt =
            conn.prepare("SELECT id, name FROM networks WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![user.get()], |row| {
                Ok(NetworkInfo {
                    id: NetworkId::new(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
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
    fn resolve_unknown_is_none() {
        let conn = setup();
        assert_eq!(NetworkRepo::resolve(&conn, UserId::new(1), "freenode").unwrap(), None);
    }

    #[test]
    fn ensure_is_idempotent() {
        let conn = setup();
        let a = NetworkRepo::ensure(&conn, UserId::new(1), "freenode").unwrap();
        let b = NetworkRepo::ensure(&conn, UserId::new(1), "freenode").unwrap();
        assert_eq!(a, b);
        assert!(a.is_valid());
        assert_eq!(
            NetworkRepo::resolve(&conn, UserId::new(1), "freenode").unwrap(),
            Some(a)
        );
    }

    #[test]
    fn networks_are_per_user() {
        let conn = setup();
        let _ = NetworkRepo::ensure(&conn, UserId::new(1), "freenode").unwrap();
        assert_eq!(NetworkRepo::resolve(&conn, UserId::new(2), "freenode").unwrap(), None);
        let _ = NetworkRepo::ensure(&conn, UserId::new(1), "oftc").unwrap();
        let names: Vec<_> = NetworkRepo::list(&conn, UserId::new(1))
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["freenode", "oftc"]);
    }
}
