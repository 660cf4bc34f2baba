//! Buffer repository: fetch-or-create for the `buffers` table.
//!
//! Buffers are matched on a lowercased canonical name, so `#Rust` and
//! `#rust` resolve to the same buffer. The first spelling seen is kept.

use relay_core::{BufferId, BufferInfo, NetworkId, UserId};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, StoreError};
use crate::traits::BufferLookup;

const SELECT_BUFFER: &str = "SELECT b.id, b.network_id, n.name, b.name
     FROM buffers b JOIN networks n ON n.id = b.network_id";

/// Buffer repository. Stateless, every method takes `&Connection`.
pub struct BufferRepo;

impl BufferRepo {
    /// Fetch the buffer for `(network, name)`, creating it when absent.
    pub fn get_or_create(
        conn: &Connection,
        user: UserId,
        network: NetworkId,
        name: &str,
    ) -> Result<BufferLookup> {
        let cname = name.to_lowercase();
        if let Some(buffer) = Self::find(conn, user, network, &cname)? {
            return Ok(BufferLookup {
                buffer,
                created: false,
            });
        }

        let network_known: Option<i64> = conn
            .query_row(
                "SELECT id FROM networks WHERE id = ?1 AND user_id = ?2",
                params![network.get(), user.get()],
                |row| row.get(0),
            )
            .optional()?;
        if network_known.is_none() {
            return Err(StoreError::NotFound(format!("network {network}")));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO buffers (user_id, network_id, name, cname, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.get(), network.get(), name, cname, now],
        )?;
        let buffer = Self::find(conn, user, network, &cname)?
            .ok_or_else(|| StoreError::NotFound(format!("buffer {name} on network {network}")))?;
        Ok(BufferLookup {
            buffer,
            created: true,
        })
    }

    /// All buffers of a user ordered by network, then id.
    pub fn list(conn: &Connection, user: UserId) -> Result<Vec<BufferInfo>> {
        let mut stmt = conn.prepare(&format!(
            "{SELECT_BUFFER} WHERE b.user_id = ?1 ORDER BY b.network_id, b.id"
        ))?;
        let rows = stmt
            .query_map(params![user.get()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find(
        conn: &Connection,
        user: UserId,
        network: NetworkId,
        cname: &str,
    ) -> Result<Option<BufferInfo>> {
        let row = conn
            .query_row(
                &format!(
                    "{SELECT_BUFFER} WHERE b.user_id = ?1 AND b.network_id = ?2 AND b.cname = ?3"
                ),
                params![user.get(), network.get(), cname],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BufferInfo> {
        Ok(BufferInfo {
            id: BufferId::new(row.get(0)?),
            network_id: NetworkId::new(row.get(1)?),
            network_name: row.get(2)?,
            name: row.get(3)?,
        })
    }
}
