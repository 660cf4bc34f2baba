//! Message repository: append and ranged reads on the `messages` table.

use chrono::{DateTime, Utc};
use relay_core::{BufferInfo, Message, MessageFlags, MessageId, MessageType, NewMessage};
use rusqlite::types::Type;
use rusqlite::{Connection, params};

use crate::errors::Result;

/// Message repository. Stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message and return its assigned id.
    pub fn insert(conn: &Connection, message: &NewMessage) -> Result<MessageId> {
        let _ = conn.execute(
            "INSERT INTO messages (buffer_id, timestamp, msg_type, flags, sender, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.buffer.id.get(),
                message.timestamp.to_rfc3339(),
                message.msg_type.code(),
                message.flags.bits(),
                message.sender,
                message.text,
            ],
        )?;
        Ok(MessageId::new(conn.last_insert_rowid()))
    }

    /// Messages of `buffer` with `start <= id` (and `id <= end` when bounded),
    /// in id order.
    pub fn fetch_range(
        conn: &Connection,
        buffer: &BufferInfo,
        start: MessageId,
        end: Option<MessageId>,
    ) -> Result<Vec<Message>> {
        let end = end.map_or(-1, MessageId::get);
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, msg_type, flags, sender, text
             FROM messages
             WHERE buffer_id = ?1 AND id >= ?2 AND (?3 < 0 OR id <= ?3)
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![buffer.id.get(), start.get(), end], |row| {
                Self::map_row(row, buffer)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>, buffer: &BufferInfo) -> rusqlite::Result<Message> {
        let raw_ts: String = row.get(1)?;
        let timestamp = DateTime::parse_from_rfc3339(&raw_ts)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        let code: u32 = row.get(2)?;
        let msg_type = MessageType::from_code(code).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Integer,
                format!("unknown message type {code}").into(),
            )
        })?;
        Ok(Message {
            id: MessageId::new(row.get(0)?),
            timestamp,
            buffer: buffer.clone(),
            msg_type,
            flags: MessageFlags::from_bits_truncate(row.get(3)?),
            sender: row.get(4)?,
            text: row.get(5)?,
        })
    }
}
