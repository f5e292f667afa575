//! Live change log
//!
//! Reads pending changes straight from the source database's change-log
//! tables (`dbmirror_pending` / `dbmirror_pendingdata`) plus the current
//! sequences from `replication_control`. A database without the change-log
//! tables is a plain replica and yields no changes rather than an error.

use crate::decoder::{ChangeDecoder, Fragment, Side};
use crate::error::ReplicationResult;
use crate::packet::ReplicationPacket;
use crate::unpack::{sanitize_table_name, unpack_data};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// A queryable source of pending changes.
pub trait ChangeLog: Send {
    /// Changes with id greater than `last_change_id`, or `None` if this
    /// source has no change log at all.
    fn pending_since(&self, last_change_id: Option<i64>) -> ReplicationResult<Option<ReplicationPacket>>;
}

/// Change log stored in a SQLite database.
pub struct SqliteChangeLog {
    conn: Connection,
}

impl SqliteChangeLog {
    /// Wrap an open connection.
    pub fn new(conn: Connection) -> Self {
        SqliteChangeLog { conn }
    }

    /// Open a database file read-only.
    pub fn open(path: &Path) -> ReplicationResult<Self> {
        let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::new(conn))
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn has_table(&self, name: &str) -> ReplicationResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn sequences(&self) -> ReplicationResult<(i32, i32)> {
        let seqs = self.conn.query_row(
            "SELECT current_schema_sequence, current_replication_sequence FROM replication_control",
            [],
            |row| Ok((row.get::<_, i32>(0)?, row.get::<_, i32>(1)?)),
        )?;
        Ok(seqs)
    }
}

impl ChangeLog for SqliteChangeLog {
    fn pending_since(&self, last_change_id: Option<i64>) -> ReplicationResult<Option<ReplicationPacket>> {
        if !self.has_table("dbmirror_pending")? {
            info!(target: "musearch::replication", "No change log in source database");
            return Ok(None);
        }
        let (schema_sequence, replication_sequence) = self.sequences()?;

        let mut stmt = self.conn.prepare(
            "SELECT p.seqid, p.tablename, p.op, pd.iskey, pd.data \
             FROM dbmirror_pending p \
             JOIN dbmirror_pendingdata pd ON (p.seqid = pd.seqid) \
             WHERE p.seqid > ?1 \
             ORDER BY p.seqid",
        )?;
        let mut rows = stmt.query(params![last_change_id.unwrap_or(i64::MIN)])?;

        let mut decoder = ChangeDecoder::new();
        while let Some(row) = rows.next()? {
            let seq_id: i64 = row.get(0)?;
            let table: Option<String> = row.get(1)?;
            let op: Option<String> = row.get(2)?;
            let flag: Option<String> = row.get(3)?;
            let data: Option<String> = row.get(4)?;

            match (table, op) {
                (Some(table), Some(op)) => decoder.push(Fragment::Header {
                    seq_id,
                    table: sanitize_table_name(&table),
                    operation_code: op,
                }),
                _ => {
                    decoder.reject(seq_id, "change header missing table or operation");
                    continue;
                }
            }
            let Some(side) = flag.as_deref().and_then(Side::from_flag) else {
                decoder.reject(seq_id, "payload with unknown before/after flag");
                continue;
            };
            match unpack_data(data.as_deref().unwrap_or_default()) {
                Ok(values) => decoder.push(Fragment::Data {
                    seq_id,
                    side,
                    values,
                }),
                Err(e) => decoder.reject(seq_id, e.to_string()),
            }
        }

        let batch = decoder.finish();
        debug!(
            target: "musearch::replication",
            last_change_id = ?last_change_id,
            changes = batch.changes.len(),
            dropped = batch.dropped.len(),
            "Read live change log"
        );
        Ok(Some(ReplicationPacket {
            replication_sequence,
            schema_sequence,
            batch,
        }))
    }
}
