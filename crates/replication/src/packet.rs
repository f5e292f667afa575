//! Archived replication packets
//!
//! A packet is a tar archive (zstd-compressed or plain) holding:
//! - `REPLICATION_SEQUENCE` - the sequence number of this packet
//! - `SCHEMA_SEQUENCE` - the schema version the changes apply to
//! - `mbdump/dbmirror_pending` - change headers, `seqid\ttable\top` per line
//! - `mbdump/dbmirror_pendingdata` - payloads, `seqid\tiskey\tdata` per line
//!
//! Headers and payloads live in separate entries, so decoding is a two-pass
//! merge through [`ChangeDecoder`].

use crate::decoder::{ChangeDecoder, DecodedBatch, Fragment, Side};
use crate::error::{ReplicationError, ReplicationResult};
use crate::unpack::{join_copy_line, pack_data, sanitize_table_name, split_copy_line, unpack_data};
use musearch_core::{Change, Operation};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;
use tar::{Archive, Builder, Header};
use tracing::debug;

/// Archive entry names.
pub mod paths {
    /// Packet sequence marker
    pub const REPLICATION_SEQUENCE: &str = "REPLICATION_SEQUENCE";
    /// Schema sequence marker
    pub const SCHEMA_SEQUENCE: &str = "SCHEMA_SEQUENCE";
    /// Change headers
    pub const PENDING: &str = "mbdump/dbmirror_pending";
    /// Change payloads
    pub const PENDING_DATA: &str = "mbdump/dbmirror_pendingdata";
    /// Legacy spelling of [`PENDING`]
    pub const PENDING_LEGACY: &str = "mbdump/Pending";
    /// Legacy spelling of [`PENDING_DATA`]
    pub const PENDING_DATA_LEGACY: &str = "mbdump/PendingData";
}

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationPacket {
    /// Sequence number of the packet (or, for the live log, the database's
    /// current replication sequence)
    pub replication_sequence: i32,
    /// Schema sequence the changes were produced under
    pub schema_sequence: i32,
    /// Decoded changes
    pub batch: DecodedBatch,
}

impl ReplicationPacket {
    /// Read a packet file.
    pub fn open(path: &Path) -> ReplicationResult<Self> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a packet from any byte stream, compressed or not.
    pub fn read<R: Read>(mut reader: R) -> ReplicationResult<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        if raw.starts_with(&ZSTD_MAGIC) {
            let decoder = zstd::Decoder::new(Cursor::new(raw))
                .map_err(|e| ReplicationError::archive(format!("zstd decoder: {}", e)))?;
            Self::read_tar(Archive::new(decoder))
        } else {
            Self::read_tar(Archive::new(Cursor::new(raw)))
        }
    }

    fn read_tar<R: Read>(mut archive: Archive<R>) -> ReplicationResult<Self> {
        let mut replication_sequence = None;
        let mut schema_sequence = None;
        let mut pending = None;
        let mut pending_data = None;

        let entries = archive
            .entries()
            .map_err(|e| ReplicationError::archive(format!("read entries: {}", e)))?;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| ReplicationError::archive(format!("read entry: {}", e)))?;
            let path = entry
                .path()
                .map_err(|e| ReplicationError::archive(format!("entry path: {}", e)))?
                .to_string_lossy()
                .trim_start_matches("./")
                .to_string();

            let mut text = String::new();
            match path.as_str() {
                paths::REPLICATION_SEQUENCE | paths::SCHEMA_SEQUENCE => {
                    entry.read_to_string(&mut text)?;
                    let value = parse_marker(&path, &text)?;
                    if path == paths::REPLICATION_SEQUENCE {
                        replication_sequence = Some(value);
                    } else {
                        schema_sequence = Some(value);
                    }
                }
                paths::PENDING | paths::PENDING_LEGACY => {
                    entry.read_to_string(&mut text)?;
                    pending = Some(text);
                }
                paths::PENDING_DATA | paths::PENDING_DATA_LEGACY => {
                    entry.read_to_string(&mut text)?;
                    pending_data = Some(text);
                }
                _ => {}
            }
        }

        let replication_sequence = replication_sequence
            .ok_or_else(|| ReplicationError::archive("missing REPLICATION_SEQUENCE"))?;
        let schema_sequence =
            schema_sequence.ok_or_else(|| ReplicationError::archive("missing SCHEMA_SEQUENCE"))?;

        let mut decoder = ChangeDecoder::new();
        if let Some(text) = pending {
            decode_pending(&mut decoder, &text)?;
        }
        if let Some(text) = pending_data {
            decode_pending_data(&mut decoder, &text)?;
        }
        let batch = decoder.finish();

        debug!(
            target: "musearch::replication",
            replication_sequence,
            schema_sequence,
            changes = batch.changes.len(),
            dropped = batch.dropped.len(),
            "Read replication packet"
        );

        Ok(ReplicationPacket {
            replication_sequence,
            schema_sequence,
            batch,
        })
    }
}

fn parse_marker(name: &str, text: &str) -> ReplicationResult<i32> {
    text.trim()
        .parse()
        .map_err(|_| ReplicationError::archive(format!("{} is not a number: '{}'", name, text.trim())))
}

fn parse_seq_id(field: Option<&Option<String>>, line_no: usize) -> ReplicationResult<i64> {
    field
        .and_then(|f| f.as_deref())
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ReplicationError::archive(format!("line {}: bad sequence id", line_no + 1)))
}

/// Feed `seqid\ttable\top` lines to the decoder.
pub(crate) fn decode_pending(decoder: &mut ChangeDecoder, text: &str) -> ReplicationResult<()> {
    for (line_no, line) in text.lines().enumerate().filter(|(_, l)| !l.is_empty()) {
        let fields = split_copy_line(line);
        let seq_id = parse_seq_id(fields.first(), line_no)?;
        match (fields.get(1).cloned().flatten(), fields.get(2).cloned().flatten()) {
            (Some(table), Some(op)) => decoder.push(Fragment::Header {
                seq_id,
                table: sanitize_table_name(&table),
                operation_code: op,
            }),
            _ => decoder.reject(seq_id, "change header missing table or operation"),
        }
    }
    Ok(())
}

/// Feed `seqid\tiskey\tdata` lines to the decoder.
pub(crate) fn decode_pending_data(decoder: &mut ChangeDecoder, text: &str) -> ReplicationResult<()> {
    for (line_no, line) in text.lines().enumerate().filter(|(_, l)| !l.is_empty()) {
        let fields = split_copy_line(line);
        let seq_id = parse_seq_id(fields.first(), line_no)?;
        let side = fields
            .get(1)
            .and_then(|f| f.as_deref())
            .and_then(Side::from_flag);
        let Some(side) = side else {
            decoder.reject(seq_id, "payload with unknown before/after flag");
            continue;
        };
        let data = fields.get(2).cloned().flatten().unwrap_or_default();
        match unpack_data(&data) {
            Ok(values) => decoder.push(Fragment::Data {
                seq_id,
                side,
                values,
            }),
            Err(e) => decoder.reject(seq_id, e.to_string()),
        }
    }
    Ok(())
}

// ============================================================================
// Writer
// ============================================================================

/// Writes packets in the archived format.
pub struct PacketWriter {
    compression_level: i32,
}

impl Default for PacketWriter {
    fn default() -> Self {
        PacketWriter {
            compression_level: 3,
        }
    }
}

impl PacketWriter {
    /// Writer with the given zstd level.
    pub fn new(compression_level: i32) -> Self {
        PacketWriter { compression_level }
    }

    /// Write `replication-<seq>.tar.zst`-style archive to `path`, atomically.
    pub fn write(
        &self,
        replication_sequence: i32,
        schema_sequence: i32,
        changes: &[Change],
        path: &Path,
    ) -> ReplicationResult<()> {
        let temp_path = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let result = File::create(&temp_path)
            .map_err(ReplicationError::from)
            .and_then(|file| {
                self.write_to(
                    BufWriter::new(file),
                    replication_sequence,
                    schema_sequence,
                    changes,
                )
            });
        match result {
            Ok(()) => {
                fs::rename(&temp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }

    /// Write a compressed packet into memory.
    pub fn write_to_vec(
        &self,
        replication_sequence: i32,
        schema_sequence: i32,
        changes: &[Change],
    ) -> ReplicationResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, replication_sequence, schema_sequence, changes)?;
        Ok(buffer)
    }

    fn write_to<W: Write>(
        &self,
        out: W,
        replication_sequence: i32,
        schema_sequence: i32,
        changes: &[Change],
    ) -> ReplicationResult<()> {
        let (pending, pending_data) = encode_changes(changes);

        let zstd_writer = zstd::Encoder::new(out, self.compression_level)
            .map_err(|e| ReplicationError::archive(format!("zstd encoder: {}", e)))?
            .auto_finish();
        let mut builder = Builder::new(zstd_writer);

        add_file(
            &mut builder,
            paths::REPLICATION_SEQUENCE,
            format!("{}\n", replication_sequence).as_bytes(),
        )?;
        add_file(
            &mut builder,
            paths::SCHEMA_SEQUENCE,
            format!("{}\n", schema_sequence).as_bytes(),
        )?;
        add_file(&mut builder, paths::PENDING, pending.as_bytes())?;
        add_file(&mut builder, paths::PENDING_DATA, pending_data.as_bytes())?;

        let zstd_writer = builder
            .into_inner()
            .map_err(|e| ReplicationError::archive(format!("tar finish: {}", e)))?;
        drop(zstd_writer);
        Ok(())
    }
}

fn add_file<W: Write>(builder: &mut Builder<W>, path: &str, data: &[u8]) -> ReplicationResult<()> {
    let mut header = Header::new_gnu();
    header
        .set_path(path)
        .map_err(|e| ReplicationError::archive(format!("set path '{}': {}", path, e)))?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append(&header, data)
        .map_err(|e| ReplicationError::archive(format!("append '{}': {}", path, e)))?;
    Ok(())
}

/// Render changes as pending / pending-data COPY text.
fn encode_changes(changes: &[Change]) -> (String, String) {
    let mut pending = String::new();
    let mut pending_data = String::new();
    for change in changes {
        let id = change.id.to_string();
        let table = format!("\"musicbrainz\".\"{}\"", change.table);
        pending.push_str(&join_copy_line(&[
            Some(&id),
            Some(&table),
            Some(change.operation.code()),
        ]));
        pending.push('\n');

        let mut payload = |side: Side, values: &musearch_core::ColumnValues| {
            let data = pack_data(values);
            pending_data.push_str(&join_copy_line(&[Some(&id), Some(side.flag()), Some(&data)]));
            pending_data.push('\n');
        };
        if let Some(old) = &change.old_values {
            if change.operation != Operation::Insert {
                payload(Side::Before, old);
            }
        }
        if let Some(new) = &change.new_values {
            if change.operation != Operation::Delete {
                payload(Side::After, new);
            }
        }
    }
    (pending, pending_data)
}
