//! On-disk layout of a persisted index
//!
//! An index directory (`<name>_index/`) holds:
//! - `seg_<id>.mpk`: one file per segment, the MessagePack-encoded documents
//! - `index.manifest`: segment list, per-segment xxh3 checksums and
//!   tombstone sets
//!
//! Postings are not persisted; they are rebuilt from the documents on load.
//! Both files are written atomically via temp + rename.

use crate::error::{EngineError, EngineResult};
use musearch_core::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Magic bytes for the index manifest
const MANIFEST_MAGIC: &[u8; 4] = b"MSIX";
/// Current manifest version
const MANIFEST_VERSION: u32 = 1;
/// Manifest file name inside the index directory
pub(crate) const MANIFEST_FILE: &str = "index.manifest";

// ============================================================================
// Manifest Data (serializable)
// ============================================================================

/// Serializable representation of the segment list.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ManifestData {
    /// Format version
    pub version: u32,
    /// Next segment ID to assign
    pub next_segment_id: u64,
    /// Segment entries, oldest first
    pub segments: Vec<SegmentManifestEntry>,
}

/// Manifest entry for a single segment.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SegmentManifestEntry {
    /// Unique segment identifier
    pub segment_id: u64,
    /// Number of documents in this segment
    pub doc_count: u32,
    /// xxh3 of the segment file
    pub checksum: u64,
    /// Deleted segment-local doc numbers
    pub tombstones: BTreeSet<u32>,
}

pub(crate) fn segment_path(dir: &Path, segment_id: u64) -> PathBuf {
    dir.join(format!("seg_{}.mpk", segment_id))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

// ============================================================================
// Segments
// ============================================================================

/// Write the documents of a segment, returning the file checksum.
pub(crate) fn write_segment(dir: &Path, segment_id: u64, docs: &[Document]) -> EngineResult<u64> {
    let payload =
        rmp_serde::to_vec(docs).map_err(|e| EngineError::Serialization(e.to_string()))?;
    write_atomic(&segment_path(dir, segment_id), &payload)?;
    Ok(xxh3_64(&payload))
}

/// Read and verify the documents of a segment.
pub(crate) fn read_segment(dir: &Path, entry: &SegmentManifestEntry) -> EngineResult<Vec<Document>> {
    let path = segment_path(dir, entry.segment_id);
    let payload = std::fs::read(&path)?;
    if xxh3_64(&payload) != entry.checksum {
        return Err(EngineError::Corrupt(format!(
            "checksum mismatch in {}",
            path.display()
        )));
    }
    let docs: Vec<Document> =
        rmp_serde::from_slice(&payload).map_err(|e| EngineError::Corrupt(e.to_string()))?;
    if docs.len() as u32 != entry.doc_count {
        return Err(EngineError::Corrupt(format!(
            "segment {} holds {} docs, manifest says {}",
            entry.segment_id,
            docs.len(),
            entry.doc_count
        )));
    }
    Ok(docs)
}

// ============================================================================
// Manifest Read / Write
// ============================================================================

/// Write manifest data atomically.
pub(crate) fn write_manifest(dir: &Path, data: &ManifestData) -> EngineResult<()> {
    let payload =
        rmp_serde::to_vec(data).map_err(|e| EngineError::Serialization(e.to_string()))?;

    // magic + version + payload
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(MANIFEST_MAGIC);
    buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);

    write_atomic(&dir.join(MANIFEST_FILE), &buf)
}

/// Load manifest data, `None` when the directory holds no index.
pub(crate) fn load_manifest(dir: &Path) -> EngineResult<Option<ManifestData>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let buf = std::fs::read(&path)?;
    if buf.len() < 8 {
        return Err(EngineError::Corrupt("manifest too small".to_string()));
    }
    if &buf[0..4] != MANIFEST_MAGIC {
        return Err(EngineError::Corrupt("bad manifest magic".to_string()));
    }
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&buf[4..8]);
    let version = u32::from_le_bytes(version_bytes);
    if version != MANIFEST_VERSION {
        return Err(EngineError::Corrupt(format!(
            "unsupported manifest version {}",
            version
        )));
    }
    let data: ManifestData =
        rmp_serde::from_slice(&buf[8..]).map_err(|e| EngineError::Corrupt(e.to_string()))?;
    Ok(Some(data))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        let mut a = Document::new();
        a.add_text("_id", "1").add_int("duration", 33000);
        let mut b = Document::new();
        b.add_text("_id", "2");
        vec![a, b]
    }

    #[test]
    fn test_segment_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let checksum = write_segment(tmp.path(), 3, &docs()).unwrap();
        let entry = SegmentManifestEntry {
            segment_id: 3,
            doc_count: 2,
            checksum,
            tombstones: BTreeSet::new(),
        };
        assert_eq!(read_segment(tmp.path(), &entry).unwrap(), docs());
    }

    #[test]
    fn test_segment_checksum_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let checksum = write_segment(tmp.path(), 0, &docs()).unwrap();
        let entry = SegmentManifestEntry {
            segment_id: 0,
            doc_count: 2,
            checksum: checksum ^ 1,
            tombstones: BTreeSet::new(),
        };
        assert!(matches!(
            read_segment(tmp.path(), &entry),
            Err(EngineError::Corrupt(_))
        ));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let data = ManifestData {
            version: MANIFEST_VERSION,
            next_segment_id: 2,
            segments: vec![SegmentManifestEntry {
                segment_id: 1,
                doc_count: 10,
                checksum: 99,
                tombstones: [4u32, 7].into_iter().collect(),
            }],
        };
        write_manifest(tmp.path(), &data).unwrap();
        let loaded = load_manifest(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded.next_segment_id, 2);
        assert_eq!(loaded.segments[0].tombstones.len(), 2);
    }

    #[test]
    fn test_manifest_missing_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_manifest(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_manifest_bad_magic() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), [0u8; 16]).unwrap();
        assert!(load_manifest(tmp.path()).is_err());
    }
}
