//! Index kinds and id ranges

use crate::field::FieldRegistry;
use crate::schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The indexes this system builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Recordings, joined with their tracks and releases
    Recording,
    /// Releases
    Release,
    /// Works
    Work,
    /// Artists
    Artist,
    /// Labels
    Label,
    /// Events
    Event,
    /// Annotations of any entity
    Annotation,
}

impl IndexKind {
    /// Build order: largest indexes first, so their finalize overlaps later builds.
    pub const ALL: [IndexKind; 7] = [
        IndexKind::Recording,
        IndexKind::Release,
        IndexKind::Work,
        IndexKind::Artist,
        IndexKind::Label,
        IndexKind::Event,
        IndexKind::Annotation,
    ];

    /// Public index name.
    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Recording => "recording",
            IndexKind::Release => "release",
            IndexKind::Work => "work",
            IndexKind::Artist => "artist",
            IndexKind::Label => "label",
            IndexKind::Event => "event",
            IndexKind::Annotation => "annotation",
        }
    }

    /// On-disk folder name of the index.
    pub fn dir_name(self) -> String {
        format!("{}_index", self.name())
    }

    /// Field table of the index.
    pub fn registry(self) -> &'static FieldRegistry {
        match self {
            IndexKind::Recording => &schema::RECORDING,
            IndexKind::Release => &schema::RELEASE,
            IndexKind::Work => &schema::WORK,
            IndexKind::Artist => &schema::ARTIST,
            IndexKind::Label => &schema::LABEL,
            IndexKind::Event => &schema::EVENT,
            IndexKind::Annotation => &schema::ANNOTATION,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexKind::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Config(format!("unknown index '{}'", s)))
    }
}

/// Inclusive id range processed as one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdRange {
    /// First id (inclusive)
    pub min: u32,
    /// Last id (inclusive)
    pub max: u32,
}

impl IdRange {
    /// Range `[min, max]`.
    pub fn new(min: u32, max: u32) -> Self {
        IdRange { min, max }
    }

    /// Range holding a single id.
    pub fn single(id: u32) -> Self {
        IdRange { min: id, max: id }
    }

    /// Whether `id` falls inside the range.
    pub fn contains(&self, id: u32) -> bool {
        id >= self.min && id <= self.max
    }

    /// Partition `[0, max_id]` into consecutive chunks of `chunk_size` ids.
    ///
    /// The chunks are contiguous, non-overlapping and cover the whole range.
    pub fn chunks(max_id: u32, chunk_size: u32) -> Vec<IdRange> {
        let step = chunk_size.max(1);
        let mut out = Vec::new();
        let mut start: u32 = 0;
        loop {
            let end = start.saturating_add(step - 1).min(max_id);
            out.push(IdRange::new(start, end));
            if end >= max_id {
                break;
            }
            start = end + 1;
        }
        out
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}
