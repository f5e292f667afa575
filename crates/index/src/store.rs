//! Store blobs
//!
//! Every entity document carries a stored-only `_store` field: the entity's
//! full nested representation serialized as JSON, so a search result can be
//! rendered without going back to the database.
//!
//! Blobs are assembled by a consuming [`StoreBuilder`]; side entities
//! (aliases, tags, relations) can only be attached through the helpers in
//! [`crate::side`], which add the matching search fields at the same time.

use crate::source::RelationTarget;
use musearch_core::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// Shared entries
// ============================================================================

/// A tag with its vote count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tag name
    pub name: String,
    /// Votes
    pub count: i32,
}

/// An alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AliasEntry {
    /// Alias name
    pub name: String,
    /// Sort name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    /// Locale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Alias type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub alias_type: Option<String>,
    /// Primary for its locale
    pub primary: bool,
}

/// One credited artist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NameCreditEntry {
    /// Artist external id
    pub artist_id: String,
    /// Artist name
    pub name: String,
    /// Artist sort name
    pub sort_name: String,
    /// Credited name, when different
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<String>,
    /// Join phrase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_phrase: Option<String>,
}

/// An artist credit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ArtistCreditEntry {
    /// Credited artists in order
    pub name_credits: Vec<NameCreditEntry>,
}

/// A relation to another entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RelationEntry {
    /// Target kind
    pub target: RelationTarget,
    /// Target external id
    pub id: String,
    /// Target name
    pub name: String,
    /// Relationship type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
}

/// Begin / end of an entity's existence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifeSpan {
    /// Begin date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    /// End date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Ended flag
    pub ended: bool,
}

/// Release group summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReleaseGroupEntry {
    /// External id
    pub id: String,
    /// Primary type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<String>,
    /// Secondary types
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary_types: Vec<String>,
    /// Legacy single type derived from primary + secondary types
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub legacy_type: Option<String>,
}

/// Release event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseEventEntry {
    /// Date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

// ============================================================================
// Entity blobs
// ============================================================================

/// A track of a recording, as seen from the recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TrackEntry {
    /// External track id
    pub id: String,
    /// Track title
    pub title: String,
    /// Length in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    /// Track number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Track credit, when it differs from the recording credit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_credit: Option<ArtistCreditEntry>,
}

/// The medium a recording's track sits on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RecordingMediumEntry {
    /// Medium position
    pub position: u32,
    /// Format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Tracks on the medium
    pub track_count: u32,
    /// Zero-based offset of the track
    pub track_offset: u32,
    /// The track
    pub track: TrackEntry,
}

/// A release a recording appears on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RecordingReleaseEntry {
    /// External id
    pub id: String,
    /// Title
    pub title: String,
    /// Status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Release group
    pub release_group: ReleaseGroupEntry,
    /// Release credit, when it adds information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_credit: Option<ArtistCreditEntry>,
    /// Earliest release event date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Country of the earliest release event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// All release events
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub release_events: Vec<ReleaseEventEntry>,
    /// Tracks on the whole release
    pub track_count: u32,
    /// The medium carrying the track
    pub medium: RecordingMediumEntry,
}

/// Recording blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RecordingStore {
    /// External id
    pub id: String,
    /// Title
    pub title: String,
    /// Length in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Video flag
    pub video: bool,
    /// ISRCs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub isrcs: Vec<String>,
    /// Recording credit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_credit: Option<ArtistCreditEntry>,
    /// Releases the recording appears on, one entry per track
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub releases: Vec<RecordingReleaseEntry>,
}

/// Label + catalog number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LabelInfoEntry {
    /// Label external id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    /// Label name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Catalog number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_number: Option<String>,
}

/// A medium of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MediumEntry {
    /// Position
    pub position: u32,
    /// Format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Tracks
    pub track_count: u32,
}

/// Release blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReleaseStore {
    /// External id
    pub id: String,
    /// Title
    pub title: String,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Packaging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    /// Barcode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    /// Language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Release group
    pub release_group: ReleaseGroupEntry,
    /// Credit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_credit: Option<ArtistCreditEntry>,
    /// Release events
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub release_events: Vec<ReleaseEventEntry>,
    /// Labels
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelInfoEntry>,
    /// Media
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediumEntry>,
    /// Tracks over all media
    pub track_count: u32,
}

/// Artist blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ArtistStore {
    /// External id
    pub id: String,
    /// Name
    pub name: String,
    /// Sort name
    pub sort_name: String,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub artist_type: Option<String>,
    /// Gender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Life span
    pub life_span: LifeSpan,
    /// IPI codes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ipis: Vec<String>,
}

/// Label blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LabelStore {
    /// External id
    pub id: String,
    /// Name
    pub name: String,
    /// Sort name
    pub sort_name: String,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    /// Label code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_code: Option<i32>,
    /// Country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    /// Life span
    pub life_span: LifeSpan,
    /// IPI codes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ipis: Vec<String>,
}

/// Work blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkStore {
    /// External id
    pub id: String,
    /// Title
    pub title: String,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    /// Lyrics languages
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// ISWCs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub iswcs: Vec<String>,
}

/// Event blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EventStore {
    /// External id
    pub id: String,
    /// Name
    pub name: String,
    /// Disambiguation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disambiguation: Option<String>,
    /// Type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Life span
    pub life_span: LifeSpan,
}

// ============================================================================
// Builder
// ============================================================================

/// Entity blob plus its side entities, as serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBlob<T> {
    /// The entity itself
    #[serde(flatten)]
    pub entity: T,
    /// Aliases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<AliasEntry>,
    /// Tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagEntry>,
    /// Relations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationEntry>,
}

impl<T: DeserializeOwned> StoreBlob<T> {
    /// Parse a serialized blob.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Accumulates one entity's blob; finished exactly once.
#[derive(Debug, Clone)]
#[must_use]
pub struct StoreBuilder<T> {
    blob: StoreBlob<T>,
}

impl<T: Serialize> StoreBuilder<T> {
    /// Start from the entity's own fields.
    pub fn new(entity: T) -> Self {
        StoreBuilder {
            blob: StoreBlob {
                entity,
                aliases: Vec::new(),
                tags: Vec::new(),
                relations: Vec::new(),
            },
        }
    }

    pub(crate) fn with_aliases(mut self, aliases: Vec<AliasEntry>) -> Self {
        self.blob.aliases.extend(aliases);
        self
    }

    pub(crate) fn with_tags(mut self, tags: Vec<TagEntry>) -> Self {
        self.blob.tags.extend(tags);
        self
    }

    pub(crate) fn with_relations(mut self, relations: Vec<RelationEntry>) -> Self {
        self.blob.relations.extend(relations);
        self
    }

    /// Serialize the blob.
    pub fn finish(self) -> Result<String> {
        Ok(serde_json::to_string(&self.blob)?)
    }
}
