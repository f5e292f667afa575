//! Relational catalog source
//!
//! The builders never talk to a database directly; they pull typed rows
//! through [`CatalogSource`]. Primary rows and side tables are both queried
//! by id range so one chunk's side-maps can be loaded in a handful of
//! batched calls.

use chrono::{DateTime, Utc};
use musearch_core::{IdRange, IndexKind, ReplicationInfo, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Primary rows
// ============================================================================

/// One `recording` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Title
    pub name: String,
    /// Length in milliseconds
    pub length: Option<i32>,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Video flag
    pub video: bool,
    /// Artist credit id
    pub artist_credit: Option<u32>,
}

/// One `release` row, joined with its release group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Title
    pub name: String,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Release status (Official, Promotion, ...)
    pub status: Option<String>,
    /// Packaging
    pub packaging: Option<String>,
    /// Barcode
    pub barcode: Option<String>,
    /// Text language (ISO 639-3)
    pub language: Option<String>,
    /// Text script (ISO 15924)
    pub script: Option<String>,
    /// Release group external id
    pub release_group: String,
    /// Release group primary type
    pub primary_type: Option<String>,
    /// Release group secondary types
    pub secondary_types: Vec<String>,
    /// Artist credit id
    pub artist_credit: Option<u32>,
}

/// One `artist` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Name
    pub name: String,
    /// Sort name
    pub sort_name: String,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Person, Group, ...
    pub artist_type: Option<String>,
    /// Gender
    pub gender: Option<String>,
    /// ISO country code of the area
    pub country: Option<String>,
    /// Area name
    pub area: Option<String>,
    /// Begin date (partial ISO date)
    pub begin: Option<String>,
    /// End date (partial ISO date)
    pub end: Option<String>,
    /// Ended flag
    pub ended: bool,
}

/// One `label` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Name
    pub name: String,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Label type
    pub label_type: Option<String>,
    /// Label code (LC)
    pub code: Option<i32>,
    /// ISO country code of the area
    pub country: Option<String>,
    /// Area name
    pub area: Option<String>,
    /// Begin date
    pub begin: Option<String>,
    /// End date
    pub end: Option<String>,
    /// Ended flag
    pub ended: bool,
}

/// One `work` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Title
    pub name: String,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Work type
    pub work_type: Option<String>,
    /// Lyrics languages
    pub languages: Vec<String>,
}

/// One `event` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRow {
    /// Internal id
    pub id: u32,
    /// External id
    pub gid: String,
    /// Name
    pub name: String,
    /// Disambiguation comment
    pub comment: Option<String>,
    /// Event type
    pub event_type: Option<String>,
    /// Begin date
    pub begin: Option<String>,
    /// End date
    pub end: Option<String>,
    /// Ended flag
    pub ended: bool,
}

/// One annotation of any entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    /// Annotation id
    pub id: u32,
    /// Annotated entity type (artist, release, ...)
    pub entity_type: String,
    /// Annotated entity external id
    pub entity_gid: String,
    /// Annotated entity name
    pub entity_name: String,
    /// Annotation text
    pub text: Option<String>,
    /// When the annotation was written
    pub created: DateTime<Utc>,
}

// ============================================================================
// Side rows
// ============================================================================

/// One track, i.e. one appearance of a recording on a release medium.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRow {
    /// Internal track id
    pub id: u32,
    /// External track id
    pub gid: String,
    /// Recording the track points at
    pub recording: u32,
    /// Release of the medium
    pub release: u32,
    /// Track title
    pub name: String,
    /// Track length in milliseconds
    pub length: Option<i32>,
    /// Free-form track number ("A1", "3")
    pub number: Option<String>,
    /// 1-based position on the medium
    pub position: u32,
    /// 1-based position of the medium on the release
    pub medium_position: u32,
    /// Medium format
    pub medium_format: Option<String>,
    /// Tracks on the medium
    pub medium_track_count: u32,
    /// Artist credit id of the track
    pub artist_credit: Option<u32>,
}

/// Release event (date + country).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseEventRow {
    /// Release id
    pub release: u32,
    /// Partial ISO date
    pub date: Option<String>,
    /// ISO country code
    pub country: Option<String>,
}

/// Label + catalog number of a release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseLabelRow {
    /// Release id
    pub release: u32,
    /// Label external id
    pub label_gid: Option<String>,
    /// Label name
    pub label_name: Option<String>,
    /// Catalog number
    pub catalog_number: Option<String>,
}

/// One medium of a release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediumRow {
    /// Release id
    pub release: u32,
    /// 1-based position
    pub position: u32,
    /// Format (CD, Vinyl, ...)
    pub format: Option<String>,
    /// Tracks on the medium
    pub track_count: u32,
}

/// A tag applied to an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRow {
    /// Tagged entity id
    pub entity: u32,
    /// Tag name
    pub name: String,
    /// Vote count
    pub count: i32,
}

/// An alias of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasRow {
    /// Owning entity id
    pub entity: u32,
    /// Alias name
    pub name: String,
    /// Alias sort name
    pub sort_name: Option<String>,
    /// Locale the alias is used in
    pub locale: Option<String>,
    /// Alias type
    pub alias_type: Option<String>,
    /// Primary alias for its locale
    pub primary: bool,
}

/// Kinds of entity a relation can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationTarget {
    /// An artist
    #[default]
    Artist,
    /// A recording
    Recording,
    /// A place
    Place,
    /// An area
    Area,
}

/// A relation from an entity to another entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationRow {
    /// Source entity id
    pub entity: u32,
    /// Kind of the target
    pub target: RelationTarget,
    /// Target external id
    pub target_gid: String,
    /// Target name
    pub target_name: String,
    /// Relationship type (performer, composer, held at, ...)
    pub relation_type: Option<String>,
}

/// Identifier code tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Recording ISRCs
    Isrc,
    /// Work ISWCs
    Iswc,
    /// Artist IPIs
    ArtistIpi,
    /// Label IPIs
    LabelIpi,
}

/// An identifier code attached to an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeRow {
    /// Owning entity id
    pub entity: u32,
    /// The code
    pub code: String,
}

/// One artist in an artist credit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameCreditRow {
    /// Artist external id
    pub artist_gid: String,
    /// Artist name
    pub artist_name: String,
    /// Artist sort name
    pub artist_sort_name: String,
    /// Name as credited, when different from the artist name
    pub credit_name: Option<String>,
    /// Text joining this artist to the next
    pub join_phrase: Option<String>,
}

/// An artist credit ("Artist A feat. Artist B").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistCreditRow {
    /// Credit id
    pub id: u32,
    /// Credited artists in order
    pub names: Vec<NameCreditRow>,
}

impl ArtistCreditRow {
    /// The credit as displayed: credited names joined by their join phrases.
    pub fn full_name(&self) -> String {
        let mut out = String::new();
        for name in &self.names {
            out.push_str(name.credit_name.as_deref().unwrap_or(&name.artist_name));
            out.push_str(name.join_phrase.as_deref().unwrap_or(""));
        }
        out
    }
}

// ============================================================================
// Source trait
// ============================================================================

/// Queries the builders, the orchestrator and the updater run against the
/// relational catalog.
pub trait CatalogSource: Send + Sync {
    /// Current schema and replication sequence of the database.
    fn replication_info(&self) -> Result<ReplicationInfo>;

    /// Highest primary id of `kind`.
    fn max_id(&self, kind: IndexKind) -> Result<u32>;

    /// Rows of `kind` with id ≤ `max_id` that a build indexes.
    fn row_count(&self, kind: IndexKind, max_id: u32) -> Result<u64>;

    /// Recording rows in `range`.
    fn recordings(&self, range: IdRange) -> Result<Vec<RecordingRow>>;

    /// Release rows in `range`.
    fn releases(&self, range: IdRange) -> Result<Vec<ReleaseRow>>;

    /// Release rows by id.
    fn releases_by_ids(&self, ids: &[u32]) -> Result<Vec<ReleaseRow>>;

    /// Artist rows in `range`.
    fn artists(&self, range: IdRange) -> Result<Vec<ArtistRow>>;

    /// Label rows in `range`.
    fn labels(&self, range: IdRange) -> Result<Vec<LabelRow>>;

    /// Work rows in `range`.
    fn works(&self, range: IdRange) -> Result<Vec<WorkRow>>;

    /// Event rows in `range`.
    fn events(&self, range: IdRange) -> Result<Vec<EventRow>>;

    /// Annotation rows in `range`.
    fn annotations(&self, range: IdRange) -> Result<Vec<AnnotationRow>>;

    /// Tracks whose recording falls in `range`.
    fn tracks_for_recordings(&self, range: IdRange) -> Result<Vec<TrackRow>>;

    /// Release events of the given releases.
    fn release_events(&self, release_ids: &[u32]) -> Result<Vec<ReleaseEventRow>>;

    /// Release events of releases in `range`.
    fn release_events_in(&self, range: IdRange) -> Result<Vec<ReleaseEventRow>>;

    /// Labels of releases in `range`.
    fn release_labels(&self, range: IdRange) -> Result<Vec<ReleaseLabelRow>>;

    /// Mediums of the given releases.
    fn mediums(&self, release_ids: &[u32]) -> Result<Vec<MediumRow>>;

    /// Mediums of releases in `range`.
    fn mediums_in(&self, range: IdRange) -> Result<Vec<MediumRow>>;

    /// Tags of entities of `kind` in `range`.
    fn tags(&self, kind: IndexKind, range: IdRange) -> Result<Vec<TagRow>>;

    /// Aliases of entities of `kind` in `range`.
    fn aliases(&self, kind: IndexKind, range: IdRange) -> Result<Vec<AliasRow>>;

    /// Relations from entities of `kind` in `range`.
    fn relations(&self, kind: IndexKind, range: IdRange) -> Result<Vec<RelationRow>>;

    /// Identifier codes of entities in `range`.
    fn codes(&self, kind: CodeKind, range: IdRange) -> Result<Vec<CodeRow>>;

    /// Artist credits by id.
    fn artist_credits(&self, ids: &[u32]) -> Result<BTreeMap<u32, ArtistCreditRow>>;

    /// Artist credit of each recording or release in `range`, keyed by
    /// entity id.
    fn entity_artist_credits(
        &self,
        kind: IndexKind,
        range: IdRange,
    ) -> Result<BTreeMap<u32, ArtistCreditRow>>;

    /// Ids of entities of `kind` that use artist credit `credit`.
    fn ids_with_artist_credit(&self, kind: IndexKind, credit: u32) -> Result<Vec<u32>>;

    /// Ids of recordings with a track on `release`.
    fn recordings_on_release(&self, release: u32) -> Result<Vec<u32>>;
}

/// Group side rows by owning id, keeping source order within a group.
pub fn group_by<T>(rows: Vec<T>, key: impl Fn(&T) -> u32) -> BTreeMap<u32, Vec<T>> {
    let mut out: BTreeMap<u32, Vec<T>> = BTreeMap::new();
    for row in rows {
        out.entry(key(&row)).or_default().push(row);
    }
    out
}
