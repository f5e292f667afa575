//! Entity document builders
//!
//! One builder per index. A builder turns one primary row plus the side-maps
//! of its chunk into at most one [`Document`]:
//!
//! 1. `load_side_maps` runs the batched side-table queries for an id range
//! 2. `fetch_rows` reads the primary rows of the same range
//! 3. `build` is a pure function of (row, side-maps), so chunks can be built
//!    in any order or concurrently with the same result
//!
//! `build` returns `Ok(None)` for rows that are deliberately not indexed
//! (tombstone entities, empty annotations) and an error for rows that can't
//! be turned into a document, which fails the whole chunk.

mod annotation;
mod artist;
mod event;
mod label;
mod recording;
mod release;
mod work;

pub use annotation::AnnotationBuilder;
pub use artist::ArtistBuilder;
pub use event::EventBuilder;
pub use label::LabelBuilder;
pub use recording::RecordingBuilder;
pub use release::ReleaseBuilder;
pub use work::WorkBuilder;

use crate::source::{ArtistCreditRow, CatalogSource, NameCreditRow};
use crate::timing::{Phase, PhaseTimings};
use musearch_core::{Document, Error, IdRange, IndexKind, Result};

/// Reserved "Deleted Artist" placeholder, never indexed.
pub const DELETED_ARTIST_GID: &str = "c06aa285-520e-40c0-b776-83d2c9e8a6d1";

/// Reserved "Deleted Label" placeholder, never indexed.
pub const DELETED_LABEL_GID: &str = "f43e252d-9ebf-4e8e-bba8-36d080756cc1";

/// Artist credit id of "Various Artists".
pub const VARIOUS_ARTISTS_CREDIT_ID: u32 = 1;

/// External id of the "Various Artists" artist.
pub const VARIOUS_ARTISTS_GID: &str = "89ad4ac3-39f7-470e-963a-56509c546377";

/// Name of the "Various Artists" artist.
pub const VARIOUS_ARTISTS_NAME: &str = "Various Artists";

/// Release group secondary types that name the legacy type, by priority.
const LEGACY_SECONDARY_TYPES: [&str; 7] = [
    "Compilation",
    "Soundtrack",
    "Spokenword",
    "Interview",
    "Audiobook",
    "Live",
    "Remix",
];

/// Single pre-NGS release type: the first significant secondary type, else
/// the primary type.
pub fn legacy_release_type(primary: Option<&str>, secondary: &[String]) -> Option<String> {
    LEGACY_SECONDARY_TYPES
        .iter()
        .find(|t| secondary.iter().any(|s| s.eq_ignore_ascii_case(t)))
        .map(|t| t.to_string())
        .or_else(|| primary.filter(|p| !p.is_empty()).map(str::to_string))
}

/// The canonical "Various Artists" credit.
pub fn various_artists_credit() -> ArtistCreditRow {
    ArtistCreditRow {
        id: VARIOUS_ARTISTS_CREDIT_ID,
        names: vec![NameCreditRow {
            artist_gid: VARIOUS_ARTISTS_GID.to_string(),
            artist_name: VARIOUS_ARTISTS_NAME.to_string(),
            artist_sort_name: VARIOUS_ARTISTS_NAME.to_string(),
            credit_name: None,
            join_phrase: None,
        }],
    }
}

/// Fail the row when its external id is missing.
pub(crate) fn require_gid(kind: IndexKind, id: u32, gid: &str) -> Result<()> {
    if gid.is_empty() {
        return Err(Error::MalformedRow {
            entity: kind.name().to_string(),
            id,
            message: "missing external id".to_string(),
        });
    }
    Ok(())
}

/// Serialize a store blob, timed as its own phase.
pub(crate) fn finish_store<T: serde::Serialize>(
    store: crate::store::StoreBuilder<T>,
    timings: &PhaseTimings,
) -> Result<String> {
    let _t = timings.time(Phase::SerializeStore);
    store.finish()
}

// ============================================================================
// Builder trait
// ============================================================================

/// Turns rows of one entity type into documents.
pub trait EntityBuilder: Send + Sync {
    /// Primary row type.
    type Row: Send + Sync;

    /// Side-maps of one chunk, keyed by entity id.
    type SideMaps: Send + Sync;

    /// Index the builder fills.
    fn kind(&self) -> IndexKind;

    /// Run the batched side-table queries for `range`.
    fn load_side_maps(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Self::SideMaps>;

    /// Read the primary rows of `range`.
    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<Self::Row>>;

    /// Internal id of a row.
    fn row_id(&self, row: &Self::Row) -> u32;

    /// Build the document of one row; `None` skips the row.
    fn build(
        &self,
        row: &Self::Row,
        side: &Self::SideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>>;

    /// [`build`](Self::build), timed as the document phase.
    fn document(
        &self,
        row: &Self::Row,
        side: &Self::SideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        let _t = timings.time(Phase::BuildDocuments);
        self.build(row, side, timings)
    }

    /// Every document of `range`, built sequentially.
    fn build_range(
        &self,
        source: &dyn CatalogSource,
        range: IdRange,
        timings: &PhaseTimings,
    ) -> Result<Vec<Document>> {
        let side = {
            let _t = timings.time(Phase::LoadSideMaps);
            self.load_side_maps(source, range)?
        };
        let rows = {
            let _t = timings.time(Phase::FetchRows);
            self.fetch_rows(source, range)?
        };
        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(doc) = self.document(row, &side, timings)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

/// Documents of `kind` for every entity in `range`.
pub fn documents_for(
    kind: IndexKind,
    source: &dyn CatalogSource,
    range: IdRange,
    timings: &PhaseTimings,
) -> Result<Vec<Document>> {
    match kind {
        IndexKind::Recording => RecordingBuilder.build_range(source, range, timings),
        IndexKind::Release => ReleaseBuilder.build_range(source, range, timings),
        IndexKind::Work => WorkBuilder.build_range(source, range, timings),
        IndexKind::Artist => ArtistBuilder.build_range(source, range, timings),
        IndexKind::Label => LabelBuilder.build_range(source, range, timings),
        IndexKind::Event => EventBuilder.build_range(source, range, timings),
        IndexKind::Annotation => AnnotationBuilder.build_range(source, range, timings),
    }
}
