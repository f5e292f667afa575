//! In-memory catalog
//!
//! A [`CatalogSource`] over plain row vectors, loadable from JSON. Used by
//! the CLI for catalog snapshots and by tests, which can mutate it mid-build
//! and make chosen id ranges fail.

use crate::builders::{DELETED_ARTIST_GID, DELETED_LABEL_GID};
use crate::source::*;
use musearch_core::{Error, IdRange, IndexKind, ReplicationInfo, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Every table the catalog serves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogData {
    /// `replication_control.current_schema_sequence`
    pub schema_sequence: i32,
    /// `replication_control.current_replication_sequence`
    pub replication_sequence: i32,
    /// Recordings
    pub recordings: Vec<RecordingRow>,
    /// Releases
    pub releases: Vec<ReleaseRow>,
    /// Artists
    pub artists: Vec<ArtistRow>,
    /// Labels
    pub labels: Vec<LabelRow>,
    /// Works
    pub works: Vec<WorkRow>,
    /// Events
    pub events: Vec<EventRow>,
    /// Annotations
    pub annotations: Vec<AnnotationRow>,
    /// Tracks
    pub tracks: Vec<TrackRow>,
    /// Release events
    pub release_events: Vec<ReleaseEventRow>,
    /// Release labels
    pub release_labels: Vec<ReleaseLabelRow>,
    /// Mediums
    pub mediums: Vec<MediumRow>,
    /// Tags per entity kind
    pub tags: HashMap<IndexKind, Vec<TagRow>>,
    /// Aliases per entity kind
    pub aliases: HashMap<IndexKind, Vec<AliasRow>>,
    /// Relations per source entity kind
    pub relations: HashMap<IndexKind, Vec<RelationRow>>,
    /// Identifier codes per table
    pub codes: HashMap<CodeKind, Vec<CodeRow>>,
    /// Artist credits
    pub artist_credits: Vec<ArtistCreditRow>,
}

/// In-memory [`CatalogSource`].
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
    failing: Mutex<Vec<(IndexKind, u32)>>,
}

fn in_range<T: Clone>(rows: &[T], range: IdRange, id: impl Fn(&T) -> u32) -> Vec<T> {
    rows.iter().filter(|r| range.contains(id(r))).cloned().collect()
}

fn in_ids<T: Clone>(rows: &[T], ids: &[u32], id: impl Fn(&T) -> u32) -> Vec<T> {
    rows.iter().filter(|r| ids.contains(&id(r))).cloned().collect()
}

fn max_of<T>(rows: &[T], id: impl Fn(&T) -> u32) -> u32 {
    rows.iter().map(id).max().unwrap_or(0)
}

impl MemoryCatalog {
    /// Catalog over `data`.
    pub fn new(data: CatalogData) -> Self {
        MemoryCatalog {
            data: RwLock::new(data),
            failing: Mutex::new(Vec::new()),
        }
    }

    /// Parse a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON snapshot file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Mutate the tables in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut CatalogData) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Read the tables.
    pub fn read<R>(&self, f: impl FnOnce(&CatalogData) -> R) -> R {
        f(&self.data.read())
    }

    /// Make every primary-row query of `kind` covering `id` fail.
    pub fn fail_range_containing(&self, kind: IndexKind, id: u32) {
        self.failing.lock().push((kind, id));
    }

    fn check(&self, kind: IndexKind, range: IdRange) -> Result<()> {
        let failing = self.failing.lock();
        match failing.iter().find(|(k, id)| *k == kind && range.contains(*id)) {
            Some(_) => Err(Error::Source {
                entity: kind.name().to_string(),
                min: range.min,
                max: range.max,
                message: "connection reset while fetching rows".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl CatalogSource for MemoryCatalog {
    fn replication_info(&self) -> Result<ReplicationInfo> {
        let data = self.data.read();
        Ok(ReplicationInfo::new(
            data.schema_sequence,
            data.replication_sequence,
        ))
    }

    fn max_id(&self, kind: IndexKind) -> Result<u32> {
        let d = self.data.read();
        Ok(match kind {
            IndexKind::Recording => max_of(&d.recordings, |r| r.id),
            IndexKind::Release => max_of(&d.releases, |r| r.id),
            IndexKind::Artist => max_of(&d.artists, |r| r.id),
            IndexKind::Label => max_of(&d.labels, |r| r.id),
            IndexKind::Work => max_of(&d.works, |r| r.id),
            IndexKind::Event => max_of(&d.events, |r| r.id),
            IndexKind::Annotation => max_of(&d.annotations, |r| r.id),
        })
    }

    fn row_count(&self, kind: IndexKind, max_id: u32) -> Result<u64> {
        let d = self.data.read();
        let count = match kind {
            IndexKind::Recording => d.recordings.iter().filter(|r| r.id <= max_id).count(),
            IndexKind::Release => d.releases.iter().filter(|r| r.id <= max_id).count(),
            IndexKind::Artist => d
                .artists
                .iter()
                .filter(|r| r.id <= max_id && r.gid != DELETED_ARTIST_GID)
                .count(),
            IndexKind::Label => d
                .labels
                .iter()
                .filter(|r| r.id <= max_id && r.gid != DELETED_LABEL_GID)
                .count(),
            IndexKind::Work => d.works.iter().filter(|r| r.id <= max_id).count(),
            IndexKind::Event => d.events.iter().filter(|r| r.id <= max_id).count(),
            IndexKind::Annotation => d
                .annotations
                .iter()
                .filter(|r| r.id <= max_id && r.text.as_deref().is_some_and(|t| !t.is_empty()))
                .count(),
        };
        Ok(count as u64)
    }

    fn recordings(&self, range: IdRange) -> Result<Vec<RecordingRow>> {
        self.check(IndexKind::Recording, range)?;
        Ok(in_range(&self.data.read().recordings, range, |r| r.id))
    }

    fn releases(&self, range: IdRange) -> Result<Vec<ReleaseRow>> {
        self.check(IndexKind::Release, range)?;
        Ok(in_range(&self.data.read().releases, range, |r| r.id))
    }

    fn releases_by_ids(&self, ids: &[u32]) -> Result<Vec<ReleaseRow>> {
        Ok(in_ids(&self.data.read().releases, ids, |r| r.id))
    }

    fn artists(&self, range: IdRange) -> Result<Vec<ArtistRow>> {
        self.check(IndexKind::Artist, range)?;
        Ok(in_range(&self.data.read().artists, range, |r| r.id))
    }

    fn labels(&self, range: IdRange) -> Result<Vec<LabelRow>> {
        self.check(IndexKind::Label, range)?;
        Ok(in_range(&self.data.read().labels, range, |r| r.id))
    }

    fn works(&self, range: IdRange) -> Result<Vec<WorkRow>> {
        self.check(IndexKind::Work, range)?;
        Ok(in_range(&self.data.read().works, range, |r| r.id))
    }

    fn events(&self, range: IdRange) -> Result<Vec<EventRow>> {
        self.check(IndexKind::Event, range)?;
        Ok(in_range(&self.data.read().events, range, |r| r.id))
    }

    fn annotations(&self, range: IdRange) -> Result<Vec<AnnotationRow>> {
        self.check(IndexKind::Annotation, range)?;
        Ok(in_range(&self.data.read().annotations, range, |r| r.id))
    }

    fn tracks_for_recordings(&self, range: IdRange) -> Result<Vec<TrackRow>> {
        Ok(in_range(&self.data.read().tracks, range, |t| t.recording))
    }

    fn release_events(&self, release_ids: &[u32]) -> Result<Vec<ReleaseEventRow>> {
        Ok(in_ids(&self.data.read().release_events, release_ids, |e| e.release))
    }

    fn release_events_in(&self, range: IdRange) -> Result<Vec<ReleaseEventRow>> {
        Ok(in_range(&self.data.read().release_events, range, |e| e.release))
    }

    fn release_labels(&self, range: IdRange) -> Result<Vec<ReleaseLabelRow>> {
        Ok(in_range(&self.data.read().release_labels, range, |l| l.release))
    }

    fn mediums(&self, release_ids: &[u32]) -> Result<Vec<MediumRow>> {
        Ok(in_ids(&self.data.read().mediums, release_ids, |m| m.release))
    }

    fn mediums_in(&self, range: IdRange) -> Result<Vec<MediumRow>> {
        Ok(in_range(&self.data.read().mediums, range, |m| m.release))
    }

    fn tags(&self, kind: IndexKind, range: IdRange) -> Result<Vec<TagRow>> {
        let d = self.data.read();
        Ok(d.tags
            .get(&kind)
            .map(|rows| in_range(rows, range, |t| t.entity))
            .unwrap_or_default())
    }

    fn aliases(&self, kind: IndexKind, range: IdRange) -> Result<Vec<AliasRow>> {
        let d = self.data.read();
        Ok(d.aliases
            .get(&kind)
            .map(|rows| in_range(rows, range, |a| a.entity))
            .unwrap_or_default())
    }

    fn relations(&self, kind: IndexKind, range: IdRange) -> Result<Vec<RelationRow>> {
        let d = self.data.read();
        Ok(d.relations
            .get(&kind)
            .map(|rows| in_range(rows, range, |r| r.entity))
            .unwrap_or_default())
    }

    fn codes(&self, kind: CodeKind, range: IdRange) -> Result<Vec<CodeRow>> {
        let d = self.data.read();
        Ok(d.codes
            .get(&kind)
            .map(|rows| in_range(rows, range, |c| c.entity))
            .unwrap_or_default())
    }

    fn artist_credits(&self, ids: &[u32]) -> Result<BTreeMap<u32, ArtistCreditRow>> {
        Ok(self
            .data
            .read()
            .artist_credits
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| (c.id, c.clone()))
            .collect())
    }

    fn entity_artist_credits(
        &self,
        kind: IndexKind,
        range: IdRange,
    ) -> Result<BTreeMap<u32, ArtistCreditRow>> {
        let d = self.data.read();
        let owners: Vec<(u32, u32)> = match kind {
            IndexKind::Recording => d
                .recordings
                .iter()
                .filter(|r| range.contains(r.id))
                .filter_map(|r| r.artist_credit.map(|ac| (r.id, ac)))
                .collect(),
            IndexKind::Release => d
                .releases
                .iter()
                .filter(|r| range.contains(r.id))
                .filter_map(|r| r.artist_credit.map(|ac| (r.id, ac)))
                .collect(),
            _ => Vec::new(),
        };
        Ok(owners
            .into_iter()
            .filter_map(|(owner, ac)| {
                d.artist_credits
                    .iter()
                    .find(|c| c.id == ac)
                    .map(|c| (owner, c.clone()))
            })
            .collect())
    }

    fn ids_with_artist_credit(&self, kind: IndexKind, credit: u32) -> Result<Vec<u32>> {
        let d = self.data.read();
        let uses = |ac: Option<u32>| ac == Some(credit);
        let mut ids: Vec<u32> = match kind {
            IndexKind::Recording => d
                .recordings
                .iter()
                .filter(|r| uses(r.artist_credit))
                .map(|r| r.id)
                .chain(d.tracks.iter().filter(|t| uses(t.artist_credit)).map(|t| t.recording))
                .collect(),
            IndexKind::Release => d
                .releases
                .iter()
                .filter(|r| uses(r.artist_credit))
                .map(|r| r.id)
                .collect(),
            _ => Vec::new(),
        };
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn recordings_on_release(&self, release: u32) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self
            .data
            .read()
            .tracks
            .iter()
            .filter(|t| t.release == release)
            .map(|t| t.recording)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}
