//! Recording documents
//!
//! A recording document flattens every track that uses the recording, and
//! for each track its medium, release, release group and release events, so
//! a recording can be found by anything printed on a release it appears on.
//!
//! Display credit precedence: the recording's own credit is always indexed;
//! a track credit is indexed and stored only when it differs from the
//! recording credit; a release credit is stored only when it differs from
//! the credit already shown for the track. Releases credited to "Various
//! Artists" always carry the canonical various-artists credit.

use super::{
    finish_store, legacy_release_type, require_gid, various_artists_credit, EntityBuilder,
    VARIOUS_ARTISTS_CREDIT_ID,
};
use crate::side::{add_credit, add_tags, credit_entry, CREDIT_FIELDS};
use crate::source::{
    group_by, ArtistCreditRow, CatalogSource, CodeKind, CodeRow, MediumRow, RecordingRow,
    ReleaseEventRow, ReleaseRow, TagRow, TrackRow,
};
use crate::store::{
    RecordingMediumEntry, RecordingReleaseEntry, RecordingStore, ReleaseEventEntry,
    ReleaseGroupEntry, StoreBuilder, TrackEntry,
};
use crate::timing::PhaseTimings;
use musearch_core::{Document, IdRange, IndexKind, Result, ID_FIELD, NO_VALUE, STORE_FIELD};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Durations are quantized into buckets of this many milliseconds for `qdur`.
pub const QUANTIZED_DURATION: i32 = 2000;

/// Side-maps of a recording chunk.
#[derive(Debug, Default)]
pub struct RecordingSideMaps {
    tracks: BTreeMap<u32, Vec<TrackRow>>,
    releases: HashMap<u32, ReleaseRow>,
    release_events: BTreeMap<u32, Vec<ReleaseEventRow>>,
    release_track_counts: HashMap<u32, u32>,
    recording_credits: BTreeMap<u32, ArtistCreditRow>,
    credits: BTreeMap<u32, ArtistCreditRow>,
    isrcs: BTreeMap<u32, Vec<CodeRow>>,
    tags: BTreeMap<u32, Vec<TagRow>>,
}

/// Builds the `recording` index.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingBuilder;

impl EntityBuilder for RecordingBuilder {
    type Row = RecordingRow;
    type SideMaps = RecordingSideMaps;

    fn kind(&self) -> IndexKind {
        IndexKind::Recording
    }

    fn load_side_maps(
        &self,
        source: &dyn CatalogSource,
        range: IdRange,
    ) -> Result<RecordingSideMaps> {
        let tracks = source.tracks_for_recordings(range)?;

        let release_ids: Vec<u32> = tracks
            .iter()
            .map(|t| t.release)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let releases: HashMap<u32, ReleaseRow> = source
            .releases_by_ids(&release_ids)?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        let mut release_events = group_by(source.release_events(&release_ids)?, |e| e.release);
        for events in release_events.values_mut() {
            sort_release_events(events);
        }

        let mut release_track_counts: HashMap<u32, u32> = HashMap::new();
        for medium in source.mediums(&release_ids)? {
            let MediumRow {
                release,
                track_count,
                ..
            } = medium;
            *release_track_counts.entry(release).or_default() += track_count;
        }

        let credit_ids: Vec<u32> = tracks
            .iter()
            .filter_map(|t| t.artist_credit)
            .chain(releases.values().filter_map(|r| r.artist_credit))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(RecordingSideMaps {
            tracks: group_by(tracks, |t| t.recording),
            releases,
            release_events,
            release_track_counts,
            recording_credits: source.entity_artist_credits(IndexKind::Recording, range)?,
            credits: source.artist_credits(&credit_ids)?,
            isrcs: group_by(source.codes(CodeKind::Isrc, range)?, |c| c.entity),
            tags: group_by(source.tags(IndexKind::Recording, range)?, |t| t.entity),
        })
    }

    fn fetch_rows(&self, source: &dyn CatalogSource, range: IdRange) -> Result<Vec<RecordingRow>> {
        source.recordings(range)
    }

    fn row_id(&self, row: &RecordingRow) -> u32 {
        row.id
    }

    fn build(
        &self,
        row: &RecordingRow,
        side: &RecordingSideMaps,
        timings: &PhaseTimings,
    ) -> Result<Option<Document>> {
        require_gid(IndexKind::Recording, row.id, &row.gid)?;

        let mut titles: BTreeSet<String> = BTreeSet::new();
        let mut durations: BTreeSet<i32> = BTreeSet::new();

        let mut doc = Document::new();
        doc.add_text(ID_FIELD, row.id.to_string())
            .add_text("rid", &row.gid)
            .add_text("recordingaccent", &row.name)
            .add_or_no_value("comment", row.comment.as_deref());
        titles.insert(row.name.to_lowercase());
        if let Some(length) = row.length.filter(|l| *l > 0) {
            durations.insert(length);
        }
        if row.video {
            doc.add_text("video", "true");
        }

        let isrcs: Vec<String> = side
            .isrcs
            .get(&row.id)
            .map(|codes| codes.iter().map(|c| c.code.clone()).collect())
            .unwrap_or_default();
        if isrcs.is_empty() {
            doc.add_text("isrc", NO_VALUE);
        }
        for isrc in &isrcs {
            doc.add_text("isrc", isrc);
        }

        let recording_credit = side.recording_credits.get(&row.id);
        let artist_credit = recording_credit.map(|c| add_credit(&mut doc, CREDIT_FIELDS, c));

        let mut releases = Vec::new();
        match side.tracks.get(&row.id) {
            Some(tracks) => {
                for track in tracks {
                    titles.insert(track.name.to_lowercase());
                    if let Some(length) = track.length.filter(|l| *l > 0) {
                        durations.insert(length);
                    }
                    // Release-level fields need the release row.
                    let Some(release) = side.releases.get(&track.release) else {
                        continue;
                    };
                    releases.push(self.add_track(
                        &mut doc,
                        side,
                        track,
                        release,
                        recording_credit,
                    ));
                }
            }
            None => {
                doc.add_text("type", "standalone");
            }
        }

        if durations.is_empty() {
            doc.add_text("duration", NO_VALUE).add_text("qdur", NO_VALUE);
        } else {
            let quantized: BTreeSet<i32> =
                durations.iter().map(|d| d / QUANTIZED_DURATION).collect();
            for duration in &durations {
                doc.add_int("duration", *duration);
            }
            for qdur in quantized {
                doc.add_int("qdur", qdur);
            }
        }

        for title in &titles {
            doc.add_non_empty("recording", Some(title.as_str()));
        }

        let store = StoreBuilder::new(RecordingStore {
            id: row.gid.clone(),
            title: row.name.clone(),
            length: row.length.filter(|l| *l > 0),
            disambiguation: row.comment.clone().filter(|c| !c.is_empty()),
            video: row.video,
            isrcs,
            artist_credit,
            releases,
        });
        let store = add_tags(&mut doc, store, "tag", side.tags.get(&row.id));

        doc.add_text(STORE_FIELD, finish_store(store, timings)?);
        Ok(Some(doc))
    }
}

impl RecordingBuilder {
    /// Index one track of the recording and return its store entry.
    fn add_track(
        &self,
        doc: &mut Document,
        side: &RecordingSideMaps,
        track: &TrackRow,
        release: &ReleaseRow,
        recording_credit: Option<&ArtistCreditRow>,
    ) -> RecordingReleaseEntry {
        let legacy_type =
            legacy_release_type(release.primary_type.as_deref(), &release.secondary_types);

        doc.add_non_empty("tid", Some(track.gid.as_str()))
            .add_or_unknown("rgid", Some(release.release_group.as_str()))
            .add_or_unknown("primarytype", release.primary_type.as_deref());
        for secondary in &release.secondary_types {
            doc.add_text("secondarytype", secondary);
        }
        doc.add_or_no_value("type", legacy_type.as_deref())
            .add_int("tracks", track.medium_track_count as i32)
            .add_int("tnum", track.position as i32)
            .add_or_no_value("number", track.number.as_deref())
            .add_or_no_value("status", release.status.as_deref());

        let events: &[ReleaseEventRow] = side
            .release_events
            .get(&release.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if events.is_empty() {
            doc.add_text("date", NO_VALUE).add_text("country", NO_VALUE);
        }
        for event in events {
            doc.add_or_no_value("date", event.date.as_deref())
                .add_or_no_value("country", event.country.as_deref());
        }

        let release_track_count = side
            .release_track_counts
            .get(&release.id)
            .copied()
            .unwrap_or(0);
        doc.add_text("reid", &release.gid)
            .add_text("release", &release.name)
            .add_int("tracksrelease", release_track_count as i32)
            .add_int("position", track.medium_position as i32)
            .add_or_no_value("format", track.medium_format.as_deref());

        let track_credit = track.artist_credit.and_then(|id| side.credits.get(&id));
        let track_credit_entry = match (track_credit, recording_credit) {
            (Some(tc), Some(rc)) if tc.id == rc.id => None,
            (Some(tc), _) => Some(add_credit(doc, CREDIT_FIELDS, tc)),
            (None, _) => None,
        };

        // Credit shown for the track, against which the release credit is
        // compared.
        let shown_credit = track_credit.or(recording_credit).map(|c| c.id);
        let release_credit = match release.artist_credit {
            Some(VARIOUS_ARTISTS_CREDIT_ID) => Some(credit_entry(&various_artists_credit())),
            Some(id) if Some(id) != shown_credit => side.credits.get(&id).map(credit_entry),
            _ => None,
        };

        RecordingReleaseEntry {
            id: release.gid.clone(),
            title: release.name.clone(),
            status: release.status.clone(),
            release_group: ReleaseGroupEntry {
                id: release.release_group.clone(),
                primary_type: release.primary_type.clone(),
                secondary_types: release.secondary_types.clone(),
                legacy_type,
            },
            artist_credit: release_credit,
            date: events.first().and_then(|e| e.date.clone()),
            country: events.first().and_then(|e| e.country.clone()),
            release_events: events
                .iter()
                .map(|e| ReleaseEventEntry {
                    date: e.date.clone(),
                    country: e.country.clone(),
                })
                .collect(),
            track_count: release_track_count,
            medium: RecordingMediumEntry {
                position: track.medium_position,
                format: track.medium_format.clone(),
                track_count: track.medium_track_count,
                track_offset: track.position.saturating_sub(1),
                track: TrackEntry {
                    id: track.gid.clone(),
                    title: track.name.clone(),
                    length: track.length,
                    number: track.number.clone(),
                    artist_credit: track_credit_entry,
                },
            },
        }
    }
}

/// Earliest dated event first; undated events last.
fn sort_release_events(events: &mut [ReleaseEventRow]) {
    events.sort_by(|a, b| match (&a.date, &b.date) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CatalogData, MemoryCatalog};
    use crate::source::NameCreditRow;
    use crate::store::StoreBlob;
    use musearch_core::UNKNOWN;
    use std::collections::HashMap as Map;

    fn credit(id: u32, name: &str) -> ArtistCreditRow {
        ArtistCreditRow {
            id,
            names: vec![NameCreditRow {
                artist_gid: format!("artist-{}", id),
                artist_name: name.into(),
                artist_sort_name: name.into(),
                ..Default::default()
            }],
        }
    }

    fn crocodiles() -> CatalogData {
        CatalogData {
            recordings: vec![RecordingRow {
                id: 2,
                gid: "rec-2".into(),
                name: "Crocodiles".into(),
                length: Some(33000),
                artist_credit: Some(10),
                ..Default::default()
            }],
            releases: vec![ReleaseRow {
                id: 1,
                gid: "rel-1".into(),
                name: "Crocodiles".into(),
                status: Some("Official".into()),
                release_group: "rg-1".into(),
                primary_type: Some("Album".into()),
                artist_credit: Some(10),
                ..Default::default()
            }],
            tracks: vec![TrackRow {
                id: 7,
                gid: "trk-7".into(),
                recording: 2,
                release: 1,
                name: "Crocodiles (bonus disc)".into(),
                length: Some(33100),
                number: Some("1".into()),
                position: 1,
                medium_position: 2,
                medium_format: Some("CD".into()),
                medium_track_count: 10,
                artist_credit: Some(10),
            }],
            mediums: vec![
                MediumRow { release: 1, position: 1, format: Some("CD".into()), track_count: 10 },
                MediumRow { release: 1, position: 2, format: Some("CD".into()), track_count: 10 },
            ],
            release_events: vec![ReleaseEventRow {
                release: 1,
                date: Some("1980-07-18".into()),
                country: Some("GB".into()),
            }],
            artist_credits: vec![credit(10, "Echo & the Bunnymen")],
            ..Default::default()
        }
    }

    fn build(data: CatalogData, range: IdRange) -> Vec<Document> {
        RecordingBuilder
            .build_range(&MemoryCatalog::new(data), range, &PhaseTimings::new())
            .unwrap()
    }

    #[test]
    fn test_crocodiles_titles_and_durations() {
        let docs = build(crocodiles(), IdRange::new(0, 2));
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.numbers("duration"), vec![33000, 33100]);
        assert_eq!(doc.numbers("qdur"), vec![16]);
        assert_eq!(
            doc.texts("recording"),
            vec!["crocodiles", "crocodiles (bonus disc)"]
        );
        assert_eq!(doc.texts("recordingaccent"), vec!["Crocodiles"]);
    }

    #[test]
    fn test_track_fields() {
        let docs = build(crocodiles(), IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.get("tid"), Some("trk-7"));
        assert_eq!(doc.get("reid"), Some("rel-1"));
        assert_eq!(doc.get("type"), Some("Album"));
        assert_eq!(doc.get("status"), Some("Official"));
        assert_eq!(doc.numbers("tracksrelease"), vec![20]);
        assert_eq!(doc.numbers("position"), vec![2]);
        assert_eq!(doc.get("date"), Some("1980-07-18"));
        assert_eq!(doc.get("isrc"), Some(NO_VALUE));
    }

    #[test]
    fn test_same_credit_not_repeated() {
        let docs = build(crocodiles(), IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.texts("artist"), vec!["Echo & the Bunnymen"]);

        let blob = StoreBlob::<RecordingStore>::parse(doc.get(STORE_FIELD).unwrap()).unwrap();
        let release = &blob.entity.releases[0];
        assert!(release.artist_credit.is_none());
        assert!(release.medium.track.artist_credit.is_none());
        assert_eq!(release.medium.track_offset, 0);
        assert_eq!(release.track_count, 20);
    }

    #[test]
    fn test_track_credit_differs() {
        let mut data = crocodiles();
        data.artist_credits.push(credit(11, "Ian McCulloch"));
        data.tracks[0].artist_credit = Some(11);
        let docs = build(data, IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.texts("artist"), vec!["Echo & the Bunnymen", "Ian McCulloch"]);

        let blob = StoreBlob::<RecordingStore>::parse(doc.get(STORE_FIELD).unwrap()).unwrap();
        let release = &blob.entity.releases[0];
        assert!(release.medium.track.artist_credit.is_some());
        // Release credit differs from the track credit shown.
        assert!(release.artist_credit.is_some());
    }

    #[test]
    fn test_various_artists_release() {
        let mut data = crocodiles();
        data.releases[0].artist_credit = Some(VARIOUS_ARTISTS_CREDIT_ID);
        let docs = build(data, IdRange::new(0, 2));
        let blob = StoreBlob::<RecordingStore>::parse(docs[0].get(STORE_FIELD).unwrap()).unwrap();
        let credit = blob.entity.releases[0].artist_credit.as_ref().unwrap();
        assert_eq!(credit.name_credits[0].name, "Various Artists");
    }

    #[test]
    fn test_standalone_recording() {
        let mut data = crocodiles();
        data.tracks.clear();
        data.recordings[0].length = None;
        let docs = build(data, IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.get("type"), Some("standalone"));
        assert_eq!(doc.get("duration"), Some(NO_VALUE));
        assert_eq!(doc.get("qdur"), Some(NO_VALUE));
        assert!(!doc.has("tid"));
        assert_eq!(doc.texts("recording"), vec!["crocodiles"]);
    }

    #[test]
    fn test_partial_release_events_stay_aligned() {
        let mut data = crocodiles();
        data.release_events = vec![
            ReleaseEventRow { release: 1, date: Some("1980-07-18".into()), country: Some("GB".into()) },
            ReleaseEventRow { release: 1, date: Some("1981".into()), country: None },
            ReleaseEventRow { release: 1, date: None, country: Some("US".into()) },
        ];
        let docs = build(data, IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.texts("date"), vec!["1980-07-18", "1981", NO_VALUE]);
        assert_eq!(doc.texts("country"), vec!["GB", NO_VALUE, "US"]);
    }

    #[test]
    fn test_track_without_release_keeps_title_and_length() {
        let mut data = crocodiles();
        data.tracks[0].release = 99;
        let docs = build(data, IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.numbers("duration"), vec![33000, 33100]);
        assert_eq!(
            doc.texts("recording"),
            vec!["crocodiles", "crocodiles (bonus disc)"]
        );
        assert!(!doc.has("reid"));
        assert!(!doc.has("tid"));
    }

    #[test]
    fn test_missing_release_group_type() {
        let mut data = crocodiles();
        data.releases[0].primary_type = None;
        data.releases[0].status = None;
        data.release_events.clear();
        let docs = build(data, IdRange::new(0, 2));
        let doc = &docs[0];
        assert_eq!(doc.get("primarytype"), Some(UNKNOWN));
        assert_eq!(doc.get("type"), Some(NO_VALUE));
        assert_eq!(doc.get("status"), Some(NO_VALUE));
        assert_eq!(doc.get("date"), Some(NO_VALUE));
        assert_eq!(doc.get("country"), Some(NO_VALUE));
    }

    #[test]
    fn test_chunks_build_same_documents() {
        let mut data = crocodiles();
        for id in 3..=9 {
            data.recordings.push(RecordingRow {
                id,
                gid: format!("rec-{}", id),
                name: format!("Track {}", id),
                length: Some(1000 * id as i32),
                ..Default::default()
            });
        }
        data.tags = Map::from([(
            IndexKind::Recording,
            vec![
                TagRow { entity: 4, name: "post-punk".into(), count: 1 },
                TagRow { entity: 8, name: "new wave".into(), count: 2 },
            ],
        )]);
        let catalog = MemoryCatalog::new(data);
        let timings = PhaseTimings::new();

        let whole = RecordingBuilder
            .build_range(&catalog, IdRange::new(0, 9), &timings)
            .unwrap();
        let mut chunked = Vec::new();
        for range in IdRange::chunks(9, 3).into_iter().rev() {
            chunked.extend(RecordingBuilder.build_range(&catalog, range, &timings).unwrap());
        }
        chunked.sort_by_key(|d| d.get(ID_FIELD).and_then(|id| id.parse::<u32>().ok()));
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_release_events_sorted() {
        let mut events = vec![
            ReleaseEventRow { release: 1, date: None, country: Some("XW".into()) },
            ReleaseEventRow { release: 1, date: Some("1981".into()), country: Some("US".into()) },
            ReleaseEventRow { release: 1, date: Some("1980".into()), country: Some("GB".into()) },
        ];
        sort_release_events(&mut events);
        let dates: Vec<Option<&str>> = events.iter().map(|e| e.date.as_deref()).collect();
        assert_eq!(dates, vec![Some("1980"), Some("1981"), None]);
    }
}
