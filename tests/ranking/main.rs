//! Relevance ranking over built indexes: disjunction-max scoring, fuzzy
//! and prefix expansion, the phrase bonus and the search service.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use musearch::core::{IndexKind, ID_FIELD};
use musearch::engine::{IndexStore, MemoryStore, Occur, Query, SearchOptions, TopDocs};
use musearch::index::source::RecordingRow;
use musearch::index::CatalogData;
use musearch::query::{QueryConfig, Results, SearchService};
use std::sync::Arc;

fn service(store: &Arc<MemoryStore>) -> SearchService {
    SearchService::new(store.clone(), QueryConfig::default())
}

fn ids(results: &Results) -> Vec<&str> {
    results
        .hits
        .iter()
        .filter_map(|h| h.doc.get(ID_FIELD))
        .collect()
}

fn score_of(top: &TopDocs, id: &str) -> f32 {
    top.hits
        .iter()
        .find(|h| h.doc.get(ID_FIELD) == Some(id))
        .map(|h| h.score)
        .unwrap_or_else(|| panic!("document {} not found", id))
}

// ============================================================================
// Engine scoring
// ============================================================================

#[test]
fn test_disjunction_takes_best_field_not_sum() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 10);
    let reader = store.open_reader(IndexKind::Artist).unwrap();
    let opts = SearchOptions::new(0, 10);
    let search = |q: Query| reader.search(&q, &opts).unwrap();

    let by_name = score_of(&search(Query::term("artist", "massive")), "5");
    let by_sort = score_of(&search(Query::term("sortname", "massive")), "5");
    let fields = || vec![Query::term("artist", "massive"), Query::term("sortname", "massive")];

    let dismax = score_of(
        &search(Query::DisjunctionMax {
            disjuncts: fields(),
            tie_breaker: 0.0,
        }),
        "5",
    );
    assert!((dismax - by_name.max(by_sort)).abs() < 1e-5);

    let summed = score_of(
        &search(Query::Boolean {
            clauses: fields().into_iter().map(|q| (Occur::Should, q)).collect(),
        }),
        "5",
    );
    assert!(summed > dismax);

    let tied = score_of(
        &search(Query::DisjunctionMax {
            disjuncts: fields(),
            tie_breaker: 0.5,
        }),
        "5",
    );
    let expected = by_name.max(by_sort) + 0.5 * by_name.min(by_sort);
    assert!((tied - expected).abs() < 1e-5);
}

// ============================================================================
// Compiled queries
// ============================================================================

#[test]
fn test_exact_match_outranks_near_miss() {
    let mut data = bristol();
    data.artists.push(artist(6, "Portished"));
    let (_, store, _) = build(data, &[IndexKind::Artist], 10);

    let results = service(&store).search(IndexKind::Artist, "portishead", 0, None);
    assert_eq!(ids(&results), vec!["2", "6"]);
    assert!(results.hits[0].score > results.hits[1].score);
    assert_eq!(results.hits[0].normalized_score, 100);
    assert!(results.hits[1].normalized_score < 100);
}

#[test]
fn test_prefix_finds_longer_names() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 10);
    let results = service(&store).search(IndexKind::Artist, "portis", 0, None);
    assert_eq!(ids(&results), vec!["2"]);
}

#[test]
fn test_short_terms_are_not_expanded() {
    let mut data = bristol();
    data.artists.push(artist(6, "Tricks"));
    let (_, store, _) = build(data, &[IndexKind::Artist], 10);
    // "tricky" is long enough to expand; "tri" is not.
    let long = service(&store).search(IndexKind::Artist, "tricky", 0, None);
    assert_eq!(long.total_hits, 2);
    assert_eq!(ids(&long)[0], "3");
    let short = service(&store).search(IndexKind::Artist, "tri", 0, None);
    assert_eq!(short.total_hits, 0);
}

#[test]
fn test_exact_phrase_ranked_first() {
    let data = CatalogData {
        recordings: vec![recording(1, "Monday Blue"), recording(2, "Blue Monday")],
        ..empty_catalog()
    };
    let (_, store, _) = build(data, &[IndexKind::Recording], 10);
    let results = service(&store).search(IndexKind::Recording, "blue monday", 0, None);
    assert_eq!(results.total_hits, 2);
    assert_eq!(ids(&results), vec!["2", "1"]);
    assert!(results.hits[0].score > results.hits[1].score);
}

#[test]
fn test_matching_more_words_ranks_higher() {
    let data = CatalogData {
        recordings: vec![recording(1, "Blue Tuesday"), recording(2, "Blue Monday")],
        ..empty_catalog()
    };
    let (_, store, _) = build(data, &[IndexKind::Recording], 10);
    let results = service(&store).search(IndexKind::Recording, "blue monday", 0, None);
    assert_eq!(ids(&results), vec!["2", "1"]);
}

#[test]
fn test_recording_titles_not_penalized_for_length() {
    let data = CatalogData {
        recordings: vec![
            recording(1, "Crocodiles"),
            recording(2, "Crocodiles Live at the Royal Albert Hall"),
        ],
        ..empty_catalog()
    };
    let (_, store, _) = build(data, &[IndexKind::Recording], 10);
    let results = service(&store).search(IndexKind::Recording, "recording:crocodiles", 0, None);
    assert_eq!(results.total_hits, 2);
    assert!((results.hits[0].score - results.hits[1].score).abs() < 1e-6);

    // Other indexes keep length normalization.
    let mut bands = bristol();
    bands.artists.push(artist(6, "Massive Attack Sound System"));
    let (_, store, _) = build(bands, &[IndexKind::Artist], 10);
    let results = service(&store).search(IndexKind::Artist, "artist:attack", 0, None);
    let score = |id: &str| {
        results
            .hits
            .iter()
            .find(|h| h.doc.get(ID_FIELD) == Some(id))
            .map(|h| h.score)
            .unwrap()
    };
    assert!(score("1") > score("6"));
}

#[test]
fn test_numeric_field_queries() {
    let (_, store, _) = build(crocodiles(), &[IndexKind::Recording], 10);
    let svc = service(&store);
    let hits = |q: &str| svc.search(IndexKind::Recording, q, 0, None).total_hits;

    assert_eq!(hits("duration:33000"), 1);
    assert_eq!(hits("duration:33100"), 1);
    assert_eq!(hits("duration:33001"), 0);
    assert_eq!(hits("duration:[33050 TO 33200]"), 1);
    assert_eq!(hits("duration:[1 TO 100]"), 0);
    assert_eq!(hits("qdur:16"), 1);
    assert_eq!(hits("duration:long"), 0);
}

#[test]
fn test_open_ranges_skip_recordings_without_length() {
    let data = CatalogData {
        recordings: vec![
            RecordingRow { length: Some(20000), ..recording(1, "Rescue") },
            RecordingRow { length: Some(33000), ..recording(2, "Crocodiles") },
            recording(3, "Villiers Terrace"),
        ],
        ..empty_catalog()
    };
    let (_, store, _) = build(data, &[IndexKind::Recording], 10);
    let svc = service(&store);

    assert_eq!(svc.search(IndexKind::Recording, "duration:[* TO 1]", 0, None).total_hits, 0);
    let results = svc.search(IndexKind::Recording, "duration:[* TO 40000]", 0, None);
    let mut found = ids(&results);
    found.sort();
    assert_eq!(found, vec!["1", "2"]);
    let results = svc.search(IndexKind::Recording, "duration:[30000 TO *]", 0, None);
    assert_eq!(ids(&results), vec!["2"]);
    let results = svc.search(IndexKind::Recording, "qdur:{* TO 100}", 0, None);
    assert_eq!(results.total_hits, 2);
}

#[test]
fn test_field_and_alias_queries() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 10);
    let svc = service(&store);

    let results = svc.search(IndexKind::Artist, "artist:tricky", 0, None);
    assert_eq!(ids(&results), vec!["3"]);

    let results = svc.search(IndexKind::Artist, "type:unknown", 0, None);
    assert_eq!(results.total_hits, 5);

    let results = svc.search(IndexKind::Artist, "massive AND attack", 0, None);
    assert_eq!(ids(&results), vec!["1"]);

    let results = svc.search(IndexKind::Artist, "colour:red", 0, None);
    assert_eq!(results.total_hits, 0);
}

// ============================================================================
// Service
// ============================================================================

#[test]
fn test_replication_state_never_returned() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 2);
    assert_eq!(store.open_reader(IndexKind::Artist).unwrap().num_docs(), 6);

    let results = service(&store).search(IndexKind::Artist, "-nothing", 0, None);
    assert_eq!(results.total_hits, 5);
    assert!(results.hits.iter().all(|h| h.doc.has(ID_FIELD)));
}

#[test]
fn test_pages_are_stable() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 2);
    let svc = service(&store);
    let all = svc.search(IndexKind::Artist, "-nothing", 0, Some(10));
    let first = svc.search(IndexKind::Artist, "-nothing", 0, Some(2));
    let second = svc.search(IndexKind::Artist, "-nothing", 2, Some(2));

    assert_eq!(first.total_hits, 5);
    assert_eq!(second.offset, 2);
    let paged: Vec<&str> = ids(&first).into_iter().chain(ids(&second)).collect();
    assert_eq!(paged, ids(&all)[..4].to_vec());
}

#[test]
fn test_normalized_scores_relative_to_best() {
    let (_, store, _) = build(bristol(), &[IndexKind::Artist], 10);
    let results = service(&store).search(IndexKind::Artist, "attack", 0, None);
    assert_eq!(results.total_hits, 2);
    assert_eq!(results.hits[0].normalized_score, 100);
    for hit in &results.hits {
        assert!(hit.normalized_score <= 100);
        assert!(hit.score <= results.max_score);
    }
}

#[test]
fn test_missing_index_answers_empty() {
    let store = Arc::new(MemoryStore::in_memory());
    let svc = service(&store);
    let results = svc.search(IndexKind::Work, "blue monday", 5, None);
    assert_eq!(results.total_hits, 0);
    assert_eq!(results.offset, 5);
    assert!(svc.try_search(IndexKind::Work, "blue monday", 0, None).is_err());
}
