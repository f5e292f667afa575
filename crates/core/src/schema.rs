//! Field tables for every index
//!
//! One static [`FieldRegistry`] per index. Field names follow the public
//! search syntax, so a user can write `recording:crocodiles` or `qdur:16`.

use crate::analysis::AnalyzerKind::{AccentPreserving, WithPositionGap};
use crate::field::{FieldRegistry, FieldSpec as F, ID_FIELD, STORE_FIELD};

/// Recording index fields.
pub static RECORDING: FieldRegistry = FieldRegistry::new(
    "recording",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("rid").stored(),
        F::text("recording").analyzed_with(WithPositionGap),
        F::text("recordingaccent").analyzed_with(AccentPreserving),
        F::keyword("arid"),
        F::text("artist"),
        F::text("artistname").analyzed_with(WithPositionGap),
        F::text("creditname").analyzed_with(WithPositionGap),
        F::text("comment"),
        F::ci_keyword("isrc"),
        F::int("duration"),
        F::int("qdur"),
        F::keyword("tid"),
        F::keyword("rgid"),
        F::ci_keyword("primarytype"),
        F::ci_keyword("secondarytype"),
        F::ci_keyword("type"),
        F::int("tracks"),
        F::int("tnum"),
        F::keyword("number"),
        F::ci_keyword("status"),
        F::keyword("date"),
        F::ci_keyword("country"),
        F::keyword("reid"),
        F::text("release").analyzed_with(WithPositionGap),
        F::int("tracksrelease"),
        F::int("position"),
        F::ci_keyword("format"),
        F::ci_keyword("video"),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Release index fields.
pub static RELEASE: FieldRegistry = FieldRegistry::new(
    "release",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("reid").stored(),
        F::text("release"),
        F::text("releaseaccent").analyzed_with(AccentPreserving),
        F::keyword("arid"),
        F::text("artist"),
        F::text("artistname").analyzed_with(WithPositionGap),
        F::text("creditname").analyzed_with(WithPositionGap),
        F::text("comment"),
        F::ci_keyword("status"),
        F::ci_keyword("primarytype"),
        F::ci_keyword("secondarytype"),
        F::ci_keyword("type"),
        F::ci_keyword("packaging"),
        F::keyword("barcode"),
        F::ci_keyword("lang"),
        F::ci_keyword("script"),
        F::keyword("rgid"),
        F::keyword("date"),
        F::ci_keyword("country"),
        F::keyword("laid"),
        F::text("label").analyzed_with(WithPositionGap),
        F::ci_keyword("catno"),
        F::ci_keyword("format"),
        F::int("tracksmedium"),
        F::int("tracks"),
        F::int("mediums"),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Artist index fields.
pub static ARTIST: FieldRegistry = FieldRegistry::new(
    "artist",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("arid").stored(),
        F::text("artist"),
        F::text("artistaccent").analyzed_with(AccentPreserving),
        F::text("sortname"),
        F::text("alias").analyzed_with(WithPositionGap),
        F::ci_keyword("aliastype"),
        F::ci_keyword("aliaslocale"),
        F::ci_keyword("type"),
        F::ci_keyword("gender"),
        F::ci_keyword("country"),
        F::text("area"),
        F::keyword("begin"),
        F::keyword("end"),
        F::ci_keyword("ended"),
        F::text("comment"),
        F::keyword("ipi"),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Label index fields.
pub static LABEL: FieldRegistry = FieldRegistry::new(
    "label",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("laid").stored(),
        F::text("label"),
        F::text("labelaccent").analyzed_with(AccentPreserving),
        F::text("sortname"),
        F::text("alias").analyzed_with(WithPositionGap),
        F::ci_keyword("aliastype"),
        F::ci_keyword("aliaslocale"),
        F::ci_keyword("type"),
        F::keyword("code"),
        F::ci_keyword("country"),
        F::text("area"),
        F::keyword("begin"),
        F::keyword("end"),
        F::ci_keyword("ended"),
        F::text("comment"),
        F::keyword("ipi"),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Work index fields.
pub static WORK: FieldRegistry = FieldRegistry::new(
    "work",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("wid").stored(),
        F::text("work"),
        F::text("workaccent").analyzed_with(AccentPreserving),
        F::text("alias").analyzed_with(WithPositionGap),
        F::ci_keyword("aliastype"),
        F::ci_keyword("aliaslocale"),
        F::keyword("arid"),
        F::text("artist").analyzed_with(WithPositionGap),
        F::keyword("rid"),
        F::text("recording").analyzed_with(WithPositionGap),
        F::ci_keyword("iswc"),
        F::ci_keyword("lang"),
        F::ci_keyword("type"),
        F::text("comment"),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Event index fields.
pub static EVENT: FieldRegistry = FieldRegistry::new(
    "event",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("eid").stored(),
        F::text("event"),
        F::text("eventaccent").analyzed_with(AccentPreserving),
        F::text("alias").analyzed_with(WithPositionGap),
        F::ci_keyword("aliastype"),
        F::ci_keyword("aliaslocale"),
        F::ci_keyword("type"),
        F::keyword("begin"),
        F::keyword("end"),
        F::ci_keyword("ended"),
        F::text("comment"),
        F::keyword("arid"),
        F::text("artist").analyzed_with(WithPositionGap),
        F::keyword("pid"),
        F::text("place").analyzed_with(WithPositionGap),
        F::keyword("aid"),
        F::text("area").analyzed_with(WithPositionGap),
        F::text("tag").analyzed_with(WithPositionGap),
        F::store_only(STORE_FIELD),
    ],
);

/// Annotation index fields.
pub static ANNOTATION: FieldRegistry = FieldRegistry::new(
    "annotation",
    &[
        F::keyword(ID_FIELD).stored(),
        F::keyword("entity").stored(),
        F::text("name").stored(),
        F::ci_keyword("type").stored(),
        F::text("text").stored(),
        F::long("created").stored(),
    ],
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all() -> Vec<&'static FieldRegistry> {
        vec![&RECORDING, &RELEASE, &ARTIST, &LABEL, &WORK, &EVENT, &ANNOTATION]
    }

    #[test]
    fn test_field_names_unique_per_index() {
        for registry in all() {
            let mut seen = HashSet::new();
            for field in registry.fields() {
                assert!(
                    seen.insert(field.name),
                    "{} declares {} twice",
                    registry.index_name(),
                    field.name
                );
            }
        }
    }

    #[test]
    fn test_every_index_has_stored_id() {
        for registry in all() {
            let id = registry.get(ID_FIELD).unwrap();
            assert!(id.indexed && id.stored, "{}", registry.index_name());
        }
    }

    #[test]
    fn test_store_blob_is_store_only() {
        for registry in all() {
            if let Some(store) = registry.get(STORE_FIELD) {
                assert!(!store.indexed);
            }
        }
    }

    #[test]
    fn test_accent_fields_preserve_accents() {
        for (registry, field) in [
            (&RECORDING, "recordingaccent"),
            (&RELEASE, "releaseaccent"),
            (&ARTIST, "artistaccent"),
            (&LABEL, "labelaccent"),
            (&WORK, "workaccent"),
            (&EVENT, "eventaccent"),
        ] {
            assert_eq!(registry.get(field).unwrap().analyzer, AccentPreserving);
        }
    }
}
