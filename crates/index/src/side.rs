//! Side entities: aliases, tags, relations and artist credits
//!
//! Each helper writes the search fields of a side entity and the matching
//! store entries in one call, so the document and its `_store` blob can't
//! drift apart. Parallel groups (alias + alias type + alias locale,
//! relation id + relation name) get one value per item in every field of the
//! group, with [`NO_VALUE`](musearch_core::NO_VALUE) standing in for a
//! missing per-item value.

use crate::source::{AliasRow, ArtistCreditRow, RelationRow, RelationTarget, TagRow};
use crate::store::{
    AliasEntry, ArtistCreditEntry, NameCreditEntry, RelationEntry, StoreBuilder, TagEntry,
};
use musearch_core::Document;
use serde::Serialize;

/// Field names of the alias group.
#[derive(Debug, Clone, Copy)]
pub struct AliasFields {
    /// Alias name field
    pub name: &'static str,
    /// Alias type field
    pub alias_type: &'static str,
    /// Alias locale field
    pub locale: &'static str,
}

/// Alias group shared by every index with aliases.
pub const ALIAS_FIELDS: AliasFields = AliasFields {
    name: "alias",
    alias_type: "aliastype",
    locale: "aliaslocale",
};

/// Field names written for an artist credit.
#[derive(Debug, Clone, Copy)]
pub struct CreditFields {
    /// Full credit string
    pub artist: &'static str,
    /// Each credited name
    pub credit_name: &'static str,
    /// Each artist id
    pub artist_id: &'static str,
    /// Each artist name
    pub artist_name: &'static str,
}

/// Credit fields of the recording and release indexes.
pub const CREDIT_FIELDS: CreditFields = CreditFields {
    artist: "artist",
    credit_name: "creditname",
    artist_id: "arid",
    artist_name: "artistname",
};

/// Relation targets an index accepts, with the id and name field of each.
pub type RelationFields = &'static [(RelationTarget, &'static str, &'static str)];

/// Add tags to `doc` and the blob.
pub fn add_tags<T: Serialize>(
    doc: &mut Document,
    store: StoreBuilder<T>,
    field: &str,
    tags: Option<&Vec<TagRow>>,
) -> StoreBuilder<T> {
    let Some(tags) = tags else {
        return store;
    };
    let entries = tags
        .iter()
        .map(|t| {
            doc.add_text(field, &t.name);
            TagEntry {
                name: t.name.clone(),
                count: t.count,
            }
        })
        .collect();
    store.with_tags(entries)
}

/// Add de-duplicated aliases to `doc` and the blob.
pub fn add_aliases<T: Serialize>(
    doc: &mut Document,
    store: StoreBuilder<T>,
    fields: AliasFields,
    aliases: Option<&Vec<AliasRow>>,
) -> StoreBuilder<T> {
    let Some(aliases) = aliases else {
        return store;
    };
    let mut entries: Vec<AliasEntry> = Vec::with_capacity(aliases.len());
    for alias in aliases {
        let entry = AliasEntry {
            name: alias.name.clone(),
            sort_name: alias.sort_name.clone(),
            locale: alias.locale.clone(),
            alias_type: alias.alias_type.clone(),
            primary: alias.primary,
        };
        if entries.contains(&entry) {
            continue;
        }
        doc.add_text(fields.name, &alias.name)
            .add_or_no_value(fields.alias_type, alias.alias_type.as_deref())
            .add_or_no_value(fields.locale, alias.locale.as_deref());
        entries.push(entry);
    }
    store.with_aliases(entries)
}

/// Add relations whose target kind has fields in `fields`; others are
/// skipped in both the document and the blob.
pub fn add_relations<T: Serialize>(
    doc: &mut Document,
    store: StoreBuilder<T>,
    fields: RelationFields,
    relations: Option<&Vec<RelationRow>>,
) -> StoreBuilder<T> {
    let Some(relations) = relations else {
        return store;
    };
    let mut entries = Vec::new();
    for rel in relations {
        let Some((_, id_field, name_field)) = fields.iter().find(|(t, _, _)| *t == rel.target)
        else {
            continue;
        };
        doc.add_or_no_value(id_field, Some(rel.target_gid.as_str()))
            .add_or_no_value(name_field, Some(rel.target_name.as_str()));
        entries.push(RelationEntry {
            target: rel.target,
            id: rel.target_gid.clone(),
            name: rel.target_name.clone(),
            relation_type: rel.relation_type.clone(),
        });
    }
    store.with_relations(entries)
}

/// Store form of a credit, without touching any document.
pub fn credit_entry(credit: &ArtistCreditRow) -> ArtistCreditEntry {
    ArtistCreditEntry {
        name_credits: credit
            .names
            .iter()
            .map(|n| NameCreditEntry {
                artist_id: n.artist_gid.clone(),
                name: n.artist_name.clone(),
                sort_name: n.artist_sort_name.clone(),
                credit_name: n
                    .credit_name
                    .clone()
                    .filter(|c| *c != n.artist_name),
                join_phrase: n.join_phrase.clone().filter(|j| !j.is_empty()),
            })
            .collect(),
    }
}

/// Add a credit's search fields and return its store form.
pub fn add_credit(
    doc: &mut Document,
    fields: CreditFields,
    credit: &ArtistCreditRow,
) -> ArtistCreditEntry {
    doc.add_text(fields.artist, credit.full_name());
    for name in &credit.names {
        doc.add_text(
            fields.credit_name,
            name.credit_name.as_deref().unwrap_or(&name.artist_name),
        )
        .add_text(fields.artist_id, &name.artist_gid)
        .add_text(fields.artist_name, &name.artist_name);
    }
    credit_entry(credit)
}
