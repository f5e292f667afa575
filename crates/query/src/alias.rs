//! Query aliases
//!
//! An alias is a user-facing pseudo-field spanning several real fields with
//! their own boosts. Unfielded query text goes to the index's default
//! alias; a clause such as `name:massive` uses the alias named `name`.

use musearch_core::IndexKind;

/// One real field behind an alias.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AliasField {
    /// Real field name
    pub field: &'static str,
    /// Boost of an exact match in this field
    pub boost: f32,
    /// Whether long terms also get prefix and fuzzy alternatives
    pub fuzzy: bool,
}

impl AliasField {
    const fn fuzzy(field: &'static str, boost: f32) -> Self {
        AliasField {
            field,
            boost,
            fuzzy: true,
        }
    }

    const fn exact(field: &'static str, boost: f32) -> Self {
        AliasField {
            field,
            boost,
            fuzzy: false,
        }
    }
}

/// A named pseudo-field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alias {
    /// Name used in `name:value` clauses
    pub name: &'static str,
    /// Weight of the non-best fields in the best-of combiner
    pub tie_breaker: f32,
    /// Real fields
    pub fields: &'static [AliasField],
}

/// Aliases of one index.
#[derive(Debug)]
pub struct AliasTable {
    index: IndexKind,
    default: Alias,
    others: &'static [Alias],
}

impl AliasTable {
    /// Alias used for unfielded text.
    pub fn default_alias(&self) -> &Alias {
        &self.default
    }

    /// Index the table belongs to.
    pub fn index(&self) -> IndexKind {
        self.index
    }

    /// Alias by name, the default alias included.
    pub fn get(&self, name: &str) -> Option<&Alias> {
        std::iter::once(&self.default)
            .chain(self.others.iter())
            .find(|a| a.name == name)
    }

    /// Alias table of an index.
    pub fn for_index(kind: IndexKind) -> &'static AliasTable {
        match kind {
            IndexKind::Recording => &RECORDING,
            IndexKind::Release => &RELEASE,
            IndexKind::Artist => &ARTIST,
            IndexKind::Label => &LABEL,
            IndexKind::Work => &WORK,
            IndexKind::Event => &EVENT,
            IndexKind::Annotation => &ANNOTATION,
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

static RECORDING: AliasTable = AliasTable {
    index: IndexKind::Recording,
    default: Alias {
        name: "recording",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("recording", 1.0),
            AliasField::fuzzy("recordingaccent", 1.0),
        ],
    },
    others: &[],
};

static RELEASE: AliasTable = AliasTable {
    index: IndexKind::Release,
    default: Alias {
        name: "release",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("release", 1.0),
            AliasField::fuzzy("releaseaccent", 1.0),
        ],
    },
    others: &[],
};

static ARTIST: AliasTable = AliasTable {
    index: IndexKind::Artist,
    default: Alias {
        name: "artist",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("artist", 1.0),
            AliasField::fuzzy("artistaccent", 1.0),
            AliasField::fuzzy("sortname", 1.0),
            AliasField::fuzzy("alias", 0.9),
        ],
    },
    others: &[Alias {
        name: "text",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("artist", 1.0),
            AliasField::fuzzy("alias", 0.9),
            AliasField::exact("comment", 0.5),
        ],
    }],
};

static LABEL: AliasTable = AliasTable {
    index: IndexKind::Label,
    default: Alias {
        name: "label",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("label", 1.0),
            AliasField::fuzzy("labelaccent", 1.0),
            AliasField::fuzzy("alias", 0.9),
            AliasField::fuzzy("sortname", 1.0),
        ],
    },
    others: &[Alias {
        name: "text",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("label", 1.0),
            AliasField::fuzzy("alias", 0.9),
            AliasField::exact("comment", 0.5),
        ],
    }],
};

static WORK: AliasTable = AliasTable {
    index: IndexKind::Work,
    default: Alias {
        name: "work",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("work", 1.0),
            AliasField::fuzzy("workaccent", 1.0),
            AliasField::fuzzy("alias", 0.9),
        ],
    },
    others: &[],
};

static EVENT: AliasTable = AliasTable {
    index: IndexKind::Event,
    default: Alias {
        name: "event",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("event", 1.0),
            AliasField::fuzzy("eventaccent", 1.0),
            AliasField::fuzzy("alias", 0.9),
        ],
    },
    others: &[],
};

static ANNOTATION: AliasTable = AliasTable {
    index: IndexKind::Annotation,
    default: Alias {
        name: "text",
        tie_breaker: 0.0,
        fields: &[
            AliasField::fuzzy("name", 1.0),
            AliasField::exact("text", 0.8),
        ],
    },
    others: &[],
};
