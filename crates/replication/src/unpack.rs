//! Change-log text encodings
//!
//! Two layers:
//! - COPY text: one record per line, tab-separated fields, with `\t`, `\n`,
//!   `\r`, `\\` escapes and `\N` for NULL
//! - packed column data: `"column"='value' ` pairs, a quote inside a value
//!   doubled (`''`), and a bare `"column"= ` for NULL

use crate::error::{ReplicationError, ReplicationResult};
use musearch_core::ColumnValues;

// ============================================================================
// COPY text
// ============================================================================

/// Split a COPY line into unescaped fields (`None` for `\N`).
pub fn split_copy_line(line: &str) -> Vec<Option<String>> {
    line.split('\t').map(copy_unescape).collect()
}

/// Undo COPY escaping of one field.
pub fn copy_unescape(field: &str) -> Option<String> {
    if field == "\\N" {
        return None;
    }
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// COPY-escape one field.
pub fn copy_escape(field: Option<&str>) -> String {
    let Some(field) = field else {
        return "\\N".to_string();
    };
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Join fields into one COPY line.
pub fn join_copy_line(fields: &[Option<&str>]) -> String {
    fields
        .iter()
        .map(|f| copy_escape(*f))
        .collect::<Vec<_>>()
        .join("\t")
}

// ============================================================================
// Packed column data
// ============================================================================

fn unpack_err(offset: usize, message: &str) -> ReplicationError {
    ReplicationError::Unpack {
        offset,
        message: message.to_string(),
    }
}

/// Read a quoted token starting at `start` (which must be `quote`); a
/// doubled quote stands for one literal quote. Returns the text and the
/// offset just past the closing quote.
fn read_quoted(bytes: &str, start: usize, quote: char) -> ReplicationResult<(String, usize)> {
    let mut out = String::new();
    let mut iter = bytes[start + 1..].char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if c == quote {
            if let Some((_, next)) = iter.peek() {
                if *next == quote {
                    out.push(quote);
                    iter.next();
                    continue;
                }
            }
            return Ok((out, start + 1 + i + c.len_utf8()));
        }
        out.push(c);
    }
    Err(unpack_err(start, "unterminated quoted token"))
}

/// Parse packed column data into column values.
pub fn unpack_data(data: &str) -> ReplicationResult<ColumnValues> {
    let mut values = ColumnValues::new();
    let mut pos = 0;
    let len = data.len();

    loop {
        while pos < len && data[pos..].starts_with(' ') {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        if !data[pos..].starts_with('"') {
            return Err(unpack_err(pos, "expected '\"' before column name"));
        }
        let (column, next) = read_quoted(data, pos, '"')?;
        pos = next;
        if !data[pos..].starts_with('=') {
            return Err(unpack_err(pos, "expected '='"));
        }
        pos += 1;
        if data[pos..].starts_with('\'') {
            let (value, next) = read_quoted(data, pos, '\'')?;
            values.insert(column, Some(value));
            pos = next;
        } else {
            values.insert(column, None);
        }
        if pos < len && !data[pos..].starts_with(' ') {
            return Err(unpack_err(pos, "expected ' ' after value"));
        }
    }

    Ok(values)
}

/// Pack column values; the inverse of [`unpack_data`].
pub fn pack_data(values: &ColumnValues) -> String {
    let mut out = String::new();
    for (column, value) in values {
        out.push('"');
        out.push_str(&column.replace('"', "\"\""));
        out.push_str("\"=");
        if let Some(v) = value {
            out.push('\'');
            out.push_str(&v.replace('\'', "''"));
            out.push('\'');
        }
        out.push(' ');
    }
    out
}

/// Strip the schema qualifier and quotes from a change-log table name.
pub fn sanitize_table_name(raw: &str) -> String {
    let name = raw
        .replace("\"public\".", "")
        .replace("\"musicbrainz\".", "");
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(&name)
        .to_string()
}
