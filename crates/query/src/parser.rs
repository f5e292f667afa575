//! Raw query syntax
//!
//! A small Lucene-flavoured grammar:
//!
//! ```text
//! query   := clause*
//! clause  := [+|-|NOT|!] [field ':'] atom
//! atom    := word | '"' phrase '"' | '(' query ')' | range
//! range   := ('[' | '{') bound 'TO' bound (']' | '}')
//! ```
//!
//! Clauses are optional by default. `AND`/`&&` makes both neighbours
//! required, `OR`/`||` leaves them optional, and a backslash escapes the
//! next character. `*` as a range bound leaves that side open.
//!
//! Parsing is strict; [`escape`] turns any input into plain words for the
//! fallback path.

use crate::error::{QueryError, QueryResult};
use musearch_engine::Occur;

/// Parsed query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Text matched against a field (or the default alias when `None`)
    Text {
        /// Field or alias name
        field: Option<String>,
        /// Unescaped text
        text: String,
        /// Whether the text was a quoted phrase
        quoted: bool,
    },
    /// Range over a field's terms
    Range {
        /// Field name
        field: Option<String>,
        /// Lower bound, open when `None`
        lower: Option<String>,
        /// Upper bound, open when `None`
        upper: Option<String>,
        /// `[..]` vs `{..}`
        inclusive: bool,
    },
    /// Parenthesized (or top-level) clause list
    Group(Vec<(Occur, Node)>),
}

impl Node {
    /// Whether this is a group of optional, unfielded, unquoted words.
    pub fn is_plain(&self) -> bool {
        match self {
            Node::Group(clauses) => clauses.iter().all(|(occur, node)| {
                *occur == Occur::Should
                    && matches!(
                        node,
                        Node::Text {
                            field: None,
                            quoted: false,
                            ..
                        }
                    )
            }),
            _ => false,
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Quoted(String),
    Colon,
    Open,
    Close,
    RangeOpen { inclusive: bool },
    RangeClose { inclusive: bool },
    Plus,
    Minus,
    And,
    Or,
    Not,
}

fn is_special(c: char) -> bool {
    matches!(c, ':' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\\')
}

fn lex(input: &str) -> QueryResult<Vec<(usize, Tok)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            ':' => out.push((start, Tok::Colon)),
            '(' => out.push((start, Tok::Open)),
            ')' => out.push((start, Tok::Close)),
            '[' => out.push((start, Tok::RangeOpen { inclusive: true })),
            '{' => out.push((start, Tok::RangeOpen { inclusive: false })),
            ']' => out.push((start, Tok::RangeClose { inclusive: true })),
            '}' => out.push((start, Tok::RangeClose { inclusive: false })),
            '+' => out.push((start, Tok::Plus)),
            '-' | '!' => out.push((start, Tok::Minus)),
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(QueryError::syntax(start, "unterminated quote")),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| QueryError::syntax(i, "dangling escape"))?;
                            text.push(*escaped);
                            i += 2;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                out.push((start, Tok::Quoted(text)));
            }
            _ => {
                let mut text = String::new();
                let mut escaped_any = false;
                while let Some(&ch) = chars.get(i) {
                    if ch == '\\' {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| QueryError::syntax(i, "dangling escape"))?;
                        text.push(*escaped);
                        escaped_any = true;
                        i += 2;
                        continue;
                    }
                    if ch.is_whitespace() || is_special(ch) {
                        break;
                    }
                    text.push(ch);
                    i += 1;
                }
                let tok = match text.as_str() {
                    "AND" | "&&" if !escaped_any => Tok::And,
                    "OR" | "||" if !escaped_any => Tok::Or,
                    "NOT" if !escaped_any => Tok::Not,
                    _ => Tok::Word(text),
                };
                out.push((start, tok));
                continue;
            }
        }
        i += 1;
    }
    Ok(out)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    toks: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.toks.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn clauses(&mut self, nested: bool) -> QueryResult<Vec<(Occur, Node)>> {
        let mut clauses: Vec<(Occur, Node)> = Vec::new();
        let mut pending: Option<Occur> = None;
        loop {
            match self.peek() {
                None if nested => return Err(QueryError::syntax(self.end, "missing ')'")),
                None => break,
                Some(Tok::Close) if nested => {
                    self.pos += 1;
                    break;
                }
                Some(Tok::Close) => return Err(QueryError::syntax(self.offset(), "unbalanced ')'")),
                Some(Tok::And) => {
                    let at = self.offset();
                    self.pos += 1;
                    match clauses.last_mut() {
                        Some((occur, _)) if *occur == Occur::Should => *occur = Occur::Must,
                        Some(_) => {}
                        None => return Err(QueryError::syntax(at, "AND without left operand")),
                    }
                    pending = Some(Occur::Must);
                }
                Some(Tok::Or) => {
                    let at = self.offset();
                    self.pos += 1;
                    if clauses.is_empty() {
                        return Err(QueryError::syntax(at, "OR without left operand"));
                    }
                    pending = Some(Occur::Should);
                }
                Some(_) => {
                    let occur = self.modifier()?.or(pending.take()).unwrap_or(Occur::Should);
                    clauses.push((occur, self.clause()?));
                    pending = None;
                }
            }
        }
        if pending.is_some() {
            return Err(QueryError::syntax(self.end, "operator without right operand"));
        }
        Ok(clauses)
    }

    fn modifier(&mut self) -> QueryResult<Option<Occur>> {
        let occur = match self.peek() {
            Some(Tok::Plus) => Occur::Must,
            Some(Tok::Minus) | Some(Tok::Not) => Occur::MustNot,
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(occur))
    }

    fn clause(&mut self) -> QueryResult<Node> {
        let field = match (self.toks.get(self.pos), self.toks.get(self.pos + 1)) {
            (Some((_, Tok::Word(name))), Some((_, Tok::Colon))) => {
                let name = name.clone();
                self.pos += 2;
                Some(name)
            }
            _ => None,
        };
        self.atom(field)
    }

    fn atom(&mut self, field: Option<String>) -> QueryResult<Node> {
        let at = self.offset();
        match self.next() {
            Some(Tok::Word(text)) => Ok(Node::Text {
                field,
                text,
                quoted: false,
            }),
            Some(Tok::Quoted(text)) => Ok(Node::Text {
                field,
                text,
                quoted: true,
            }),
            Some(Tok::Open) => {
                let clauses = self.clauses(true)?;
                if clauses.is_empty() {
                    return Err(QueryError::syntax(at, "empty group"));
                }
                Ok(Node::Group(
                    clauses
                        .into_iter()
                        .map(|(occur, node)| (occur, with_field(node, field.as_deref())))
                        .collect(),
                ))
            }
            Some(Tok::RangeOpen { inclusive }) => self.range(field, inclusive, at),
            Some(other) => Err(QueryError::syntax(at, format!("unexpected {:?}", other))),
            None => Err(QueryError::syntax(at, "missing term")),
        }
    }

    fn range(&mut self, field: Option<String>, inclusive: bool, at: usize) -> QueryResult<Node> {
        let lower = self.bound()?;
        match self.next() {
            Some(Tok::Word(to)) if to == "TO" => {}
            _ => return Err(QueryError::syntax(self.offset(), "expected TO")),
        }
        let upper = self.bound()?;
        match self.next() {
            Some(Tok::RangeClose { inclusive: closing }) if closing == inclusive => {}
            Some(Tok::RangeClose { .. }) => {
                return Err(QueryError::syntax(at, "mismatched range brackets"))
            }
            _ => return Err(QueryError::syntax(self.offset(), "unterminated range")),
        }
        Ok(Node::Range {
            field,
            lower,
            upper,
            inclusive,
        })
    }

    fn bound(&mut self) -> QueryResult<Option<String>> {
        let at = self.offset();
        match self.next() {
            Some(Tok::Word(w)) if w == "*" => Ok(None),
            Some(Tok::Word(w)) | Some(Tok::Quoted(w)) => Ok(Some(w)),
            _ => Err(QueryError::syntax(at, "expected range bound")),
        }
    }
}

/// Apply a group's field to its unfielded members.
fn with_field(node: Node, field: Option<&str>) -> Node {
    let Some(field) = field else { return node };
    match node {
        Node::Text {
            field: None,
            text,
            quoted,
        } => Node::Text {
            field: Some(field.to_string()),
            text,
            quoted,
        },
        Node::Range {
            field: None,
            lower,
            upper,
            inclusive,
        } => Node::Range {
            field: Some(field.to_string()),
            lower,
            upper,
            inclusive,
        },
        Node::Group(clauses) => Node::Group(
            clauses
                .into_iter()
                .map(|(occur, n)| (occur, with_field(n, Some(field))))
                .collect(),
        ),
        fielded => fielded,
    }
}

/// Parse a raw query into a top-level group.
pub fn parse(input: &str) -> QueryResult<Node> {
    let toks = lex(input)?;
    let mut parser = Parser {
        toks,
        pos: 0,
        end: input.chars().count(),
    };
    Ok(Node::Group(parser.clauses(false)?))
}

/// Escape every syntax character so `parse` reads the input as plain words.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for word in input.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        if matches!(word, "AND" | "OR" | "NOT" | "&&" | "||") {
            out.push('\\');
        }
        for (i, c) in word.chars().enumerate() {
            if is_special(c) || (i == 0 && matches!(c, '+' | '-' | '!')) {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}
