//! Statement parsing with a source map back to the original query text.
//!
//! The query builder emits named placeholders (`:ssn`) that the PostgreSQL
//! grammar does not accept in every expression position, so each bound
//! placeholder is inlined as a quoted identifier (`"ssn"`) and the whole
//! text is lowercased before parsing. The original text is never modified
//! here; instead every character of the normalized text remembers the byte
//! offset it came from, so parser spans can be turned into byte ranges of
//! the original query.

use std::ops::Range;

use sqlparser::ast::{Delete, Expr, Ident, Insert, Select, Statement, Update, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Location, Span, Token, Tokenizer};
use vor_core::Parameters;

use crate::error::InterceptError;

/// Parses queries into statements and keeps track of where each node came from.
pub struct StatementParser {
    dialect: PostgreSqlDialect,
}

impl Clone for StatementParser {
    fn clone(&self) -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Inline bound placeholders and lowercase the query.
    pub fn normalize(
        &self,
        query: &str,
        parameters: &Parameters,
    ) -> Result<NormalizedQuery, InterceptError> {
        let placeholders = if parameters.is_empty() {
            Vec::new()
        } else {
            self.find_placeholders(query, parameters)?
        };

        let mut out = NormalizedQuery::with_capacity(query.len());
        let mut pending = placeholders.into_iter().peekable();
        let mut chars = query.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            let Some(placeholder) = pending.next_if(|p| p.range.start == offset) else {
                out.push(offset, c);
                continue;
            };
            while chars.next_if(|&(o, _)| o < placeholder.range.end).is_some() {}
            out.push_placeholder(query, placeholder);
        }

        out.source_map.source_len = query.len();
        Ok(out)
    }

    /// Locate `:name` placeholders whose name is a bound parameter.
    ///
    /// The tokenizer keeps literals, quoted identifiers, comments and `::`
    /// casts out of the way; a placeholder is a `:` token immediately
    /// followed by an unquoted word.
    fn find_placeholders(
        &self,
        query: &str,
        parameters: &Parameters,
    ) -> Result<Vec<BoundPlaceholder>, InterceptError> {
        let tokens = Tokenizer::new(&self.dialect, query)
            .tokenize_with_location()
            .map_err(|e| InterceptError::Parse(e.to_string()))?;
        let positions = SourceMap::identity(query);

        let mut placeholders = Vec::new();
        for pair in tokens.windows(2) {
            let (Token::Colon, Token::Word(word)) = (&pair[0].token, &pair[1].token) else {
                continue;
            };
            if word.quote_style.is_some() {
                continue;
            }
            let Some(name) = find_parameter(parameters, &word.value) else {
                continue;
            };
            let (Some(start), Some(end)) = (
                positions.offset(pair[0].span.start),
                positions.offset(pair[1].span.end),
            ) else {
                continue;
            };
            placeholders.push(BoundPlaceholder {
                name: name.to_string(),
                range: start..end,
            });
        }
        Ok(placeholders)
    }

    /// Parse the first statement of `query`.
    ///
    /// Returns `Ok(None)` when the query contains no statement.
    pub fn parse<'q>(
        &self,
        query: &'q str,
        parameters: &Parameters,
    ) -> Result<Option<ParsedQuery<'q>>, InterceptError> {
        let normalized = self.normalize(query, parameters)?;
        let statements = Parser::parse_sql(&self.dialect, &normalized.text)
            .map_err(|e| InterceptError::Parse(e.to_string()))?;

        if statements.len() > 1 {
            tracing::debug!(
                count = statements.len(),
                "Multiple statements in query; only the first is intercepted"
            );
        }
        let Some(statement) = statements.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(ParsedQuery {
            original: query,
            normalized: normalized.text,
            statement,
            source_map: normalized.source_map,
            placeholders: normalized.placeholders,
        }))
    }
}

/// Exact key first, then an ASCII-case-insensitive match.
fn find_parameter<'p>(parameters: &'p Parameters, word: &str) -> Option<&'p str> {
    if word.is_empty() {
        return None;
    }
    if let Some((key, _)) = parameters.get_key_value(word) {
        return Some(key);
    }
    parameters
        .keys()
        .find(|key| key.eq_ignore_ascii_case(word))
        .map(String::as_str)
}

/// A named placeholder that was inlined before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundPlaceholder {
    /// Parameter name as keyed in the parameter map.
    pub name: String,
    /// Byte range of `:name` in the original query.
    pub range: Range<usize>,
}

/// Maps parser locations in the normalized text to original byte offsets.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    /// Original byte offset for each normalized character.
    origin: Vec<usize>,
    /// Normalized character index at which each line starts.
    line_starts: Vec<usize>,
    source_len: usize,
}

impl SourceMap {
    /// Map of a text onto itself.
    fn identity(text: &str) -> Self {
        let mut map = Self {
            origin: Vec::with_capacity(text.len()),
            line_starts: vec![0],
            source_len: text.len(),
        };
        for (offset, c) in text.char_indices() {
            map.origin.push(offset);
            if c == '\n' {
                map.line_starts.push(map.origin.len());
            }
        }
        map
    }

    /// Original byte offset of a 1-based line/column location.
    pub fn offset(&self, location: Location) -> Option<usize> {
        if location.line == 0 || location.column == 0 {
            return None;
        }
        let line_start = *self.line_starts.get(usize::try_from(location.line - 1).ok()?)?;
        let index = line_start + usize::try_from(location.column - 1).ok()?;
        if index == self.origin.len() {
            return Some(self.source_len);
        }
        self.origin.get(index).copied()
    }

    /// Original byte range covered by a parser span.
    pub fn range(&self, span: Span) -> Option<Range<usize>> {
        if span == Span::empty() {
            return None;
        }
        let start = self.offset(span.start)?;
        let end = self.offset(span.end)?;
        (start < end).then_some(start..end)
    }
}

/// Query text prepared for the parser.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    pub text: String,
    pub source_map: SourceMap,
    pub placeholders: Vec<BoundPlaceholder>,
}

impl NormalizedQuery {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity + 8),
            source_map: SourceMap {
                origin: Vec::with_capacity(capacity),
                line_starts: vec![0],
                source_len: 0,
            },
            placeholders: Vec::new(),
        }
    }

    fn push(&mut self, offset: usize, c: char) {
        for lower in c.to_lowercase() {
            self.text.push(lower);
            self.source_map.origin.push(offset);
            if lower == '\n' {
                self.source_map.line_starts.push(self.source_map.origin.len());
            }
        }
    }

    fn push_placeholder(&mut self, query: &str, placeholder: BoundPlaceholder) {
        let range = placeholder.range.clone();
        self.push(range.start, '"');
        for (o, ch) in query[range.start + 1..range.end].char_indices() {
            self.push(range.start + 1 + o, ch);
        }
        self.push(range.end, '"');
        self.placeholders.push(placeholder);
    }
}

/// Types of SQL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

/// The parsed statement, dispatched by kind.
///
/// `Other` covers everything the interceptor passes through: DDL, set
/// operations, CTEs and any non-DML statement.
#[derive(Debug, Clone, Copy)]
pub enum StatementKind<'a> {
    Select(&'a Select),
    Insert(&'a Insert),
    Update(&'a Update),
    Delete(&'a Delete),
    Other,
}

impl StatementKind<'_> {
    pub fn operation(&self) -> SqlOperation {
        match self {
            StatementKind::Select(_) => SqlOperation::Select,
            StatementKind::Insert(_) => SqlOperation::Insert,
            StatementKind::Update(_) => SqlOperation::Update,
            StatementKind::Delete(_) => SqlOperation::Delete,
            StatementKind::Other => SqlOperation::Other,
        }
    }
}

/// A column reference found in the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Table or alias qualifier as written.
    pub qualifier: Option<String>,
    /// Bare column name as written.
    pub name: String,
    /// Byte range of the whole reference in the original query.
    pub range: Range<usize>,
}

/// A bound parameter used as a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundParameter {
    pub name: String,
    /// Byte range of the placeholder in the original query.
    pub range: Range<usize>,
}

/// A parsed query together with its original text.
#[derive(Debug, Clone)]
pub struct ParsedQuery<'q> {
    original: &'q str,
    normalized: String,
    statement: Statement,
    source_map: SourceMap,
    placeholders: Vec<BoundPlaceholder>,
}

impl<'q> ParsedQuery<'q> {
    pub fn original(&self) -> &'q str {
        self.original
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn placeholders(&self) -> &[BoundPlaceholder] {
        &self.placeholders
    }

    pub fn kind(&self) -> StatementKind<'_> {
        match &self.statement {
            Statement::Query(query) if query.with.is_none() => match query.body.as_select() {
                Some(select) => StatementKind::Select(select),
                None => StatementKind::Other,
            },
            Statement::Insert(insert) => StatementKind::Insert(insert),
            Statement::Update(update) => StatementKind::Update(update),
            Statement::Delete(delete) => StatementKind::Delete(delete),
            _ => StatementKind::Other,
        }
    }

    /// Original text of a byte range.
    pub fn text(&self, range: &Range<usize>) -> &'q str {
        &self.original[range.clone()]
    }

    /// Original byte range of an identifier.
    pub fn ident_range(&self, ident: &Ident) -> Option<Range<usize>> {
        self.source_map.range(ident.span)
    }

    /// Original byte range spanning a dotted identifier chain.
    pub fn idents_range(&self, idents: &[Ident]) -> Option<Range<usize>> {
        let start = self.ident_range(idents.first()?)?.start;
        let end = self.ident_range(idents.last()?)?.end;
        (start < end).then_some(start..end)
    }

    /// An identifier as written in the original query.
    ///
    /// Quoted identifiers keep their case; unquoted ones fold to lowercase.
    pub fn spelling(&self, ident: &Ident) -> String {
        let Some(quote) = ident.quote_style else {
            return ident.value.clone();
        };
        let quoted = self
            .ident_range(ident)
            .map(|range| self.text(&range))
            .and_then(|text| text.strip_prefix(quote)?.strip_suffix(quote));
        match quoted {
            Some(inner) => inner.replace(&format!("{quote}{quote}"), &quote.to_string()),
            None => ident.value.clone(),
        }
    }

    fn placeholder_at(&self, range: &Range<usize>) -> Option<&BoundPlaceholder> {
        self.placeholders.iter().find(|p| p.range == *range)
    }

    /// The bound parameter an expression refers to, if any.
    ///
    /// Inlined named placeholders appear as quoted identifiers; parser-level
    /// placeholders such as `$1` appear as values.
    pub fn bound_parameter(&self, expr: &Expr) -> Option<BoundParameter> {
        match expr {
            Expr::Identifier(ident) => {
                let range = self.ident_range(ident)?;
                let placeholder = self.placeholder_at(&range)?;
                Some(BoundParameter {
                    name: placeholder.name.clone(),
                    range,
                })
            }
            Expr::Value(ValueWithSpan {
                value: Value::Placeholder(_),
                span,
            }) => {
                let range = self.source_map.range(*span)?;
                let text = self.text(&range);
                Some(BoundParameter {
                    name: text.strip_prefix(':').unwrap_or(text).to_string(),
                    range,
                })
            }
            Expr::Nested(inner) => self.bound_parameter(inner),
            _ => None,
        }
    }

    /// The column an expression refers to, if it is a plain column reference.
    pub fn column_ref(&self, expr: &Expr) -> Option<ColumnRef> {
        match expr {
            Expr::Identifier(ident) => {
                let range = self.ident_range(ident)?;
                if self.placeholder_at(&range).is_some() {
                    return None;
                }
                Some(ColumnRef {
                    qualifier: None,
                    name: self.spelling(ident),
                    range,
                })
            }
            Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                let range = self.idents_range(idents)?;
                let qualifier = &idents[idents.len() - 2];
                let name = &idents[idents.len() - 1];
                Some(ColumnRef {
                    qualifier: Some(self.spelling(qualifier)),
                    name: self.spelling(name),
                    range,
                })
            }
            Expr::Nested(inner) => self.column_ref(inner),
            _ => None,
        }
    }
}
