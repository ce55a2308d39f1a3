//! Applying modification plans to the original query text.
//!
//! Every plan kind reduces to a list of [`Substitution`]s. Positional mode
//! wraps exactly those byte ranges; literal mode replaces every
//! occurrence of each range's text.

mod delete;
mod insert;
mod select;
mod update;

use std::ops::Range;

use vor_core::SubstitutionMode;

use crate::cipher::CipherCalls;
use crate::extract::{ModificationPlan, SelectColumn};

/// The cipher call wrapped around a span, with its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wrap {
    Encrypt(String),
    Decrypt(String),
}

/// One span of the original query and the call to wrap it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub range: Range<usize>,
    pub wrap: Wrap,
}

impl Substitution {
    pub fn encrypt(range: Range<usize>, key: &str) -> Self {
        Self {
            range,
            wrap: Wrap::Encrypt(key.to_string()),
        }
    }

    pub fn decrypt(range: Range<usize>, key: &str) -> Self {
        Self {
            range,
            wrap: Wrap::Decrypt(key.to_string()),
        }
    }

    fn render(&self, text: &str, calls: &CipherCalls) -> String {
        match &self.wrap {
            Wrap::Encrypt(key) => calls.encrypt(text, key),
            Wrap::Decrypt(key) => calls.decrypt(text, key),
        }
    }
}

/// Decrypt every reference of each column.
fn decrypt_columns(columns: &[SelectColumn]) -> impl Iterator<Item = Substitution> + '_ {
    columns.iter().flat_map(|column| {
        column
            .references
            .iter()
            .map(|range| Substitution::decrypt(range.clone(), &column.encryption_key))
    })
}

/// Per-kind rewriting of a plan.
pub(crate) trait Rewrite {
    /// Spans to wrap, in no particular order.
    fn substitutions(&self) -> Vec<Substitution>;

    fn rewrite_literal(&self, query: &str, calls: &CipherCalls) -> String {
        replace_tokens(query, &literal_patterns(query, &self.substitutions(), calls))
    }
}

/// Apply `plan` to `query`.
pub fn rewrite(
    query: &str,
    plan: &ModificationPlan,
    mode: SubstitutionMode,
    calls: &CipherCalls,
) -> String {
    let rewriter: &dyn Rewrite = match plan {
        ModificationPlan::Select(plan) => plan,
        ModificationPlan::Insert(plan) => plan,
        ModificationPlan::Update(plan) => plan,
        ModificationPlan::Delete(plan) => plan,
        ModificationPlan::Passthrough => return query.to_string(),
    };
    match mode {
        SubstitutionMode::Positional => apply_positional(query, rewriter.substitutions(), calls),
        SubstitutionMode::Literal => rewriter.rewrite_literal(query, calls),
    }
}

/// Wrap each span in place, copying untouched bytes verbatim.
///
/// Spans that overlap an earlier one are dropped with a warning.
pub fn apply_positional(
    query: &str,
    mut substitutions: Vec<Substitution>,
    calls: &CipherCalls,
) -> String {
    substitutions.sort_by_key(|s| (s.range.start, s.range.end));

    let mut out = String::with_capacity(query.len() + substitutions.len() * 64);
    let mut cursor = 0;
    for substitution in &substitutions {
        let range = &substitution.range;
        let Some(text) = query.get(range.clone()) else {
            tracing::warn!(start = range.start, end = range.end, "Span outside query text; skipped");
            continue;
        };
        if range.start < cursor {
            tracing::warn!(
                start = range.start,
                end = range.end,
                "Overlapping substitution skipped"
            );
            continue;
        }
        out.push_str(&query[cursor..range.start]);
        out.push_str(&substitution.render(text, calls));
        cursor = range.end;
    }
    out.push_str(&query[cursor..]);
    out
}

/// Distinct (pattern, replacement) pairs for literal replacement, longest
/// pattern first. The first substitution for a given text wins.
fn literal_patterns(
    query: &str,
    substitutions: &[Substitution],
    calls: &CipherCalls,
) -> Vec<(String, String)> {
    let mut patterns: Vec<(String, String)> = Vec::new();
    for substitution in substitutions {
        let Some(text) = query.get(substitution.range.clone()) else {
            continue;
        };
        if patterns.iter().any(|(pattern, _)| pattern == text) {
            continue;
        }
        patterns.push((text.to_string(), substitution.render(text, calls)));
    }
    patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    patterns
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace every whole-token occurrence of each pattern in one pass.
///
/// An occurrence is whole-token when it does not continue an identifier
/// on either side, so `:ssn` never matches inside `:ssnFilter`. Replaced
/// text is not scanned again.
pub(crate) fn replace_tokens(text: &str, patterns: &[(String, String)]) -> String {
    if patterns.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    'scan: while i < text.len() {
        let previous = text[..i].chars().next_back();
        for (pattern, replacement) in patterns {
            if pattern.is_empty() || !text[i..].starts_with(pattern.as_str()) {
                continue;
            }
            let end = i + pattern.len();
            let starts_word = pattern.chars().next().is_some_and(is_word_char);
            let ends_word = pattern.chars().next_back().is_some_and(is_word_char);
            if starts_word && previous.is_some_and(is_word_char) {
                continue;
            }
            if ends_word && text[end..].chars().next().is_some_and(is_word_char) {
                continue;
            }
            out.push_str(replacement);
            i = end;
            continue 'scan;
        }
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        out.push(c);
        i += c.len_utf8();
    }
    out
}
