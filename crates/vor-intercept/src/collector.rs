//! Encrypted column collection and lookup.

use serde::Serialize;
use vor_core::{AliasMetadata, AmbiguityPolicy};

use crate::error::InterceptError;

/// A column whose stored values must be wrapped in cipher calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedColumn {
    /// Table the entity maps to.
    pub table: String,
    /// Alias the query builder uses for the entity.
    pub alias: String,
    /// Bare column name.
    pub column: String,
    pub encryption_key: String,
    pub declared_type: Option<String>,
}

impl EncryptedColumn {
    fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.alias.eq_ignore_ascii_case(qualifier) || self.table.eq_ignore_ascii_case(qualifier)
    }

    fn matches_column(&self, column: &str) -> bool {
        self.column.eq_ignore_ascii_case(column)
    }
}

/// Collect descriptors for every encrypted column across all aliases.
///
/// Order is alias order then column order. Duplicates are kept; lookups
/// return the first match.
pub fn collect_encrypted_columns(aliases: &[AliasMetadata]) -> Vec<EncryptedColumn> {
    let mut columns = Vec::new();
    for alias in aliases {
        let Some(entity) = &alias.metadata else {
            continue;
        };
        for column in &entity.columns {
            if let Some(key) = column.key() {
                columns.push(EncryptedColumn {
                    table: entity.table_name.clone(),
                    alias: alias.name.clone(),
                    column: column.property_path.clone(),
                    encryption_key: key.to_string(),
                    declared_type: column.column_type.clone(),
                });
            }
        }
    }
    columns
}

/// How a column reference is qualified at the point of lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier<'a> {
    /// Written in the query (`"User"."ssn"`). No fallback when it misses.
    Explicit(&'a str),
    /// The statement's single target table. Falls back to the bare name.
    Implicit(&'a str),
    /// Unqualified reference with no target table.
    None,
}

/// The working set of encrypted columns for one query.
#[derive(Debug, Clone)]
pub struct EncryptedColumns {
    columns: Vec<EncryptedColumn>,
    policy: AmbiguityPolicy,
}

impl EncryptedColumns {
    pub fn new(columns: Vec<EncryptedColumn>, policy: AmbiguityPolicy) -> Self {
        Self { columns, policy }
    }

    /// Collect from alias metadata.
    pub fn from_aliases(aliases: &[AliasMetadata], policy: AmbiguityPolicy) -> Self {
        Self::new(collect_encrypted_columns(aliases), policy)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EncryptedColumn> {
        self.columns.iter()
    }

    /// Whether any descriptor carries this bare column name.
    pub fn contains_name(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.matches_column(column))
    }

    /// Find the descriptor for a column reference.
    pub fn lookup(
        &self,
        column: &str,
        qualifier: Qualifier<'_>,
    ) -> Result<Option<&EncryptedColumn>, InterceptError> {
        match qualifier {
            Qualifier::Explicit(name) => Ok(self.qualified(column, name)),
            Qualifier::Implicit(table) => match self.qualified(column, table) {
                Some(found) => Ok(Some(found)),
                None => self.bare(column),
            },
            Qualifier::None => self.bare(column),
        }
    }

    fn qualified(&self, column: &str, qualifier: &str) -> Option<&EncryptedColumn> {
        self.columns
            .iter()
            .find(|c| c.matches_column(column) && c.matches_qualifier(qualifier))
    }

    fn bare(&self, column: &str) -> Result<Option<&EncryptedColumn>, InterceptError> {
        let mut candidates = self.columns.iter().filter(|c| c.matches_column(column));
        let Some(first) = candidates.next() else {
            return Ok(None);
        };

        let conflicting: Vec<&EncryptedColumn> = candidates
            .filter(|c| c.table != first.table || c.encryption_key != first.encryption_key)
            .collect();
        if conflicting.is_empty() {
            return Ok(Some(first));
        }

        let names: Vec<String> = std::iter::once(first)
            .chain(conflicting)
            .map(|c| format!("{}.{}", c.table, c.column))
            .collect();
        match self.policy {
            AmbiguityPolicy::Warn => {
                tracing::warn!(
                    column,
                    candidates = ?names,
                    "Ambiguous unqualified column; using first match"
                );
                Ok(Some(first))
            }
            AmbiguityPolicy::Reject => Err(InterceptError::AmbiguousColumn {
                column: column.to_string(),
                candidates: names,
            }),
        }
    }
}
