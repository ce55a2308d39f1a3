//! Alias and entity metadata supplied by the query builder.
//!
//! Every alias participating in a query may carry entity metadata: the
//! table it maps to and the column definitions of that entity. Columns with
//! an `encryption_key` are the ones the interceptor wraps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;

/// Bound parameters of a query, keyed by placeholder name.
///
/// Only the names are consulted during interception; values are carried
/// through untouched to the executor.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// One column definition of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Bare column name as referenced in SQL.
    pub property_path: String,

    /// Declared column type, if known.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,

    /// Key identifier; the column is encrypted when this is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

impl ColumnMetadata {
    /// A plaintext column.
    pub fn plain(property_path: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            column_type: None,
            encryption_key: None,
        }
    }

    /// A column encrypted under `key`.
    pub fn encrypted(property_path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            property_path: property_path.into(),
            column_type: None,
            encryption_key: Some(key.into()),
        }
    }

    /// Set the declared type.
    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    /// The encryption key, if set and non-empty.
    pub fn key(&self) -> Option<&str> {
        self.encryption_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Entity metadata attached to an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub table_name: String,

    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
}

/// An alias in scope for the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasMetadata {
    /// Alias name as emitted by the query builder (e.g. `User`).
    pub name: String,

    /// Entity metadata; `None` for aliases over raw sub-queries.
    #[serde(default)]
    pub metadata: Option<EntityMetadata>,
}

impl AliasMetadata {
    /// An alias mapped to `table_name` with the given columns.
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<ColumnMetadata>,
    ) -> Self {
        Self {
            name: name.into(),
            metadata: Some(EntityMetadata {
                table_name: table_name.into(),
                columns,
            }),
        }
    }

    /// An alias without entity metadata.
    pub fn without_metadata(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
        }
    }

    /// Whether the alias maps to an entity with column metadata.
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }
}

/// Source of the aliases participating in a query.
///
/// This is the seam to the query builder: anything that can list its
/// aliases in declaration order can drive the interceptor.
pub trait AliasMetadataSource {
    fn aliases(&self) -> &[AliasMetadata];
}

impl AliasMetadataSource for [AliasMetadata] {
    fn aliases(&self) -> &[AliasMetadata] {
        self
    }
}

impl AliasMetadataSource for Vec<AliasMetadata> {
    fn aliases(&self) -> &[AliasMetadata] {
        self
    }
}

/// Alias metadata loaded from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    #[serde(default)]
    pub aliases: Vec<AliasMetadata>,
}

impl QueryMetadata {
    /// Load metadata from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse metadata from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }
}

impl AliasMetadataSource for QueryMetadata {
    fn aliases(&self) -> &[AliasMetadata] {
        &self.aliases
    }
}
