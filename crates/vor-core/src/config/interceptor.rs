//! Interceptor behavior configuration.

use serde::{Deserialize, Serialize};

/// How plan entries are substituted back into the query text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionMode {
    /// Wrap the exact byte ranges the parser reported for each matched node.
    #[default]
    Positional,
    /// Replace every occurrence of each matched reference's text.
    ///
    /// UPDATE statements are split once on `" WHERE "`, encrypting only in
    /// the SET half and decrypting only in the WHERE half.
    Literal,
}

/// What to do when a bare column name matches descriptors with different
/// tables or keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Log a warning and use the first match.
    #[default]
    Warn,
    /// Fail the interception.
    Reject,
}

/// Interceptor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorConfig {
    #[serde(default)]
    pub substitution: SubstitutionMode,

    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}
