//! Configuration types for the vor query interceptor.
//!
//! Configuration is loaded from a single YAML file (`vor.yaml`). Every
//! section is optional; an empty file yields the defaults, which emit the
//! `pgcrypto` call shapes used by the original deployment.
//!
//! # Sections
//!
//! - **cipher**: names of the SQL functions emitted around reads and writes
//! - **interceptor**: how plan spans are substituted and how ambiguous
//!   column names are treated

pub mod cipher;
pub mod interceptor;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use cipher::CipherConfig;
pub use interceptor::{AmbiguityPolicy, InterceptorConfig, SubstitutionMode};

/// Complete vor configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VorConfig {
    /// Cipher call configuration.
    #[serde(default)]
    pub cipher: CipherConfig,

    /// Interceptor behavior.
    #[serde(default)]
    pub interceptor: InterceptorConfig,
}

/// Errors that can occur while loading configuration or metadata files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VorConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content and validate it.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cipher.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = VorConfig::from_yaml("").unwrap();
        assert_eq!(config, VorConfig::default());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let yaml = r#"
interceptor:
  substitution: literal
"#;
        let config = VorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.interceptor.substitution, SubstitutionMode::Literal);
        assert_eq!(config.interceptor.ambiguity, AmbiguityPolicy::Warn);
        assert_eq!(config.cipher, CipherConfig::default());
    }

    #[test]
    fn test_invalid_cipher_rejected() {
        let yaml = r#"
cipher:
  encrypt_function: "drop table x; --"
"#;
        let result = VorConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cipher:\n  key_function: DERIVE_KEY").unwrap();

        let config = VorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cipher.key_function, "DERIVE_KEY");
        assert_eq!(config.cipher.encrypt_function, "PGP_SYM_ENCRYPT");
    }

    #[test]
    fn test_missing_file() {
        let result = VorConfig::from_file("/nonexistent/vor.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
