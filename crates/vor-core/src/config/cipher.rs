//! Cipher call configuration.
//!
//! Defines the SQL functions wrapped around encrypted columns. Only the call
//! syntax is configured here; the database performs the cryptography.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// SQL functions and options used for encryption and decryption calls.
///
/// Writes are emitted as
/// `<encrypt_function>(<plaintext>, <key_function>('<key>'), '<options>')`
/// and reads as
/// `<decrypt_function>(<ciphertext>::<binary_type>, <key_function>('<key>'), '<options>')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherConfig {
    /// Function wrapping plaintext values on write.
    #[serde(default = "default_encrypt_function")]
    pub encrypt_function: String,

    /// Function wrapping stored ciphertext on read.
    #[serde(default = "default_decrypt_function")]
    pub decrypt_function: String,

    /// Function deriving the symmetric key from a key identifier.
    #[serde(default = "default_key_function")]
    pub key_function: String,

    /// Type the stored column is cast to before decryption.
    #[serde(default = "default_binary_type")]
    pub binary_type: String,

    /// Compression and cipher options passed as the last argument.
    #[serde(default = "default_options")]
    pub options: String,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            encrypt_function: default_encrypt_function(),
            decrypt_function: default_decrypt_function(),
            key_function: default_key_function(),
            binary_type: default_binary_type(),
            options: default_options(),
        }
    }
}

impl CipherConfig {
    /// Check that every emitted name is a plain SQL identifier.
    ///
    /// The names are spliced into query text verbatim, so anything beyond
    /// `[A-Za-z_][A-Za-z0-9_.]*` is refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("encrypt_function", &self.encrypt_function),
            ("decrypt_function", &self.decrypt_function),
            ("key_function", &self.key_function),
            ("binary_type", &self.binary_type),
        ];
        for (field, value) in names {
            if !is_plain_identifier(value) {
                return Err(ConfigError::Config(format!(
                    "cipher.{field} must be a plain SQL identifier, got {value:?}"
                )));
            }
        }
        if self.options.contains('\'') {
            return Err(ConfigError::Config(
                "cipher.options must not contain single quotes".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

// Default value functions
fn default_encrypt_function() -> String {
    "PGP_SYM_ENCRYPT".to_string()
}

fn default_decrypt_function() -> String {
    "PGP_SYM_DECRYPT".to_string()
}

fn default_key_function() -> String {
    "MERGEKEY".to_string()
}

fn default_binary_type() -> String {
    "bytea".to_string()
}

fn default_options() -> String {
    "compress-algo=1, cipher-algo=aes256".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CipherConfig::default().validate().is_ok());
    }

    #[test]
    fn test_schema_qualified_function_allowed() {
        let config = CipherConfig {
            key_function: "crypto.derive_key".to_string(),
            ..CipherConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_identifier() {
        for bad in ["", "1abc", "f(x)", "name with space"] {
            let config = CipherConfig {
                decrypt_function: bad.to_string(),
                ..CipherConfig::default()
            };
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_quote_in_options() {
        let config = CipherConfig {
            options: "cipher-algo=aes256'".to_string(),
            ..CipherConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
