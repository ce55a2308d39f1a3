//! Encryption and decryption call text.

use vor_core::CipherConfig;

/// Renders cipher calls around SQL fragments.
#[derive(Debug, Clone, Default)]
pub struct CipherCalls {
    config: CipherConfig,
}

impl CipherCalls {
    pub fn new(config: CipherConfig) -> Self {
        Self { config }
    }

    /// Wrap a plaintext value for writing.
    pub fn encrypt(&self, plaintext: &str, key: &str) -> String {
        format!(
            "{}({}, {}, '{}')",
            self.config.encrypt_function,
            plaintext,
            self.key(key),
            self.config.options
        )
    }

    /// Wrap a stored ciphertext for reading.
    pub fn decrypt(&self, ciphertext: &str, key: &str) -> String {
        format!(
            "{}({}::{}, {}, '{}')",
            self.config.decrypt_function,
            ciphertext,
            self.config.binary_type,
            self.key(key),
            self.config.options
        )
    }

    fn key(&self, key: &str) -> String {
        format!("{}('{}')", self.config.key_function, key.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_call_shapes() {
        let calls = CipherCalls::default();
        assert_eq!(
            calls.encrypt(":ssn", "K"),
            "PGP_SYM_ENCRYPT(:ssn, MERGEKEY('K'), 'compress-algo=1, cipher-algo=aes256')"
        );
        assert_eq!(
            calls.decrypt(r#""User"."ssn""#, "K"),
            r#"PGP_SYM_DECRYPT("User"."ssn"::bytea, MERGEKEY('K'), 'compress-algo=1, cipher-algo=aes256')"#
        );
    }

    #[test]
    fn test_key_quotes_escaped() {
        let calls = CipherCalls::default();
        assert!(calls.encrypt("$1", "o'brien").contains("MERGEKEY('o''brien')"));
    }

    #[test]
    fn test_configured_functions() {
        let calls = CipherCalls::new(CipherConfig {
            encrypt_function: "enc".to_string(),
            decrypt_function: "dec".to_string(),
            key_function: "k".to_string(),
            binary_type: "blob".to_string(),
            options: "opts".to_string(),
        });
        assert_eq!(calls.encrypt("x", "a"), "enc(x, k('a'), 'opts')");
        assert_eq!(calls.decrypt("c", "a"), "dec(c::blob, k('a'), 'opts')");
    }
}
