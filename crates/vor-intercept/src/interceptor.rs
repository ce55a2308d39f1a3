//! Query interception entry points.

use serde::Serialize;
use vor_core::{AliasMetadataSource, InterceptorConfig, Parameters, VorConfig};

use crate::cipher::CipherCalls;
use crate::collector::EncryptedColumns;
use crate::error::InterceptError;
use crate::extract::{self, ModificationPlan};
use crate::parser::{SqlOperation, StatementParser};
use crate::rewrite;

/// Wraps encrypted columns in cipher calls.
#[derive(Clone, Default)]
pub struct QueryInterceptor {
    parser: StatementParser,
    cipher: CipherCalls,
    config: InterceptorConfig,
}

/// Result of intercepting one query.
#[derive(Debug, Clone, Serialize)]
pub struct Interception {
    pub original_sql: String,
    pub rewritten_sql: String,
    pub operation: SqlOperation,
    pub plan: ModificationPlan,
    /// Encrypted column descriptors collected from the metadata.
    pub encrypted_columns: usize,
}

impl Interception {
    fn passthrough(query: &str, operation: SqlOperation, encrypted_columns: usize) -> Self {
        Self {
            original_sql: query.to_string(),
            rewritten_sql: query.to_string(),
            operation,
            plan: ModificationPlan::Passthrough,
            encrypted_columns,
        }
    }

    /// Whether the rewritten text differs from the original.
    pub fn is_rewritten(&self) -> bool {
        self.original_sql != self.rewritten_sql
    }
}

impl QueryInterceptor {
    /// Create an interceptor from a loaded configuration.
    ///
    /// The cipher names are spliced into rewritten SQL, so the configuration
    /// is validated here even when it did not come from a file.
    pub fn new(config: VorConfig) -> Result<Self, InterceptError> {
        config.validate()?;
        Ok(Self {
            parser: StatementParser::new(),
            cipher: CipherCalls::new(config.cipher),
            config: config.interceptor,
        })
    }

    /// Rewrite `query` so encrypted columns are read and written through
    /// cipher calls.
    ///
    /// Returns the original text unchanged when nothing is encrypted or the
    /// statement is not a supported SELECT/INSERT/UPDATE/DELETE.
    pub fn intercept<M>(
        &self,
        query: &str,
        parameters: &Parameters,
        metadata: &M,
    ) -> Result<String, InterceptError>
    where
        M: AliasMetadataSource + ?Sized,
    {
        Ok(self.explain(query, parameters, metadata)?.rewritten_sql)
    }

    /// Intercept `query` and report the plan alongside the rewritten text.
    pub fn explain<M>(
        &self,
        query: &str,
        parameters: &Parameters,
        metadata: &M,
    ) -> Result<Interception, InterceptError>
    where
        M: AliasMetadataSource + ?Sized,
    {
        let columns = EncryptedColumns::from_aliases(metadata.aliases(), self.config.ambiguity);
        if columns.is_empty() {
            tracing::debug!("No encrypted columns; query passed through");
            return Ok(Interception::passthrough(query, SqlOperation::Other, 0));
        }

        let Some(parsed) = self.parser.parse(query, parameters)? else {
            return Ok(Interception::passthrough(query, SqlOperation::Other, columns.len()));
        };
        let operation = parsed.kind().operation();

        let plan = extract::extract(&parsed, &columns)?;
        if plan.is_empty() {
            tracing::debug!(kind = ?operation, "Nothing to encrypt; query passed through");
            return Ok(Interception::passthrough(query, operation, columns.len()));
        }

        let rewritten_sql = rewrite::rewrite(query, &plan, self.config.substitution, &self.cipher);
        tracing::debug!(kind = ?operation, "Query rewritten for encrypted columns");

        Ok(Interception {
            original_sql: query.to_string(),
            rewritten_sql,
            operation,
            plan,
            encrypted_columns: columns.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vor_core::{AliasMetadata, ColumnMetadata};

    fn metadata() -> Vec<AliasMetadata> {
        vec![AliasMetadata::new(
            "User",
            "user",
            vec![
                ColumnMetadata::plain("id"),
                ColumnMetadata::encrypted("ssn", "K"),
            ],
        )]
    }

    #[test]
    fn test_fast_path_skips_parsing() {
        let interceptor = QueryInterceptor::default();
        let plain = vec![AliasMetadata::new("User", "user", vec![ColumnMetadata::plain("id")])];
        // not valid SQL, but never parsed
        let query = "SELEC ssn FRM user";
        let out = interceptor.intercept(query, &Parameters::new(), &plain).unwrap();
        assert_eq!(out, query);
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let interceptor = QueryInterceptor::default();
        let result = interceptor.intercept("SELEC ssn FRM user", &Parameters::new(), &metadata());
        assert!(matches!(result, Err(InterceptError::Parse(_))));
    }

    #[test]
    fn test_explain_reports_plan() {
        let interceptor = QueryInterceptor::default();
        let params: Parameters = [("ssn".to_string(), json!("123"))].into_iter().collect();
        let interception = interceptor
            .explain(r#"DELETE FROM "user" WHERE "ssn" = :ssn"#, &params, &metadata())
            .unwrap();
        assert_eq!(interception.operation, SqlOperation::Delete);
        assert_eq!(interception.encrypted_columns, 1);
        assert!(interception.is_rewritten());
        assert!(matches!(interception.plan, ModificationPlan::Delete(ref plan) if plan.wheres.len() == 1));
    }

    #[test]
    fn test_unsupported_statement_passes_through() {
        let interceptor = QueryInterceptor::default();
        let query = r#"CREATE TABLE "user" ("ssn" bytea)"#;
        let interception = interceptor.explain(query, &Parameters::new(), &metadata()).unwrap();
        assert_eq!(interception.operation, SqlOperation::Other);
        assert_eq!(interception.rewritten_sql, query);
    }

    #[test]
    fn test_new_rejects_unsafe_cipher_names() {
        let mut config = VorConfig::default();
        config.cipher.decrypt_function = "PGP_SYM_DECRYPT(x); DROP TABLE t; --".to_string();
        let result = QueryInterceptor::new(config);
        assert!(matches!(result, Err(InterceptError::Config(_))));

        assert!(QueryInterceptor::new(VorConfig::default()).is_ok());
    }

    #[test]
    fn test_interceptor_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<QueryInterceptor>();
    }
}
