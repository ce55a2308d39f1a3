//! # vor-intercept
//!
//! Column-level encryption for SQL emitted by a query builder.
//!
//! This crate provides functionality to:
//! - Collect encrypted column descriptors from alias metadata
//! - Parse queries with `sqlparser` while keeping a map back to the original text
//! - Plan which column references and bound values touch encrypted columns
//! - Wrap them in decryption and encryption calls
//!
//! ## How It Works
//!
//! **Before (from the query builder):**
//! ```sql
//! SELECT "User"."ssn" FROM "user" "User" WHERE "User"."ssn" = :ssn
//! ```
//!
//! **After (to Postgres):**
//! ```sql
//! SELECT PGP_SYM_DECRYPT("User"."ssn"::bytea, MERGEKEY('user-ssn'), 'compress-algo=1, cipher-algo=aes256')
//! FROM "user" "User"
//! WHERE PGP_SYM_DECRYPT("User"."ssn"::bytea, MERGEKEY('user-ssn'), 'compress-algo=1, cipher-algo=aes256') = :ssn
//! ```
//!
//! ## Supported Operations
//!
//! | Operation | Behavior |
//! |-----------|----------|
//! | `SELECT`  | Decrypt projected columns wherever they appear, and WHERE comparisons |
//! | `INSERT`  | Encrypt bound values of a single-row `VALUES` |
//! | `UPDATE`  | Encrypt `SET` values, decrypt WHERE comparisons and `RETURNING` |
//! | `DELETE`  | Decrypt WHERE comparisons and `RETURNING` |
//!
//! Everything else is returned unchanged.

pub mod cipher;
pub mod collector;
pub mod error;
pub mod extract;
pub mod interceptor;
pub mod parser;
pub mod predicate;
pub mod rewrite;

pub use cipher::CipherCalls;
pub use collector::{collect_encrypted_columns, EncryptedColumn, EncryptedColumns, Qualifier};
pub use error::InterceptError;
pub use extract::ModificationPlan;
pub use interceptor::{Interception, QueryInterceptor};
pub use parser::{ParsedQuery, SqlOperation, StatementKind, StatementParser};
