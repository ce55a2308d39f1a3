// Configuration types shared across all vor crates
pub mod config;

// Alias/entity metadata supplied by the query builder
pub mod metadata;

pub use config::{
    AmbiguityPolicy, CipherConfig, ConfigError, InterceptorConfig, SubstitutionMode, VorConfig,
};
pub use metadata::{
    AliasMetadata, AliasMetadataSource, ColumnMetadata, EntityMetadata, Parameters, QueryMetadata,
};
