//! CLI command implementations for vor.

pub mod columns;
pub mod explain;
pub mod rewrite;

use anyhow::{Context, Result};
use clap::Args;
use std::io::Read;
use std::path::PathBuf;

use vor_core::{Parameters, QueryMetadata, VorConfig};

/// Where to find the alias metadata and interceptor configuration.
#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    /// Alias metadata file (YAML)
    #[arg(long, short = 'm', env = "VOR_METADATA")]
    pub metadata: PathBuf,

    /// Interceptor configuration file (YAML); defaults apply when omitted
    #[arg(long, short = 'c', env = "VOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// A query to intercept.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub files: MetadataArgs,

    /// Bound parameter as name=value; the value is read as JSON when it parses
    #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// SQL text, or `-` to read it from stdin
    pub sql: String,
}

impl MetadataArgs {
    pub fn load_config(&self) -> Result<VorConfig> {
        match &self.config {
            Some(path) => VorConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => Ok(VorConfig::default()),
        }
    }

    pub fn load_metadata(&self) -> Result<QueryMetadata> {
        QueryMetadata::from_file(&self.metadata).with_context(|| {
            format!("Failed to load metadata from {}", self.metadata.display())
        })
    }
}

impl QueryArgs {
    pub fn parameters(&self) -> Result<Parameters> {
        self.params.iter().map(String::as_str).map(parse_parameter).collect()
    }

    pub fn read_sql(&self) -> Result<String> {
        if self.sql != "-" {
            return Ok(self.sql.clone());
        }
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .context("Failed to read SQL from stdin")?;
        Ok(sql.trim_end().to_string())
    }
}

/// Parse `name=value`. Values that are not valid JSON are kept as strings.
fn parse_parameter(raw: &str) -> Result<(String, serde_json::Value)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid parameter {raw:?}, expected NAME=VALUE"))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        anyhow::bail!("Invalid parameter {raw:?}, name is empty");
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
