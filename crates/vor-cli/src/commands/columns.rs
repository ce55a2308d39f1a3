//! `vor columns` - list encrypted column descriptors.

use anyhow::Result;
use vor_intercept::{collect_encrypted_columns, EncryptedColumn};

use super::MetadataArgs;

pub fn run(args: &MetadataArgs) -> Result<()> {
    let columns = columns(args)?;
    if columns.is_empty() {
        println!("No encrypted columns.");
        return Ok(());
    }
    for column in &columns {
        println!(
            "{}.{}  alias={}  key={}  type={}",
            column.table,
            column.column,
            column.alias,
            column.encryption_key,
            column.declared_type.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn columns(args: &MetadataArgs) -> Result<Vec<EncryptedColumn>> {
    let metadata = args.load_metadata()?;
    Ok(collect_encrypted_columns(&metadata.aliases))
}
