use sqlparser::ast::{Delete, FromTable};

use super::{DecryptedColumns, DeletePlan, Resolver, TableScope};
use crate::collector::EncryptedColumns;
use crate::error::InterceptError;
use crate::parser::ParsedQuery;

/// Plan decryption of WHERE leaves and RETURNING columns; every leaf
/// carries the source table.
pub fn extract_delete(
    parsed: &ParsedQuery<'_>,
    delete: &Delete,
    columns: &EncryptedColumns,
) -> Result<DeletePlan, InterceptError> {
    let tables = match &delete.from {
        FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
    };
    let scope = TableScope::from_tables(tables);
    let table = scope.single().map(str::to_string);
    let resolver = Resolver::new(parsed, columns, scope);

    let wheres = match &delete.selection {
        Some(selection) => resolver
            .wheres(selection, table.as_deref())?
            .into_iter()
            .map(|(leaf, _)| leaf)
            .collect(),
        None => Vec::new(),
    };

    let mut returning = DecryptedColumns::default();
    for resolved in resolver.references(&delete.returning)? {
        returning.add(resolved);
    }

    Ok(DeletePlan {
        wheres,
        returning: returning.into_columns(),
    })
}
