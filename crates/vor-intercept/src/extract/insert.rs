use sqlparser::ast::{Insert, SetExpr, TableObject};

use super::{InsertPlan, Resolver, TableScope, ValueParameter};
use crate::collector::EncryptedColumns;
use crate::error::InterceptError;
use crate::parser::ParsedQuery;

/// Plan encryption of bound values in a single-row `INSERT ... VALUES`.
///
/// The column list is zipped with the row; literal values are left alone.
/// Multi-row inserts and `INSERT ... SELECT` are passed through.
pub fn extract_insert(
    parsed: &ParsedQuery<'_>,
    insert: &Insert,
    columns: &EncryptedColumns,
) -> Result<InsertPlan, InterceptError> {
    let mut plan = InsertPlan::default();

    let Some(source) = &insert.source else {
        return Ok(plan);
    };
    let SetExpr::Values(values) = source.body.as_ref() else {
        tracing::warn!("INSERT ... SELECT is not encrypted; passing through");
        return Ok(plan);
    };
    let row = match values.rows.as_slice() {
        [row] => row,
        [] => return Ok(plan),
        rows => {
            tracing::warn!(rows = rows.len(), "Multi-row INSERT is not encrypted; passing through");
            return Ok(plan);
        }
    };

    let scope = match &insert.table {
        TableObject::TableName(name) => TableScope::single_table(name),
        _ => TableScope::default(),
    };
    let resolver = Resolver::new(parsed, columns, scope);

    for (column, value) in insert.columns.iter().zip(row) {
        let Some(descriptor) = resolver.lookup_unqualified(&column.value)? else {
            continue;
        };
        match parsed.bound_parameter(value) {
            Some(parameter) => plan.values.push(ValueParameter {
                parameter: parameter.name,
                encryption_key: descriptor.encryption_key.clone(),
                placeholder: parameter.range,
            }),
            None => tracing::debug!(
                column = %column.value,
                "Encrypted column receives a literal value; left unchanged"
            ),
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{StatementKind, StatementParser};
    use serde_json::json;
    use vor_core::{AliasMetadata, AmbiguityPolicy, ColumnMetadata, Parameters};

    fn plan(sql: &str, params: &[&str]) -> InsertPlan {
        let columns = EncryptedColumns::from_aliases(
            &[AliasMetadata::new(
                "User",
                "user",
                vec![
                    ColumnMetadata::plain("name"),
                    ColumnMetadata::encrypted("ssn", "ssn-key"),
                    ColumnMetadata::encrypted("phone", "phone-key"),
                ],
            )],
            AmbiguityPolicy::Reject,
        );
        let params: Parameters = params.iter().map(|p| (p.to_string(), json!("x"))).collect();
        let parsed = StatementParser::new().parse(sql, &params).unwrap().unwrap();
        let StatementKind::Insert(insert) = parsed.kind() else {
            panic!("expected insert");
        };
        extract_insert(&parsed, insert, &columns).unwrap()
    }

    #[test]
    fn test_values_aligned_with_columns() {
        let sql = r#"INSERT INTO "user"("name", "ssn", "phone") VALUES (:name, :ssn, :phone)"#;
        let plan = plan(sql, &["name", "ssn", "phone"]);
        assert_eq!(plan.values.len(), 2);
        assert_eq!(plan.values[0].parameter, "ssn");
        assert_eq!(plan.values[0].encryption_key, "ssn-key");
        assert_eq!(&sql[plan.values[0].placeholder.clone()], ":ssn");
        assert_eq!(plan.values[1].parameter, "phone");
        assert_eq!(plan.values[1].encryption_key, "phone-key");
    }

    #[test]
    fn test_literal_value_skipped() {
        let plan = plan(
            r#"INSERT INTO "user"("ssn", "phone") VALUES ('123', :phone)"#,
            &["phone"],
        );
        assert_eq!(plan.values.len(), 1);
        assert_eq!(plan.values[0].parameter, "phone");
    }

    #[test]
    fn test_multi_row_and_select_pass_through() {
        let multi = plan(
            r#"INSERT INTO "user"("ssn") VALUES (:a), (:b)"#,
            &["a", "b"],
        );
        assert!(multi.values.is_empty());

        let select = plan(r#"INSERT INTO "user"("ssn") SELECT "ssn" FROM "other""#, &[]);
        assert!(select.values.is_empty());
    }

    #[test]
    fn test_positional_placeholders() {
        let plan = plan(r#"INSERT INTO "user"("name", "ssn") VALUES ($1, $2)"#, &[]);
        assert_eq!(plan.values.len(), 1);
        assert_eq!(plan.values[0].parameter, "$2");
    }
}
