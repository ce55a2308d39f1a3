use sqlparser::ast::{AssignmentTarget, Update};

use super::{last_name, DecryptedColumns, Resolver, TableScope, UpdateColumn, UpdatePlan};
use crate::collector::{EncryptedColumn, EncryptedColumns};
use crate::error::InterceptError;
use crate::parser::ParsedQuery;

/// Plan encryption of SET values and decryption of WHERE leaves.
///
/// A WHERE leaf on a column that is also assigned is recorded on that
/// SET entry rather than in `wheres`. Encrypted columns in RETURNING are
/// decrypted.
pub fn extract_update(
    parsed: &ParsedQuery<'_>,
    update: &Update,
    columns: &EncryptedColumns,
) -> Result<UpdatePlan, InterceptError> {
    let scope = TableScope::from_tables(std::iter::once(&update.table));
    let table = scope.single().unwrap_or_default().to_string();
    let resolver = Resolver::new(parsed, columns, scope);
    let mut plan = UpdatePlan::default();
    let mut assigned: Vec<&EncryptedColumn> = Vec::new();

    for assignment in &update.assignments {
        let AssignmentTarget::ColumnName(target) = &assignment.target else {
            continue;
        };
        let Some(column) = last_name(target) else {
            continue;
        };
        let Some(descriptor) = resolver.lookup_unqualified(&column)? else {
            continue;
        };
        let Some(parameter) = parsed.bound_parameter(&assignment.value) else {
            tracing::debug!(
                column = %column,
                "Encrypted column assigned a non-parameter value; left unchanged"
            );
            continue;
        };
        plan.columns.push(UpdateColumn {
            table: table.clone(),
            column,
            parameter: parameter.name,
            encryption_key: descriptor.encryption_key.clone(),
            placeholder: parameter.range,
            where_references: Vec::new(),
        });
        assigned.push(descriptor);
    }

    if let Some(selection) = &update.selection {
        for (leaf, descriptor) in resolver.wheres(selection, None)? {
            match assigned.iter().position(|a| *a == descriptor) {
                Some(index) => plan.columns[index].where_references.push(leaf.reference),
                None => plan.wheres.push(leaf),
            }
        }
    }

    let mut returning = DecryptedColumns::default();
    for resolved in resolver.references(&update.returning)? {
        returning.add(resolved);
    }
    plan.returning = returning.into_columns();

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{StatementKind, StatementParser};
    use serde_json::json;
    use vor_core::{AliasMetadata, AmbiguityPolicy, ColumnMetadata, Parameters};

    fn plan(sql: &str, params: &[&str]) -> UpdatePlan {
        let columns = EncryptedColumns::from_aliases(
            &[AliasMetadata::new(
                "User",
                "user",
                vec![
                    ColumnMetadata::plain("id"),
                    ColumnMetadata::encrypted("ssn", "ssn-key"),
                    ColumnMetadata::encrypted("phone", "phone-key"),
                ],
            )],
            AmbiguityPolicy::Reject,
        );
        let params: Parameters = params.iter().map(|p| (p.to_string(), json!("x"))).collect();
        let parsed = StatementParser::new().parse(sql, &params).unwrap().unwrap();
        let StatementKind::Update(update) = parsed.kind() else {
            panic!("expected update");
        };
        extract_update(&parsed, update, &columns).unwrap()
    }

    #[test]
    fn test_set_and_where() {
        let sql = r#"UPDATE "user" SET "ssn" = :ssn, "id" = :id WHERE "ssn" = :ssnFilter AND "phone" = :phone"#;
        let plan = plan(sql, &["ssn", "id", "ssnFilter", "phone"]);

        assert_eq!(plan.columns.len(), 1);
        let column = &plan.columns[0];
        assert_eq!(column.table, "user");
        assert_eq!(column.parameter, "ssn");
        assert_eq!(&sql[column.placeholder.clone()], ":ssn");
        assert_eq!(column.where_references.len(), 1);
        assert_eq!(&sql[column.where_references[0].clone()], r#""ssn""#);

        assert_eq!(plan.wheres.len(), 1);
        assert_eq!(plan.wheres[0].column, "phone");
        assert_eq!(plan.wheres[0].encryption_key, "phone-key");
    }

    #[test]
    fn test_returning_decrypted() {
        let sql = r#"UPDATE "user" SET "phone" = :phone RETURNING "id", "ssn", "phone""#;
        let plan = plan(sql, &["phone"]);
        assert_eq!(plan.returning.len(), 2);
        assert_eq!(plan.returning[0].column, "ssn");
        assert_eq!(plan.returning[0].table, "User");
        assert_eq!(&sql[plan.returning[0].references[0].clone()], r#""ssn""#);
        assert_eq!(plan.returning[1].encryption_key, "phone-key");
    }

    #[test]
    fn test_literal_assignment_skipped() {
        let plan = plan(r#"UPDATE "user" SET "ssn" = NULL"#, &[]);
        assert!(plan.columns.is_empty());
        assert!(plan.wheres.is_empty());
    }

    #[test]
    fn test_without_where() {
        let plan = plan(r#"UPDATE "user" SET "phone" = :phone"#, &["phone"]);
        assert_eq!(plan.columns.len(), 1);
        assert!(plan.wheres.is_empty());
    }
}
