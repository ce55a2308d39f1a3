use sqlparser::ast::{Select, SelectItem};

use super::{DecryptedColumns, Resolver, SelectPlan, TableScope};
use crate::collector::EncryptedColumns;
use crate::error::InterceptError;
use crate::parser::ParsedQuery;

/// Plan decryption of projected columns and WHERE leaves.
///
/// Only plain column references in the projection are eligible, with or
/// without an `AS` alias. Once a column is projected, every other reference
/// to it in the statement (WHERE, JOIN ON, GROUP BY, HAVING, ORDER BY) is
/// recorded on that column, so each reference is wrapped exactly once.
pub fn extract_select(
    parsed: &ParsedQuery<'_>,
    select: &Select,
    columns: &EncryptedColumns,
) -> Result<SelectPlan, InterceptError> {
    let resolver = Resolver::new(parsed, columns, TableScope::from_tables(&select.from));
    let mut projected = DecryptedColumns::default();

    for item in &select.projection {
        let expr = match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => expr,
            _ => continue,
        };
        if let Some(resolved) = resolver.resolve(expr)? {
            projected.add(resolved);
        }
    }
    projected.extend_existing(resolver.references(parsed.statement())?);

    let mut wheres = Vec::new();
    if let Some(selection) = &select.selection {
        for (leaf, descriptor) in resolver.wheres(selection, None)? {
            if !projected.contains(descriptor) {
                wheres.push(leaf);
            }
        }
    }

    let plan = SelectPlan {
        columns: projected.into_columns(),
        wheres,
    };

    tracing::debug!(
        columns = plan.columns.len(),
        wheres = plan.wheres.len(),
        "Extracted select plan"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Operand;
    use crate::parser::{StatementKind, StatementParser};
    use serde_json::json;
    use vor_core::{AliasMetadata, AmbiguityPolicy, ColumnMetadata, Parameters};

    fn columns() -> EncryptedColumns {
        EncryptedColumns::from_aliases(
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
        )
    }

    fn plan(sql: &str, params: &[&str]) -> (SelectPlan, String) {
        let params: Parameters = params.iter().map(|p| (p.to_string(), json!(1))).collect();
        let parsed = StatementParser::new().parse(sql, &params).unwrap().unwrap();
        let StatementKind::Select(select) = parsed.kind() else {
            panic!("expected select");
        };
        let plan = extract_select(&parsed, select, &columns()).unwrap();
        (plan, sql.to_string())
    }

    #[test]
    fn test_projected_columns() {
        let (plan, sql) = plan(
            r#"SELECT "User"."id" AS "User_id", "User"."ssn" AS "User_ssn", count(*) FROM "user" "User""#,
            &[],
        );
        assert_eq!(plan.columns.len(), 1);
        let column = &plan.columns[0];
        assert_eq!(column.table, "User");
        assert_eq!(column.column, "ssn");
        assert_eq!(column.encryption_key, "ssn-key");
        assert_eq!(&sql[column.references[0].clone()], r#""User"."ssn""#);
        assert!(plan.wheres.is_empty());
    }

    #[test]
    fn test_where_on_projected_column_is_folded() {
        let (plan, sql) = plan(
            r#"SELECT "User"."ssn" FROM "user" "User" WHERE "User"."ssn" = :ssn AND "User"."phone" = :phone"#,
            &["ssn", "phone"],
        );
        assert_eq!(plan.columns.len(), 1);
        assert_eq!(plan.columns[0].references.len(), 2);
        assert_eq!(&sql[plan.columns[0].references[1].clone()], r#""User"."ssn""#);

        assert_eq!(plan.wheres.len(), 1);
        let leaf = &plan.wheres[0];
        assert_eq!(leaf.column, "phone");
        assert_eq!(leaf.table, "User");
        assert_eq!(leaf.operand, Operand::Parameter("phone".to_string()));
        assert_eq!(leaf.encryption_key, "phone-key");
    }

    #[test]
    fn test_every_clause_references_projected_column() {
        let (plan, sql) = plan(
            r#"SELECT "User"."ssn", count(*) FROM "user" "User" JOIN "user" "Other" ON "Other"."ssn" = "User"."ssn" GROUP BY "User"."ssn" HAVING min("User"."ssn") > '1' ORDER BY "User"."ssn" ASC"#,
            &[],
        );
        assert_eq!(plan.columns.len(), 1);
        let references = &plan.columns[0].references;
        assert_eq!(references.len(), 6);
        assert!(references.windows(2).all(|pair| pair[0].start < pair[1].start));
        assert_eq!(&sql[references[1].clone()], r#""Other"."ssn""#);
        assert!(references.iter().skip(2).all(|r| &sql[r.clone()] == r#""User"."ssn""#));
        assert!(plan.wheres.is_empty());
    }

    #[test]
    fn test_mixed_case_alias_keeps_spelling() {
        let (plan, _) = plan(
            r#"SELECT "UserProfile"."ssn" FROM "user" "UserProfile" WHERE "UserProfile"."phone" = :phone"#,
            &["phone"],
        );
        assert_eq!(plan.columns[0].table, "UserProfile");
        assert_eq!(plan.wheres[0].table, "UserProfile");
    }

    #[test]
    fn test_unprojected_column_elsewhere_not_collected() {
        let (plan, _) = plan(
            r#"SELECT "User"."id" FROM "user" "User" ORDER BY "User"."ssn""#,
            &[],
        );
        assert!(plan.columns.is_empty());
        assert!(plan.wheres.is_empty());
    }

    #[test]
    fn test_sql_alias_resolves_to_table() {
        let (plan, _) = plan("SELECT u.ssn FROM \"user\" u WHERE u.phone = '555'", &[]);
        assert_eq!(plan.columns[0].table, "U");
        assert_eq!(plan.wheres[0].operand, Operand::Literal("'555'".to_string()));
    }

    #[test]
    fn test_unknown_qualifier_is_plaintext() {
        let (plan, _) = plan("SELECT o.ssn FROM orders o", &[]);
        assert!(plan.columns.is_empty());
    }

    #[test]
    fn test_wildcard_and_expressions_ignored() {
        let (plan, _) = plan("SELECT *, upper(ssn) FROM \"user\"", &[]);
        assert!(plan.columns.is_empty());
    }
}
