use super::{decrypt_columns, literal_patterns, replace_tokens, Rewrite, Substitution, Wrap};
use crate::cipher::CipherCalls;
use crate::extract::UpdatePlan;

/// Clauses after SET, where literal mode stops encrypting.
const DECRYPT_CLAUSES: [&str; 2] = [" WHERE ", " RETURNING "];

impl Rewrite for UpdatePlan {
    fn substitutions(&self) -> Vec<Substitution> {
        let mut substitutions = Vec::new();
        for column in &self.columns {
            substitutions.push(Substitution::encrypt(
                column.placeholder.clone(),
                &column.encryption_key,
            ));
            substitutions.extend(
                column
                    .where_references
                    .iter()
                    .map(|range| Substitution::decrypt(range.clone(), &column.encryption_key)),
            );
        }
        substitutions.extend(
            self.wheres
                .iter()
                .map(|leaf| Substitution::decrypt(leaf.reference.clone(), &leaf.encryption_key)),
        );
        substitutions.extend(decrypt_columns(&self.returning));
        substitutions
    }

    /// Encrypt only before the first `" WHERE "` or `" RETURNING "`,
    /// decrypt only after it.
    fn rewrite_literal(&self, query: &str, calls: &CipherCalls) -> String {
        let (encrypts, decrypts): (Vec<_>, Vec<_>) = self
            .substitutions()
            .into_iter()
            .partition(|s| matches!(s.wrap, Wrap::Encrypt(_)));
        let encrypt = literal_patterns(query, &encrypts, calls);
        let decrypt = literal_patterns(query, &decrypts, calls);

        let boundary = DECRYPT_CLAUSES
            .iter()
            .filter_map(|clause| query.find(clause))
            .min();
        match boundary {
            Some(index) => {
                let (set, rest) = query.split_at(index);
                format!(
                    "{}{}",
                    replace_tokens(set, &encrypt),
                    replace_tokens(rest, &decrypt)
                )
            }
            None => replace_tokens(query, &encrypt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{SelectColumn, UpdateColumn};

    fn plan() -> UpdatePlan {
        // UPDATE "user" SET "ssn" = :ssn WHERE "ssn" = :ssnFilter
        UpdatePlan {
            columns: vec![UpdateColumn {
                table: "user".to_string(),
                column: "ssn".to_string(),
                parameter: "ssn".to_string(),
                encryption_key: "k".to_string(),
                placeholder: 26..30,
                where_references: vec![37..42],
            }],
            wheres: Vec::new(),
            returning: Vec::new(),
        }
    }

    #[test]
    fn test_literal_split_on_where() {
        let query = r#"UPDATE "user" SET "ssn" = :ssn WHERE "ssn" = :ssnFilter"#;
        let calls = CipherCalls::default();
        assert_eq!(
            plan().rewrite_literal(query, &calls),
            format!(
                r#"UPDATE "user" SET "ssn" = {} WHERE {} = :ssnFilter"#,
                calls.encrypt(":ssn", "k"),
                calls.decrypt(r#""ssn""#, "k")
            )
        );
    }

    #[test]
    fn test_literal_returning_without_where_decrypted() {
        let query = r#"UPDATE "user" SET "ssn" = :ssn RETURNING "ssn""#;
        let calls = CipherCalls::default();
        let mut plan = plan();
        plan.columns[0].where_references.clear();
        plan.returning.push(SelectColumn {
            table: "User".to_string(),
            column: "ssn".to_string(),
            encryption_key: "k".to_string(),
            references: vec![41..46],
        });
        assert_eq!(
            plan.rewrite_literal(query, &calls),
            format!(
                r#"UPDATE "user" SET "ssn" = {} RETURNING {}"#,
                calls.encrypt(":ssn", "k"),
                calls.decrypt(r#""ssn""#, "k")
            )
        );
    }

    #[test]
    fn test_literal_without_where_only_encrypts() {
        let query = r#"UPDATE "user" SET "ssn" = :ssn"#;
        let calls = CipherCalls::default();
        let mut plan = plan();
        plan.columns[0].where_references.clear();
        assert_eq!(
            plan.rewrite_literal(query, &calls),
            format!(r#"UPDATE "user" SET "ssn" = {}"#, calls.encrypt(":ssn", "k"))
        );
    }
}
