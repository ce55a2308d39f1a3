//! `vor explain` - print the interception plan as JSON.

use anyhow::{Context, Result};
use vor_intercept::QueryInterceptor;

use super::QueryArgs;

pub fn run(args: &QueryArgs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&explain(args)?)?);
    Ok(())
}

pub fn explain(args: &QueryArgs) -> Result<serde_json::Value> {
    let interceptor = QueryInterceptor::new(args.files.load_config()?)?;
    let metadata = args.files.load_metadata()?;
    let sql = args.read_sql()?;
    let interception = interceptor
        .explain(&sql, &args.parameters()?, &metadata)
        .context("Failed to intercept query")?;
    Ok(serde_json::to_value(&interception)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::fixture;
    use serde_json::json;

    #[test]
    fn test_explain_delete() {
        let (_dir, files) = fixture(None);
        let report = explain(&QueryArgs {
            files,
            params: vec!["ssn=\"123\"".to_string()],
            sql: r#"DELETE FROM "user" WHERE "ssn" = :ssn"#.to_string(),
        })
        .unwrap();

        assert_eq!(report["operation"], json!("delete"));
        assert_eq!(report["encrypted_columns"], json!(1));
        assert_eq!(report["plan"]["kind"], json!("delete"));
        let leaf = &report["plan"]["wheres"][0];
        assert_eq!(leaf["table"], json!("user"));
        assert_eq!(leaf["operand"], json!({"type": "parameter", "value": "ssn"}));
        assert_eq!(leaf["reference"], json!({"start": 25, "end": 30}));
    }

    #[test]
    fn test_explain_passthrough() {
        let (_dir, files) = fixture(None);
        let report = explain(&QueryArgs {
            files,
            params: Vec::new(),
            sql: "SELECT 1".to_string(),
        })
        .unwrap();
        assert_eq!(report["plan"], json!({"kind": "passthrough"}));
        assert_eq!(report["rewritten_sql"], json!("SELECT 1"));
    }
}
