//! `vor rewrite` - print the intercepted query.

use anyhow::{Context, Result};
use vor_intercept::QueryInterceptor;

use super::QueryArgs;

pub fn run(args: &QueryArgs) -> Result<()> {
    println!("{}", rewrite(args)?);
    Ok(())
}

pub fn rewrite(args: &QueryArgs) -> Result<String> {
    let interceptor = QueryInterceptor::new(args.files.load_config()?)?;
    let metadata = args.files.load_metadata()?;
    let sql = args.read_sql()?;
    interceptor
        .intercept(&sql, &args.parameters()?, &metadata)
        .context("Failed to intercept query")
}
