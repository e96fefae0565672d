//! SQL query commands.

use super::Context;
use crate::cli::{DefaultQueryArgs, QueryArgs};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::output::{self, OutputFormat};
use serde_json::Value;

/// `dclient query DATABASE SQL`
///
/// # Errors
///
/// Returns an error if resolution fails or the server rejects the query.
pub fn execute(args: &QueryArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.database_client(Some(&args.database), &args.conn)?;
    run_sql(&client, &args.sql, args.output.format())
}

/// `dclient "SQL"` against the default instance and database.
///
/// # Errors
///
/// Returns an error if resolution fails or the server rejects the query.
pub fn execute_default(args: &DefaultQueryArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.database_client(args.conn.database.as_deref(), &args.conn.instance)?;
    run_sql(&client, &args.sql, args.output.format())
}

fn run_sql(client: &ApiClient, sql: &str, format: OutputFormat) -> Result<()> {
    let params = [
        ("sql".to_string(), sql.to_string()),
        ("_shape".to_string(), "objects".to_string()),
    ];
    let data = client.get_json(".json", &params)?;
    let (rows, columns) = rows_and_columns(&data)?;
    print!("{}", output::render(&rows, format, columns.as_deref())?);
    Ok(())
}

/// Pull `rows` and the optional `columns` list out of a Datasette response.
pub(crate) fn rows_and_columns(data: &Value) -> Result<(Vec<Value>, Option<Vec<String>>)> {
    let rows = data
        .get("rows")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| Error::Other("Response did not include any rows".to_string()))?;
    let columns = data.get("columns").and_then(Value::as_array).map(|columns| {
        columns
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    });
    Ok((rows, columns))
}
