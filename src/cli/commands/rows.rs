//! Table browsing command.

use super::query::rows_and_columns;
use super::Context;
use crate::cli::RowsArgs;
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::output;
use serde_json::Value;
use tracing::debug;

/// `dclient rows [DATABASE] TABLE`
///
/// # Errors
///
/// Returns an error if resolution fails or any page request fails.
pub fn execute(args: &RowsArgs, ctx: &Context) -> Result<()> {
    let (database, table) = split_target(&args.target)?;
    let (client, _) = ctx.database_client(database, &args.conn)?;
    let params = query_params(args);

    let (rows, columns) = fetch_rows(&client, table, &params, args.all, args.limit)?;
    print!(
        "{}",
        output::render(&rows, args.output.format(), columns.as_deref())?
    );
    Ok(())
}

/// `[TABLE]` or `[DATABASE, TABLE]`.
fn split_target(target: &[String]) -> Result<(Option<&str>, &str)> {
    match target {
        [table] => Ok((None, table.as_str())),
        [database, table] => Ok((Some(database.as_str()), table.as_str())),
        _ => Err(Error::InvalidArgument(
            "Expected [DATABASE] TABLE".to_string(),
        )),
    }
}

/// Translate the browse flags into Datasette table query parameters.
pub(crate) fn query_params(args: &RowsArgs) -> Vec<(String, String)> {
    let mut params = vec![("_shape".to_string(), "objects".to_string())];

    for filter in args.filters.chunks_exact(3) {
        let (column, op, value) = (&filter[0], &filter[1], &filter[2]);
        let op = if op == "eq" { "exact" } else { op.as_str() };
        params.push((format!("{column}__{op}"), value.clone()));
    }

    let repeated = [
        ("_where", &args.where_clauses),
        ("_col", &args.col),
        ("_nocol", &args.nocol),
        ("_facet", &args.facet),
    ];
    for (key, values) in repeated {
        params.extend(values.iter().map(|v| (key.to_string(), v.clone())));
    }

    let single = [
        ("_search", args.search.clone()),
        ("_sort", args.sort.clone()),
        ("_sort_desc", args.sort_desc.clone()),
        ("_size", args.size.map(|s| s.to_string())),
    ];
    for (key, value) in single {
        if let Some(value) = value {
            params.push((key.to_string(), value));
        }
    }

    params
}

/// Fetch the first page, then follow `next_url` while `all` is set and the
/// limit has not been reached.
fn fetch_rows(
    client: &ApiClient,
    table: &str,
    params: &[(String, String)],
    all: bool,
    limit: Option<usize>,
) -> Result<(Vec<Value>, Option<Vec<String>>)> {
    let mut page = client.get_json(&format!("/{table}.json"), params)?;
    let (mut rows, columns) = rows_and_columns(&page)?;

    while all && limit.is_none_or(|limit| rows.len() < limit) {
        let Some(next_url) = page.get("next_url").and_then(Value::as_str).map(str::to_string)
        else {
            break;
        };
        debug!(%next_url, fetched = rows.len(), "Following pagination");
        page = client.get_url(&next_url)?;
        rows.extend(rows_and_columns(&page)?.0);
    }

    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok((rows, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::TestServer;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
        params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn test_filters_map_to_column_ops() {
        let args = RowsArgs {
            filters: strings(&["name", "eq", "Cleo", "age", "gte", "3", "name", "custom_op", "x"]),
            ..RowsArgs::default()
        };
        let params = query_params(&args);
        assert_eq!(param(&params, "_shape"), vec!["objects"]);
        assert_eq!(param(&params, "name__exact"), vec!["Cleo"]);
        assert_eq!(param(&params, "age__gte"), vec!["3"]);
        assert_eq!(param(&params, "name__custom_op"), vec!["x"]);
    }

    #[test]
    fn test_other_params() {
        let args = RowsArgs {
            where_clauses: strings(&["age > 3"]),
            search: Some("dog".to_string()),
            sort: Some("age".to_string()),
            sort_desc: Some("name".to_string()),
            col: strings(&["name", "age"]),
            nocol: strings(&["id"]),
            facet: strings(&["owner"]),
            size: Some(10),
            ..RowsArgs::default()
        };
        let params = query_params(&args);
        assert_eq!(param(&params, "_where"), vec!["age > 3"]);
        assert_eq!(param(&params, "_search"), vec!["dog"]);
        assert_eq!(param(&params, "_sort"), vec!["age"]);
        assert_eq!(param(&params, "_sort_desc"), vec!["name"]);
        assert_eq!(param(&params, "_col"), vec!["name", "age"]);
        assert_eq!(param(&params, "_nocol"), vec!["id"]);
        assert_eq!(param(&params, "_facet"), vec!["owner"]);
        assert_eq!(param(&params, "_size"), vec!["10"]);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target(&strings(&["dogs"])).unwrap(), (None, "dogs"));
        assert_eq!(
            split_target(&strings(&["fixtures", "dogs"])).unwrap(),
            (Some("fixtures"), "dogs")
        );
        assert!(split_target(&[]).is_err());
    }

    fn paginated_server() -> TestServer {
        let server = TestServer::start();
        let next_url = format!("{}/fixtures/dogs.json?_next=2&_shape=objects", server.uri());
        server.mount(
            Mock::given(method("GET"))
                .and(path("/fixtures/dogs.json"))
                .and(query_param("_next", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "ok": true,
                    "rows": [{"id": 3}, {"id": 4}],
                    "columns": ["id"],
                    "next_url": null
                }))),
        );
        server.mount(
            Mock::given(method("GET"))
                .and(path("/fixtures/dogs.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "ok": true,
                    "rows": [{"id": 1}, {"id": 2}],
                    "columns": ["id"],
                    "next_url": next_url
                }))),
        );
        server
    }

    fn ids(rows: &[Value]) -> Vec<i64> {
        rows.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_all_follows_next_url() {
        let server = paginated_server();
        let client = ApiClient::new(&format!("{}/fixtures", server.uri()), None).unwrap();

        let (rows, columns) = fetch_rows(&client, "dogs", &[], true, None).unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3, 4]);
        assert_eq!(columns, Some(vec!["id".to_string()]));
        assert_eq!(server.received().len(), 2);
    }

    #[test]
    fn test_all_stops_at_limit() {
        let server = paginated_server();
        let client = ApiClient::new(&format!("{}/fixtures", server.uri()), None).unwrap();

        let (rows, _) = fetch_rows(&client, "dogs", &[], true, Some(3)).unwrap();
        assert_eq!(ids(&rows), vec![1, 2, 3]);

        let (rows, _) = fetch_rows(&client, "dogs", &[], true, Some(2)).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
    }

    #[test]
    fn test_without_all_only_first_page() {
        let server = paginated_server();
        let client = ApiClient::new(&format!("{}/fixtures", server.uri()), None).unwrap();

        let (rows, _) = fetch_rows(&client, "dogs", &[], false, None).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);

        let (rows, _) = fetch_rows(&client, "dogs", &[], false, Some(1)).unwrap();
        assert_eq!(ids(&rows), vec![1]);
    }
}
