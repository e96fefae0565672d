//! Single-row writes and table management.

use super::{confirm, print_json, Context};
use crate::cli::{CreateTableArgs, InstanceArgs, UpdateArgs};
use crate::error::{Error, Result};
use serde_json::{json, Map, Value};

/// `dclient update DATABASE TABLE PK COL=VALUE...`
///
/// # Errors
///
/// Returns an error for a malformed `COL=VALUE` or a rejected request.
pub fn execute_update(args: &UpdateArgs, ctx: &Context) -> Result<()> {
    let body = update_body(&args.values, args.alter)?;
    let (client, _) = ctx.database_client(Some(&args.database), &args.conn)?;
    let response = client.post_json(&format!("/{}/{}/-/update", args.table, args.pk), &body)?;
    print_json(&response)
}

/// `{"update": {...}}`, values parsed as JSON where they parse, else text.
pub(crate) fn update_body(values: &[String], alter: bool) -> Result<Value> {
    let mut update = Map::new();
    for pair in values {
        let (column, raw) = pair.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("Expected COLUMN=VALUE, got {pair:?}"))
        })?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        update.insert(column.to_string(), value);
    }

    let mut body = json!({ "update": update });
    if alter {
        body["alter"] = Value::Bool(true);
    }
    Ok(body)
}

/// `dclient delete DATABASE TABLE PK`
///
/// # Errors
///
/// Returns an error if the user declines or the request is rejected.
pub fn execute_delete(
    database: &str,
    table: &str,
    pk: &str,
    yes: bool,
    conn: &InstanceArgs,
    ctx: &Context,
) -> Result<()> {
    let (client, target) = ctx.database_client(Some(database), conn)?;
    if !yes && !confirm(&format!("Delete row {pk} from {}/{table}?", target.database))? {
        return Err(Error::Other("Aborted".to_string()));
    }
    let response = client.post_json(&format!("/{table}/{pk}/-/delete"), &json!({}))?;
    print_json(&response)
}

/// `dclient drop DATABASE TABLE`
///
/// # Errors
///
/// Returns an error if the user declines or the request is rejected.
pub fn execute_drop(
    database: &str,
    table: &str,
    yes: bool,
    conn: &InstanceArgs,
    ctx: &Context,
) -> Result<()> {
    let (client, target) = ctx.database_client(Some(database), conn)?;
    if !yes && !confirm(&format!("Drop table {}/{table}?", target.database))? {
        return Err(Error::Other("Aborted".to_string()));
    }
    let response = client.post_json(&format!("/{table}/-/drop"), &json!({"confirm": true}))?;
    print_json(&response)
}

/// `dclient create-table DATABASE TABLE -c NAME TYPE...`
///
/// # Errors
///
/// Returns an error if no columns are given or the request is rejected.
pub fn execute_create_table(args: &CreateTableArgs, ctx: &Context) -> Result<()> {
    let body = create_table_body(&args.table, &args.columns, &args.pks)?;
    let (client, _) = ctx.database_client(Some(&args.database), &args.conn)?;
    let response = client.post_json("/-/create", &body)?;
    print_json(&response)
}

/// `columns` is a flat list of name/type pairs.
pub(crate) fn create_table_body(table: &str, columns: &[String], pks: &[String]) -> Result<Value> {
    if columns.is_empty() {
        return Err(Error::InvalidArgument(
            "Provide at least one --column definition".to_string(),
        ));
    }
    let columns: Vec<Value> = columns
        .chunks_exact(2)
        .map(|pair| json!({"name": pair[0], "type": pair[1]}))
        .collect();

    let mut body = json!({"table": table, "columns": columns});
    match pks {
        [] => {}
        [pk] => body["pk"] = json!(pk),
        _ => body["pks"] = json!(pks),
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::TestServer;
    use crate::config::{ConfigLocation, Environment};
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_update_body_parses_json_values() {
        let body = update_body(&strings(&["name=Rex", "age=10", "tags=[\"a\"]", "note="]), false)
            .unwrap();
        assert_eq!(
            body,
            json!({"update": {"name": "Rex", "age": 10, "tags": ["a"], "note": ""}})
        );

        let body = update_body(&strings(&["flag=true"]), true).unwrap();
        assert_eq!(body, json!({"update": {"flag": true}, "alter": true}));

        assert!(update_body(&strings(&["oops"]), false).is_err());
    }

    #[test]
    fn test_create_table_body() {
        let body = create_table_body("cats", &strings(&["id", "integer", "name", "text"]), &strings(&["id"]))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "table": "cats",
                "columns": [{"name": "id", "type": "integer"}, {"name": "name", "type": "text"}],
                "pk": "id"
            })
        );

        let body = create_table_body("t", &strings(&["a", "text", "b", "text"]), &strings(&["a", "b"]))
            .unwrap();
        assert_eq!(body["pks"], json!(["a", "b"]));

        let err = create_table_body("t", &[], &[]).unwrap_err();
        assert!(err.to_string().contains("Provide at least one --column definition"));
    }

    #[test]
    fn test_update_posts_to_row_endpoint() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("POST"))
                .and(path("/data/dogs/1/-/update"))
                .and(header("authorization", "Bearer t0k"))
                .and(body_json(json!({"update": {"name": "Rex"}})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true}))),
        );

        let temp = TempDir::new().unwrap();
        let ctx = Context::new(ConfigLocation::new(temp.path()), Environment::default());
        let args = UpdateArgs {
            database: format!("{}/data", server.uri()),
            table: "dogs".to_string(),
            pk: "1".to_string(),
            values: strings(&["name=Rex"]),
            alter: false,
            conn: InstanceArgs {
                instance: None,
                token: Some("t0k".to_string()),
            },
        };
        execute_update(&args, &ctx).unwrap();
        assert_eq!(server.received().len(), 1);
    }

    #[test]
    fn test_drop_with_yes_sends_confirm() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("POST"))
                .and(path("/data/dogs/-/drop"))
                .and(body_json(json!({"confirm": true})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true}))),
        );

        let temp = TempDir::new().unwrap();
        let ctx = Context::new(ConfigLocation::new(temp.path()), Environment::default());
        execute_drop(
            &format!("{}/data", server.uri()),
            "dogs",
            true,
            &InstanceArgs::default(),
            &ctx,
        )
        .unwrap();
        assert_eq!(server.received().len(), 1);
    }

    #[test]
    fn test_delete_with_yes() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("POST"))
                .and(path("/data/dogs/3/-/delete"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true}))),
        );

        let temp = TempDir::new().unwrap();
        let ctx = Context::new(ConfigLocation::new(temp.path()), Environment::default());
        execute_delete(
            &format!("{}/data", server.uri()),
            "dogs",
            "3",
            true,
            &InstanceArgs::default(),
            &ctx,
        )
        .unwrap();
        assert_eq!(server.received().len(), 1);
    }
}
