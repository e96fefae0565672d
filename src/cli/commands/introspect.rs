//! Read-only instance introspection: databases, tables, schema, plugins and
//! the current actor.

use super::{print_json, print_json_wide, Context};
use crate::cli::{DatabaseArgs, InstanceArgs, TablesArgs};
use crate::error::Result;
use serde_json::Value;

/// `dclient databases`
///
/// # Errors
///
/// Returns an error if resolution or the request fails.
pub fn execute_databases(conn: &InstanceArgs, json: bool, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.instance_client(conn)?;
    let data = client.get_json("/.json", &[])?;
    let databases = database_list(&data);

    if json {
        return print_json(&Value::Array(databases));
    }
    for database in &databases {
        println!("{}", item_name(database));
    }
    Ok(())
}

/// The instance index is a list, or an object whose `databases` key is a
/// list or a name-keyed object.
pub(crate) fn database_list(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("databases") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(by_name)) => by_name.values().cloned().collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// `name` of an object entry, or the entry itself when it is a string.
pub(crate) fn item_name(item: &Value) -> String {
    match item {
        Value::String(name) => name.clone(),
        Value::Object(map) => match map.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => item.to_string(),
        },
        other => other.to_string(),
    }
}

/// `dclient tables`
///
/// # Errors
///
/// Returns an error if resolution or the request fails.
pub fn execute_tables(args: &TablesArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.database_client(args.conn.database.as_deref(), &args.conn.instance)?;
    let data = client.get_json(".json", &[])?;

    if args.json {
        return print_json(&Value::Array(table_json(&data, args)));
    }
    for line in table_lines(&data, args) {
        println!("{line}");
    }
    Ok(())
}

fn list<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

fn table_json(data: &Value, args: &TablesArgs) -> Vec<Value> {
    let (tables, views) = (list(data, "tables"), list(data, "views"));
    if args.views_only {
        views.to_vec()
    } else if args.views {
        tables.iter().chain(views).cloned().collect()
    } else {
        tables.to_vec()
    }
}

/// `name` or `name\t<count> rows`, hidden tables skipped unless asked for,
/// views appended when requested.
pub(crate) fn table_lines(data: &Value, args: &TablesArgs) -> Vec<String> {
    let mut lines = Vec::new();

    if !args.views_only {
        for table in list(data, "tables") {
            let hidden = table.get("hidden").and_then(Value::as_bool).unwrap_or(false);
            if hidden && !args.hidden {
                continue;
            }
            let name = item_name(table);
            match table.get("count").filter(|c| !c.is_null()) {
                Some(count) => lines.push(format!("{name}\t{count} rows")),
                None => lines.push(name),
            }
        }
    }
    if args.views || args.views_only {
        lines.extend(list(data, "views").iter().map(item_name));
    }
    lines
}

/// `dclient schema [TABLE]`
///
/// # Errors
///
/// Returns an error if resolution or the request fails.
pub fn execute_schema(
    table: Option<&str>,
    conn: &DatabaseArgs,
    json: bool,
    ctx: &Context,
) -> Result<()> {
    let (client, _) = ctx.database_client(conn.database.as_deref(), &conn.instance)?;
    let path = match table {
        Some(table) => format!("/{table}/-/schema.json"),
        None => "/-/schema.json".to_string(),
    };
    let data = client.get_json(&path, &[])?;

    if json {
        return print_json(&data);
    }
    println!(
        "{}",
        data.get("schema").and_then(Value::as_str).unwrap_or_default()
    );
    Ok(())
}

/// `dclient plugins`
///
/// # Errors
///
/// Returns an error if resolution or the request fails.
pub fn execute_plugins(conn: &InstanceArgs, json: bool, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.instance_client(conn)?;
    let data = client.get_json("/-/plugins.json", &[])?;

    if json {
        return print_json(&data);
    }
    for plugin in data.as_array().map_or(&[][..], Vec::as_slice) {
        println!("{}", item_name(plugin));
    }
    Ok(())
}

/// `dclient actor` and `dclient auth status`
///
/// # Errors
///
/// Returns an error if resolution or the request fails.
pub fn execute_actor(conn: &InstanceArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.instance_client(conn)?;
    let data = client.get_json("/-/actor.json", &[])?;
    print_json_wide(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_database_list_shapes() {
        let names = |data: Value| -> Vec<String> { database_list(&data).iter().map(item_name).collect() };

        assert_eq!(names(json!([{"name": "a"}, "b"])), vec!["a", "b"]);
        assert_eq!(
            names(json!({"databases": {"fixtures": {"name": "fixtures"}, "data": {"name": "data"}}})),
            vec!["fixtures", "data"]
        );
        assert_eq!(names(json!({"databases": [{"name": "x"}]})), vec!["x"]);
        assert!(names(json!({"ok": true})).is_empty());
    }

    fn database_json() -> Value {
        json!({
            "tables": [
                {"name": "dogs", "count": 3, "hidden": false},
                {"name": "dogs_fts", "count": 3, "hidden": true},
                {"name": "cats", "count": null}
            ],
            "views": [{"name": "good_dogs"}]
        })
    }

    #[test]
    fn test_table_lines_default() {
        let lines = table_lines(&database_json(), &TablesArgs::default());
        assert_eq!(lines, vec!["dogs\t3 rows", "cats"]);
    }

    #[test]
    fn test_table_lines_hidden_and_views() {
        let args = TablesArgs {
            hidden: true,
            views: true,
            ..TablesArgs::default()
        };
        let lines = table_lines(&database_json(), &args);
        assert_eq!(lines, vec!["dogs\t3 rows", "dogs_fts\t3 rows", "cats", "good_dogs"]);

        let args = TablesArgs {
            views_only: true,
            ..TablesArgs::default()
        };
        assert_eq!(table_lines(&database_json(), &args), vec!["good_dogs"]);
    }

    #[test]
    fn test_table_json_selection() {
        let args = TablesArgs {
            views: true,
            ..TablesArgs::default()
        };
        assert_eq!(table_json(&database_json(), &args).len(), 4);
        assert_eq!(table_json(&database_json(), &TablesArgs::default()).len(), 3);
    }
}
