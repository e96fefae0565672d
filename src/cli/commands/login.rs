//! `dclient login`: OAuth device flow, then first-run defaults.

use super::introspect::{database_list, item_name};
use super::{prompt, Context};
use crate::client::{oauth, ApiClient};
use crate::config::{is_url, normalize_url, resolve_instance, Config, Environment, InstanceEntry};
use crate::error::Result;
use colored::Colorize;
use std::io::{self, Write};
use tracing::debug;

/// Run the device flow and store the resulting token.
///
/// # Errors
///
/// Returns an error if the instance cannot be resolved, the flow fails, or
/// the token or config cannot be written. Failing to list databases for the
/// default database is not an error.
pub fn execute(alias_or_url: Option<&str>, scope: Option<&str>, ctx: &Context) -> Result<()> {
    let auth_key = match alias_or_url {
        Some(value) => value.to_string(),
        None => {
            println!("Enter the URL of your Datasette instance, or an alias you have");
            println!("already configured with 'dclient alias add'.\n");
            prompt("Instance URL or alias")?
        }
    };

    let url = if is_url(&auth_key) {
        normalize_url(&auth_key).to_string()
    } else {
        let config = ctx.location.load_config()?;
        resolve_instance(Some(&auth_key), &config, &Environment::default())?.url
    };

    let client = ApiClient::new(&url, None)?;
    let device = oauth::request_device_code(&client, scope)?;

    println!("\nOpen this URL in your browser:\n");
    println!("    {}\n", device.verification_uri.underline());
    println!("Enter this code: {}\n", device.user_code.bold());
    print!("Waiting for authorization...");
    io::stdout().flush()?;

    let polled = oauth::poll_for_token(&client, &device, std::thread::sleep, || {
        print!(".");
        io::stdout().flush().ok();
    });
    println!();
    let token = polled?;

    let mut tokens = ctx.location.load_tokens()?;
    tokens.insert(auth_key.clone(), token.clone());
    ctx.location.save_tokens(&tokens)?;
    println!("Login successful. Token saved for {}", auth_key.green());

    let mut config = ctx.location.load_config()?;
    let authed = ApiClient::new(&url, Some(token))?;
    let messages = apply_defaults(&mut config, &url, &auth_key, || {
        let data = authed.get_json("/.json", &[])?;
        Ok(database_list(&data).iter().map(item_name).collect())
    });
    if let Some(messages) = messages {
        for message in messages {
            println!("{message}");
        }
        ctx.location.save_config(&config)?;
    }
    Ok(())
}

/// Fill in a default instance and database when either is missing.
///
/// Returns `None` when both were already configured, otherwise the lines to
/// report. The config must then be saved.
pub(crate) fn apply_defaults(
    config: &mut Config,
    url: &str,
    auth_key: &str,
    list_databases: impl FnOnce() -> Result<Vec<String>>,
) -> Option<Vec<String>> {
    let has_default_instance = config.default_instance.is_some();
    let has_default_database = config
        .default_instance
        .as_ref()
        .and_then(|name| config.instances.get(name))
        .and_then(|entry| entry.default_database.as_deref())
        .is_some_and(|db| !db.is_empty());
    if has_default_instance && has_default_database {
        return None;
    }

    let mut messages = Vec::new();
    let key = config
        .alias_for_url(url)
        .map_or_else(|| auth_key.to_string(), str::to_string);
    config
        .instances
        .entry(key.clone())
        .or_insert_with(|| InstanceEntry::new(normalize_url(url)));

    if !has_default_instance {
        config.default_instance = Some(key.clone());
        messages.push(format!("Set default instance to {key}"));
    }

    if !has_default_database {
        match list_databases() {
            Ok(names) => {
                if let Some(database) = pick_default_database(&names) {
                    if let Some(entry) = config.instances.get_mut(&key) {
                        entry.default_database = Some(database.to_string());
                    }
                    messages.push(format!("Set default database to {database}"));
                }
            }
            Err(e) => debug!(error = %e, "Could not list databases after login"),
        }
    }
    Some(messages)
}

/// The only database, else `data` if present, else the first.
fn pick_default_database(names: &[String]) -> Option<&str> {
    match names {
        [] => None,
        [only] => Some(only.as_str()),
        _ if names.iter().any(|n| n == "data") => Some("data"),
        [first, ..] => Some(first.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::TestServer;
    use crate::config::ConfigLocation;
    use crate::error::Error;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_pick_default_database() {
        assert_eq!(pick_default_database(&[]), None);
        assert_eq!(pick_default_database(&names(&["fixtures"])), Some("fixtures"));
        assert_eq!(pick_default_database(&names(&["a", "data", "b"])), Some("data"));
        assert_eq!(pick_default_database(&names(&["a", "b"])), Some("a"));
    }

    #[test]
    fn test_apply_defaults_fresh_config() {
        let mut config = Config::default();
        let messages = apply_defaults(&mut config, "https://x.example.com", "https://x.example.com", || {
            Ok(names(&["_internal", "data"]))
        })
        .unwrap();

        assert_eq!(
            messages,
            vec![
                "Set default instance to https://x.example.com",
                "Set default database to data"
            ]
        );
        let entry = &config.instances["https://x.example.com"];
        assert_eq!(entry.url, "https://x.example.com");
        assert_eq!(entry.default_database.as_deref(), Some("data"));
    }

    #[test]
    fn test_apply_defaults_uses_existing_alias() {
        let mut config = Config::default();
        config.instances.insert(
            "prod".to_string(),
            InstanceEntry::new("https://prod.example.com"),
        );
        let messages = apply_defaults(&mut config, "https://prod.example.com", "https://prod.example.com", || {
            Err(Error::Other("offline".to_string()))
        })
        .unwrap();

        assert_eq!(messages, vec!["Set default instance to prod"]);
        assert_eq!(config.default_instance.as_deref(), Some("prod"));
        assert_eq!(config.instances.len(), 1);
    }

    #[test]
    fn test_apply_defaults_noop_when_configured() {
        let mut config = Config::default();
        let mut entry = InstanceEntry::new("https://prod.example.com");
        entry.default_database = Some("main".to_string());
        config.instances.insert("prod".to_string(), entry);
        config.default_instance = Some("prod".to_string());
        let before = config.clone();

        let result = apply_defaults(&mut config, "https://other.example.com", "other", || {
            panic!("should not list databases")
        });
        assert!(result.is_none());
        assert_eq!(config, before);
    }

    #[test]
    fn test_login_stores_token_and_defaults() {
        let server = TestServer::start();
        server.mount(
            Mock::given(method("POST"))
                .and(path("/-/oauth/device"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "device_code": "dev",
                    "user_code": "CODE",
                    "verification_uri": "https://example.com/verify",
                    "interval": 0
                }))),
        );
        server.mount(
            Mock::given(method("POST"))
                .and(path("/-/oauth/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "dstok_new"}))),
        );
        server.mount(
            Mock::given(method("GET"))
                .and(path("/.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "databases": {"fixtures": {"name": "fixtures"}}
                }))),
        );

        let temp = TempDir::new().unwrap();
        let ctx = Context::new(ConfigLocation::new(temp.path()), Environment::default());
        let url = server.uri();
        execute(Some(&url), None, &ctx).unwrap();

        let tokens = ctx.location.load_tokens().unwrap();
        assert_eq!(tokens.get(&url).map(String::as_str), Some("dstok_new"));
        let config = ctx.location.load_config().unwrap();
        assert_eq!(config.default_instance.as_deref(), Some(url.as_str()));
        assert_eq!(
            config.instances[&url].default_database.as_deref(),
            Some("fixtures")
        );
    }
}
