//! Command implementations.
//!
//! Every handler receives a [`Context`] carrying the configuration location
//! and an environment snapshot, so nothing below reads process-wide state.

pub mod alias;
pub mod auth;
pub mod completions;
pub mod default;
pub mod get;
pub mod insert;
pub mod introspect;
pub mod login;
pub mod query;
pub mod rows;
pub mod version;
pub mod write;

use crate::cli::InstanceArgs;
use crate::client::ApiClient;
use crate::config::{
    resolve_database_target, resolve_instance, resolve_token, ConfigLocation, DatabaseTarget,
    Environment, ResolvedInstance,
};
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::debug;

/// Shared state for command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    pub location: ConfigLocation,
    pub env: Environment,
}

impl Context {
    #[must_use]
    pub const fn new(location: ConfigLocation, env: Environment) -> Self {
        Self { location, env }
    }

    /// Client rooted at the resolved instance URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read or no instance resolves.
    pub fn instance_client(&self, conn: &InstanceArgs) -> Result<(ApiClient, ResolvedInstance)> {
        let config = self.location.load_config()?;
        let instance = resolve_instance(conn.instance.as_deref(), &config, &self.env)?;
        let tokens = self.location.load_tokens()?;
        let token = resolve_token(conn.token.as_deref(), &instance.url, &tokens, &config, &self.env);
        debug!(url = %instance.url, alias = ?instance.alias, authenticated = token.is_some(), "Resolved instance");

        Ok((ApiClient::new(&instance.url, token)?, instance))
    }

    /// Client rooted at the resolved database URL.
    ///
    /// `database` may be a name, a full database URL, or `None` to use the
    /// configured default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read or the instance or
    /// database does not resolve.
    pub fn database_client(
        &self,
        database: Option<&str>,
        conn: &InstanceArgs,
    ) -> Result<(ApiClient, DatabaseTarget)> {
        let config = self.location.load_config()?;
        let target =
            resolve_database_target(database, conn.instance.as_deref(), &config, &self.env)?;
        let tokens = self.location.load_tokens()?;
        let token = resolve_token(conn.token.as_deref(), &target.url, &tokens, &config, &self.env);
        debug!(url = %target.url, authenticated = token.is_some(), "Resolved database");

        Ok((ApiClient::new(&target.url, token)?, target))
    }
}

/// Ask for one line on stderr and read the answer from stdin.
pub(crate) fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Like [`prompt`], but the answer is not echoed when stdin is a terminal.
pub(crate) fn prompt_secret(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }
    let secret = rpassword::prompt_password(format!("{label}: "))?;
    Ok(secret.trim().to_string())
}

/// Yes/no question defaulting to no.
pub(crate) fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print a JSON value with two-space indentation.
pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a JSON value with four-space indentation.
pub(crate) fn print_json_wide(value: &Value) -> Result<()> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    println!("{}", String::from_utf8_lossy(&out));
    Ok(())
}
