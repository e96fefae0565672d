//! Default instance and database commands.

use super::Context;
use crate::cli::DefaultCommands;
use crate::config::{is_url, normalize_url, resolve_instance_key, Config};
use crate::error::{Error, Result};

/// Execute a default subcommand.
///
/// # Errors
///
/// Returns an error if the config cannot be read or written, or the alias
/// or URL is unknown.
pub fn execute(command: &DefaultCommands, ctx: &Context) -> Result<()> {
    let mut config = ctx.location.load_config()?;
    let changed = match command {
        DefaultCommands::Instance {
            alias_or_url,
            clear,
        } => default_instance(&mut config, alias_or_url.as_deref(), *clear)?,
        DefaultCommands::Database {
            alias_or_url,
            db,
            clear,
        } => default_database(&mut config, alias_or_url, db.as_deref(), *clear)?,
    };
    if changed {
        ctx.location.save_config(&config)?;
    }
    Ok(())
}

/// Returns whether `config` was modified.
fn default_instance(config: &mut Config, alias_or_url: Option<&str>, clear: bool) -> Result<bool> {
    if clear {
        config.default_instance = None;
        return Ok(true);
    }
    let Some(alias_or_url) = alias_or_url else {
        match &config.default_instance {
            Some(default) => println!("{default}"),
            None => println!("No default instance set"),
        }
        return Ok(false);
    };

    // A URL without an alias is stored as-is
    let key = match resolve_instance_key(alias_or_url, config) {
        Ok(key) => key,
        Err(_) if is_url(alias_or_url) => normalize_url(alias_or_url).to_string(),
        Err(e) => return Err(e),
    };
    config.default_instance = Some(key);
    Ok(true)
}

fn default_database(
    config: &mut Config,
    alias_or_url: &str,
    db: Option<&str>,
    clear: bool,
) -> Result<bool> {
    let key = resolve_instance_key(alias_or_url, config)?;
    let entry = config
        .instances
        .get_mut(&key)
        .ok_or_else(|| Error::UnknownAlias { name: key.clone() })?;

    if clear {
        entry.default_database = None;
        return Ok(true);
    }
    match db {
        Some(db) => {
            entry.default_database = Some(db.to_string());
            Ok(true)
        }
        None => {
            match entry.default_database.as_deref().filter(|d| !d.is_empty()) {
                Some(db) => println!("{db}"),
                None => println!("No default database set for {key}"),
            }
            Ok(false)
        }
    }
}
