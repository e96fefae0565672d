//! Instance alias commands and the `instances` listing.

use super::Context;
use crate::cli::AliasCommands;
use crate::config::{Config, InstanceEntry};
use crate::error::{Error, Result};
use colored::Colorize;
use tracing::info;

/// Execute an alias subcommand.
///
/// # Errors
///
/// Returns an error if the config cannot be read or written, or the alias
/// to remove does not exist.
pub fn execute(command: &AliasCommands, ctx: &Context) -> Result<()> {
    match command {
        AliasCommands::List { json } => execute_instances(*json, ctx),
        AliasCommands::Add { name, url } => add(name, url, ctx),
        AliasCommands::Remove { name } => remove(name, ctx),
    }
}

/// `dclient instances` (also `dclient alias list`)
///
/// # Errors
///
/// Returns an error if the config cannot be read.
pub fn execute_instances(json: bool, ctx: &Context) -> Result<()> {
    let config = ctx.location.load_config()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    for line in instance_lines(&config) {
        println!("{line}");
    }
    Ok(())
}

/// One line per alias, the default marked with `*`.
pub(crate) fn instance_lines(config: &Config) -> Vec<String> {
    config
        .instances
        .iter()
        .map(|(name, entry)| {
            let is_default = config.default_instance.as_deref() == Some(name.as_str());
            let marker = if is_default { "* " } else { "  " };
            let database = entry
                .default_database
                .as_deref()
                .filter(|db| !db.is_empty())
                .map(|db| format!(" (db: {db})"))
                .unwrap_or_default();
            let name = if is_default {
                name.bold().to_string()
            } else {
                name.clone()
            };
            format!("{marker}{name} = {}{database}", entry.url)
        })
        .collect()
}

fn add(name: &str, url: &str, ctx: &Context) -> Result<()> {
    let mut config = ctx.location.load_config()?;
    config
        .instances
        .insert(name.to_string(), InstanceEntry::new(url));
    ctx.location.save_config(&config)?;
    info!(alias = name, url, "Added alias");
    Ok(())
}

fn remove(name: &str, ctx: &Context) -> Result<()> {
    let mut config = ctx.location.load_config()?;
    if !config.remove_alias(name) {
        return Err(Error::Other("No such alias".to_string()));
    }
    ctx.location.save_config(&config)?;
    info!(alias = name, "Removed alias");
    Ok(())
}
