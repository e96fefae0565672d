//! One-time migration from the v1 layout.
//!
//! v1 kept a flat `aliases.json` (`name → database URL`) and an `auth.json`
//! keyed by those URLs. v2 splits each alias into an instance URL plus a
//! default database and keys tokens by alias name.

use super::store::{save_config, save_tokens};
use super::{load_tokens, Config, ConfigLocation, InstanceEntry, Tokens};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use tracing::{debug, info};
use url::{Position, Url};

/// What a migration run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Aliases converted into instance entries.
    pub aliases: usize,
    /// Tokens re-keyed from a URL to an alias name.
    pub tokens_rekeyed: usize,
    /// Tokens kept under their original URL key.
    pub tokens_kept: usize,
}

/// Migrate a v1 configuration directory in place.
///
/// Returns `Ok(None)` when there is nothing to do: `config.json` already
/// exists or there is no `aliases.json`. Running it again after a successful
/// migration is therefore a no-op.
///
/// # Errors
///
/// Returns an error if the v1 files cannot be parsed or the v2 files cannot
/// be written.
pub fn migrate_v1_to_v2(location: &ConfigLocation) -> Result<Option<MigrationReport>> {
    let config_file = location.config_file();
    let aliases_file = location.aliases_file();
    let auth_file = location.auth_file();

    if config_file.exists() || !aliases_file.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&aliases_file)?;
    let aliases: IndexMap<String, String> =
        serde_json::from_str(&content).map_err(|e| Error::ConfigCorrupt {
            path: aliases_file.clone(),
            message: e.to_string(),
        })?;
    let old_tokens = load_tokens(&auth_file)?;

    let mut report = MigrationReport::default();
    let mut config = Config::default();
    let mut url_to_alias: HashMap<&str, &str> = HashMap::new();

    for (name, url) in &aliases {
        let entry = split_database_url(url);
        debug!(alias = %name, url = %entry.url, database = ?entry.default_database, "Migrating alias");
        config.instances.insert(name.clone(), entry);
        url_to_alias.insert(url.as_str(), name.as_str());
        report.aliases += 1;
    }

    let mut new_tokens = Tokens::new();
    for (key, token) in &old_tokens {
        if let Some(alias) = url_to_alias.get(key.as_str()) {
            new_tokens.insert((*alias).to_string(), token.clone());
            report.tokens_rekeyed += 1;
        } else {
            new_tokens.insert(key.clone(), token.clone());
            report.tokens_kept += 1;
        }
    }

    save_config(&config_file, &config)?;

    if auth_file.exists() {
        fs::rename(&auth_file, location.dir().join("auth.json.bak"))?;
        save_tokens(&auth_file, &new_tokens)?;
    }

    fs::rename(&aliases_file, location.dir().join("aliases.json.bak"))?;

    info!(
        aliases = report.aliases,
        tokens_rekeyed = report.tokens_rekeyed,
        tokens_kept = report.tokens_kept,
        "Migrated v1 configuration"
    );

    Ok(Some(report))
}

/// `https://host/db` → instance `https://host` with default database `db`.
///
/// Any other shape (no path, several segments, unparseable) is kept verbatim.
fn split_database_url(url: &str) -> InstanceEntry {
    let Ok(parsed) = Url::parse(url) else {
        return InstanceEntry::new(url);
    };

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        [database] => InstanceEntry {
            url: parsed[..Position::BeforePath].to_string(),
            default_database: Some((*database).to_string()),
        },
        _ => InstanceEntry::new(url),
    }
}
