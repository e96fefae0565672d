//! Configuration management.
//!
//! This module owns everything dclient keeps on disk and everything it
//! derives from it:
//!
//! - [`ConfigLocation`] - the configuration directory, passed explicitly
//! - [`Config`] / [`InstanceEntry`] - `config.json` (aliases and defaults)
//! - [`Tokens`] - `auth.json` (bearer tokens keyed by alias or URL)
//! - [`matcher`] - longest-prefix token lookup by URL
//! - [`migrate`] - one-time v1 `aliases.json` → v2 `config.json` migration
//! - [`resolve`] - instance / database / token resolution chains
//!
//! # Layout
//!
//! ```text
//! <config dir>/
//!   config.json      {"default_instance": ..., "instances": {...}}
//!   auth.json        {"<alias-or-url>": "<token>"}
//!   aliases.json.bak left behind by the v1 migration
//! ```
//!
//! Files are read-then-written without locking, so two invocations racing on
//! the same directory end with the last writer's content.

mod file;
pub mod matcher;
pub mod migrate;
pub mod resolve;
mod store;

pub use file::atomic_write;
pub use matcher::{longest_prefix_match, url_matches_prefix};
pub use migrate::{migrate_v1_to_v2, MigrationReport};
pub use resolve::{
    first_resolved, instance_alias_for_url, resolve_database, resolve_database_target,
    resolve_instance, resolve_instance_key, resolve_token, DatabaseTarget, Environment,
    ResolvedInstance,
};
pub use store::{load_config, load_tokens, save_config, save_tokens};

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DCLIENT_CONFIG_DIR";

/// Directory name used under the platform configuration directory.
const APP_DIR_NAME: &str = "io.datasette.dclient";

/// Stored tokens: alias name or instance URL → bearer token.
pub type Tokens = IndexMap<String, String>;

/// The `config.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Alias (or raw URL) used when no `-i` flag is given.
    #[serde(default)]
    pub default_instance: Option<String>,

    /// Alias name → instance.
    #[serde(default)]
    pub instances: IndexMap<String, InstanceEntry>,
}

/// A configured instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceEntry {
    /// Base URL of the instance, stored as given.
    pub url: String,

    /// Database used when no `-d` flag is given.
    #[serde(default)]
    pub default_database: Option<String>,
}

impl InstanceEntry {
    /// Create an entry with no default database.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_database: None,
        }
    }
}

impl Config {
    /// Find the alias whose instance URL equals `url` (ignoring trailing slashes).
    #[must_use]
    pub fn alias_for_url(&self, url: &str) -> Option<&str> {
        let wanted = normalize_url(url);
        self.instances
            .iter()
            .find(|(_, entry)| normalize_url(&entry.url) == wanted)
            .map(|(name, _)| name.as_str())
    }

    /// Remove an alias, clearing the default instance if it pointed there.
    ///
    /// Returns `false` if the alias did not exist.
    pub fn remove_alias(&mut self, name: &str) -> bool {
        if self.instances.shift_remove(name).is_none() {
            return false;
        }
        if self.default_instance.as_deref() == Some(name) {
            self.default_instance = None;
        }
        true
    }
}

/// Whether a string should be treated as a URL rather than an alias.
#[must_use]
pub fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Strip trailing slashes so equal instances compare equal.
#[must_use]
pub fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Where dclient keeps its configuration.
///
/// Every command receives one of these explicitly; nothing reads the
/// directory from process-wide state after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    dir: PathBuf,
}

impl ConfigLocation {
    /// Use an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve the configuration directory.
    ///
    /// Priority:
    /// 1. `explicit` (the `--config-dir` flag, which clap also fills from
    ///    `DCLIENT_CONFIG_DIR`)
    /// 2. `<platform config dir>/io.datasette.dclient`
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }

        directories::BaseDirs::new()
            .map(|b| Self::new(b.config_dir().join(APP_DIR_NAME)))
            .ok_or_else(|| Error::Other("Could not determine home directory".to_string()))
    }

    /// The configuration directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to `config.json`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    /// Path to `auth.json`.
    #[must_use]
    pub fn auth_file(&self) -> PathBuf {
        self.dir.join("auth.json")
    }

    /// Path to the v1 `aliases.json`.
    #[must_use]
    pub fn aliases_file(&self) -> PathBuf {
        self.dir.join("aliases.json")
    }

    /// Load `config.json`, or an empty config if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if the file is not a valid config.
    pub fn load_config(&self) -> Result<Config> {
        load_config(&self.config_file())
    }

    /// Write `config.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_config(&self, config: &Config) -> Result<()> {
        save_config(&self.config_file(), config)
    }

    /// Load `auth.json`, or an empty token store if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigCorrupt`] if the file is not a JSON object of strings.
    pub fn load_tokens(&self) -> Result<Tokens> {
        load_tokens(&self.auth_file())
    }

    /// Write `auth.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_tokens(&self, tokens: &Tokens) -> Result<()> {
        save_tokens(&self.auth_file(), tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> Config {
        let mut config = Config::default();
        config.instances.insert(
            "prod".to_string(),
            InstanceEntry {
                url: "https://myapp.datasette.cloud/".to_string(),
                default_database: Some("main".to_string()),
            },
        );
        config
            .instances
            .insert("local".to_string(), InstanceEntry::new("http://localhost:8001"));
        config.default_instance = Some("prod".to_string());
        config
    }

    #[test]
    fn test_discover_prefers_explicit() {
        let location = ConfigLocation::discover(Some(Path::new("/tmp/dclient-test"))).unwrap();
        assert_eq!(location.dir(), Path::new("/tmp/dclient-test"));
        assert!(location.config_file().ends_with("config.json"));
        assert!(location.auth_file().ends_with("auth.json"));
    }

    #[test]
    fn test_alias_for_url_ignores_trailing_slash() {
        let config = sample_config();
        assert_eq!(config.alias_for_url("https://myapp.datasette.cloud"), Some("prod"));
        assert_eq!(config.alias_for_url("http://localhost:8001/"), Some("local"));
        assert_eq!(config.alias_for_url("https://other.example.com"), None);
    }

    #[test]
    fn test_remove_alias_clears_default() {
        let mut config = sample_config();
        assert!(config.remove_alias("prod"));
        assert_eq!(config.default_instance, None);
        assert!(!config.remove_alias("prod"));

        assert!(config.remove_alias("local"));
        assert!(config.instances.is_empty());
    }

    #[test]
    fn test_round_trip_through_location() {
        let temp_dir = TempDir::new().unwrap();
        let location = ConfigLocation::new(temp_dir.path().join("nested"));

        let config = sample_config();
        location.save_config(&config).unwrap();
        assert_eq!(location.load_config().unwrap(), config);

        // Alias order survives the round trip
        let names: Vec<_> = location.load_config().unwrap().instances.into_keys().collect();
        assert_eq!(names, vec!["prod", "local"]);
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com"));
        assert!(is_url("http://localhost:8001"));
        assert!(!is_url("prod"));
        assert!(!is_url("ftp://example.com"));
    }
}
