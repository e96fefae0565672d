//! Resolution chains for instance, database and token.
//!
//! Every resolver is a pure function of its explicit arguments, the loaded
//! [`Config`], the [`Tokens`] store and an [`Environment`] snapshot. Nothing
//! here touches the filesystem or reads process environment variables
//! directly, which keeps the precedence rules unit-testable.

use super::{is_url, longest_prefix_match, normalize_url, url_matches_prefix, Config, Tokens};
use crate::error::{Error, Result};
use std::convert::Infallible;

/// Environment variables consulted at the end of each chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `DATASETTE_URL`
    pub url: Option<String>,
    /// `DATASETTE_DATABASE`
    pub database: Option<String>,
    /// `DATASETTE_TOKEN`
    pub token: Option<String>,
}

impl Environment {
    /// Snapshot the process environment. Empty values count as unset.
    #[must_use]
    pub fn from_process() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            url: read("DATASETTE_URL"),
            database: read("DATASETTE_DATABASE"),
            token: read("DATASETTE_TOKEN"),
        }
    }
}

/// A resolved instance base URL, with the alias it came from if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstance {
    /// Base URL without trailing slashes.
    pub url: String,
    /// Alias owning this URL.
    pub alias: Option<String>,
}

/// Where database-scoped requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    /// Instance the database lives on.
    pub instance: ResolvedInstance,
    /// Database name.
    pub database: String,
    /// `<instance>/<database>`, or the full database URL when one was given.
    pub url: String,
}

/// A lazy link in a resolution chain.
pub type Provider<'a, T, E> = &'a dyn Fn() -> std::result::Result<Option<T>, E>;

/// Evaluate providers in order and return the first value found.
///
/// A provider returning `Err` stops the chain. `Ok(None)` means no provider
/// produced a value.
///
/// # Errors
///
/// Returns the first error a provider reports.
pub fn first_resolved<T, E>(providers: &[Provider<'_, T, E>]) -> std::result::Result<Option<T>, E> {
    for provider in providers {
        if let Some(value) = provider()? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Resolve the instance: `-i` flag → config default → `DATASETTE_URL`.
///
/// # Errors
///
/// - [`Error::UnknownInstance`] if the flag is neither a URL nor a known alias
/// - [`Error::NoInstanceSpecified`] if nothing in the chain is set
pub fn resolve_instance(
    flag: Option<&str>,
    config: &Config,
    env: &Environment,
) -> Result<ResolvedInstance> {
    let from_url = |url: &str| ResolvedInstance {
        url: normalize_url(url).to_string(),
        alias: instance_alias_for_url(url, config),
    };
    let from_alias = |name: &str| {
        config.instances.get(name).map(|entry| ResolvedInstance {
            url: normalize_url(&entry.url).to_string(),
            alias: Some(name.to_string()),
        })
    };

    let explicit = || match flag {
        None => Ok(None),
        Some(value) if is_url(value) => Ok(Some(from_url(value))),
        Some(value) => from_alias(value)
            .map(Some)
            .ok_or_else(|| Error::UnknownInstance {
                name: value.to_string(),
            }),
    };
    let configured = || {
        Ok(config.default_instance.as_deref().and_then(|default| {
            from_alias(default).or_else(|| is_url(default).then(|| from_url(default)))
        }))
    };
    let environment = || Ok(env.url.as_deref().map(from_url));

    first_resolved(&[&explicit, &configured, &environment])?.ok_or(Error::NoInstanceSpecified)
}

/// Resolve the database: `-d` flag → the instance's default database →
/// `DATASETTE_DATABASE`.
///
/// # Errors
///
/// Returns [`Error::NoDatabaseSpecified`] if nothing in the chain is set.
pub fn resolve_database(
    flag: Option<&str>,
    instance: &ResolvedInstance,
    config: &Config,
    env: &Environment,
) -> Result<String> {
    let explicit = || Ok(flag.map(str::to_string));
    let configured = || {
        let alias = instance
            .alias
            .clone()
            .or_else(|| instance_alias_for_url(&instance.url, config));
        Ok(alias
            .and_then(|a| config.instances.get(&a))
            .and_then(|entry| entry.default_database.clone())
            .filter(|db| !db.is_empty()))
    };
    let environment = || Ok(env.database.clone());

    first_resolved::<String, Error>(&[&explicit, &configured, &environment])?
        .ok_or(Error::NoDatabaseSpecified)
}

/// Resolve the full target for a database-scoped command.
///
/// A `database` starting with `http://` or `https://` is a complete database
/// URL: the instance flag is ignored and the last path segment names the
/// database. Otherwise the instance and database chains run as usual.
///
/// # Errors
///
/// Propagates errors from [`resolve_instance`] and [`resolve_database`], or
/// [`Error::InvalidArgument`] for a database URL without a path.
pub fn resolve_database_target(
    database: Option<&str>,
    instance_flag: Option<&str>,
    config: &Config,
    env: &Environment,
) -> Result<DatabaseTarget> {
    if let Some(url) = database.filter(|d| is_url(d)) {
        let url = normalize_url(url);
        let (base, name) = url
            .rsplit_once('/')
            .filter(|(base, name)| !name.is_empty() && is_url(base))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("Database URL must include a database name: {url}"))
            })?;
        return Ok(DatabaseTarget {
            instance: ResolvedInstance {
                url: base.to_string(),
                alias: instance_alias_for_url(base, config),
            },
            database: name.to_string(),
            url: url.to_string(),
        });
    }

    let instance = resolve_instance(instance_flag, config, env)?;
    let database = resolve_database(database, &instance, config, env)?;
    let url = format!("{}/{}", instance.url, database);
    Ok(DatabaseTarget {
        instance,
        database,
        url,
    })
}

/// Resolve the token: `--token` flag → token stored under the alias owning
/// `url` → longest stored URL prefix → `DATASETTE_TOKEN`.
///
/// Absence is not an error; requests are then sent unauthenticated.
#[must_use]
pub fn resolve_token(
    flag: Option<&str>,
    url: &str,
    tokens: &Tokens,
    config: &Config,
    env: &Environment,
) -> Option<String> {
    let explicit = || Ok(flag.map(str::to_string));
    let by_alias = || {
        Ok(owning_alias(url, config)
            .and_then(|alias| tokens.get(&alias))
            .cloned())
    };
    let by_url = || Ok(longest_prefix_match(url, tokens).cloned());
    let environment = || Ok(env.token.clone());

    match first_resolved::<String, Infallible>(&[&explicit, &by_alias, &by_url, &environment]) {
        Ok(token) => token,
        Err(never) => match never {},
    }
}

/// Find the alias whose instance URL equals `url`, ignoring trailing slashes.
#[must_use]
pub fn instance_alias_for_url(url: &str, config: &Config) -> Option<String> {
    config.alias_for_url(url).map(str::to_string)
}

/// Alias whose instance covers `url`: an exact match, else the longest
/// instance URL that is a prefix of it.
fn owning_alias(url: &str, config: &Config) -> Option<String> {
    instance_alias_for_url(url, config).or_else(|| {
        config
            .instances
            .iter()
            .filter(|(_, entry)| url_matches_prefix(url, &entry.url))
            .max_by_key(|(_, entry)| normalize_url(&entry.url).len())
            .map(|(name, _)| name.clone())
    })
}

/// Map an alias or instance URL to the alias name it refers to.
///
/// # Errors
///
/// - [`Error::UnknownInstanceUrl`] for a URL no alias points at
/// - [`Error::UnknownAlias`] for anything else that is not an alias
pub fn resolve_instance_key(alias_or_url: &str, config: &Config) -> Result<String> {
    if config.instances.contains_key(alias_or_url) {
        return Ok(alias_or_url.to_string());
    }
    if is_url(alias_or_url) {
        return instance_alias_for_url(alias_or_url, config).ok_or_else(|| {
            Error::UnknownInstanceUrl {
                url: alias_or_url.to_string(),
            }
        });
    }
    Err(Error::UnknownAlias {
        name: alias_or_url.to_string(),
    })
}
