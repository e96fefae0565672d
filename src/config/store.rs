//! Reading and writing `config.json` and `auth.json`.

use super::file::{atomic_write, restrict_permissions};
use super::{Config, Tokens};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load the config document, or an empty one if the file does not exist.
///
/// # Errors
///
/// Returns [`Error::ConfigCorrupt`] if the file exists but does not parse.
pub fn load_config(path: &Path) -> Result<Config> {
    read_json_or_default(path)
}

/// Save the config document, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    write_json(path, config)
}

/// Load stored tokens, or an empty store if the file does not exist.
///
/// # Errors
///
/// Returns [`Error::ConfigCorrupt`] if the file exists but does not parse.
pub fn load_tokens(path: &Path) -> Result<Tokens> {
    read_json_or_default(path)
}

/// Save stored tokens. The file is readable by its owner only.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_tokens(path: &Path, tokens: &Tokens) -> Result<()> {
    write_json(path, tokens)?;
    restrict_permissions(path)?;
    Ok(())
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| Error::ConfigCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize with 4-space indentation, the layout the files have always had.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| Error::Other(e.to_string()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = to_pretty_json(value)?;
    atomic_write(path, &content)?;
    Ok(())
}
