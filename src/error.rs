//! Error types for dclient.
//!
//! Provides structured error handling with:
//! - Context-aware recovery hints
//! - A single exit status (1) for every user-facing failure
//!
//! Two layers of remote failure are kept apart: [`Error::Transport`] for a
//! non-2xx status, [`Error::Application`] for a 2xx body carrying `"ok": false`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dclient operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in dclient operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file {path} is corrupt: {message}")]
    ConfigCorrupt { path: PathBuf, message: String },

    #[error("Unknown instance: {name}. Use a URL or configure an alias.")]
    UnknownInstance { name: String },

    #[error("No such alias: {name}")]
    UnknownAlias { name: String },

    #[error("No such instance URL: {url}")]
    UnknownInstanceUrl { url: String },

    #[error(
        "No instance specified. Use -i <url-or-alias>, or configure a default:\n\n    \
         dclient alias add <name> <url>\n    \
         dclient default instance <name-or-url>\n\n\
         Or set the DATASETTE_URL environment variable."
    )]
    NoInstanceSpecified,

    #[error(
        "No database specified. Use -d <name>, or configure a default:\n\n    \
         dclient default database <alias-or-url> <database>\n\n\
         Or set the DATASETTE_DATABASE environment variable."
    )]
    NoDatabaseSpecified,

    /// Non-2xx HTTP status.
    #[error("{status} status code. {message}")]
    Transport { status: u16, message: String },

    /// 2xx HTTP status with `"ok": false` in the body.
    #[error("{0}")]
    Application(String),

    #[error("Response was not valid JSON: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Login(String),

    #[error("{0}")]
    InputFormat(String),

    #[error("Could not decode input as {encoding}: {message}")]
    Encoding { encoding: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Process exit status. Every user-facing error exits with 1.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        1
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ConfigCorrupt { path, .. } => Some(format!(
                "Fix or delete {} and reconfigure with `dclient alias add`",
                path.display()
            )),
            Self::UnknownInstance { .. } | Self::UnknownAlias { .. } => {
                Some("Use `dclient alias list` to see configured aliases".to_string())
            }
            Self::Encoding { .. } => {
                Some("Pass --encoding latin-1 if the file is not UTF-8".to_string())
            }
            Self::Transport { status: 401 | 403, .. } => Some(
                "Check your token: `dclient auth status`, or store one with `dclient auth add`"
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_instance_message_mentions_every_option() {
        let message = Error::NoInstanceSpecified.to_string();
        assert!(message.contains("-i <url-or-alias>"));
        assert!(message.contains("dclient alias add"));
        assert!(message.contains("dclient default instance"));
        assert!(message.contains("DATASETTE_URL"));
    }

    #[test]
    fn test_transport_message_keeps_status() {
        let err = Error::Transport {
            status: 400,
            message: "Invalid SQL: Statement must be a SELECT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "400 status code. Invalid SQL: Statement must be a SELECT"
        );
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_hints() {
        assert!(Error::UnknownAlias { name: "x".into() }.hint().is_some());
        assert!(
            Error::Transport { status: 403, message: String::new() }
                .hint()
                .is_some()
        );
        assert!(Error::Other("boom".into()).hint().is_none());
    }
}
