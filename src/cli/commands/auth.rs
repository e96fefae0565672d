//! Stored token management.

use super::{introspect, prompt_secret, Context};
use crate::cli::AuthCommands;
use crate::config::Tokens;
use crate::error::{Error, Result};
use tracing::info;

/// Execute an auth subcommand.
///
/// # Errors
///
/// Returns an error if the token store cannot be read or written, or the
/// key to remove is unknown.
pub fn execute(command: &AuthCommands, ctx: &Context) -> Result<()> {
    match command {
        AuthCommands::Add {
            alias_or_url,
            token,
        } => {
            let token = match token {
                Some(token) => token.clone(),
                None => prompt_secret("Token")?,
            };
            add(alias_or_url, token, ctx)
        }
        AuthCommands::List => list(ctx),
        AuthCommands::Remove { alias_or_url } => remove(alias_or_url, ctx),
        AuthCommands::Status { conn } => introspect::execute_actor(conn, ctx),
    }
}

/// Keys are stored exactly as given, alias or URL.
fn add(key: &str, token: String, ctx: &Context) -> Result<()> {
    if token.is_empty() {
        return Err(Error::InvalidArgument("Token cannot be empty".to_string()));
    }
    let mut tokens = ctx.location.load_tokens()?;
    tokens.insert(key.to_string(), token);
    ctx.location.save_tokens(&tokens)?;
    info!(key, "Stored token");
    Ok(())
}

fn list(ctx: &Context) -> Result<()> {
    let tokens = ctx.location.load_tokens()?;
    println!("Tokens file: {}", ctx.location.auth_file().display());
    for line in token_lines(&tokens) {
        println!("{line}");
    }
    Ok(())
}

/// A blank separator, then each key with only the token's first character.
pub(crate) fn token_lines(tokens: &Tokens) -> Vec<String> {
    if tokens.is_empty() {
        return Vec::new();
    }
    std::iter::once(String::new())
        .chain(tokens.iter().map(|(key, token)| {
            let first: String = token.chars().take(1).collect();
            format!("{key}:\t{first}..")
        }))
        .collect()
}

fn remove(key: &str, ctx: &Context) -> Result<()> {
    let mut tokens = ctx.location.load_tokens()?;
    if tokens.shift_remove(key).is_none() {
        return Err(Error::Other("No such URL or alias".to_string()));
    }
    ctx.location.save_tokens(&tokens)?;
    info!(key, "Removed token");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLocation, Environment};
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> Context {
        Context::new(ConfigLocation::new(temp.path()), Environment::default())
    }

    #[test]
    fn test_add_list_remove() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);

        add("prod", "dstok_abc".to_string(), &ctx).unwrap();
        add("https://example.com", "xyz".to_string(), &ctx).unwrap();

        let tokens = ctx.location.load_tokens().unwrap();
        assert_eq!(
            token_lines(&tokens),
            vec!["", "prod:\td..", "https://example.com:\tx.."]
        );

        remove("prod", &ctx).unwrap();
        let tokens = ctx.location.load_tokens().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains_key("https://example.com"));
    }

    #[test]
    fn test_remove_unknown() {
        let temp = TempDir::new().unwrap();
        let err = remove("nope", &context(&temp)).unwrap_err();
        assert_eq!(err.to_string(), "No such URL or alias");
    }

    #[test]
    fn test_empty_token_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(add("prod", String::new(), &context(&temp)).is_err());
    }

    #[test]
    fn test_token_lines_empty() {
        assert!(token_lines(&Tokens::new()).is_empty());
    }
}
