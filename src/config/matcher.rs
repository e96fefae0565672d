//! Token lookup by URL prefix.
//!
//! A token stored for `https://example.com/data` also applies to
//! `https://example.com/data/dogs.json` and `https://example.com/data.json`,
//! but never to another scheme or host.

use url::Url;

/// Whether `prefix` covers `url`.
///
/// Scheme, host and port must be identical, and then either:
/// - the paths are equal,
/// - the target path is the prefix path plus `.json`, or
/// - the target path continues the prefix path after a `/`.
///
/// Unparseable URLs never match.
#[must_use]
pub fn url_matches_prefix(url: &str, prefix: &str) -> bool {
    let (Ok(target), Ok(prefix)) = (Url::parse(url), Url::parse(prefix)) else {
        return false;
    };

    if target.scheme() != prefix.scheme()
        || target.host_str() != prefix.host_str()
        || target.port_or_known_default() != prefix.port_or_known_default()
    {
        return false;
    }

    let target_path = target.path();
    let prefix_path = prefix.path();

    if target_path == prefix_path {
        return true;
    }

    if target_path.ends_with(".json") && format!("{prefix_path}.json") == target_path {
        return true;
    }

    if prefix_path.ends_with('/') {
        target_path.starts_with(prefix_path)
    } else {
        target_path.starts_with(&format!("{prefix_path}/"))
    }
}

/// Pick the value stored under the longest prefix that covers `target`.
///
/// Ties keep the first candidate encountered.
pub fn longest_prefix_match<'a, K, V, I>(target: &str, candidates: I) -> Option<&'a V>
where
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: AsRef<str> + ?Sized + 'a,
    V: 'a,
{
    let mut best: Option<(usize, &'a V)> = None;

    for (prefix, value) in candidates {
        let prefix = prefix.as_ref();
        if !url_matches_prefix(target, prefix) {
            continue;
        }
        if best.is_none_or(|(len, _)| prefix.len() > len) {
            best = Some((prefix.len(), value));
        }
    }

    best.map(|(_, value)| value)
}
