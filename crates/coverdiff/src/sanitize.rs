//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Traces are safe to share for debugging — these functions ensure storage
//! keys and endpoint URLs don't leak tenant paths or tokens into spans.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Returns only the final segment of a storage key (no prefix directories).
///
/// Safe for span fields — reveals the object name without exposing the full
/// key, which usually embeds tenant or upload-session identifiers.
pub fn redact_key(key: &str) -> String {
    key.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo/tokens from an HTTP endpoint URL.
///
/// - `https://token@storage.example.com/v1` → `https://****@storage.example.com/v1`
/// - `https://storage.example.com/v1` → `https://storage.example.com/v1` (no change)
pub fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let after_scheme = &url[scheme_end + 3..];
        if let Some(at_pos) = after_scheme.find('@') {
            let scheme = &url[..scheme_end + 3];
            let after_at = &after_scheme[at_pos + 1..];
            return format!("{}****@{}", scheme, after_at);
        }
    }

    url.to_string()
}

/// Returns a short deterministic hash of a storage key for correlation
/// without exposing the actual key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();
    format!("{:016x}", hash)
}
