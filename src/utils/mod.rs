//!
//! Utility module for the wallet engine.
//!
//! URL normalization and filesystem-safe path derivation helpers used throughout the codebase.

use std::path::{Path, PathBuf};
use url::Url;

/// Normalize a mint URL so the same endpoint is never stored twice
/// ("https://Mint.example/" vs "https://mint.example"). Trims whitespace,
/// strips trailing slashes, and re-serializes through [`Url`], which
/// lowercases the scheme and host and leaves userinfo, path and query
/// untouched. Unparseable input is returned trimmed.
pub fn normalize_mint_url(url: &str) -> String {
    let mut normalized = url.trim().to_string();
    if let Ok(parsed) = Url::parse(&normalized) {
        normalized = parsed.to_string();
    }
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Check that a mint URL parses with an http or https scheme and a
/// non-empty host.
pub fn has_http_scheme(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Derive a filesystem-safe, deterministic name from a mint URL: every run of
/// non-alphanumeric characters collapses to a single underscore, leading and
/// trailing underscores are trimmed.
///
/// Distinct URLs can in theory sanitize to the same name. URLs are normalized
/// before they reach this point, which keeps that limited to deliberately
/// crafted inputs.
pub fn sanitize_mint_name(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut last_was_sep = false;
    for c in url.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Per-mint wallet database location under the engine data directory.
pub fn wallet_db_path(data_dir: &Path, mint_url: &str) -> PathBuf {
    data_dir.join(format!("db_{}", sanitize_mint_name(mint_url)))
}
