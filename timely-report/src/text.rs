//! Normalization of titles into cache-key material.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static NON_WORD: Lazy<Regex> = Lazy::new(|| {
    // Hard-coded pattern, always valid
    #[allow(clippy::expect_used)]
    Regex::new(r"[^a-z0-9_]+").expect("Hard-coded regex pattern should be valid")
});

/// Lowercases `title` and collapses every run of other characters into a
/// single `-`, trimming leading and trailing dashes.
///
/// ```rust
/// use timely_report::text::parameterize;
///
/// assert_eq!(parameterize("Orders by Month (EU)"), "orders-by-month-eu");
/// ```
pub fn parameterize(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_WORD
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Cache-key form of a title.
///
/// Titles made of ASCII letters, digits and underscores separated by single
/// spaces map to their [`parameterize`] form. Any other title gets the first
/// 8 hex digits of its SHA-256 appended, so titles that parameterize alike
/// (`"Orders (EU)"` and `"Orders EU"`, or two non-Latin titles) stay apart.
/// Titles differing only in letter case still share a slug.
///
/// ```rust
/// use timely_report::text::cache_slug;
///
/// assert_eq!(cache_slug("Net revenue"), "net-revenue");
/// assert_ne!(cache_slug("Orders (EU)"), cache_slug("Orders EU"));
/// assert_eq!(cache_slug("注文").len(), 8);
/// ```
pub fn cache_slug(title: &str) -> String {
    let slug = parameterize(title);
    let lossless = !slug.is_empty()
        && !title.contains('-')
        && title.to_ascii_lowercase().replace(' ', "-") == slug;
    if lossless {
        return slug;
    }
    let mut digest = hex::encode(Sha256::digest(title.as_bytes()));
    digest.truncate(8);
    if slug.is_empty() {
        digest
    } else {
        format!("{slug}-{digest}")
    }
}
