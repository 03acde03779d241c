//! Shared utility functions for naming and identity.
//!
//! Chapter filenames must stay stable across regenerations: the incremental
//! planner matches cached chapters by filename, so the derivation here is
//! deterministic and collision-resistant by construction (position prefix).

// =============================================================================
// String Utilities
// =============================================================================

/// Capitalize the first character of a string.
#[inline]
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Lowercase, underscore-joined slug of an arbitrary name.
///
/// Non-alphanumeric runs collapse to a single underscore; leading and
/// trailing separators are stripped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Deterministic chapter filename: zero-padded 1-based position plus the
/// slugified abstraction name.
pub fn chapter_filename(position: usize, abstraction_name: &str) -> String {
    format!("{:02}_{}.md", position, slugify(abstraction_name))
}

// =============================================================================
// Repository Identity
// =============================================================================

/// Normalize a repository URL into a stable cache key.
///
/// Strips the scheme, credentials, a trailing `.git` suffix, and trailing
/// slashes, and lowercases the host so equivalent spellings share one cache
/// entry.
pub fn normalize_repo_url(repo_url: &str) -> String {
    let trimmed = repo_url.trim();

    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);

    let without_credentials = without_scheme
        .rsplit_once('@')
        .map(|(_, rest)| rest)
        .unwrap_or(without_scheme);

    let without_suffix = without_credentials
        .trim_end_matches('/')
        .trim_end_matches(".git");

    match without_suffix.split_once('/') {
        Some((host, path)) => format!("{}/{}", host.to_ascii_lowercase(), path),
        None => without_suffix.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Repository Crawler"), "repository_crawler");
        assert_eq!(slugify("User Auth Flow!!"), "user_auth_flow");
        assert_eq!(slugify("  spaced  out  "), "spaced_out");
        assert_eq!(slugify("already_snake"), "already_snake");
    }

    #[test]
    fn test_slugify_strips_leading_and_trailing_separators() {
        assert_eq!(slugify("!!Bang!!"), "bang");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_chapter_filename_deterministic() {
        assert_eq!(
            chapter_filename(3, "User Auth Flow!!"),
            "03_user_auth_flow.md"
        );
        assert_eq!(
            chapter_filename(3, "User Auth Flow!!"),
            chapter_filename(3, "User Auth Flow!!")
        );
        assert_eq!(chapter_filename(12, "Cache"), "12_cache.md");
    }

    #[test]
    fn test_normalize_repo_url() {
        assert_eq!(
            normalize_repo_url("https://github.com/Acme/Widget.git"),
            "github.com/Acme/Widget"
        );
        assert_eq!(
            normalize_repo_url("https://GITHUB.COM/Acme/Widget/"),
            "github.com/Acme/Widget"
        );
        assert_eq!(
            normalize_repo_url("https://token@github.com/acme/widget"),
            "github.com/acme/widget"
        );
        assert_eq!(
            normalize_repo_url("git://github.com/acme/widget.git"),
            normalize_repo_url("https://github.com/acme/widget")
        );
    }
}
