//! Source classification: decide what a reference string *is* before any
//! bytes are fetched.
//!
//! ## Why this order?
//!
//! URL and data-URI prefixes are unambiguous, so they are checked first.
//! Path shapes come before the "looks like base64" test because short
//! strings that happen to fit the base64 alphabet (`photos/cat`, `a/b/c/d`)
//! are far more likely to be relative paths than inline data. Anything that
//! matches nothing is treated as a path, so the caller gets a clear
//! "does not exist" error instead of a silent misclassification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Where the bytes for a reference come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FilePath,
    Url,
    InlineData,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FilePath => "file",
            SourceKind::Url => "url",
            SourceKind::InlineData => "base64",
        }
    }
}

/// Returned when nothing else matches.
pub const DEFAULT_SOURCE_KIND: SourceKind = SourceKind::FilePath;

/// Strings shorter than this are never treated as inline base64.
pub const MIN_BASE64_LEN: usize = 100;

/// Strings at least this long are never treated as "name.ext" paths.
const MAX_EXTENSION_PATH_LEN: usize = 500;

static RE_BASE64: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").unwrap());

static RE_DRIVE_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]").unwrap());

static RE_DOT_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[A-Za-z0-9]{1,10}$").unwrap());

/// Classify a reference. Pure and total: always returns a kind.
pub fn classify_source(reference: &str) -> SourceKind {
    let r = reference.trim();

    if is_url(r) {
        return SourceKind::Url;
    }
    if is_data_uri(r) {
        return SourceKind::InlineData;
    }
    if looks_like_path(r) {
        return SourceKind::FilePath;
    }
    if looks_like_base64(r) {
        return SourceKind::InlineData;
    }
    DEFAULT_SOURCE_KIND
}

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

pub fn is_data_uri(input: &str) -> bool {
    input.starts_with("data:")
}

/// Filesystem-path shape: drive letter, UNC, absolute, explicitly relative,
/// or a short whitespace-free name ending in a dot-extension.
pub fn looks_like_path(input: &str) -> bool {
    if RE_DRIVE_LETTER.is_match(input)
        || input.starts_with(r"\\")
        || input.starts_with('/')
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with(r".\")
        || input.starts_with(r"..\")
    {
        return true;
    }

    input.len() < MAX_EXTENSION_PATH_LEN
        && !input.chars().any(char::is_whitespace)
        && RE_DOT_EXTENSION.is_match(input)
}

/// Structural base64 plausibility: long enough, padded to a multiple of 4,
/// and only alphabet characters once whitespace is removed.
pub fn looks_like_base64(input: &str) -> bool {
    let compact = strip_whitespace(input);
    compact.len() >= MIN_BASE64_LEN && compact.len() % 4 == 0 && RE_BASE64.is_match(&compact)
}

pub(crate) fn strip_whitespace(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_base64() -> String {
        "QUJD".repeat(40)
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn url_prefix_always_wins() {
        assert_eq!(classify_source("https://x"), SourceKind::Url);
        assert_eq!(classify_source("http://a b c/with spaces.png"), SourceKind::Url);
        assert_eq!(
            classify_source(&format!("https://{}", long_base64())),
            SourceKind::Url
        );
    }

    #[test]
    fn data_prefix_always_wins() {
        assert_eq!(classify_source("data:"), SourceKind::InlineData);
        assert_eq!(classify_source("data:image/png;base64,AAAA"), SourceKind::InlineData);
        assert_eq!(classify_source("data:/looks/like/a/path.png"), SourceKind::InlineData);
    }

    #[test]
    fn path_shapes() {
        for p in [
            "C:\\Users\\me\\pic.png",
            "d:/scans/page.pdf",
            "\\\\server\\share\\img",
            "/tmp/file",
            "./rel/thing",
            "../up/thing",
            "photo.jpeg",
            "scans/report.PDF",
        ] {
            assert_eq!(classify_source(p), SourceKind::FilePath, "{p}");
        }
    }

    #[test]
    fn plausible_base64_is_inline() {
        assert_eq!(classify_source(&long_base64()), SourceKind::InlineData);
        let wrapped = format!("{}\n{}", &long_base64()[..80], &long_base64()[80..]);
        assert_eq!(classify_source(&wrapped), SourceKind::InlineData);
    }

    #[test]
    fn short_alphabet_strings_default_to_path() {
        // Valid base64 alphabet, but far too short to be inline data.
        assert_eq!(classify_source("abcd/efgh"), SourceKind::FilePath);
        assert_eq!(classify_source("QUJD"), SourceKind::FilePath);
    }

    #[test]
    fn base64_requires_multiple_of_four() {
        let s = format!("{}A", long_base64());
        assert!(!looks_like_base64(&s));
        assert_eq!(classify_source(&s), DEFAULT_SOURCE_KIND);
    }

    #[test]
    fn garbage_defaults_to_path() {
        assert_eq!(classify_source("not a path, not base64!"), SourceKind::FilePath);
        assert_eq!(classify_source(""), SourceKind::FilePath);
    }

    #[test]
    fn extension_rule_rejects_whitespace_and_long_strings() {
        assert!(!looks_like_path("my holiday photo.png"));
        let long = format!("{}.png", "a".repeat(600));
        assert!(!looks_like_path(&long));
    }
}
