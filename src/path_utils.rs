//! Path utilities for safe filesystem operations.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Bytes that cannot appear in a portable file name, plus `%` itself so the encoding stays reversible.
const UNSAFE: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b'/')
    .add(b'\\')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|');

/// Encode a string for use as a single file name
///
/// Cache keys and checkpoint keys become file names. Separators and characters that are not
/// portable across filesystems are percent-encoded, as is a leading dot, so distinct keys
/// always map to distinct names and no key can name a parent directory.
///
/// # Examples
///
/// ```ignore
/// // This is an internal utility function
/// assert_eq!(sanitize_path_component("contributions_rust-lang_rust"), "contributions_rust-lang_rust");
/// assert_eq!(sanitize_path_component("../etc/passwd"), "%2E.%2Fetc%2Fpasswd");
/// ```
#[must_use]
pub fn sanitize_path_component(s: &str) -> String {
    let encoded = utf8_percent_encode(s, UNSAFE).to_string();
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded,
    }
}
