//! Storage-safe names.
//!
//! Identity keys become file names in the `Components` store, so they are
//! sanitized once when allocated. Entity names (modes, groups) may contain
//! arbitrary text and are escaped reversibly instead.

use crate::constants::identity::FALLBACK_KEY;

/// Reduce a preferred key to characters every filesystem accepts.
///
/// Keeps ASCII alphanumerics plus `_`, `-` and `.`; everything else becomes
/// `_`. Leading dots are dropped so keys never name hidden files.
pub fn sanitize_key(preferred: &str) -> String {
    let cleaned: String = preferred
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        FALLBACK_KEY.to_string()
    } else {
        cleaned.to_string()
    }
}

/// True when `key` can be used as a `Components` file stem as-is.
pub fn is_storage_safe(key: &str) -> bool {
    !key.is_empty() && sanitize_key(key) == key
}

/// Escape an entity name for use as a file stem.
///
/// `%` and characters outside `[A-Za-z0-9_.-]` are written as `%XX` per UTF-8
/// byte so [`unescape_name`] restores the original exactly.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    // "." and ".." are not usable file stems
    if out.chars().all(|c| c == '.') {
        out = out.replace('.', "%2E");
    }
    out
}

/// Inverse of [`escape_name`]. Malformed escapes are kept literally.
pub fn unescape_name(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

/// Case-insensitive form used for uniqueness checks.
pub fn fold_case(key: &str) -> String {
    key.to_lowercase()
}
