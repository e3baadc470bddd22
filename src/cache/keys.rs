//! Key Handling Module
//!
//! Key normalization, Korean-content detection, key hashing, and the
//! key-to-path mapping used by the file tier.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a sanitized file name, in characters.
const MAX_FILE_NAME_CHARS: usize = 200;

/// Characters of the sanitized name kept when a hash suffix is appended.
const TRUNCATED_NAME_CHARS: usize = 180;

/// File name used when sanitization strips a key down to nothing.
const EMPTY_NAME_PLACEHOLDER: &str = "entry";

/// Minimum share of Hangul among non-whitespace characters for a string to
/// count as Korean content.
const KOREAN_RATIO: f64 = 0.1;

// == Normalization ==
/// Canonicalizes a cache key: trims surrounding whitespace and applies
/// Unicode NFC composition, so independently constructed but canonically
/// equal Korean keys (e.g. NFC vs NFD "문서:제목") resolve to one entry.
pub fn normalize_key(key: &str) -> String {
    key.trim().nfc().collect()
}

/// Builds a semantically prefixed key for a document title:
/// `"document:" + hash(title)`.
///
/// Prefixing is the caller's job: [`CacheManager`](crate::CacheManager)
/// takes keys as given, so retrieval code builds its keys with this before
/// calling `get`/`set`, and `keys("document:*")` then scopes to them.
pub fn document_key(title: &str) -> String {
    let digest = hash_key(&normalize_key(title));
    format!("document:{}", &digest[..16])
}

// == Korean Detection ==
fn is_hangul(c: char) -> bool {
    matches!(c,
        '\u{AC00}'..='\u{D7A3}'   // syllables
        | '\u{1100}'..='\u{11FF}' // jamo
        | '\u{3130}'..='\u{318F}' // compatibility jamo
    )
}

/// Detects Korean-language text: at least [`KOREAN_RATIO`] of the
/// non-whitespace characters fall in the Hangul blocks.
pub fn is_korean_text(text: &str) -> bool {
    let mut total = 0usize;
    let mut hangul = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if is_hangul(c) {
            hangul += 1;
        }
    }
    total > 0 && (hangul as f64 / total as f64) >= KOREAN_RATIO
}

/// Detects Korean content anywhere in a JSON value (strings, object keys,
/// and nested structures).
pub fn value_is_korean(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => is_korean_text(s),
        serde_json::Value::Array(items) => items.iter().any(value_is_korean),
        serde_json::Value::Object(map) => map
            .iter()
            .any(|(k, v)| is_korean_text(k) || value_is_korean(v)),
        _ => false,
    }
}

// == Hashing ==
/// SHA-256 hex digest of a key.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// SHA-256 hex digest of a serialized payload, used as the integrity
/// checksum for file-backed entries.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// == Path Mapping ==
/// Sanitizes a key into a file-system-safe name. Hangul syllables and jamo,
/// ASCII alphanumerics, `-` and `_` are kept; any run of other characters
/// collapses to a single `_`. Over-long results are truncated with a hash
/// suffix; a key stripped to nothing maps to a fixed placeholder.
pub fn sanitize_file_name(key: &str) -> String {
    let mut name = String::new();
    let mut last_was_filler = false;
    for c in key.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || is_hangul(c) {
            name.push(c);
            last_was_filler = false;
        } else if !last_was_filler {
            name.push('_');
            last_was_filler = true;
        }
    }

    let stripped: String = name.trim_matches('_').to_string();
    if stripped.is_empty() {
        return EMPTY_NAME_PLACEHOLDER.to_string();
    }
    if stripped.chars().count() <= MAX_FILE_NAME_CHARS {
        return stripped;
    }

    // Too long even after sanitizing: keep a prefix and disambiguate with a
    // digest of the full key.
    let prefix: String = stripped.chars().take(TRUNCATED_NAME_CHARS).collect();
    let digest = hash_key(key);
    format!("{}_{}", prefix, &digest[..16])
}

/// Maps a key to its sharded path relative to the base directory:
/// the first `depth` byte-pairs of the key hash become nested
/// 2-hex-character directories, bounding per-directory file counts;
/// the file name is the sanitized key suffixed with the hash prefix.
/// The digest has 32 byte-pairs, so deeper settings are clamped.
pub fn entry_relative_path(key: &str, depth: usize) -> String {
    let digest = hash_key(key);
    let depth = depth.min(digest.len() / 2);
    let mut parts: Vec<&str> = Vec::with_capacity(depth + 1);
    for i in 0..depth {
        parts.push(&digest[i * 2..i * 2 + 2]);
    }
    let file_name = format!("{}_{}", sanitize_file_name(key), &digest[..8]);
    if parts.is_empty() {
        file_name
    } else {
        format!("{}/{}", parts.join("/"), file_name)
    }
}

// == Pattern Matching ==
/// Matches a key against a `*`-wildcard pattern (`*` matches any run of
/// characters, including none).
pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    let key: Vec<char> = key.chars().collect();
    let pat: Vec<char> = pattern.chars().collect();

    // Classic two-pointer wildcard match with backtracking to the last star.
    let (mut k, mut p) = (0usize, 0usize);
    let (mut star, mut resume) = (None::<usize>, 0usize);
    while k < key.len() {
        if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            resume = k;
            p += 1;
        } else if p < pat.len() && pat[p] == key[k] {
            k += 1;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            resume += 1;
            k = resume;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}
