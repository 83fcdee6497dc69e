//! Identity generation and path sanitization.
//!
//! Identities look like `<base>_<unix-millis>_<32 hex>.<ext>`. The timestamp
//! keeps them roughly sortable; the random suffix (a v4 UUID, 122 random
//! bits) is what makes two saves of the same name in the same millisecond
//! distinct.

use attache_error::{AttacheResult, StorageError, StorageErrorKind};
use chrono::Utc;
use uuid::Uuid;

/// Maximum length of the sanitized base name.
pub const MAX_BASE_LEN: usize = 50;

/// Maximum length of a preserved extension.
pub const MAX_EXTENSION_LEN: usize = 10;

const FALLBACK_BASE: &str = "file";

/// Generate a fresh identity for an upload named `original_name`.
///
/// # Example
///
/// ```
/// use attache_storage::generate_identity;
///
/// let id = generate_identity("Screen Shot (1).PNG");
/// assert!(id.starts_with("Screen_Shot_1_"));
/// assert!(id.ends_with(".png"));
/// assert_ne!(id, generate_identity("Screen Shot (1).PNG"));
/// ```
pub fn generate_identity(original_name: &str) -> String {
    let base = sanitize_base(original_name);
    let timestamp = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple();

    match sanitize_extension(original_name) {
        Some(ext) => format!("{}_{}_{}.{}", base, timestamp, random, ext),
        None => format!("{}_{}_{}", base, timestamp, random),
    }
}

/// Final path component of a name, accepting either separator.
fn file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Split a file name into stem and extension. A leading dot is not an extension.
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], Some(&file_name[pos + 1..])),
        _ => (file_name, None),
    }
}

/// Reduce the stem of `name` to a bounded, filesystem- and URL-safe token.
///
/// Keeps ASCII alphanumerics, `-` and `_`; every run of other characters
/// becomes a single `_`. Never returns an empty string.
pub fn sanitize_base(name: &str) -> String {
    let (stem, _) = split_extension(file_name(name));

    let mut sanitized = String::with_capacity(stem.len().min(MAX_BASE_LEN));
    let mut gap = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if gap && !sanitized.is_empty() {
                sanitized.push('_');
            }
            gap = false;
            sanitized.push(c);
        } else {
            gap = true;
        }
        if sanitized.len() >= MAX_BASE_LEN {
            break;
        }
    }
    // ASCII only, so byte truncation is safe
    sanitized.truncate(MAX_BASE_LEN);

    let trimmed = sanitized.trim_matches(|c| c == '_' || c == '-');
    if trimmed.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercased extension of `name`, if it is short and alphanumeric.
pub fn sanitize_extension(name: &str) -> Option<String> {
    let (_, ext) = split_extension(file_name(name));
    ext.filter(|ext| {
        !ext.is_empty()
            && ext.len() <= MAX_EXTENSION_LEN
            && ext.chars().all(|c| c.is_ascii_alphanumeric())
    })
    .map(|ext| ext.to_ascii_lowercase())
}

/// Normalize a caller-supplied relative path into `/`-separated segments.
///
/// Empty and `.` segments are dropped. Absolute paths, `..`, hidden segments
/// and characters outside `[A-Za-z0-9._-]` are rejected. An empty result
/// means the storage root.
pub fn sanitize_relative_path(path: &str) -> AttacheResult<String> {
    let invalid = |reason: &str| -> attache_error::AttacheError {
        StorageError::new(StorageErrorKind::InvalidPath(format!("{}: {}", path, reason))).into()
    };

    if path.starts_with('/') || path.starts_with('\\') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("parent directory references are not allowed")),
            s if s.starts_with('.') => return Err(invalid("hidden segments are not allowed")),
            s if !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) =>
            {
                return Err(invalid("unsupported characters"));
            }
            s => segments.push(s),
        }
    }

    Ok(segments.join("/"))
}
