//! MIME type guessing for `put`.

use std::path::Path;

/// Extension to MIME type for the formats attachments usually come in.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("svg", "image/svg+xml"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("json", "application/json"),
    ("zip", "application/zip"),
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
];

/// Guess a MIME type from a file's extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| {
            KNOWN_TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(attache::DEFAULT_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type(Path::new("shot.PNG")), "image/png");
        assert_eq!(guess_mime_type(Path::new("a/b/clip.mov")), "video/quicktime");
        assert_eq!(guess_mime_type(Path::new("server.log")), "text/plain");
        assert_eq!(
            guess_mime_type(Path::new("mystery.xyz")),
            "application/octet-stream"
        );
        assert_eq!(
            guess_mime_type(Path::new("Makefile")),
            "application/octet-stream"
        );
    }
}
