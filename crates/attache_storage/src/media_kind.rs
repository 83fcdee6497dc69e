//! Media kind classification.

/// Broad class of an uploaded payload, derived from its MIME type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
    derive_more::Display,
)]
pub enum MediaKind {
    /// Image content (PNG, JPEG, WebP, etc.)
    #[display("image")]
    Image,
    /// Video content (MP4, WebM, etc.)
    #[display("video")]
    Video,
    /// Audio content (MP3, WAV, OGG, etc.)
    #[display("audio")]
    Audio,
    /// Anything else (documents, archives, text)
    #[display("other")]
    Other,
}

impl MediaKind {
    /// Classify a MIME type such as `image/png` or `video/mp4; codecs=avc1`.
    pub fn from_mime(mime_type: &str) -> Self {
        let top_level = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match top_level.as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    /// Whether uploads of this kind go through the transcoding step.
    pub fn is_transcodable(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}
