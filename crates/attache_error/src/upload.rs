//! Upload pipeline errors.

/// Specific upload error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum UploadErrorKind {
    /// The media processor failed to produce derivatives
    #[display("Media processing failed: {}", _0)]
    Processing(String),

    /// Upload refused before reaching storage
    #[display("Upload rejected: {}", _0)]
    Rejected(String),
}

/// Upload error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Upload Error: {} at line {} in {}", kind, line, file)]
pub struct UploadError {
    kind: UploadErrorKind,
    line: u32,
    file: &'static str,
}

impl UploadError {
    /// Create a new upload error with caller location tracking.
    #[track_caller]
    pub fn new(kind: UploadErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &UploadErrorKind {
        &self.kind
    }
}
