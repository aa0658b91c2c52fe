//! Remote resource model

/// A resource (attachment) as returned by the remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAttachment {
    /// File name, possibly with `/` separated subdirectories.
    pub filename: String,
    /// Downloaded bytes; `None` when the download failed.
    pub content: Option<Vec<u8>>,
    /// Owning memo, informational only.
    pub note_id: Option<String>,
}

impl RemoteAttachment {
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: Some(content.into()),
            note_id: None,
        }
    }

    /// An attachment whose content could not be downloaded.
    #[must_use]
    pub fn unavailable(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: None,
            note_id: None,
        }
    }
}
