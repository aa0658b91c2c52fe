//! Remote memo model

use serde::{Deserialize, Serialize};

use super::attachment::RemoteAttachment;

/// A memo as returned by the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    /// Stable identifier, unique per memo
    pub id: String,
    /// Display title
    pub title: String,
    /// Raw memo body
    pub content: String,
    /// Creation timestamp (Unix seconds)
    pub created_at: Option<i64>,
    /// Last update timestamp (Unix seconds)
    pub updated_at: Option<i64>,
    /// Archived memos are never mirrored locally
    pub archived: bool,
}

impl RemoteNote {
    /// Create an active memo whose title is derived from its content.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let id = id.into();
        let content = content.into();
        let title = title_from_content(&content).unwrap_or_else(|| id.clone());
        Self {
            id,
            title,
            content,
            created_at: None,
            updated_at: None,
            archived: false,
        }
    }

    /// Set both timestamps (Unix seconds).
    #[must_use]
    pub const fn with_timestamps(mut self, created_at: i64, updated_at: i64) -> Self {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self
    }

    #[must_use]
    pub const fn archived(mut self) -> Self {
        self.archived = true;
        self
    }
}

/// Derive a title from the first non-empty line of a memo body.
///
/// Leading Markdown heading marks are stripped.
#[must_use]
pub fn title_from_content(content: &str) -> Option<String> {
    content
        .lines()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Everything one sync run fetched from the remote server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub notes: Vec<RemoteNote>,
    pub attachments: Vec<RemoteAttachment>,
}
