//! Data models for memos-sync

mod attachment;
mod note;
mod settings;

pub use attachment::RemoteAttachment;
pub use note::{title_from_content, RemoteNote, RemoteSnapshot};
pub use settings::{Authorization, FileNameFormat, SyncSettings, ALLOWED_INTERVALS};
