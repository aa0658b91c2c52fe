//! Rendering memos into Markdown documents.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::models::RemoteNote;

/// Turns a memo into the text written to its `.md` file.
pub trait NoteRenderer {
    fn render(&self, note: &RemoteNote) -> String;
}

/// Markdown with a front matter block carrying the memo metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmatterRenderer;

impl NoteRenderer for FrontmatterRenderer {
    fn render(&self, note: &RemoteNote) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", yaml_string(&note.id));
        let _ = writeln!(output, "title: {}", yaml_string(&note.title));
        if let Some(created_at) = note.created_at.and_then(format_timestamp) {
            let _ = writeln!(output, "created_at: {created_at}");
        }
        if let Some(updated_at) = note.updated_at.and_then(format_timestamp) {
            let _ = writeln!(output, "updated_at: {updated_at}");
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        output.push_str(note.content.trim_end());
        output.push('\n');

        output
    }
}

/// Plain body without metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyRenderer;

impl NoteRenderer for BodyRenderer {
    fn render(&self, note: &RemoteNote) -> String {
        note.content.clone()
    }
}

// JSON string literals are valid YAML scalars and survive `:` and `#`.
fn yaml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn format_timestamp(seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|time| time.to_rfc3339())
}
