//! Snapshot normalization.
//!
//! Maps a raw `RemoteSnapshot` onto vault paths and file contents. Nothing
//! here performs I/O or reads the clock; the caller passes `now`.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

use crate::config::SyncConfig;
use crate::models::{FileNameFormat, RemoteNote, RemoteSnapshot};
use crate::render::NoteRenderer;
use crate::util::join_vault_path;

/// A remote memo or resource mapped to its vault path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    /// Vault-relative, `/`-separated path.
    pub relative_path: String,
    /// Bytes to write; `None` for resources whose download failed.
    pub content: Option<Vec<u8>>,
    /// Remote update time (Unix seconds).
    pub remote_updated_at: Option<i64>,
}

/// Both collections of one snapshot, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedSnapshot {
    pub notes: Vec<NormalizedEntry>,
    pub attachments: Vec<NormalizedEntry>,
}

/// Normalize a remote snapshot for `config`'s folder and file name format.
///
/// Archived memos are dropped. Resources are kept regardless of the state of
/// the memo they belong to.
pub fn normalize_snapshot(
    snapshot: &RemoteSnapshot,
    config: &SyncConfig,
    now: DateTime<FixedOffset>,
    renderer: &dyn NoteRenderer,
) -> NormalizedSnapshot {
    let memos_root = config.memos_root();
    let resources_root = config.resources_root();

    let notes = snapshot
        .notes
        .iter()
        .filter(|note| !note.archived)
        .map(|note| NormalizedEntry {
            relative_path: join_vault_path(
                &memos_root,
                &note_file_name(note, config.file_name_format(), now),
            ),
            content: Some(renderer.render(note).into_bytes()),
            remote_updated_at: note.updated_at,
        })
        .collect();

    let attachments = snapshot
        .attachments
        .iter()
        .filter_map(|attachment| {
            let name = attachment.filename.trim_start_matches('/');
            if name
                .trim_matches(|c: char| c == '/' || c.is_whitespace())
                .is_empty()
            {
                tracing::warn!(
                    "Skipping resource with empty file name {:?}",
                    attachment.filename
                );
                return None;
            }
            Some(NormalizedEntry {
                relative_path: join_vault_path(&resources_root, name),
                content: attachment.content.clone(),
                remote_updated_at: None,
            })
        })
        .collect();

    NormalizedSnapshot { notes, attachments }
}

/// File name (without folder) for a memo under `format`.
///
/// Titles are used verbatim; characters the host filesystem rejects are not
/// replaced.
pub fn note_file_name(
    note: &RemoteNote,
    format: FileNameFormat,
    now: DateTime<FixedOffset>,
) -> String {
    let stem = match format {
        FileNameFormat::Id => note.id.clone(),
        FileNameFormat::CreatedAt => format_file_timestamp(note.created_at, now),
        FileNameFormat::UpdatedAt => format_file_timestamp(note.updated_at, now),
        FileNameFormat::Title => note.title.clone(),
    };
    format!("{stem}.md")
}

/// `YYYY-M-D-H-MM` in `now`'s offset, with no zero padding on any field.
fn format_file_timestamp(seconds: Option<i64>, now: DateTime<FixedOffset>) -> String {
    let time = seconds
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        .map_or(now, |time| time.with_timezone(&now.timezone()));

    format!(
        "{}-{}-{}-{}-{}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteAttachment;
    use crate::render::BodyRenderer;
    use pretty_assertions::assert_eq;

    fn utc_now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-09T08:05:00+00:00").unwrap()
    }

    fn config(format: FileNameFormat) -> SyncConfig {
        SyncConfig::new("Memos Sync", format).unwrap()
    }

    fn paths(entries: &[NormalizedEntry]) -> Vec<&str> {
        entries
            .iter()
            .map(|entry| entry.relative_path.as_str())
            .collect()
    }

    #[test]
    fn id_format_uses_identifier() {
        let note = RemoteNote::new("abc", "body");
        assert_eq!(note_file_name(&note, FileNameFormat::Id, utc_now()), "abc.md");
    }

    #[test]
    fn timestamp_formats_are_not_zero_padded() {
        // 2024-01-02T03:04:00Z / 2024-11-12T13:05:00Z
        let note = RemoteNote::new("abc", "body").with_timestamps(1_704_164_640, 1_731_416_700);

        assert_eq!(
            note_file_name(&note, FileNameFormat::CreatedAt, utc_now()),
            "2024-1-2-3-4.md"
        );
        assert_eq!(
            note_file_name(&note, FileNameFormat::UpdatedAt, utc_now()),
            "2024-11-12-13-5.md"
        );
    }

    #[test]
    fn timestamp_format_uses_offset_of_now() {
        let now = DateTime::parse_from_rfc3339("2024-03-09T08:05:00+09:00").unwrap();
        let note = RemoteNote::new("abc", "body").with_timestamps(1_704_164_640, 1_704_164_640);
        assert_eq!(
            note_file_name(&note, FileNameFormat::CreatedAt, now),
            "2024-1-2-12-4.md"
        );
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let note = RemoteNote::new("abc", "body");
        assert_eq!(
            note_file_name(&note, FileNameFormat::UpdatedAt, utc_now()),
            "2024-3-9-8-5.md"
        );
    }

    #[test]
    fn title_format_is_verbatim() {
        let mut note = RemoteNote::new("abc", "body");
        note.title = "What? A/B: test".to_string();
        assert_eq!(
            note_file_name(&note, FileNameFormat::Title, utc_now()),
            "What? A/B: test.md"
        );
    }

    #[test]
    fn file_name_is_deterministic() {
        let note = RemoteNote::new("abc", "body").with_timestamps(1, 2);
        for format in [
            FileNameFormat::Id,
            FileNameFormat::CreatedAt,
            FileNameFormat::UpdatedAt,
            FileNameFormat::Title,
        ] {
            assert_eq!(
                note_file_name(&note, format, utc_now()),
                note_file_name(&note, format, utc_now())
            );
        }
    }

    #[test]
    fn archived_notes_are_dropped_but_attachments_kept() {
        let snapshot = RemoteSnapshot {
            notes: vec![
                RemoteNote::new("live", "keep me"),
                RemoteNote::new("old", "archived").archived(),
            ],
            attachments: vec![
                RemoteAttachment::new("pic.png", vec![1, 2, 3]),
                RemoteAttachment::unavailable("sub/dir/broken.png"),
            ],
        };

        let normalized =
            normalize_snapshot(&snapshot, &config(FileNameFormat::Id), utc_now(), &BodyRenderer);

        assert_eq!(paths(&normalized.notes), vec!["Memos Sync/memos/live.md"]);
        assert_eq!(
            normalized.notes[0].content.as_deref(),
            Some("keep me".as_bytes())
        );
        assert_eq!(
            paths(&normalized.attachments),
            vec![
                "Memos Sync/resources/pic.png",
                "Memos Sync/resources/sub/dir/broken.png"
            ]
        );
        assert_eq!(normalized.attachments[1].content, None);
    }

    #[test]
    fn attachments_without_a_file_name_are_skipped() {
        let snapshot = RemoteSnapshot {
            notes: Vec::new(),
            attachments: vec![
                RemoteAttachment::new("", vec![1]),
                RemoteAttachment::new("/", vec![2]),
                RemoteAttachment::new(" // ", vec![3]),
                RemoteAttachment::new("/ok.png", vec![4]),
            ],
        };

        let normalized =
            normalize_snapshot(&snapshot, &config(FileNameFormat::Id), utc_now(), &BodyRenderer);

        assert_eq!(
            paths(&normalized.attachments),
            vec!["Memos Sync/resources/ok.png"]
        );
    }

    #[test]
    fn note_entries_carry_remote_update_time() {
        let snapshot = RemoteSnapshot {
            notes: vec![RemoteNote::new("abc", "body").with_timestamps(10, 1_700_000_000)],
            attachments: Vec::new(),
        };
        let normalized =
            normalize_snapshot(&snapshot, &config(FileNameFormat::Id), utc_now(), &BodyRenderer);
        assert_eq!(normalized.notes[0].remote_updated_at, Some(1_700_000_000));
    }

    #[test]
    fn normalization_is_deterministic() {
        let snapshot = RemoteSnapshot {
            notes: vec![
                RemoteNote::new("b", "two"),
                RemoteNote::new("a", "one"),
            ],
            attachments: vec![RemoteAttachment::new("x.bin", vec![0])],
        };
        let config = config(FileNameFormat::Id);
        assert_eq!(
            normalize_snapshot(&snapshot, &config, utc_now(), &BodyRenderer),
            normalize_snapshot(&snapshot, &config, utc_now(), &BodyRenderer)
        );
    }
}
