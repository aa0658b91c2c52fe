use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use memos_sync_core::executor::CollectionReport;
use memos_sync_core::reconcile::{CollectionPlan, SkipReason};
use memos_sync_core::render::{BodyRenderer, FrontmatterRenderer, NoteRenderer};
use memos_sync_core::{
    JsonSettingsStore, LocalFilesystem, MemosClient, ReconciliationPlan, SyncEvent, SyncNotifier,
    SyncReport, SyncRunner,
};
use serde::Serialize;

use crate::error::CliError;

const SETTINGS_DIR_NAME: &str = "memos-sync";
const SETTINGS_FILE_NAME: &str = "settings.json";

pub type CliRunner<N = ConsoleNotifier> = SyncRunner<LocalFilesystem, MemosClient, JsonSettingsStore, N>;

pub fn default_settings_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
        .ok_or_else(|| {
            CliError::Config("Failed to resolve the user config directory".to_string())
        })
}

pub fn resolve_settings_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    explicit.map_or_else(default_settings_path, Ok)
}

pub fn resolve_vault(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

pub fn build_runner<N: SyncNotifier>(
    settings_path: &Path,
    vault: &Path,
    frontmatter: bool,
    notifier: N,
) -> Result<CliRunner<N>, CliError> {
    let renderer: Arc<dyn NoteRenderer + Send + Sync> = if frontmatter {
        Arc::new(FrontmatterRenderer)
    } else {
        Arc::new(BodyRenderer)
    };

    Ok(SyncRunner::new(
        LocalFilesystem::new(vault),
        MemosClient::new()?,
        JsonSettingsStore::new(settings_path),
        notifier,
    )
    .with_renderer(renderer))
}

/// Prints run events to stderr so JSON output on stdout stays clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl SyncNotifier for ConsoleNotifier {
    fn notify(&self, event: &SyncEvent) {
        eprintln!("{}", event.message());
    }
}

pub fn format_watermark(millis: Option<i64>) -> String {
    millis
        .and_then(|millis| Local.timestamp_millis_opt(millis).single())
        .map_or_else(
            || "never".to_string(),
            |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
}

const fn skip_reason_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::UnchangedSinceWatermark => "unchanged since last sync",
        SkipReason::AlreadyPresent => "already present",
        SkipReason::ContentUnavailable => "download failed",
    }
}

pub fn format_plan_lines(plan: &ReconciliationPlan) -> Vec<String> {
    let mut lines = Vec::new();
    for collection in [&plan.notes, &plan.attachments] {
        lines.push(format!(
            "{} ({}): {} to write, {} skipped, {} to delete",
            collection.collection.label(),
            collection.root,
            collection.writes.len(),
            collection.skipped_writes.len(),
            collection.deletes.len()
        ));
        for dir in &collection.create_dirs {
            lines.push(format!("  mkdir  {dir}"));
        }
        for path in collection.write_paths() {
            lines.push(format!("  write  {path}"));
        }
        for skipped in &collection.skipped_writes {
            lines.push(format!(
                "  skip   {} ({})",
                skipped.path,
                skip_reason_label(skipped.reason)
            ));
        }
        for path in &collection.deletes {
            lines.push(format!("  delete {path}"));
        }
    }
    if plan.is_noop() {
        lines.push("Nothing to do.".to_string());
    }
    lines
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();
    for collection in [&report.execution.notes, &report.execution.attachments] {
        lines.push(report_summary(collection));
        for failure in &collection.failures {
            lines.push(format!(
                "  failed {:?} {}: {}",
                failure.operation, failure.path, failure.error
            ));
        }
    }
    lines.push(format!(
        "Last sync: {}",
        format_watermark(Some(report.synced_at))
    ));
    lines
}

fn report_summary(report: &CollectionReport) -> String {
    format!(
        "{}: {} written, {} skipped, {} deleted, {} failed",
        report.collection.label(),
        report.written.len(),
        report.skipped,
        report.deleted.len(),
        report.failures.len()
    )
}

/// JSON shape of a dry-run plan. Contents are omitted.
#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    pub notes: CollectionSummary<'a>,
    pub attachments: CollectionSummary<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary<'a> {
    pub root: &'a str,
    pub create_dirs: &'a [String],
    pub writes: Vec<&'a str>,
    pub skipped: Vec<SkippedSummary<'a>>,
    pub deletes: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct SkippedSummary<'a> {
    pub path: &'a str,
    pub reason: SkipReason,
}

impl<'a> From<&'a ReconciliationPlan> for PlanSummary<'a> {
    fn from(plan: &'a ReconciliationPlan) -> Self {
        Self {
            notes: CollectionSummary::from(&plan.notes),
            attachments: CollectionSummary::from(&plan.attachments),
        }
    }
}

impl<'a> From<&'a CollectionPlan> for CollectionSummary<'a> {
    fn from(plan: &'a CollectionPlan) -> Self {
        Self {
            root: &plan.root,
            create_dirs: &plan.create_dirs,
            writes: plan.write_paths().collect(),
            skipped: plan
                .skipped_writes
                .iter()
                .map(|skipped| SkippedSummary {
                    path: &skipped.path,
                    reason: skipped.reason,
                })
                .collect(),
            deletes: &plan.deletes,
        }
    }
}
