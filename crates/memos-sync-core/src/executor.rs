//! Executing a reconciliation plan.
//!
//! Every filesystem operation yields its own `Result`. Failures are logged
//! and collected in the report; they never stop the rest of the batch or the
//! other collection.

use futures_util::future::join_all;
use serde::Serialize;

use crate::fs::FilesystemCapability;
use crate::reconcile::{Collection, CollectionPlan, PlannedWrite, ReconciliationPlan};

/// Kind of filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateFolder,
    Write,
    Delete,
}

/// One failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    pub path: String,
    pub operation: Operation,
    pub error: String,
}

/// Outcome of executing one collection plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub collection: Collection,
    pub created_dirs: Vec<String>,
    pub written: Vec<String>,
    pub skipped: usize,
    pub deleted: Vec<String>,
    pub failures: Vec<EntryFailure>,
}

impl CollectionReport {
    const fn new(collection: Collection, skipped: usize) -> Self {
        Self {
            collection,
            created_dirs: Vec::new(),
            written: Vec::new(),
            skipped,
            deleted: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Outcome of executing both collection plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub notes: CollectionReport,
    pub attachments: CollectionReport,
}

impl ExecutionReport {
    pub fn failure_count(&self) -> usize {
        self.notes.failures.len() + self.attachments.failures.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryFailure> {
        self.notes.failures.iter().chain(&self.attachments.failures)
    }
}

/// Execute both collection plans.
pub async fn execute_plan<F: FilesystemCapability>(
    fs: &F,
    plan: &ReconciliationPlan,
) -> ExecutionReport {
    let notes = execute_collection(fs, &plan.notes).await;
    let attachments = execute_collection(fs, &plan.attachments).await;
    ExecutionReport { notes, attachments }
}

/// Execute a single collection plan.
///
/// Directories are created first, in order. Writes and deletes then run
/// concurrently with no ordering between them.
pub async fn execute_collection<F: FilesystemCapability>(
    fs: &F,
    plan: &CollectionPlan,
) -> CollectionReport {
    let mut report = CollectionReport::new(plan.collection, plan.skipped_writes.len());

    for dir in &plan.create_dirs {
        let result = match fs.exists(dir).await {
            Ok(true) => continue,
            Ok(false) => fs.create_folder(dir).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(()) => report.created_dirs.push(dir.clone()),
            Err(error) => record_failure(&mut report, dir, Operation::CreateFolder, &error),
        }
    }

    let writes = join_all(
        plan.writes
            .iter()
            .map(|write| write_entry(fs, plan.collection, write)),
    );
    let deletes = join_all(plan.deletes.iter().map(|path| fs.remove(path)));
    let (write_results, delete_results) = futures_util::join!(writes, deletes);

    for (write, result) in plan.writes.iter().zip(write_results) {
        match result {
            Ok(()) => report.written.push(write.path.clone()),
            Err(error) => record_failure(&mut report, &write.path, Operation::Write, &error),
        }
    }
    for (path, result) in plan.deletes.iter().zip(delete_results) {
        match result {
            Ok(()) => report.deleted.push(path.clone()),
            Err(error) => record_failure(&mut report, path, Operation::Delete, &error),
        }
    }

    tracing::info!(
        "Synced {}: {} written, {} skipped, {} deleted, {} failed",
        plan.collection.label(),
        report.written.len(),
        report.skipped,
        report.deleted.len(),
        report.failures.len()
    );
    report
}

async fn write_entry<F: FilesystemCapability>(
    fs: &F,
    collection: Collection,
    write: &PlannedWrite,
) -> crate::Result<()> {
    match (collection, std::str::from_utf8(&write.content)) {
        (Collection::Notes, Ok(text)) => fs.write(&write.path, text).await,
        _ => fs.write_binary(&write.path, &write.content).await,
    }
}

fn record_failure(
    report: &mut CollectionReport,
    path: &str,
    operation: Operation,
    error: &crate::Error,
) {
    tracing::warn!("Failed to {:?} {}: {}", operation, path, error);
    report.failures.push(EntryFailure {
        path: path.to_string(),
        operation,
        error: error.to_string(),
    });
}
