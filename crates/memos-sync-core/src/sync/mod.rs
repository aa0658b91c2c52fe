//! One sync run: settings, fetch, normalize, scan, reconcile, execute.

mod notify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::config::{Credentials, SettingsStore, SyncConfig};
use crate::error::{Error, Result};
use crate::executor::{execute_plan, ExecutionReport};
use crate::fs::{scan_collection, FilesystemCapability};
use crate::normalize::normalize_snapshot;
use crate::reconcile::{reconcile, ReconciliationPlan};
use crate::remote::{fetch_snapshot, RemoteCapability};
use crate::render::{FrontmatterRenderer, NoteRenderer};
use crate::state::SyncState;
use crate::util::unix_millis_now;

pub use notify::{LogNotifier, SyncEvent, SyncNotifier};

/// Default bound on listing the remote memos and resources.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on downloading a single resource.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Watermark persisted by this run (Unix ms)
    pub synced_at: i64,
    pub execution: ExecutionReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another run held the runner; nothing was done.
    AlreadyRunning,
}

/// Drives sync runs against a vault.
///
/// At most one run is active at a time; concurrent calls to [`Self::run`]
/// return [`SyncOutcome::AlreadyRunning`] immediately.
pub struct SyncRunner<F, R, S, N> {
    fs: F,
    remote: R,
    store: S,
    notifier: N,
    renderer: Arc<dyn NoteRenderer + Send + Sync>,
    fetch_timeout: Duration,
    download_timeout: Duration,
    running: AtomicBool,
    state: Mutex<SyncState>,
}

impl<F, R, S, N> SyncRunner<F, R, S, N>
where
    F: FilesystemCapability,
    R: RemoteCapability,
    S: SettingsStore,
    N: SyncNotifier,
{
    pub fn new(fs: F, remote: R, store: S, notifier: N) -> Self {
        Self {
            fs,
            remote,
            store,
            notifier,
            renderer: Arc::new(FrontmatterRenderer),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            running: AtomicBool::new(false),
            state: Mutex::new(SyncState::Idle),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn NoteRenderer + Send + Sync>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Bound on the list calls; exceeding it fails the run.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Bound on each resource download; a slow resource is skipped.
    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub const fn fs(&self) -> &F {
        &self.fs
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full sync.
    ///
    /// Per-entry filesystem failures are reported in the returned
    /// [`SyncReport`] and do not fail the run. Configuration, settings and
    /// remote errors fail the run and leave the watermark untouched.
    pub async fn run(&self) -> Result<SyncOutcome> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("Sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        let (config, credentials) = match self.load_config().await {
            Ok(loaded) => loaded,
            Err(error) => return Err(self.fail(error)),
        };

        self.set_state(SyncState::Syncing);
        self.notifier.notify(&SyncEvent::Started);

        match self.sync(&config, &credentials).await {
            Ok(report) => {
                self.set_state(SyncState::Synced);
                self.notifier.notify(&SyncEvent::Succeeded {
                    written: report.execution.notes.written.len()
                        + report.execution.attachments.written.len(),
                    deleted: report.execution.notes.deleted.len()
                        + report.execution.attachments.deleted.len(),
                    failed: report.execution.failure_count(),
                });
                Ok(SyncOutcome::Completed(report))
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Compute the plan a run would execute without touching the vault or
    /// the persisted watermark.
    pub async fn dry_run(&self) -> Result<ReconciliationPlan> {
        let (config, credentials) = self.load_config().await?;
        self.plan(&config, &credentials).await
    }

    async fn load_config(&self) -> Result<(SyncConfig, Credentials)> {
        let settings = self.store.load().await?;
        let config = SyncConfig::from_settings(&settings)?;
        let credentials = Credentials::from_authorization(&settings.authorization)?;
        Ok((config, credentials))
    }

    async fn plan(
        &self,
        config: &SyncConfig,
        credentials: &Credentials,
    ) -> Result<ReconciliationPlan> {
        let snapshot = fetch_snapshot(
            &self.remote,
            credentials,
            self.fetch_timeout,
            self.download_timeout,
        )
        .await?;

        let now = chrono::Local::now().fixed_offset();
        let normalized = normalize_snapshot(&snapshot, config, now, self.renderer.as_ref());

        let local_notes = scan_collection(&self.fs, &config.memos_root()).await?;
        let local_attachments = scan_collection(&self.fs, &config.resources_root()).await?;

        Ok(reconcile(config, &normalized, &local_notes, &local_attachments))
    }

    async fn sync(&self, config: &SyncConfig, credentials: &Credentials) -> Result<SyncReport> {
        let synced_at = unix_millis_now();
        let plan = self.plan(config, credentials).await?;
        let execution = execute_plan(&self.fs, &plan).await;

        // Settings may have been edited while the run was in flight.
        let mut settings = self.store.load().await?;
        settings.last_sync_time = Some(synced_at);
        self.store.save(&settings).await?;

        Ok(SyncReport {
            synced_at,
            execution,
        })
    }

    fn fail(&self, error: Error) -> Error {
        tracing::error!("Sync failed: {}", error);
        self.set_state(SyncState::Failed);
        self.notifier.notify(&SyncEvent::Failed {
            error: error.to_string(),
        });
        error
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::config::Credentials;
    use crate::error::{Error, Result};
    use crate::models::RemoteSnapshot;
    use crate::remote::{RemoteCapability, RemoteListing, ResourceRef};

    use super::{SyncEvent, SyncNotifier};

    #[derive(Default)]
    pub struct FakeRemote {
        snapshot: Mutex<RemoteSnapshot>,
        failure: Option<String>,
        delay: Option<Duration>,
        download_delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeRemote {
        pub fn new(snapshot: RemoteSnapshot) -> Self {
            Self {
                snapshot: Mutex::new(snapshot),
                ..Self::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::default()
            }
        }

        /// Delay every list call.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Delay every resource download.
        pub fn with_download_delay(mut self, delay: Duration) -> Self {
            self.download_delay = Some(delay);
            self
        }

        pub fn set_snapshot(&self, snapshot: RemoteSnapshot) {
            *self.snapshot.lock().unwrap() = snapshot;
        }

        /// Number of list calls.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RemoteCapability for FakeRemote {
        async fn list(&self, _credentials: &Credentials) -> Result<RemoteListing> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.failure {
                return Err(Error::Remote(message.clone()));
            }
            let snapshot = self.snapshot.lock().unwrap().clone();
            Ok(RemoteListing {
                notes: snapshot.notes,
                resources: snapshot
                    .attachments
                    .into_iter()
                    .map(|attachment| ResourceRef {
                        id: attachment.filename.clone(),
                        filename: attachment.filename,
                        external_link: None,
                        memo_id: attachment.note_id,
                    })
                    .collect(),
            })
        }

        async fn download(
            &self,
            _credentials: &Credentials,
            resource: &ResourceRef,
        ) -> Result<Vec<u8>> {
            if let Some(delay) = self.download_delay {
                tokio::time::sleep(delay).await;
            }
            self.snapshot
                .lock()
                .unwrap()
                .attachments
                .iter()
                .find(|attachment| attachment.filename == resource.id)
                .and_then(|attachment| attachment.content.clone())
                .ok_or_else(|| Error::Remote(format!("resource {} not found (404)", resource.id)))
        }
    }

    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<SyncEvent>>,
    }

    impl RecordingNotifier {
        pub fn events(&self) -> Vec<SyncEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SyncNotifier for RecordingNotifier {
        fn notify(&self, event: &SyncEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
