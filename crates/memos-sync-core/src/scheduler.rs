//! Periodic sync driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SettingsStore;
use crate::fs::FilesystemCapability;
use crate::remote::RemoteCapability;
use crate::sync::{SyncNotifier, SyncOutcome, SyncRunner};

/// How often the stored interval is checked for changes.
pub const DEFAULT_SETTINGS_POLL: Duration = Duration::from_secs(5);

const QUEUE_CAPACITY: usize = 16;

/// Messages to control the scheduler loop
#[derive(Debug)]
enum SchedulerMessage {
    /// Run now, independent of the timer
    Trigger,
    /// Replace the interval and re-arm the timer
    SetInterval(Option<Duration>),
}

/// Handle for a running scheduler task.
///
/// The timer is re-armed as soon as the interval stored in the settings
/// changes, without waiting for the pending tick.
pub struct SyncScheduler {
    sender: mpsc::Sender<SchedulerMessage>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the scheduler loop.
    ///
    /// With `interval = None` the loop only runs on [`Self::trigger`] until
    /// an interval is stored in the settings.
    pub fn start<F, R, S, N>(
        runner: Arc<SyncRunner<F, R, S, N>>,
        interval: Option<Duration>,
    ) -> Self
    where
        F: FilesystemCapability + 'static,
        R: RemoteCapability + 'static,
        S: SettingsStore + 'static,
        N: SyncNotifier + 'static,
    {
        Self::start_with_settings_poll(runner, interval, DEFAULT_SETTINGS_POLL)
    }

    /// Like [`Self::start`], checking the stored interval every `settings_poll`.
    pub fn start_with_settings_poll<F, R, S, N>(
        runner: Arc<SyncRunner<F, R, S, N>>,
        interval: Option<Duration>,
        settings_poll: Duration,
    ) -> Self
    where
        F: FilesystemCapability + 'static,
        R: RemoteCapability + 'static,
        S: SettingsStore + 'static,
        N: SyncNotifier + 'static,
    {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler_loop(
            runner,
            interval,
            settings_poll,
            receiver,
            shutdown_rx,
        ));
        Self {
            sender,
            shutdown,
            handle,
        }
    }

    /// Request an immediate run.
    pub fn trigger(&self) {
        self.send(SchedulerMessage::Trigger);
    }

    /// Cancel the pending tick and re-arm with `interval`.
    pub fn set_interval(&self, interval: Option<Duration>) {
        self.send(SchedulerMessage::SetInterval(interval));
    }

    /// Stop the loop once the current run, if any, finishes.
    ///
    /// Never blocked by queued triggers.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let Self {
            sender,
            shutdown,
            handle,
        } = self;
        drop(sender);
        if let Err(error) = handle.await {
            tracing::error!("Sync scheduler task failed: {}", error);
        }
        drop(shutdown);
    }

    fn send(&self, message: SchedulerMessage) {
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!("Sync scheduler queue is full, dropping {:?}", message);
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::debug!("Sync scheduler stopped, dropping {:?}", message);
            }
        }
    }
}

async fn scheduler_loop<F, R, S, N>(
    runner: Arc<SyncRunner<F, R, S, N>>,
    mut interval: Option<Duration>,
    settings_poll: Duration,
    mut receiver: mpsc::Receiver<SchedulerMessage>,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FilesystemCapability,
    R: RemoteCapability,
    S: SettingsStore,
    N: SyncNotifier,
{
    // Only changes to the persisted interval override the current one.
    let mut persisted = load_interval(&runner).await.unwrap_or(interval);
    let mut deadline = next_deadline(interval);
    let mut poll = tokio::time::interval_at(Instant::now() + settings_poll, settings_poll);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!("Sync scheduler started (interval: {:?})", interval);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let tick = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            message = receiver.recv() => match message {
                Some(SchedulerMessage::Trigger) => {
                    run_once(&runner).await;
                    deadline = next_deadline(interval);
                }
                Some(SchedulerMessage::SetInterval(next)) => {
                    tracing::info!("Sync interval set to {:?}", next);
                    interval = next;
                    deadline = next_deadline(interval);
                }
                None => break,
            },
            () = tick => {
                run_once(&runner).await;
                deadline = next_deadline(interval);
            }
            _ = poll.tick() => {
                let latest = load_interval(&runner).await;
                if let Some(latest) = latest.filter(|latest| *latest != persisted) {
                    tracing::info!("Sync interval changed to {:?}", latest);
                    persisted = latest;
                    interval = latest;
                    deadline = next_deadline(interval);
                }
            }
        }
    }

    tracing::info!("Sync scheduler stopped");
}

fn next_deadline(interval: Option<Duration>) -> Option<Instant> {
    interval.map(|period| Instant::now() + period)
}

async fn run_once<F, R, S, N>(runner: &SyncRunner<F, R, S, N>)
where
    F: FilesystemCapability,
    R: RemoteCapability,
    S: SettingsStore,
    N: SyncNotifier,
{
    match runner.run().await {
        Ok(SyncOutcome::Completed(report)) => tracing::debug!(
            "Scheduled sync finished with {} failed entries",
            report.execution.failure_count()
        ),
        Ok(SyncOutcome::AlreadyRunning) => {}
        Err(error) => tracing::debug!("Scheduled sync failed: {}", error),
    }
}

/// Stored interval, or `None` when the settings cannot be read.
async fn load_interval<F, R, S, N>(runner: &SyncRunner<F, R, S, N>) -> Option<Option<Duration>>
where
    F: FilesystemCapability,
    R: RemoteCapability,
    S: SettingsStore,
    N: SyncNotifier,
{
    match runner.store().load().await {
        Ok(settings) => Some(settings.sync_interval()),
        Err(error) => {
            tracing::warn!("Failed to reload sync interval: {}", error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySettingsStore;
    use crate::fs::MemoryFilesystem;
    use crate::models::{Authorization, RemoteNote, RemoteSnapshot, SyncSettings};
    use crate::sync::fakes::{FakeRemote, RecordingNotifier};
    use crate::sync::SyncEvent;

    type TestRunner =
        SyncRunner<MemoryFilesystem, FakeRemote, MemorySettingsStore, RecordingNotifier>;

    fn runner_with_interval(minutes: u32) -> Arc<TestRunner> {
        let settings = SyncSettings {
            authorization: Authorization {
                base_url: "https://memos.example.com".to_string(),
                access_token: Some("token".to_string()),
                open_id: None,
            },
            interval: minutes,
            ..SyncSettings::default()
        };
        let snapshot = RemoteSnapshot {
            notes: vec![RemoteNote::new("abc", "hello")],
            attachments: Vec::new(),
        };
        Arc::new(SyncRunner::new(
            MemoryFilesystem::new(),
            FakeRemote::new(snapshot),
            MemorySettingsStore::new(settings),
            RecordingNotifier::default(),
        ))
    }

    fn runner() -> Arc<TestRunner> {
        runner_with_interval(0)
    }

    async fn store_interval(runner: &TestRunner, minutes: u32) {
        let mut settings = runner.store().snapshot();
        settings.interval = minutes;
        runner.store().save(&settings).await.unwrap();
    }

    #[tokio::test]
    async fn trigger_runs_once_without_interval() {
        let runner = runner();
        let scheduler = SyncScheduler::start(Arc::clone(&runner), None);

        scheduler.trigger();
        tokio::time::timeout(Duration::from_secs(3), async {
            while runner.store().snapshot().last_sync_time.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        scheduler.shutdown();
        scheduler.join().await;

        assert_eq!(runner.fs().file_paths(), vec!["Memos Sync/memos/abc.md"]);
        assert_eq!(runner.notifier().events().len(), 2);
    }

    #[tokio::test]
    async fn interval_ticks_until_disabled() {
        let runner = runner();
        let scheduler =
            SyncScheduler::start(Arc::clone(&runner), Some(Duration::from_millis(10)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.set_interval(None);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let runs = runner.notifier().events().len();
        assert!(runs >= 4, "expected several runs, saw {runs} events");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.notifier().events().len(), runs);

        scheduler.shutdown();
        scheduler.join().await;
    }

    #[tokio::test]
    async fn shutdown_is_not_lost_when_queue_is_full() {
        let runner = runner();
        let scheduler = SyncScheduler::start(Arc::clone(&runner), None);

        for _ in 0..20 {
            scheduler.trigger();
        }
        scheduler.shutdown();

        let joined = tokio::time::timeout(Duration::from_secs(3), scheduler.join()).await;
        assert!(joined.is_ok(), "scheduler did not stop");
    }

    #[tokio::test]
    async fn join_stops_the_loop_without_shutdown() {
        let runner = runner();
        let scheduler =
            SyncScheduler::start(Arc::clone(&runner), Some(Duration::from_secs(3600)));

        let joined = tokio::time::timeout(Duration::from_secs(3), scheduler.join()).await;
        assert!(joined.is_ok(), "scheduler did not stop");
    }

    #[tokio::test(start_paused = true)]
    async fn stored_interval_change_rearms_the_pending_tick() {
        let runner = runner_with_interval(120);
        let scheduler = SyncScheduler::start_with_settings_poll(
            Arc::clone(&runner),
            Some(Duration::from_secs(120 * 60)),
            Duration::from_secs(1),
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(runner.notifier().events().is_empty());

        store_interval(&runner, 5).await;
        tokio::time::sleep(Duration::from_secs(7 * 60)).await;

        assert!(runner.store().snapshot().last_sync_time.is_some());
        assert!(matches!(
            runner.notifier().events().as_slice(),
            [SyncEvent::Started, SyncEvent::Succeeded { .. }]
        ));

        scheduler.shutdown();
        scheduler.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stored_interval_disabled_cancels_the_pending_tick() {
        let runner = runner_with_interval(5);
        let scheduler = SyncScheduler::start_with_settings_poll(
            Arc::clone(&runner),
            Some(Duration::from_secs(5 * 60)),
            Duration::from_secs(1),
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        store_interval(&runner, 0).await;
        tokio::time::sleep(Duration::from_secs(30 * 60)).await;

        assert!(runner.notifier().events().is_empty());
        assert_eq!(runner.store().snapshot().last_sync_time, None);

        scheduler.shutdown();
        scheduler.join().await;
    }
}
