use std::sync::Arc;

use memos_sync_core::sync::LogNotifier;
use memos_sync_core::{SettingsStore, SyncConfig, SyncScheduler};

use crate::commands::common::CliRunner;
use crate::error::CliError;

pub async fn run_watch(runner: CliRunner<LogNotifier>) -> Result<(), CliError> {
    let settings = runner.store().load().await?;
    let config = SyncConfig::from_settings(&settings)?;
    let interval = config.interval().ok_or(CliError::IntervalDisabled)?;

    let runner = Arc::new(runner);
    let scheduler = SyncScheduler::start(Arc::clone(&runner), Some(interval));
    scheduler.trigger();
    println!(
        "Syncing every {} minutes into {} ({}). Press Ctrl-C to stop.",
        settings.interval,
        runner.fs().root().display(),
        config.folder()
    );

    tokio::signal::ctrl_c().await?;
    scheduler.shutdown();
    scheduler.join().await;
    println!("Stopped");
    Ok(())
}
