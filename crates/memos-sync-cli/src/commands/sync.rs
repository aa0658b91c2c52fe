use memos_sync_core::SyncOutcome;

use crate::commands::common::{format_plan_lines, format_report_lines, CliRunner, PlanSummary};
use crate::error::CliError;

pub async fn run_sync(runner: &CliRunner, dry_run: bool, as_json: bool) -> Result<(), CliError> {
    if dry_run {
        let plan = runner.dry_run().await?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&PlanSummary::from(&plan))?);
        } else {
            for line in format_plan_lines(&plan) {
                println!("{line}");
            }
        }
        return Ok(());
    }

    match runner.run().await? {
        SyncOutcome::AlreadyRunning => println!("A sync is already running"),
        SyncOutcome::Completed(report) if as_json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SyncOutcome::Completed(report) => {
            for line in format_report_lines(&report) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
