//! One-shot phase check for deployments that drive deadlines from cron
//! instead of the server's in-process interval loop.

use std::sync::Arc;
use std::time::Duration;

use bookclub_db::{migrations, RepositorySet};
use bookclub_runtime::{BookClubService, CheckReport, PhaseScheduler, TracingAuditSink};
use bookclub_slack::SlackWebClient;

use crate::commands::{build_runtime, connect, load_config, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("check-phases") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("check-phases") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result: Result<CheckReport, StepFailure> = runtime.block_on(async {
        let pool = connect(&config).await?;
        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(("migration", error.to_string(), 5));
        }

        let notifier = SlackWebClient::new(
            config.slack.bot_token.clone(),
            config.slack.notification_channel.clone(),
        );
        let service = Arc::new(BookClubService::new(
            RepositorySet::sql(pool.clone()),
            Arc::new(notifier),
            Arc::new(TracingAuditSink),
            config.phases,
        ));
        let scheduler =
            PhaseScheduler::new(service, Duration::from_secs(config.scheduler.check_interval_secs));

        let report = scheduler.run_once().await;
        pool.close().await;
        report.map_err(|error| ("phase_check", error.to_string(), 6))
    });

    match result {
        Ok(report) if report.failed > 0 => {
            CommandResult::failure("check-phases", "phase_check_partial", summarize(&report), 7)
        }
        Ok(report) => CommandResult::success("check-phases", summarize(&report)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("check-phases", error_class, message, exit_code)
        }
    }
}

fn summarize(report: &CheckReport) -> String {
    format!(
        "{}: checked {}, advanced {}, skipped {}, awaiting completion {}, failed {}, notification failures {}",
        report.correlation_id,
        report.checked,
        report.advanced,
        report.skipped,
        report.awaiting_completion,
        report.failed,
        report.notification_failures
    )
}
