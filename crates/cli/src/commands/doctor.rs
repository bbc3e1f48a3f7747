use bookclub_core::config::{AppConfig, LoadOptions};
use bookclub_db::DbPool;
use serde::Serialize;

use crate::commands::{build_runtime, connect, CommandResult};

const SCHEMA_TABLE_COUNT: i64 = 4;
const SCHEMA_QUERY: &str = "SELECT COUNT(*) FROM sqlite_master \
     WHERE type = 'table' AND name IN ('cycles', 'suggestions', 'votes', 'ratings')";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_notification_channel(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("notification_channel"));
            checks.push(DoctorCheck::skipped("database_connectivity"));
            checks.push(DoctorCheck::skipped("database_schema"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    DoctorReport {
        overall_status: if all_pass { CheckStatus::Pass } else { CheckStatus::Fail },
        summary: if all_pass {
            "doctor: all readiness checks passed".to_string()
        } else {
            "doctor: one or more readiness checks failed".to_string()
        },
        checks,
    }
}

fn check_notification_channel(config: &AppConfig) -> DoctorCheck {
    let channel = config.slack.notification_channel.trim();
    if channel.is_empty() {
        DoctorCheck::fail("notification_channel", "slack.notification_channel is empty")
    } else {
        DoctorCheck::pass("notification_channel", format!("phase announcements go to `{channel}`"))
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match build_runtime("doctor") {
        Ok(runtime) => runtime,
        Err(_) => {
            return vec![
                DoctorCheck::fail("database_connectivity", "failed to initialize async runtime"),
                DoctorCheck::skipped("database_schema"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect(config).await {
            Ok(pool) => pool,
            Err((_, message, _)) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {message}"),
                    ),
                    DoctorCheck::fail("database_schema", "database unreachable"),
                ];
            }
        };

        let connectivity =
            DoctorCheck::pass("database_connectivity", format!("connected using `{}`", config.database.url));
        let schema = match count_schema_tables(&pool).await {
            Ok(SCHEMA_TABLE_COUNT) => {
                DoctorCheck::pass("database_schema", "cycles, suggestions, votes and ratings present")
            }
            Ok(found) => DoctorCheck::fail(
                "database_schema",
                format!("{found} of {SCHEMA_TABLE_COUNT} tables present; run `bookclub migrate`"),
            ),
            Err(error) => DoctorCheck::fail("database_schema", format!("schema query failed: {error}")),
        };
        pool.close().await;

        vec![connectivity, schema]
    })
}

async fn count_schema_tables(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(SCHEMA_QUERY).fetch_one(pool).await?;
    Ok(count)
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
