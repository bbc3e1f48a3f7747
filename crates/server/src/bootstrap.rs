use std::sync::Arc;
use std::time::Duration;

use bookclub_core::config::{AppConfig, ConfigError, LoadOptions};
use bookclub_db::{connect_with_settings, migrations, DbPool, RepositorySet};
use bookclub_runtime::{BookClubService, PhaseScheduler, TracingAuditSink};
use bookclub_slack::SlackWebClient;
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<BookClubService>,
    pub scheduler: Arc<PhaseScheduler>,
}

impl Application {
    pub fn app_state(&self) -> AppState {
        AppState::new(self.service.clone(), self.scheduler.clone())
    }

    pub fn health_state(&self) -> HealthState {
        HealthState {
            db_pool: self.db_pool.clone(),
            service: self.service.clone(),
            scheduler_mode: self.config.scheduler.mode,
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = SlackWebClient::new(
        config.slack.bot_token.clone(),
        config.slack.notification_channel.clone(),
    );
    let service = Arc::new(BookClubService::new(
        RepositorySet::sql(db_pool.clone()),
        Arc::new(notifier),
        Arc::new(TracingAuditSink),
        config.phases,
    ));
    let scheduler = Arc::new(PhaseScheduler::new(
        service.clone(),
        Duration::from_secs(config.scheduler.check_interval_secs),
    ));

    Ok(Application { config, db_pool, service, scheduler })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use bookclub_core::audit::AuditContext;
    use bookclub_core::config::{ConfigOverrides, LoadOptions, SchedulerMode};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_with_an_app_level_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_owned()),
                slack_bot_token: Some("xapp-not-a-bot-token".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_schema_service_and_scheduler() {
        let dir = tempfile::tempdir().expect("temp dir");
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("bookclub.db").display());
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url),
                slack_bot_token: Some("xoxb-test".to_owned()),
                scheduler_mode: Some(SchedulerMode::External),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('cycles', 'suggestions', 'votes', 'ratings')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema should be queryable after bootstrap");
        assert_eq!(table_count, 4);
        assert_eq!(app.health_state().scheduler_mode, SchedulerMode::External);

        let cycle = app
            .service
            .start_cycle("Bootstrap", None, Utc::now(), &AuditContext::new("req-boot", "U1"))
            .await
            .expect("start cycle");
        assert_eq!(cycle.phase_durations, app.config.phases);

        let report = app.scheduler.run_once().await.expect("check pass");
        assert_eq!((report.checked, report.skipped), (1, 1));

        app.db_pool.close().await;
    }
}
