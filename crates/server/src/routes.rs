use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use bookclub_runtime::{BookClubService, CheckReport, PhaseScheduler};
use bookclub_slack::blocks::{self, SlashCommandResponse};
use bookclub_slack::commands::{
    normalize_bookclub_command, CommandRouteError, CommandRouter, SlashCommandPayload,
};

use crate::commands::ServiceCommandAdapter;
use crate::health::{self, HealthState};

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<CommandRouter<ServiceCommandAdapter>>,
    pub scheduler: Arc<PhaseScheduler>,
}

impl AppState {
    pub fn new(service: Arc<BookClubService>, scheduler: Arc<PhaseScheduler>) -> Self {
        Self {
            commands: Arc::new(CommandRouter::new(ServiceCommandAdapter::new(service))),
            scheduler,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub error: String,
}

pub fn router(state: AppState, health_state: HealthState) -> Router {
    Router::new()
        .route("/slack/commands", post(slack_command))
        .route("/cron/check-phases", post(check_phases))
        .with_state(state)
        .merge(health::router(health_state))
}

/// Slack shows whatever we return with a 200, so failures become messages.
pub async fn slack_command(
    State(state): State<AppState>,
    Form(mut payload): Form<SlashCommandPayload>,
) -> Json<SlashCommandResponse> {
    let request_id = format!("req-{}", Uuid::new_v4());
    payload.request_id = request_id.clone();

    let envelope = match normalize_bookclub_command(payload) {
        Ok(envelope) => envelope,
        Err(parse_error) => {
            warn!(
                event_name = "ingress.slack.command_rejected",
                correlation_id = %request_id,
                error = %parse_error,
                "slash command rejected"
            );
            return Json(blocks::error_message(&parse_error.to_string(), &request_id).into());
        }
    };

    info!(
        event_name = "ingress.slack.command_received",
        correlation_id = %request_id,
        verb = %envelope.verb,
        user_id = %envelope.user_id,
        channel_id = %envelope.channel_id,
        "slash command received"
    );

    let message = match state.commands.route(envelope).await {
        Ok(message) => message,
        Err(CommandRouteError::Service(summary)) => blocks::error_message(&summary, &request_id),
    };
    Json(message.into())
}

pub async fn check_phases(
    State(state): State<AppState>,
) -> Result<Json<CheckReport>, (StatusCode, Json<CheckFailure>)> {
    match state.scheduler.run_once().await {
        Ok(report) => Ok(Json(report)),
        Err(failure) => {
            error!(
                event_name = "scheduler.check.failed",
                correlation_id = "cron",
                error = %failure,
                "phase check triggered over http failed"
            );
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(CheckFailure { error: failure.to_string() }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use bookclub_core::audit::InMemoryAuditSink;
    use bookclub_core::config::SchedulerMode;
    use bookclub_core::notify::InMemoryNotifier;
    use bookclub_core::phases::PhaseDurations;
    use bookclub_db::{connect_with_settings, RepositorySet};
    use bookclub_runtime::{BookClubService, PhaseScheduler};

    use super::{router, AppState};
    use crate::health::HealthState;

    async fn app() -> (axum::Router, InMemoryNotifier) {
        let notifier = InMemoryNotifier::default();
        let service = Arc::new(BookClubService::new(
            RepositorySet::in_memory(),
            Arc::new(notifier.clone()),
            Arc::new(InMemoryAuditSink::default()),
            PhaseDurations::default(),
        ));
        let scheduler = Arc::new(PhaseScheduler::new(service.clone(), Duration::from_secs(60)));
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let health = HealthState {
            db_pool: pool,
            service: service.clone(),
            scheduler_mode: SchedulerMode::External,
        };
        (router(AppState::new(service, scheduler), health), notifier)
    }

    async fn command(app: &axum::Router, text: &str, user: &str) -> Value {
        let body = format!(
            "command=%2Fbookclub&text={}&user_id={user}&channel_id=C1&trigger_id=t1",
            text.replace(' ', "+").replace('|', "%7C")
        );
        let response = app
            .clone()
            .oneshot(
                Request::post("/slack/commands")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn slash_commands_drive_a_cycle_through_voting() {
        let (app, notifier) = app().await;

        let started = command(&app, "start Autumn reads", "U1").await;
        assert_eq!(started["response_type"], "ephemeral");
        assert!(started["text"].as_str().unwrap_or_default().contains("Autumn reads"));

        command(&app, "suggest Dune | Frank Herbert", "U1").await;
        command(&app, "suggest Emma | Jane Austen", "U2").await;
        let listing = command(&app, "suggestions", "U3").await;
        let listed = listing["blocks"][0]["text"]["text"].as_str().unwrap_or_default().to_owned();
        assert!(listed.contains("*1.* *Dune*"));
        assert!(!listed.contains("U1"));

        command(&app, "advance", "U1").await;
        let ballot = command(&app, "vote 2 1", "U3").await;
        assert_eq!(ballot["text"], "Your ballot was recorded");
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn service_errors_come_back_as_messages_with_the_request_id() {
        let (app, _) = app().await;

        let reply = command(&app, "vote 1", "U1").await;
        let summary = reply["text"].as_str().unwrap_or_default();
        assert!(summary.contains("No active cycle"), "unexpected reply: {summary}");
        let context = reply["blocks"][1]["elements"][0]["text"].as_str().unwrap_or_default();
        assert!(context.starts_with("Correlation ID: req-"));
    }

    #[tokio::test]
    async fn unknown_slash_command_is_refused_politely() {
        let (app, _) = app().await;
        let response = app
            .oneshot(
                Request::post("/slack/commands")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("command=%2Fweather&text=today&user_id=U1"))
                    .expect("request"),
            )
            .await
            .expect("response");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let reply: Value = serde_json::from_slice(&bytes).expect("json");

        assert!(reply["text"].as_str().unwrap_or_default().contains("/weather"));
    }

    #[tokio::test]
    async fn cron_endpoint_returns_the_check_report() {
        let (app, _) = app().await;
        command(&app, "start Autumn reads", "U1").await;

        let response = app
            .oneshot(Request::post("/cron/check-phases").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let report: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(report["checked"], 1);
        assert_eq!(report["skipped"], 1);
        assert_eq!(report["advanced"], 0);
    }
}
