use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use bookclub_core::audit::AuditContext;
use bookclub_core::domain::suggestion::SuggestionInput;
use bookclub_core::errors::ApplicationError;
use bookclub_core::phases::Phase;
use bookclub_runtime::BookClubService;
use bookclub_slack::blocks::{self, MessageTemplate};
use bookclub_slack::commands::{BookClubCommandService, CommandEnvelope, CommandRouteError};

/// Bridges routed slash commands onto the book club service.
pub struct ServiceCommandAdapter {
    service: Arc<BookClubService>,
}

impl ServiceCommandAdapter {
    pub fn new(service: Arc<BookClubService>) -> Self {
        Self { service }
    }

    fn audit_context(envelope: &CommandEnvelope) -> AuditContext {
        AuditContext::new(envelope.request_id.clone(), envelope.user_id.clone())
    }
}

fn route_error(envelope: &CommandEnvelope, error: ApplicationError) -> CommandRouteError {
    let interface = error.into_interface(envelope.request_id.clone());
    warn!(
        event_name = "ingress.slack.command_failed",
        correlation_id = %envelope.request_id,
        verb = %envelope.verb,
        user_id = %envelope.user_id,
        error = %interface,
        "slash command failed"
    );
    CommandRouteError::Service(interface.user_message())
}

#[async_trait]
impl BookClubCommandService for ServiceCommandAdapter {
    async fn start_cycle(
        &self,
        name: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let cycle = self
            .service
            .start_cycle(&name, None, Utc::now(), &Self::audit_context(envelope))
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::cycle_started_message(&cycle))
    }

    async fn status(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        let view = self.service.status(Utc::now()).await.map_err(|error| route_error(envelope, error))?;
        Ok(blocks::status_message(&view))
    }

    async fn suggest(
        &self,
        input: SuggestionInput,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let entry = self
            .service
            .suggest_book(&envelope.user_id, input, Utc::now())
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::suggestion_added_message(&entry))
    }

    async fn list_suggestions(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let (cycle, entries) =
            self.service.list_suggestions().await.map_err(|error| route_error(envelope, error))?;
        Ok(blocks::suggestions_message(&cycle, &entries))
    }

    async fn vote(
        &self,
        positions: Vec<usize>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let receipt = self
            .service
            .cast_vote_by_position(&envelope.user_id, &positions, Utc::now())
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::vote_receipt_message(&receipt))
    }

    async fn results(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        let view = self.service.results().await.map_err(|error| route_error(envelope, error))?;
        Ok(blocks::results_message(&view))
    }

    async fn set_phase(
        &self,
        phase: Phase,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let change = self
            .service
            .set_phase(phase, Utc::now(), &Self::audit_context(envelope))
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::phase_changed_message(&change))
    }

    async fn advance(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        let change = self
            .service
            .advance_phase(Utc::now(), &Self::audit_context(envelope))
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::phase_changed_message(&change))
    }

    async fn complete(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        // Summary first: the cycle stops being "current" once archived.
        let summary =
            self.service.rating_summary().await.map_err(|error| route_error(envelope, error))?;
        let cycle = self
            .service
            .complete_cycle(Utc::now(), &Self::audit_context(envelope))
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::cycle_completed_message(&cycle, &summary))
    }

    async fn reset(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        let cycle = self
            .service
            .reset_cycle(&Self::audit_context(envelope))
            .await
            .map_err(|error| route_error(envelope, error))?;
        info!(
            event_name = "ingress.slack.cycle_reset",
            correlation_id = %envelope.request_id,
            user_id = %envelope.user_id,
            cycle_id = %cycle.id,
            "cycle reset from slack"
        );
        Ok(blocks::cycle_reset_message(&cycle))
    }

    async fn rate(
        &self,
        rating: u8,
        recommend: bool,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let receipt = self
            .service
            .rate_book(&envelope.user_id, rating, recommend, Utc::now())
            .await
            .map_err(|error| route_error(envelope, error))?;
        Ok(blocks::rating_message(&receipt))
    }
}
