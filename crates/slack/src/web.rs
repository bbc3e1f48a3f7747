use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use bookclub_core::notify::{Notification, Notifier, NotifyError};

pub const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    unfurl_links: bool,
}

/// Slack Web API replies with HTTP 200 and reports failures in `ok`/`error`.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts phase announcements to the club channel with `chat.postMessage`.
pub struct SlackWebClient {
    client: Client,
    bot_token: SecretString,
    channel: String,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, channel: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            channel: channel.into(),
            api_base: SLACK_API_BASE.to_owned(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn post_message(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&PostMessageRequest { channel: &self.channel, text, unfurl_links: true })
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Transport(format!(
                "chat.postMessage returned {}",
                response.status()
            )));
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|error| NotifyError::Transport(format!("undecodable Slack reply: {error}")))?;
        check_reply(body)
    }
}

fn check_reply(body: PostMessageResponse) -> Result<(), NotifyError> {
    if body.ok {
        Ok(())
    } else {
        Err(NotifyError::Rejected(body.error.unwrap_or_else(|| "unknown_error".to_owned())))
    }
}

#[async_trait]
impl Notifier for SlackWebClient {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self.post_message(&notification.text).await {
            Ok(()) => {
                info!(
                    event_name = "ingress.slack.announcement_posted",
                    cycle_id = %notification.cycle_id,
                    phase = notification.phase.as_str(),
                    channel = %self.channel,
                    "phase announcement posted"
                );
                Ok(())
            }
            Err(failure) => {
                error!(
                    event_name = "ingress.slack.announcement_failed",
                    cycle_id = %notification.cycle_id,
                    phase = notification.phase.as_str(),
                    channel = %self.channel,
                    error = %failure,
                    "phase announcement failed"
                );
                Err(failure)
            }
        }
    }
}
