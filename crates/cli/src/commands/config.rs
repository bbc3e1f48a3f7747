use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bookclub_core::config::AppConfig;
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct ConfigField {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let field = |key, env_key, value: String| ConfigField { key, env_key, value };
    vec![
        field("database.url", "BOOKCLUB_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "BOOKCLUB_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "BOOKCLUB_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "slack.bot_token",
            "BOOKCLUB_SLACK_BOT_TOKEN",
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        field(
            "slack.notification_channel",
            "BOOKCLUB_SLACK_NOTIFICATION_CHANNEL",
            config.slack.notification_channel.clone(),
        ),
        field("server.bind_address", "BOOKCLUB_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        field("server.port", "BOOKCLUB_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            "BOOKCLUB_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("scheduler.mode", "BOOKCLUB_SCHEDULER_MODE", format!("{:?}", config.scheduler.mode)),
        field(
            "scheduler.check_interval_secs",
            "BOOKCLUB_SCHEDULER_CHECK_INTERVAL_SECS",
            config.scheduler.check_interval_secs.to_string(),
        ),
        field(
            "phases.suggestion_days",
            "BOOKCLUB_PHASES_SUGGESTION_DAYS",
            config.phases.suggestion_days.to_string(),
        ),
        field("phases.voting_days", "BOOKCLUB_PHASES_VOTING_DAYS", config.phases.voting_days.to_string()),
        field(
            "phases.reading_days",
            "BOOKCLUB_PHASES_READING_DAYS",
            config.phases.reading_days.to_string(),
        ),
        field(
            "phases.discussion_days",
            "BOOKCLUB_PHASES_DISCUSSION_DAYS",
            config.phases.discussion_days.to_string(),
        ),
        field("logging.level", "BOOKCLUB_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "BOOKCLUB_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("bookclub.toml"), PathBuf::from("config/bookclub.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &ConfigField, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if env::var_os(field.env_key).is_some() {
        return format!("env ({})", field.env_key);
    }

    if file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
