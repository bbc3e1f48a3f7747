use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use bookclub_core::domain::rating::{MAX_RATING, MIN_RATING};
use bookclub_core::domain::suggestion::SuggestionInput;
use bookclub_core::phases::Phase;

use crate::blocks::{self, MessageTemplate};

pub const SLASH_COMMAND: &str = "/bookclub";
pub const MAX_BALLOT_PICKS: usize = 3;

/// Form body Slack posts for a slash command. Only the fields the bot reads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(skip)]
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

impl CommandEnvelope {
    /// Classifies the verb and its arguments; never fails, bad input becomes
    /// `Invalid` or `Unknown`.
    pub fn command(&self) -> BookClubCommand {
        classify_bookclub_command(&self.verb, &self.args)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookClubCommand {
    Start { name: String },
    Status,
    Suggest { input: SuggestionInput },
    Suggestions,
    Vote { positions: Vec<usize> },
    Results,
    Phase { phase: Phase },
    Advance,
    Complete,
    Reset,
    Rate { rating: u8, recommend: bool },
    Help,
    Invalid { verb: String, reason: String, usage: &'static str },
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_bookclub_command(
    payload: SlashCommandPayload,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command != SLASH_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let text = payload.text.trim();
    let (verb, args) = match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (text, ""),
    };
    let verb = if verb.is_empty() { "help".to_owned() } else { verb.to_ascii_lowercase() };

    Ok(CommandEnvelope {
        command: "bookclub".to_owned(),
        verb,
        args: args.to_owned(),
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        request_id: payload.request_id,
    })
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: BookClubCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match envelope.command() {
            BookClubCommand::Start { name } => self.service.start_cycle(name, &envelope).await,
            BookClubCommand::Status => self.service.status(&envelope).await,
            BookClubCommand::Suggest { input } => self.service.suggest(input, &envelope).await,
            BookClubCommand::Suggestions => self.service.list_suggestions(&envelope).await,
            BookClubCommand::Vote { positions } => self.service.vote(positions, &envelope).await,
            BookClubCommand::Results => self.service.results(&envelope).await,
            BookClubCommand::Phase { phase } => self.service.set_phase(phase, &envelope).await,
            BookClubCommand::Advance => self.service.advance(&envelope).await,
            BookClubCommand::Complete => self.service.complete(&envelope).await,
            BookClubCommand::Reset => self.service.reset(&envelope).await,
            BookClubCommand::Rate { rating, recommend } => {
                self.service.rate(rating, recommend, &envelope).await
            }
            BookClubCommand::Help => Ok(blocks::help_message()),
            BookClubCommand::Invalid { reason, usage, .. } => Ok(blocks::error_message(
                &format!("{reason}. Usage: `{SLASH_COMMAND} {usage}`"),
                &envelope.request_id,
            )),
            BookClubCommand::Unknown { verb } => Ok(blocks::error_message(
                &format!("Unsupported command `{SLASH_COMMAND} {verb}`. Try `{SLASH_COMMAND} help`."),
                &envelope.request_id,
            )),
        }
    }
}

#[async_trait]
pub trait BookClubCommandService: Send + Sync {
    async fn start_cycle(
        &self,
        name: String,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn status(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError>;

    async fn suggest(
        &self,
        input: SuggestionInput,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn list_suggestions(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn vote(
        &self,
        positions: Vec<usize>,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn results(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError>;

    async fn set_phase(
        &self,
        phase: Phase,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn advance(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError>;

    async fn complete(&self, envelope: &CommandEnvelope)
        -> Result<MessageTemplate, CommandRouteError>;

    async fn reset(&self, envelope: &CommandEnvelope) -> Result<MessageTemplate, CommandRouteError>;

    async fn rate(
        &self,
        rating: u8,
        recommend: bool,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

fn invalid(verb: &str, reason: impl Into<String>, usage: &'static str) -> BookClubCommand {
    BookClubCommand::Invalid { verb: verb.to_owned(), reason: reason.into(), usage }
}

fn classify_bookclub_command(verb: &str, args: &str) -> BookClubCommand {
    match verb {
        "start" => {
            if args.is_empty() {
                invalid(verb, "A cycle needs a name", "start <name>")
            } else {
                BookClubCommand::Start { name: args.to_owned() }
            }
        }
        "status" => BookClubCommand::Status,
        "suggest" => parse_suggestion(args),
        "suggestions" | "list" => BookClubCommand::Suggestions,
        "vote" => parse_vote(args),
        "results" => BookClubCommand::Results,
        "phase" => match Phase::parse(args) {
            Some(phase) => BookClubCommand::Phase { phase },
            None => invalid(
                verb,
                format!("`{args}` is not a phase"),
                "phase suggestion|voting|reading|discussion",
            ),
        },
        "advance" => BookClubCommand::Advance,
        "complete" => BookClubCommand::Complete,
        "reset" => BookClubCommand::Reset,
        "rate" => parse_rating(args),
        "help" => BookClubCommand::Help,
        _ => BookClubCommand::Unknown { verb: verb.to_owned() },
    }
}

const SUGGEST_USAGE: &str = "suggest <book> | <author> [| link] [| notes]";

fn parse_suggestion(args: &str) -> BookClubCommand {
    let mut fields = args.splitn(4, '|').map(str::trim);
    let book_name = fields.next().unwrap_or_default();
    let author = fields.next().unwrap_or_default();
    if book_name.is_empty() || author.is_empty() {
        return invalid("suggest", "Both a book and an author are required", SUGGEST_USAGE);
    }

    let optional = |value: Option<&str>| value.filter(|text| !text.is_empty()).map(str::to_owned);
    BookClubCommand::Suggest {
        input: SuggestionInput {
            book_name: book_name.to_owned(),
            author: author.to_owned(),
            link: optional(fields.next()),
            notes: optional(fields.next()),
        },
    }
}

const VOTE_USAGE: &str = "vote <first> [second] [third]";

fn parse_vote(args: &str) -> BookClubCommand {
    let tokens: Vec<&str> = args
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return invalid("vote", "Pick at least one suggestion number", VOTE_USAGE);
    }
    if tokens.len() > MAX_BALLOT_PICKS {
        return invalid(
            "vote",
            format!("A ballot ranks at most {MAX_BALLOT_PICKS} books"),
            VOTE_USAGE,
        );
    }

    let mut positions = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token.trim_start_matches('#').parse::<usize>() {
            Ok(position) if position > 0 => positions.push(position),
            _ => {
                return invalid("vote", format!("`{token}` is not a suggestion number"), VOTE_USAGE)
            }
        }
    }
    BookClubCommand::Vote { positions }
}

const RATE_USAGE: &str = "rate <1-10> [yes|no]";

fn parse_rating(args: &str) -> BookClubCommand {
    let mut tokens = args.split_whitespace();
    let rating = match tokens.next().map(str::parse::<u8>) {
        Some(Ok(rating)) if (MIN_RATING..=MAX_RATING).contains(&rating) => rating,
        _ => {
            return invalid(
                "rate",
                format!("Ratings go from {MIN_RATING} to {MAX_RATING}"),
                RATE_USAGE,
            )
        }
    };

    let recommend = match tokens.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("yes") | Some("y") => true,
        Some("no") | Some("n") => false,
        Some(other) => {
            return invalid("rate", format!("`{other}` is not yes or no"), RATE_USAGE);
        }
    };
    BookClubCommand::Rate { rating, recommend }
}
