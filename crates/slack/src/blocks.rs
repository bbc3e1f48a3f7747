use chrono::{DateTime, Utc};
use serde::Serialize;

use bookclub_core::domain::cycle::Cycle;
use bookclub_core::domain::rating::RatingSummary;
use bookclub_core::domain::vote::Rank;
use bookclub_runtime::{
    CycleStatusView, ListedSuggestion, PhaseChange, RatingReceipt, ResultsView, VoteReceipt,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
    Divider { block_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

/// Body returned to Slack for a slash command. Replies are only shown to the
/// member who ran the command; channel-wide news goes through the notifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlashCommandResponse {
    pub response_type: &'static str,
    pub text: String,
    pub blocks: Vec<Block>,
}

impl From<MessageTemplate> for SlashCommandResponse {
    fn from(template: MessageTemplate) -> Self {
        Self { response_type: "ephemeral", text: template.fallback_text, blocks: template.blocks }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

fn day_label(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%A %-d %B").to_string()
}

fn suggestion_line(entry: &ListedSuggestion) -> String {
    let mut line = format!("*{}.* *{}* by {}", entry.position, entry.book_name, entry.author);
    if let Some(link) = &entry.link {
        line.push_str(&format!(" (<{link}|link>)"));
    }
    if let Some(notes) = &entry.notes {
        line.push_str(&format!("\n      _{notes}_"));
    }
    line
}

pub fn cycle_started_message(cycle: &Cycle) -> MessageTemplate {
    MessageBuilder::new(format!("Started cycle {}", cycle.name))
        .section("cycle.started.summary.v1", |section| {
            section.mrkdwn(format!(
                ":books: *{}* has started. Suggestions are open for {} days.",
                cycle.name, cycle.phase_durations.suggestion_days
            ));
        })
        .context("cycle.started.context.v1", |context| {
            context.mrkdwn(format!(
                "Voting {} days · Reading {} days · Discussion {} days",
                cycle.phase_durations.voting_days,
                cycle.phase_durations.reading_days,
                cycle.phase_durations.discussion_days
            ));
        })
        .build()
}

pub fn status_message(view: &CycleStatusView) -> MessageTemplate {
    let deadline = view
        .deadline
        .map(|deadline| {
            if view.overdue {
                format!("ended {}; the next phase check will move it on", day_label(deadline))
            } else {
                format!("ends {}", day_label(deadline))
            }
        })
        .unwrap_or_else(|| "has no recorded start".to_owned());

    MessageBuilder::new(format!("{} is in the {} phase", view.cycle.name, view.cycle.current_phase))
        .section("cycle.status.summary.v1", |section| {
            section.mrkdwn(format!(
                "*{}* is in the *{}* phase, which {deadline}.",
                view.cycle.name, view.cycle.current_phase
            ));
        })
        .context("cycle.status.context.v1", |context| {
            context.plain(format!("{} books suggested so far", view.suggestion_count));
        })
        .build()
}

pub fn suggestion_added_message(entry: &ListedSuggestion) -> MessageTemplate {
    MessageBuilder::new(format!("Suggested {} by {}", entry.book_name, entry.author))
        .section("cycle.suggestion.added.v1", |section| {
            section.mrkdwn(format!(
                ":white_check_mark: Added *{}* by {} as suggestion #{}.",
                entry.book_name, entry.author, entry.position
            ));
        })
        .build()
}

pub fn suggestions_message(cycle: &Cycle, entries: &[ListedSuggestion]) -> MessageTemplate {
    let fallback = format!("{} suggestions for {}", entries.len(), cycle.name);
    if entries.is_empty() {
        return MessageBuilder::new(fallback)
            .section("cycle.suggestions.empty.v1", |section| {
                section.plain(format!("Nobody has suggested a book for {} yet.", cycle.name));
            })
            .build();
    }

    let lines = entries.iter().map(suggestion_line).collect::<Vec<_>>().join("\n");
    MessageBuilder::new(fallback)
        .section("cycle.suggestions.list.v1", |section| {
            section.mrkdwn(format!("*Suggestions for {}*\n{lines}", cycle.name));
        })
        .context("cycle.suggestions.context.v1", |context| {
            context.mrkdwn("Vote with the numbers, best first: `/bookclub vote 2 1 3`");
        })
        .build()
}

fn rank_label(rank: Rank) -> &'static str {
    match rank {
        Rank::First => "1st",
        Rank::Second => "2nd",
        Rank::Third => "3rd",
    }
}

pub fn vote_receipt_message(receipt: &VoteReceipt) -> MessageTemplate {
    let lines = receipt
        .picks
        .iter()
        .map(|(rank, entry)| {
            format!(
                "{} ({} pts): *{}* by {}",
                rank_label(*rank),
                rank.points(),
                entry.book_name,
                entry.author
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    MessageBuilder::new("Your ballot was recorded")
        .section("cycle.vote.receipt.v1", |section| {
            section.mrkdwn(format!(":ballot_box_with_ballot: Your ballot\n{lines}"));
        })
        .context("cycle.vote.context.v1", |context| {
            context.plain("Voting again replaces this ballot.");
        })
        .build()
}

pub fn results_message(view: &ResultsView) -> MessageTemplate {
    let fallback = format!("Standings for {}", view.cycle.name);
    if view.standings.is_empty() {
        return MessageBuilder::new(fallback)
            .section("cycle.results.empty.v1", |section| {
                section.plain("There are no suggestions to rank yet.");
            })
            .build();
    }

    let lines = view
        .standings
        .iter()
        .enumerate()
        .map(|(index, standing)| {
            format!(
                "{}. *{}* by {}: {} points",
                index + 1,
                standing.suggestion.book_name,
                standing.suggestion.author,
                standing.points
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    MessageBuilder::new(fallback)
        .section("cycle.results.standings.v1", |section| {
            section.mrkdwn(format!("*Standings for {}*\n{lines}", view.cycle.name));
        })
        .context("cycle.results.context.v1", |context| {
            context.plain("Ties go to the book suggested first.");
        })
        .build()
}

pub fn phase_changed_message(change: &PhaseChange) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!(
        "{} moved from {} to {}",
        change.cycle.name, change.outcome.from, change.outcome.to
    ))
    .section("cycle.phase.changed.v1", |section| {
        section.mrkdwn(format!(
            "*{}* moved from *{}* to *{}*.",
            change.cycle.name, change.outcome.from, change.outcome.to
        ));
    });

    if let Some(winner) = &change.winner {
        builder = builder.section("cycle.phase.winner.v1", |section| {
            section.mrkdwn(format!(
                ":trophy: Reading *{}* by {} ({} points).",
                winner.book_name, winner.author, winner.vote_points
            ));
        });
    }
    if !change.notified {
        builder = builder.context("cycle.phase.notify_failed.v1", |context| {
            context.plain("The channel announcement could not be posted.");
        });
    }
    builder.build()
}

pub fn cycle_completed_message(cycle: &Cycle, summary: &RatingSummary) -> MessageTemplate {
    let ratings = match summary.average {
        Some(average) => format!(
            "{} ratings averaging {average:.1}/10, {} would recommend it.",
            summary.count, summary.recommend_count
        ),
        None => "Nobody rated the book.".to_owned(),
    };

    MessageBuilder::new(format!("Completed cycle {}", cycle.name))
        .section("cycle.completed.summary.v1", |section| {
            section.mrkdwn(format!(":checkered_flag: *{}* is complete. {ratings}", cycle.name));
        })
        .context("cycle.completed.context.v1", |context| {
            context.mrkdwn("Start the next one with `/bookclub start <name>`.");
        })
        .build()
}

pub fn cycle_reset_message(cycle: &Cycle) -> MessageTemplate {
    MessageBuilder::new(format!("Reset cycle {}", cycle.name))
        .section("cycle.reset.summary.v1", |section| {
            section.mrkdwn(format!(
                ":wastebasket: *{}* was deleted with its suggestions, votes and ratings.",
                cycle.name
            ));
        })
        .build()
}

pub fn rating_message(receipt: &RatingReceipt) -> MessageTemplate {
    let recommend = if receipt.recommend { "would recommend" } else { "would not recommend" };
    let average = receipt
        .summary
        .average
        .map(|average| format!("{average:.1}"))
        .unwrap_or_else(|| "-".to_owned());

    MessageBuilder::new(format!("Rated {} {}/10", receipt.book.book_name, receipt.rating))
        .section("cycle.rating.receipt.v1", |section| {
            section.mrkdwn(format!(
                "You rated *{}* {}/10 and {recommend} it.",
                receipt.book.book_name, receipt.rating
            ));
        })
        .context("cycle.rating.summary.v1", |context| {
            context.plain(format!(
                "Club average {average} from {} ratings · {} recommend",
                receipt.summary.count, receipt.summary.recommend_count
            ));
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("bookclub.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("bookclub.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Book club command help")
        .section("bookclub.help.members.v1", |section| {
            section.mrkdwn(
                "*Everyone*\n• `/bookclub status`\n• `/bookclub suggest <book> | <author> [| link] [| notes]`\n• `/bookclub suggestions`\n• `/bookclub vote <first> [second] [third]`\n• `/bookclub results`\n• `/bookclub rate <1-10> [yes|no]`",
            );
        })
        .divider("bookclub.help.divider.v1")
        .section("bookclub.help.cycle.v1", |section| {
            section.mrkdwn(
                "*Running the cycle*\n• `/bookclub start <name>`\n• `/bookclub advance`\n• `/bookclub phase <suggestion|voting|reading|discussion>`\n• `/bookclub complete`\n• `/bookclub reset`",
            );
        })
        .build()
}
