//! Slack surface of the book club bot.
//!
//! - **Slash commands** (`commands`): `/bookclub <verb> ...` parsing and routing
//! - **Block Kit** (`blocks`): replies rendered from service results
//! - **Web API** (`web`): `chat.postMessage` client used for phase announcements
//!
//! Commands arrive over HTTP (see the server crate); this crate holds no
//! transport of its own.

pub mod blocks;
pub mod commands;
pub mod web;

pub use web::SlackWebClient;
