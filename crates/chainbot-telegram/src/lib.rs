//! Telegram front end.
//!
//! [`Bot`] long-polls the Bot API and hands each message to the [`Router`],
//! which runs the command against the wallet manager, the store and the
//! strategy scheduler. [`pump_events`] turns scheduler events into paper
//! trade history and chat notifications.

mod api;
mod bot;
mod command;
mod error;
pub mod format;
mod notifier;
mod router;

pub use api::{split_message, Chat, Message, TelegramApi, Update, User, MAX_MESSAGE_CHARS};
pub use bot::Bot;
pub use command::{Command, ParseError, USAGE};
pub use error::TelegramError;
pub use notifier::{handle_event, pump_events, TelegramNotifier};
pub use router::{job_spec, MessageContext, Reply, Router};
