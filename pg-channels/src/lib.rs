//! Chat platform adapters for Polyglot.
//!
//! Adapters are pure I/O: they turn platform gateway payloads into
//! [`PlatformEvent`]s and expose the handful of REST calls the bot needs
//! behind [`ChatPlatform`].

mod discord;
mod error;
mod traits;
mod types;

pub use discord::DiscordAdapter;
pub use error::{PlatformError, Result};
pub use traits::ChatPlatform;
pub use types::{
    ApplicationId, Author, ChannelId, ChannelKind, CommandDefinition, CommandInvocation, GuildId,
    HistoryMessage, InteractionId, MessageId, OutboundMessage, PlatformEvent, ReactionEvent,
    ReadyEvent, UserId, snowflake_at, snowflake_timestamp,
};
