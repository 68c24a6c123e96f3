use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Milliseconds between the Unix epoch and the first second of 2015 (Discord epoch).
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ChannelId);
id_newtype!(UserId);
id_newtype!(GuildId);
id_newtype!(ApplicationId);
id_newtype!(InteractionId);

/// Coarse channel classification, enough to decide which surfaces a channel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Announcement,
    Thread,
    DirectMessage,
    Other(u64),
}

impl ChannelKind {
    pub fn from_discord(code: u64) -> Self {
        match code {
            0 => Self::Text,
            5 => Self::Announcement,
            10..=12 => Self::Thread,
            1 | 3 => Self::DirectMessage,
            other => Self::Other(other),
        }
    }

    /// Guild text channels, announcement channels included.
    pub fn is_text_channel(self) -> bool {
        matches!(self, Self::Text | Self::Announcement)
    }

    pub fn is_text_or_thread(self) -> bool {
        self.is_text_channel() || self == Self::Thread
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    /// Resolved display name: global name, then username.
    pub display_name: String,
    pub bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEvent {
    pub bot_user_id: UserId,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Unicode emoji as-is, custom emoji as `<:name:id>` / `<a:name:id>`.
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub interaction_id: InteractionId,
    pub application_id: ApplicationId,
    /// Interaction token, valid for 15 minutes of follow-ups.
    pub token: String,
    pub command_name: String,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub channel_kind: Option<ChannelKind>,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    Ready(ReadyEvent),
    ReactionAdded(ReactionEvent),
    Command(CommandInvocation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    #[serde(default)]
    pub reply_to_message_id: Option<MessageId>,
}

/// Smallest snowflake that can be minted at `at`. Used as an exclusive `after` cursor.
pub fn snowflake_at(at: DateTime<Utc>) -> u64 {
    let ms = at.timestamp_millis().saturating_sub(DISCORD_EPOCH_MS).max(0);
    (ms as u64) << 22
}

pub fn snowflake_timestamp(id: u64) -> Option<DateTime<Utc>> {
    let ms = (id >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(ms).single()
}
