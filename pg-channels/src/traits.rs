use crate::error::Result;
use crate::types::{
    ApplicationId, ChannelId, ChannelKind, CommandDefinition, CommandInvocation, HistoryMessage,
    MessageId, OutboundMessage, PlatformEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Unique platform identifier, e.g. "discord".
    fn platform_id(&self) -> &str;

    /// Start receiving events. Push to tx for each ready/reaction/command event.
    async fn start(&self, tx: mpsc::Sender<PlatformEvent>) -> Result<()>;

    /// All messages posted in a channel strictly after `since`, oldest first.
    async fn fetch_history(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>>;

    async fn fetch_message(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<HistoryMessage>;

    async fn channel_kind(&self, channel_id: &ChannelId) -> Result<ChannelKind>;

    /// Post a message. Mention parsing is always disabled on outbound messages.
    async fn send(&self, channel_id: &ChannelId, message: OutboundMessage) -> Result<()>;

    /// Overwrite the globally registered command set for an application.
    async fn register_commands(
        &self,
        application_id: &ApplicationId,
        commands: &[CommandDefinition],
    ) -> Result<()>;

    /// Acknowledge a command now and promise a follow-up.
    async fn defer_command(&self, invocation: &CommandInvocation) -> Result<()>;

    async fn send_followup(&self, invocation: &CommandInvocation, content: &str) -> Result<()>;

    /// Largest message body the platform accepts, in characters.
    fn max_message_chars(&self) -> usize {
        2000
    }
}
