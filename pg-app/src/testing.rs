//! In-memory fakes for the generation backend and the chat platform.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pg_channels::{
    ApplicationId, Author, ChannelId, ChannelKind, ChatPlatform, CommandDefinition,
    CommandInvocation, HistoryMessage, InteractionId, MessageId, OutboundMessage, PlatformError,
    PlatformEvent, UserId,
};
use pg_llm::{LlmError, TextGenerator};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Records every prompt and replays scripted responses; an exhausted script
/// answers with an empty string.
#[derive(Default)]
pub struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
        }
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .expect("lock")
            .push_back(Err(message.to_string()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("lock").len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> pg_llm::Result<String> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        match self.responses.lock().expect("lock").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Http(message)),
            None => Ok(String::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFailure {
    Forbidden,
    Transport,
}

#[derive(Default)]
pub struct FakePlatform {
    pub history: Mutex<Vec<HistoryMessage>>,
    pub history_failure: Mutex<Option<HistoryFailure>>,
    pub history_calls: Mutex<Vec<(ChannelId, DateTime<Utc>)>>,
    pub messages: Mutex<HashMap<String, HistoryMessage>>,
    pub channel_kinds: Mutex<HashMap<String, ChannelKind>>,
    pub sent: Mutex<Vec<(ChannelId, OutboundMessage)>>,
    pub registered: Mutex<Vec<(ApplicationId, Vec<CommandDefinition>)>>,
    pub deferred: Mutex<Vec<InteractionId>>,
    pub followups: Mutex<Vec<String>>,
    pub max_chars: Option<usize>,
}

impl FakePlatform {
    pub fn with_channel(self, channel_id: &str, kind: ChannelKind) -> Self {
        self.channel_kinds
            .lock()
            .expect("lock")
            .insert(channel_id.to_string(), kind);
        self
    }

    pub fn with_message(self, message: HistoryMessage) -> Self {
        self.messages
            .lock()
            .expect("lock")
            .insert(message.id.to_string(), message);
        self
    }

    pub fn with_history(self, history: Vec<HistoryMessage>) -> Self {
        *self.history.lock().expect("lock") = history;
        self
    }

    pub fn failing_history(self, failure: HistoryFailure) -> Self {
        *self.history_failure.lock().expect("lock") = Some(failure);
        self
    }

    pub fn sent(&self) -> Vec<(ChannelId, OutboundMessage)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn followups(&self) -> Vec<String> {
        self.followups.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    fn platform_id(&self) -> &str {
        "fake"
    }

    async fn start(&self, _tx: mpsc::Sender<PlatformEvent>) -> pg_channels::Result<()> {
        Ok(())
    }

    async fn fetch_history(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
    ) -> pg_channels::Result<Vec<HistoryMessage>> {
        self.history_calls
            .lock()
            .expect("lock")
            .push((channel_id.clone(), since));
        match *self.history_failure.lock().expect("lock") {
            Some(HistoryFailure::Forbidden) => {
                return Err(PlatformError::Forbidden("fetch channel history: Missing Access".into()));
            }
            Some(HistoryFailure::Transport) => {
                return Err(PlatformError::Transport("connection reset".into()));
            }
            None => {}
        }
        Ok(self
            .history
            .lock()
            .expect("lock")
            .iter()
            .filter(|m| &m.channel_id == channel_id && m.created_at > since)
            .cloned()
            .collect())
    }

    async fn fetch_message(
        &self,
        _channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> pg_channels::Result<HistoryMessage> {
        self.messages
            .lock()
            .expect("lock")
            .get(message_id.as_str())
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("message {message_id}")))
    }

    async fn channel_kind(&self, channel_id: &ChannelId) -> pg_channels::Result<ChannelKind> {
        self.channel_kinds
            .lock()
            .expect("lock")
            .get(channel_id.as_str())
            .copied()
            .ok_or_else(|| PlatformError::NotFound(format!("channel {channel_id}")))
    }

    async fn send(
        &self,
        channel_id: &ChannelId,
        message: OutboundMessage,
    ) -> pg_channels::Result<()> {
        self.sent
            .lock()
            .expect("lock")
            .push((channel_id.clone(), message));
        Ok(())
    }

    async fn register_commands(
        &self,
        application_id: &ApplicationId,
        commands: &[CommandDefinition],
    ) -> pg_channels::Result<()> {
        self.registered
            .lock()
            .expect("lock")
            .push((application_id.clone(), commands.to_vec()));
        Ok(())
    }

    async fn defer_command(&self, invocation: &CommandInvocation) -> pg_channels::Result<()> {
        self.deferred
            .lock()
            .expect("lock")
            .push(invocation.interaction_id.clone());
        Ok(())
    }

    async fn send_followup(
        &self,
        _invocation: &CommandInvocation,
        content: &str,
    ) -> pg_channels::Result<()> {
        self.followups.lock().expect("lock").push(content.to_string());
        Ok(())
    }

    fn max_message_chars(&self) -> usize {
        self.max_chars.unwrap_or(2000)
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 9, hour, minute, 0)
        .single()
        .expect("valid time")
}

pub fn message(
    id: &str,
    channel_id: &str,
    author: &str,
    bot: bool,
    content: &str,
    created_at: DateTime<Utc>,
) -> HistoryMessage {
    HistoryMessage {
        id: MessageId::new(id),
        channel_id: ChannelId::new(channel_id),
        author: Author {
            id: UserId::new(format!("user-{author}")),
            display_name: author.to_string(),
            bot,
        },
        content: content.to_string(),
        created_at,
    }
}
