use crate::error::{PlatformError, Result};
use crate::traits::ChatPlatform;
use crate::types::{
    ApplicationId, Author, ChannelId, ChannelKind, CommandDefinition, CommandInvocation,
    HistoryMessage, MessageId, OutboundMessage, PlatformEvent, ReactionEvent, ReadyEvent,
    snowflake_at, snowflake_timestamp,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
/// GUILDS | GUILD_MESSAGES | GUILD_MESSAGE_REACTIONS | MESSAGE_CONTENT.
const DISCORD_DEFAULT_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 10) | (1 << 15);
const DISCORD_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const HISTORY_PAGE_LIMIT: usize = 100;

const OP_DISPATCH: i64 = 0;
const OP_HEARTBEAT: i64 = 1;
const OP_IDENTIFY: i64 = 2;
const OP_RECONNECT: i64 = 7;
const OP_INVALID_SESSION: i64 = 9;

const INTERACTION_APPLICATION_COMMAND: u8 = 2;
const CALLBACK_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const COMMAND_TYPE_CHAT_INPUT: u8 = 1;

#[derive(Clone)]
pub struct DiscordAdapter {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
    gateway_url: String,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl DiscordAdapter {
    pub fn new(bot_token: &str, http_timeout: Duration) -> Result<Self> {
        let token = bot_token.trim();
        if token.is_empty() {
            return Err(PlatformError::InvalidInput(
                "discord bot token is required".into(),
            ));
        }
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            http,
            bot_token: token.to_string(),
            api_base: DISCORD_API_BASE.to_string(),
            gateway_url: DISCORD_GATEWAY_URL.to_string(),
            reconnect_delay: DISCORD_RECONNECT_DELAY,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: &str) -> Self {
        self.gateway_url = gateway_url.to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Stop the gateway session started by [`ChatPlatform::start`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response> {
        let response = request
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::from_status(status.as_u16(), context, body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let response = self
            .execute(self.http.get(self.api_url(path)).query(query), context)
            .await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl ChatPlatform for DiscordAdapter {
    fn platform_id(&self) -> &str {
        "discord"
    }

    async fn start(&self, tx: mpsc::Sender<PlatformEvent>) -> Result<()> {
        let adapter = self.clone();
        tokio::spawn(async move {
            adapter.run_gateway_loop(tx).await;
        });
        Ok(())
    }

    #[tracing::instrument(level = "info", skip_all, fields(channel_id = %channel_id, since = %since))]
    async fn fetch_history(
        &self,
        channel_id: &ChannelId,
        since: DateTime<Utc>,
    ) -> Result<Vec<HistoryMessage>> {
        let path = format!("/channels/{channel_id}/messages");
        let mut after = snowflake_at(since);
        let mut messages = Vec::new();
        let mut pages = 0usize;

        loop {
            let page: Vec<DiscordMessage> = self
                .get_json(
                    &path,
                    &[
                        ("after", after.to_string()),
                        ("limit", HISTORY_PAGE_LIMIT.to_string()),
                    ],
                    "fetch channel history",
                )
                .await?;
            pages += 1;

            let page_len = page.len();
            let newest = page
                .iter()
                .filter_map(|message| message.id.parse::<u64>().ok())
                .max();
            messages.extend(page.into_iter().map(DiscordMessage::into_history));

            match newest {
                Some(newest) if page_len == HISTORY_PAGE_LIMIT && newest > after => after = newest,
                _ => break,
            }
        }

        messages.sort_by_key(|message| (message.id.parse::<u64>().unwrap_or(0), message.created_at));
        tracing::debug!(pages, messages = messages.len(), "discord history fetched");
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<HistoryMessage> {
        let message: DiscordMessage = self
            .get_json(
                &format!("/channels/{channel_id}/messages/{message_id}"),
                &[],
                "fetch message",
            )
            .await?;
        Ok(message.into_history())
    }

    async fn channel_kind(&self, channel_id: &ChannelId) -> Result<ChannelKind> {
        let channel: DiscordChannel = self
            .get_json(&format!("/channels/{channel_id}"), &[], "fetch channel")
            .await?;
        Ok(ChannelKind::from_discord(channel.kind))
    }

    async fn send(&self, channel_id: &ChannelId, message: OutboundMessage) -> Result<()> {
        if message.content.trim().is_empty() {
            return Err(PlatformError::InvalidInput("message content is empty".into()));
        }
        let mut body = serde_json::json!({
            "content": message.content,
            "allowed_mentions": { "parse": [], "replied_user": false },
        });
        if let Some(reply_to) = message.reply_to_message_id.as_ref() {
            body["message_reference"] = serde_json::json!({
                "message_id": reply_to.as_str(),
                "fail_if_not_exists": false,
            });
        }
        let url = self.api_url(&format!("/channels/{channel_id}/messages"));
        self.execute(self.http.post(url).json(&body), "send message")
            .await?;
        Ok(())
    }

    async fn register_commands(
        &self,
        application_id: &ApplicationId,
        commands: &[CommandDefinition],
    ) -> Result<()> {
        let body: Vec<serde_json::Value> = commands
            .iter()
            .map(|command| {
                serde_json::json!({
                    "name": command.name,
                    "description": command.description,
                    "type": COMMAND_TYPE_CHAT_INPUT,
                })
            })
            .collect();
        let url = self.api_url(&format!("/applications/{application_id}/commands"));
        self.execute(self.http.put(url).json(&body), "register commands")
            .await?;
        tracing::info!(count = commands.len(), "discord commands registered");
        Ok(())
    }

    async fn defer_command(&self, invocation: &CommandInvocation) -> Result<()> {
        let url = self.api_url(&format!(
            "/interactions/{}/{}/callback",
            invocation.interaction_id, invocation.token
        ));
        let body = serde_json::json!({ "type": CALLBACK_DEFERRED_CHANNEL_MESSAGE });
        self.execute(self.http.post(url).json(&body), "defer interaction")
            .await?;
        Ok(())
    }

    async fn send_followup(&self, invocation: &CommandInvocation, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::InvalidInput("follow-up content is empty".into()));
        }
        let url = self.api_url(&format!(
            "/webhooks/{}/{}",
            invocation.application_id, invocation.token
        ));
        let body = serde_json::json!({
            "content": content,
            "allowed_mentions": { "parse": [] },
        });
        self.execute(self.http.post(url).json(&body), "send follow-up")
            .await?;
        Ok(())
    }
}

/// Aborts the wrapped task when the session that owns it ends.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl DiscordAdapter {
    async fn run_gateway_loop(&self, tx: mpsc::Sender<PlatformEvent>) {
        loop {
            let outcome = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("discord gateway shutdown requested");
                    return;
                }
                outcome = self.run_gateway_once(&tx) => outcome,
            };
            match outcome {
                Ok(()) => tracing::info!("discord gateway session ended"),
                Err(e) => tracing::warn!(%e, "discord gateway session failed"),
            }
            if tx.is_closed() {
                tracing::info!("discord event queue closed; gateway loop exiting");
                return;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn run_gateway_once(&self, tx: &mpsc::Sender<PlatformEvent>) -> Result<()> {
        let (ws, _) = tokio_tungstenite::connect_async(self.gateway_url.as_str()).await?;
        let (write, mut read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        // HELLO.
        let heartbeat_interval_ms: u64 = if let Some(msg) = read.next().await {
            let msg = msg?;
            let v: serde_json::Value = serde_json::from_str(msg.to_text()?)?;
            v.get("d")
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(|x| x.as_u64())
                .ok_or_else(|| PlatformError::Gateway("HELLO missing heartbeat_interval".into()))?
        } else {
            return Err(PlatformError::Gateway("gateway closed before HELLO".into()));
        };

        // IDENTIFY.
        let identify = serde_json::json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": format!("Bot {}", self.bot_token),
                "intents": DISCORD_DEFAULT_INTENTS,
                "properties": { "os": "linux", "browser": "polyglot", "device": "polyglot" }
            }
        });
        write
            .lock()
            .await
            .send(Message::Text(identify.to_string().into()))
            .await?;

        let seq: Arc<RwLock<Option<i64>>> = Arc::new(RwLock::new(None));

        // Heartbeat loop.
        let _heartbeat = {
            let write = write.clone();
            let seq = seq.clone();
            AbortOnDrop(tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(Duration::from_millis(heartbeat_interval_ms));
                loop {
                    interval.tick().await;
                    let s = *seq.read().await;
                    let payload = serde_json::json!({ "op": OP_HEARTBEAT, "d": s });
                    if write
                        .lock()
                        .await
                        .send(Message::Text(payload.to_string().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }))
        };

        while let Some(msg) = read.next().await {
            let text = match msg? {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    return Err(PlatformError::Gateway(format!(
                        "gateway closed by server: {frame:?}"
                    )));
                }
                _ => continue,
            };
            let v: serde_json::Value = match serde_json::from_str(text.as_str()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(%e, "discord gateway sent invalid json");
                    continue;
                }
            };

            if let Some(s) = v.get("s").and_then(|s| s.as_i64()) {
                *seq.write().await = Some(s);
            }

            match v.get("op").and_then(|o| o.as_i64()) {
                Some(OP_DISPATCH) => {}
                Some(OP_HEARTBEAT) => {
                    let s = *seq.read().await;
                    let payload = serde_json::json!({ "op": OP_HEARTBEAT, "d": s });
                    write
                        .lock()
                        .await
                        .send(Message::Text(payload.to_string().into()))
                        .await?;
                    continue;
                }
                Some(OP_RECONNECT) => {
                    tracing::info!("discord gateway requested reconnect");
                    return Ok(());
                }
                Some(OP_INVALID_SESSION) => {
                    tracing::warn!("discord gateway invalidated session");
                    return Ok(());
                }
                _ => continue,
            }

            let Some(t) = v.get("t").and_then(|t| t.as_str()) else {
                continue;
            };
            let d = v.get("d").cloned().unwrap_or(serde_json::Value::Null);
            match parse_dispatch(t, d) {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(%e, event = t, "discord dispatch payload ignored"),
            }
        }

        Err(PlatformError::Gateway(
            "gateway stream ended unexpectedly".into(),
        ))
    }
}

/// Map a gateway dispatch to a bot event. `Ok(None)` for events the bot does not consume.
fn parse_dispatch(event_name: &str, payload: serde_json::Value) -> Result<Option<PlatformEvent>> {
    match event_name {
        "READY" => {
            let ready: DiscordReady = serde_json::from_value(payload)?;
            Ok(Some(PlatformEvent::Ready(ReadyEvent {
                bot_user_id: ready.user.id.into(),
                application_id: ready.application.id.into(),
            })))
        }
        "MESSAGE_REACTION_ADD" => {
            let reaction: DiscordReactionAdd = serde_json::from_value(payload)?;
            let Some(emoji) = reaction.emoji.identifier() else {
                return Ok(None);
            };
            Ok(Some(PlatformEvent::ReactionAdded(ReactionEvent {
                user_id: reaction.user_id.into(),
                channel_id: reaction.channel_id.into(),
                message_id: reaction.message_id.into(),
                guild_id: reaction.guild_id.map(Into::into),
                emoji,
            })))
        }
        "INTERACTION_CREATE" => {
            let interaction: DiscordInteraction = serde_json::from_value(payload)?;
            if interaction.kind != INTERACTION_APPLICATION_COMMAND {
                return Ok(None);
            }
            let Some(data) = interaction.data else {
                return Ok(None);
            };
            let channel_id = interaction
                .channel_id
                .or_else(|| interaction.channel.as_ref().map(|c| c.id.clone()));
            let user_id = interaction
                .member
                .and_then(|member| member.user)
                .or(interaction.user)
                .map(|user| user.id.into());
            Ok(Some(PlatformEvent::Command(CommandInvocation {
                interaction_id: interaction.id.into(),
                application_id: interaction.application_id.into(),
                token: interaction.token,
                command_name: data.name,
                channel_id: channel_id.map(Into::into),
                channel_kind: interaction
                    .channel
                    .map(|channel| ChannelKind::from_discord(channel.kind)),
                guild_id: interaction.guild_id.map(Into::into),
                user_id,
            })))
        }
        _ => Ok(None),
    }
}

/// REST message payloads carry no guild member, so nicknames never reach history.
fn resolve_display_name(global_name: Option<&str>, username: &str) -> String {
    global_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(username)
        .to_string()
}

#[derive(Debug, Deserialize)]
struct DiscordReady {
    user: DiscordUserRef,
    application: DiscordApplicationRef,
}

#[derive(Debug, Deserialize)]
struct DiscordUserRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordApplicationRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordReactionAdd {
    user_id: String,
    channel_id: String,
    message_id: String,
    #[serde(default)]
    guild_id: Option<String>,
    emoji: DiscordEmoji,
}

#[derive(Debug, Deserialize)]
struct DiscordEmoji {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    animated: bool,
}

impl DiscordEmoji {
    fn identifier(&self) -> Option<String> {
        match (self.id.as_deref(), self.name.as_deref()) {
            (Some(id), Some(name)) => {
                let prefix = if self.animated { "a" } else { "" };
                Some(format!("<{prefix}:{name}:{id}>"))
            }
            (None, Some(name)) if !name.is_empty() => Some(name.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscordInteraction {
    id: String,
    application_id: String,
    #[serde(rename = "type")]
    kind: u8,
    token: String,
    #[serde(default)]
    data: Option<DiscordCommandData>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    channel: Option<DiscordChannel>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    member: Option<DiscordMember>,
    #[serde(default)]
    user: Option<DiscordUserRef>,
}

#[derive(Debug, Deserialize)]
struct DiscordCommandData {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u64,
}

#[derive(Debug, Deserialize)]
struct DiscordMember {
    #[serde(default)]
    user: Option<DiscordUserRef>,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    channel_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: Option<String>,
    author: DiscordAuthor,
}

#[derive(Debug, Deserialize)]
struct DiscordAuthor {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

impl DiscordMessage {
    fn into_history(self) -> HistoryMessage {
        let created_at = self
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .or_else(|| self.id.parse::<u64>().ok().and_then(snowflake_timestamp))
            .unwrap_or_else(Utc::now);
        let display_name =
            resolve_display_name(self.author.global_name.as_deref(), &self.author.username);
        HistoryMessage {
            id: self.id.into(),
            channel_id: self.channel_id.into(),
            author: Author {
                id: self.author.id.into(),
                display_name,
                bot: self.author.bot,
            },
            content: self.content,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock server");
        });
        format!("http://{addr}")
    }

    fn adapter(base: &str) -> DiscordAdapter {
        DiscordAdapter::new("test-token", Duration::from_secs(5))
            .expect("adapter")
            .with_api_base(base)
    }

    fn message_json(id: u64, author: &str, content: &str, bot: bool) -> Value {
        json!({
            "id": id.to_string(),
            "channel_id": "c1",
            "content": content,
            "timestamp": snowflake_timestamp(id).expect("ts").to_rfc3339(),
            "author": { "id": format!("u-{author}"), "username": author, "global_name": null, "bot": bot }
        })
    }

    #[test]
    fn ready_dispatch_yields_bot_and_application_ids() {
        let event = parse_dispatch(
            "READY",
            json!({ "v": 10, "user": { "id": "42", "bot": true }, "application": { "id": "99", "flags": 0 } }),
        )
        .expect("parse")
        .expect("event");
        assert_eq!(
            event,
            PlatformEvent::Ready(ReadyEvent {
                bot_user_id: "42".into(),
                application_id: "99".into(),
            })
        );
    }

    #[test]
    fn reaction_dispatch_uses_unicode_name_and_custom_markup() {
        let unicode = parse_dispatch(
            "MESSAGE_REACTION_ADD",
            json!({
                "user_id": "7", "channel_id": "c1", "message_id": "m1", "guild_id": "g1",
                "emoji": { "id": null, "name": "🇩🇪" }
            }),
        )
        .expect("parse")
        .expect("event");
        let PlatformEvent::ReactionAdded(reaction) = unicode else {
            panic!("expected reaction");
        };
        assert_eq!(reaction.emoji, "🇩🇪");
        assert_eq!(reaction.message_id.as_str(), "m1");
        assert_eq!(reaction.guild_id.as_deref(), Some("g1"));

        let custom = parse_dispatch(
            "MESSAGE_REACTION_ADD",
            json!({
                "user_id": "7", "channel_id": "c1", "message_id": "m1",
                "emoji": { "id": "123", "name": "party", "animated": true }
            }),
        )
        .expect("parse")
        .expect("event");
        let PlatformEvent::ReactionAdded(reaction) = custom else {
            panic!("expected reaction");
        };
        assert_eq!(reaction.emoji, "<a:party:123>");
    }

    #[test]
    fn interaction_dispatch_only_maps_application_commands() {
        let command = parse_dispatch(
            "INTERACTION_CREATE",
            json!({
                "id": "i1", "application_id": "99", "type": 2, "token": "tok",
                "data": { "id": "cmd", "name": "summary", "type": 1 },
                "channel_id": "c1",
                "channel": { "id": "c1", "type": 0 },
                "guild_id": "g1",
                "member": { "user": { "id": "u1" }, "nick": null }
            }),
        )
        .expect("parse")
        .expect("event");
        let PlatformEvent::Command(invocation) = command else {
            panic!("expected command");
        };
        assert_eq!(invocation.command_name, "summary");
        assert_eq!(invocation.channel_kind, Some(ChannelKind::Text));
        assert_eq!(invocation.user_id.as_deref(), Some("u1"));
        assert_eq!(invocation.token, "tok");

        let ping = parse_dispatch(
            "INTERACTION_CREATE",
            json!({ "id": "i2", "application_id": "99", "type": 1, "token": "tok" }),
        )
        .expect("parse");
        assert!(ping.is_none());
    }

    #[test]
    fn malformed_dispatch_is_an_error_and_unknown_events_are_ignored() {
        assert!(parse_dispatch("MESSAGE_REACTION_ADD", json!({ "user_id": 1 })).is_err());
        assert!(
            parse_dispatch("TYPING_START", json!({}))
                .expect("parse")
                .is_none()
        );
    }

    #[test]
    fn display_name_prefers_global_name_over_username() {
        assert_eq!(resolve_display_name(Some("Global"), "user"), "Global");
        assert_eq!(resolve_display_name(Some(" "), "user"), "user");
        assert_eq!(resolve_display_name(None, "user"), "user");
    }

    #[test]
    fn history_payload_uses_global_name() {
        let mut payload = message_json(1_100_000_000_000_000_000, "riya_k", "hi", false);
        payload["author"]["global_name"] = json!("Riya");
        let message: DiscordMessage = serde_json::from_value(payload).expect("message");
        let history = message.into_history();
        assert_eq!(history.author.display_name, "Riya");
        assert_eq!(history.author.id.as_str(), "u-riya_k");
    }

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: futures_util::Stream<
                Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
            > + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("gateway frame in time")
                .expect("gateway frame")
                .expect("websocket read");
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).expect("json frame");
            }
        }
    }

    async fn send_json<S>(ws: &mut S, value: Value)
    where
        S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        ws.send(Message::Text(value.to_string().into()))
            .await
            .expect("websocket write");
    }

    #[tokio::test]
    async fn gateway_session_identifies_heartbeats_forwards_and_reconnects() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind gateway listener");
        let addr = listener.local_addr().expect("gateway addr");

        let server = tokio::spawn(async move {
            let hello = json!({ "op": 10, "d": { "heartbeat_interval": 60_000 } });

            let (stream, _) = listener.accept().await.expect("accept first");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("first handshake");
            send_json(&mut ws, hello.clone()).await;
            let identify = next_json(&mut ws).await;

            send_json(
                &mut ws,
                json!({
                    "op": 0, "s": 1, "t": "READY",
                    "d": { "user": { "id": "42" }, "application": { "id": "99" } }
                }),
            )
            .await;
            send_json(&mut ws, json!({ "op": 1, "d": null })).await;
            loop {
                let frame = next_json(&mut ws).await;
                if frame["op"] == 1 && frame["d"] == 1 {
                    break;
                }
            }
            send_json(
                &mut ws,
                json!({
                    "op": 0, "s": 2, "t": "MESSAGE_REACTION_ADD",
                    "d": {
                        "user_id": "7", "channel_id": "c1", "message_id": "m1",
                        "emoji": { "id": null, "name": "🇩🇪" }
                    }
                }),
            )
            .await;
            send_json(&mut ws, json!({ "op": 7, "d": null })).await;

            let (stream, _) = listener.accept().await.expect("accept second");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("second handshake");
            send_json(&mut ws, hello).await;
            let second_identify = next_json(&mut ws).await;
            (identify, second_identify)
        });

        let adapter = DiscordAdapter::new("test-token", Duration::from_secs(5))
            .expect("adapter")
            .with_gateway_url(&format!("ws://{addr}"))
            .with_reconnect_delay(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(8);
        adapter.start(tx).await.expect("start");

        let ready = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("ready in time")
            .expect("ready event");
        assert_eq!(
            ready,
            PlatformEvent::Ready(ReadyEvent {
                bot_user_id: "42".into(),
                application_id: "99".into(),
            })
        );
        let reaction = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reaction in time")
            .expect("reaction event");
        let PlatformEvent::ReactionAdded(reaction) = reaction else {
            panic!("expected reaction, got {reaction:?}");
        };
        assert_eq!(reaction.emoji, "🇩🇪");
        assert_eq!(reaction.message_id.as_str(), "m1");

        let (identify, second_identify) = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server in time")
            .expect("server task");
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "Bot test-token");
        assert_eq!(identify["d"]["intents"], 1 | 512 | 1024 | 32768);
        assert_eq!(second_identify["op"], 2);

        adapter.shutdown();
    }

    #[derive(Clone)]
    struct HistoryState {
        messages: Arc<Vec<Value>>,
        requests: Arc<std::sync::Mutex<Vec<HashMap<String, String>>>>,
    }

    async fn history_handler(
        State(state): State<HistoryState>,
        Path(_channel_id): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        state.requests.lock().expect("lock").push(query.clone());
        let after: u64 = query
            .get("after")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let limit: usize = query
            .get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let mut page: Vec<Value> = state
            .messages
            .iter()
            .filter(|m| {
                m["id"]
                    .as_str()
                    .and_then(|id| id.parse::<u64>().ok())
                    .is_some_and(|id| id > after)
            })
            .take(limit)
            .cloned()
            .collect();
        // Discord returns pages newest first.
        page.reverse();
        Json(Value::Array(page))
    }

    #[tokio::test]
    async fn fetch_history_paginates_and_returns_oldest_first() {
        let since = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("date");
        let base_id = snowflake_at(since);
        let messages: Vec<Value> = (1..=103u64)
            .map(|n| message_json(base_id + (n << 22), "asha", &format!("msg {n}"), false))
            .collect();
        let state = HistoryState {
            messages: Arc::new(messages),
            requests: Arc::default(),
        };
        let router = Router::new()
            .route("/channels/{channel_id}/messages", get(history_handler))
            .with_state(state.clone());
        let base = spawn_mock(router).await;

        let history = adapter(&base)
            .fetch_history(&ChannelId::new("c1"), since)
            .await
            .expect("history");

        assert_eq!(history.len(), 103);
        assert_eq!(history[0].content, "msg 1");
        assert_eq!(history[102].content, "msg 103");
        assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let requests = state.requests.lock().expect("lock");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].get("after"), Some(&base_id.to_string()));
        assert_eq!(requests[0].get("limit").map(String::as_str), Some("100"));
        assert_eq!(
            requests[1].get("after"),
            Some(&(base_id + (100 << 22)).to_string())
        );
    }

    #[tokio::test]
    async fn fetch_history_maps_403_to_forbidden() {
        async fn forbidden() -> impl IntoResponse {
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": "Missing Access", "code": 50001 })),
            )
        }
        let router = Router::new().route("/channels/{channel_id}/messages", get(forbidden));
        let base = spawn_mock(router).await;

        let err = adapter(&base)
            .fetch_history(&ChannelId::new("c1"), Utc::now())
            .await
            .expect_err("should fail");
        assert!(err.is_forbidden(), "{err}");
    }

    #[tokio::test]
    async fn send_disables_mentions_and_references_reply_target() {
        let bodies: Arc<std::sync::Mutex<Vec<Value>>> = Arc::default();
        let recorded = bodies.clone();
        let router = Router::new().route(
            "/channels/{channel_id}/messages",
            post(move |Json(body): Json<Value>| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().expect("lock").push(body);
                    Json(json!({ "id": "m2" }))
                }
            }),
        );
        let base = spawn_mock(router).await;

        adapter(&base)
            .send(
                &ChannelId::new("c1"),
                OutboundMessage {
                    content: "Hallo zusammen".into(),
                    reply_to_message_id: Some(MessageId::new("m1")),
                },
            )
            .await
            .expect("send");

        let bodies = bodies.lock().expect("lock");
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["content"], json!("Hallo zusammen"));
        assert_eq!(bodies[0]["allowed_mentions"]["parse"], json!([]));
        assert_eq!(bodies[0]["allowed_mentions"]["replied_user"], json!(false));
        assert_eq!(bodies[0]["message_reference"]["message_id"], json!("m1"));
    }

    #[tokio::test]
    async fn defer_and_followup_hit_interaction_endpoints() {
        let hits: Arc<std::sync::Mutex<Vec<(String, Value)>>> = Arc::default();
        let on_callback = hits.clone();
        let on_webhook = hits.clone();
        let router = Router::new()
            .route(
                "/interactions/{id}/{token}/callback",
                post(move |Path((id, token)): Path<(String, String)>, Json(body): Json<Value>| {
                    let hits = on_callback.clone();
                    async move {
                        hits.lock()
                            .expect("lock")
                            .push((format!("callback:{id}:{token}"), body));
                        StatusCode::NO_CONTENT
                    }
                }),
            )
            .route(
                "/webhooks/{app}/{token}",
                post(move |Path((app, token)): Path<(String, String)>, Json(body): Json<Value>| {
                    let hits = on_webhook.clone();
                    async move {
                        hits.lock()
                            .expect("lock")
                            .push((format!("webhook:{app}:{token}"), body));
                        Json(json!({ "id": "m9" }))
                    }
                }),
            );
        let base = spawn_mock(router).await;
        let discord = adapter(&base);
        let invocation = CommandInvocation {
            interaction_id: "i1".into(),
            application_id: "99".into(),
            token: "tok".into(),
            command_name: "summary".into(),
            channel_id: Some("c1".into()),
            channel_kind: Some(ChannelKind::Text),
            guild_id: None,
            user_id: None,
        };

        discord.defer_command(&invocation).await.expect("defer");
        discord
            .send_followup(&invocation, "- nothing happened")
            .await
            .expect("follow-up");

        let hits = hits.lock().expect("lock");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "callback:i1:tok");
        assert_eq!(hits[0].1, json!({ "type": 5 }));
        assert_eq!(hits[1].0, "webhook:99:tok");
        assert_eq!(hits[1].1["allowed_mentions"]["parse"], json!([]));
    }

    #[tokio::test]
    async fn send_rejects_blank_content_without_calling_api() {
        let discord = adapter("http://127.0.0.1:9");
        let err = discord
            .send(
                &ChannelId::new("c1"),
                OutboundMessage {
                    content: "   ".into(),
                    reply_to_message_id: None,
                },
            )
            .await
            .expect_err("blank content");
        assert!(matches!(err, PlatformError::InvalidInput(_)));
    }
}
