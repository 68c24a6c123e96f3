//! `/summary`: summarize the recent history of the invoking channel.

use crate::chunking::chunk_lines;
use crate::summarize::Summarizer;
use crate::text::{format_chat_line, normalize_content, sanitize_display_name, split_for_delivery};
use chrono::{Duration, Utc};
use pg_channels::{ChatPlatform, CommandDefinition, CommandInvocation, HistoryMessage};
use std::sync::Arc;

pub const SUMMARY_COMMAND: &str = "summary";

pub const REPLY_NOT_TEXT_CHANNEL: &str = "This command can only be used in a text channel.";
pub const REPLY_HISTORY_FORBIDDEN: &str =
    "I don't have permission to read message history in this channel.";

pub fn command_definitions(window_hours: u32) -> Vec<CommandDefinition> {
    vec![CommandDefinition {
        name: SUMMARY_COMMAND.to_string(),
        description: format!(
            "Summarize messages from the past {window_hours} hours in this channel."
        ),
    }]
}

/// Transcript lines for every non-bot message with non-empty content, in input order.
pub fn transcript_lines(messages: &[HistoryMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| !m.author.bot)
        .filter_map(|m| {
            let content = normalize_content(&m.content);
            if content.is_empty() {
                return None;
            }
            let author = sanitize_display_name(&m.author.display_name);
            Some(format_chat_line(m.created_at, &author, &content))
        })
        .collect()
}

#[derive(Clone)]
pub struct SummaryCommand {
    platform: Arc<dyn ChatPlatform>,
    summarizer: Summarizer,
    max_chunk_chars: usize,
    window_hours: u32,
}

impl SummaryCommand {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        summarizer: Summarizer,
        max_chunk_chars: usize,
        window_hours: u32,
    ) -> Self {
        Self {
            platform,
            summarizer,
            max_chunk_chars,
            window_hours,
        }
    }

    pub fn definitions(&self) -> Vec<CommandDefinition> {
        command_definitions(self.window_hours)
    }

    /// Defer, compute the reply, then deliver it as one or more follow-ups.
    /// Every path ends in exactly one logical reply.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(
            interaction_id = %invocation.interaction_id,
            channel_id = ?invocation.channel_id,
            user_id = ?invocation.user_id,
        )
    )]
    pub async fn run(&self, invocation: &CommandInvocation) -> anyhow::Result<()> {
        self.platform
            .defer_command(invocation)
            .await
            .map_err(|e| anyhow::anyhow!("defer /{SUMMARY_COMMAND} failed: {e}"))?;

        let reply = self.compose_reply(invocation).await;
        for part in split_for_delivery(&reply, self.platform.max_message_chars()) {
            self.platform
                .send_followup(invocation, &part)
                .await
                .map_err(|e| anyhow::anyhow!("follow-up for /{SUMMARY_COMMAND} failed: {e}"))?;
        }
        Ok(())
    }

    async fn compose_reply(&self, invocation: &CommandInvocation) -> String {
        let Some(channel_id) = invocation.channel_id.as_ref() else {
            return REPLY_NOT_TEXT_CHANNEL.to_string();
        };
        let kind = match invocation.channel_kind {
            Some(kind) => kind,
            None => match self.platform.channel_kind(channel_id).await {
                Ok(kind) => kind,
                Err(e) => {
                    tracing::warn!(%e, "channel lookup failed");
                    return REPLY_NOT_TEXT_CHANNEL.to_string();
                }
            },
        };
        if !kind.is_text_channel() {
            tracing::info!(?kind, "summary rejected outside a text channel");
            return REPLY_NOT_TEXT_CHANNEL.to_string();
        }

        let since = Utc::now() - Duration::hours(i64::from(self.window_hours));
        let history = match self.platform.fetch_history(channel_id, since).await {
            Ok(history) => history,
            Err(e) if e.is_forbidden() => {
                tracing::warn!(%e, "history read forbidden");
                return REPLY_HISTORY_FORBIDDEN.to_string();
            }
            Err(e) => {
                tracing::warn!(%e, "history fetch failed");
                return format!("Error while fetching messages: {e}");
            }
        };

        let lines = transcript_lines(&history);
        tracing::info!(
            fetched = history.len(),
            qualifying = lines.len(),
            "history collected"
        );
        if lines.is_empty() {
            return format!("No messages found in the past {} hours.", self.window_hours);
        }

        let chunks = chunk_lines(&lines, self.max_chunk_chars);
        match self.summarizer.summarize(&chunks).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(%e, "summary generation failed");
                format!("Error generating summary: {e}")
            }
        }
    }
}
