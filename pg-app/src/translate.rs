//! Reaction-triggered translation.
//!
//! Every failure here is silent towards the channel: reaction floods must not
//! produce error replies. Outcomes are only logged.

use crate::languages::SupportedLanguages;
use crate::prompts::PromptBuilder;
use crate::text::{normalize_content, split_for_delivery};
use pg_channels::{ChatPlatform, OutboundMessage, ReactionEvent, UserId};
use pg_llm::TextGenerator;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotReady,
    OwnReaction,
    UnsupportedEmoji,
    ChannelUnavailable,
    UnsupportedChannel,
    MessageUnavailable,
    BotAuthor,
    EmptyContent,
    GenerationFailed,
    EmptyTranslation,
    ReplyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Replied { language: String, parts: usize },
    Ignored(IgnoreReason),
}

#[derive(Clone)]
pub struct Translator {
    platform: Arc<dyn ChatPlatform>,
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptBuilder>,
    languages: Arc<SupportedLanguages>,
}

impl Translator {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        generator: Arc<dyn TextGenerator>,
        prompts: Arc<PromptBuilder>,
        languages: Arc<SupportedLanguages>,
    ) -> Self {
        Self {
            platform,
            generator,
            prompts,
            languages,
        }
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(
            channel_id = %event.channel_id,
            message_id = %event.message_id,
            user_id = %event.user_id,
            emoji = %event.emoji,
        )
    )]
    pub async fn on_reaction(
        &self,
        bot_user_id: Option<&UserId>,
        event: &ReactionEvent,
    ) -> TranslationOutcome {
        let outcome = self.translate(bot_user_id, event).await;
        match &outcome {
            TranslationOutcome::Replied { language, parts } => {
                tracing::info!(%language, parts, "translation posted");
            }
            TranslationOutcome::Ignored(reason) => {
                tracing::debug!(?reason, "reaction ignored");
            }
        }
        outcome
    }

    async fn translate(
        &self,
        bot_user_id: Option<&UserId>,
        event: &ReactionEvent,
    ) -> TranslationOutcome {
        use IgnoreReason::*;
        use TranslationOutcome::Ignored;

        let Some(bot_user_id) = bot_user_id else {
            return Ignored(NotReady);
        };
        if &event.user_id == bot_user_id {
            return Ignored(OwnReaction);
        }
        let Some(language) = self.languages.language_for(&event.emoji) else {
            return Ignored(UnsupportedEmoji);
        };

        match self.platform.channel_kind(&event.channel_id).await {
            Ok(kind) if kind.is_text_or_thread() => {}
            Ok(_) => return Ignored(UnsupportedChannel),
            Err(e) => {
                tracing::debug!(%e, "channel lookup failed");
                return Ignored(ChannelUnavailable);
            }
        }

        let message = match self
            .platform
            .fetch_message(&event.channel_id, &event.message_id)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%e, "message fetch failed");
                return Ignored(MessageUnavailable);
            }
        };
        if message.author.bot {
            return Ignored(BotAuthor);
        }

        let text = normalize_content(&message.content);
        if text.is_empty() {
            return Ignored(EmptyContent);
        }

        let translated = match self
            .generator
            .generate(&self.prompts.translation(&text, language))
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(%e, "translation generation failed");
                return Ignored(GenerationFailed);
            }
        };
        if translated.is_empty() {
            return Ignored(EmptyTranslation);
        }

        let parts = split_for_delivery(&translated, self.platform.max_message_chars());
        let count = parts.len();
        for part in parts {
            let reply = OutboundMessage {
                content: part,
                reply_to_message_id: Some(message.id.clone()),
            };
            if let Err(e) = self.platform.send(&event.channel_id, reply).await {
                tracing::warn!(%e, forbidden = e.is_forbidden(), "translation reply failed");
                return Ignored(ReplyFailed);
            }
        }

        TranslationOutcome::Replied {
            language: language.to_string(),
            parts: count,
        }
    }
}
