//! Event dispatcher: drains the platform event queue and hands each event to
//! its handler on its own task.

use crate::commands::{SUMMARY_COMMAND, SummaryCommand};
use crate::translate::Translator;
use pg_channels::{ChatPlatform, CommandInvocation, PlatformEvent, ReactionEvent, ReadyEvent, UserId};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Gateway {
    platform: Arc<dyn ChatPlatform>,
    translator: Translator,
    summary: SummaryCommand,
    bot_user_id: RwLock<Option<UserId>>,
}

impl Gateway {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        translator: Translator,
        summary: SummaryCommand,
    ) -> Self {
        Self {
            platform,
            translator,
            summary,
            bot_user_id: RwLock::new(None),
        }
    }

    pub fn start(
        self: Arc<Self>,
        events: mpsc::Receiver<PlatformEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(events, shutdown).await;
        })
    }

    #[tracing::instrument(level = "info", skip_all, fields(platform = %self.platform.platform_id()))]
    async fn run_loop(
        self: Arc<Self>,
        mut events: mpsc::Receiver<PlatformEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("gateway loop cancelled");
                    return;
                }
                event = events.recv() => event,
            };
            let Some(event) = event else {
                tracing::info!("platform event queue closed");
                return;
            };
            self.clone().dispatch(event).await;
        }
    }

    async fn dispatch(self: Arc<Self>, event: PlatformEvent) {
        match event {
            PlatformEvent::Ready(ready) => self.on_ready(ready).await,
            PlatformEvent::ReactionAdded(reaction) => {
                tokio::spawn(async move { self.on_reaction(reaction).await });
            }
            PlatformEvent::Command(invocation) => {
                tokio::spawn(async move { self.on_command(invocation).await });
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(bot_user_id = %ready.bot_user_id))]
    async fn on_ready(&self, ready: ReadyEvent) {
        *self.bot_user_id.write().await = Some(ready.bot_user_id);
        match self
            .platform
            .register_commands(&ready.application_id, &self.summary.definitions())
            .await
        {
            Ok(()) => tracing::info!(application_id = %ready.application_id, "commands registered"),
            Err(e) => tracing::error!(%e, "command registration failed"),
        }
    }

    async fn on_reaction(&self, reaction: ReactionEvent) {
        let bot_user_id = self.bot_user_id.read().await.clone();
        self.translator
            .on_reaction(bot_user_id.as_ref(), &reaction)
            .await;
    }

    async fn on_command(&self, invocation: CommandInvocation) {
        if invocation.command_name != SUMMARY_COMMAND {
            tracing::debug!(command = %invocation.command_name, "unknown command ignored");
            return;
        }
        if let Err(e) = self.summary.run(&invocation).await {
            tracing::warn!(%e, "summary command failed");
        }
    }
}
