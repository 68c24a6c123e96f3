//! Process wiring: config → glossary → clients → gateway, plus the liveness server.

use crate::commands::SummaryCommand;
use crate::config::BotConfig;
use crate::gateway::Gateway;
use crate::glossary::SlangGlossary;
use crate::languages::SupportedLanguages;
use crate::prompts::PromptBuilder;
use crate::routes;
use crate::summarize::Summarizer;
use crate::translate::Translator;
use anyhow::Result;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use pg_channels::{ChatPlatform, DiscordAdapter};
use pg_llm::{GeminiClient, TextGenerator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const EVENT_QUEUE_CAPACITY: usize = 256;
const LIVENESS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn doctor(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = BotConfig::load(config_path).await?;
    let glossary = SlangGlossary::load(&cfg.glossary.path).await;
    GeminiClient::new(&cfg.llm.api_key, &cfg.llm.model, cfg.llm_timeout())?;
    DiscordAdapter::new(&cfg.discord.bot_token, cfg.discord_timeout())?;
    tracing::info!(
        model = %cfg.llm.model,
        glossary_path = %cfg.glossary.path.display(),
        glossary_terms = glossary.len(),
        summary_window_hours = cfg.summary.window_hours,
        summary_max_chunk_chars = cfg.summary.max_chunk_chars,
        liveness_enabled = cfg.liveness.enabled,
        liveness_addr = %cfg.liveness.bind_addr(),
        "config ok"
    );
    Ok(())
}

pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = BotConfig::load(config_path).await?;
    tracing::info!(
        model = %cfg.llm.model,
        llm_timeout_seconds = cfg.llm.timeout_seconds,
        discord_http_timeout_seconds = cfg.discord.http_timeout_seconds,
        glossary_path = %cfg.glossary.path.display(),
        summary_window_hours = cfg.summary.window_hours,
        summary_max_chunk_chars = cfg.summary.max_chunk_chars,
        liveness_enabled = cfg.liveness.enabled,
        liveness_addr = %cfg.liveness.bind_addr(),
        "polyglot starting"
    );

    let glossary = SlangGlossary::load(&cfg.glossary.path).await;
    let prompts = Arc::new(PromptBuilder::new(&glossary, cfg.summary.window_hours));
    let languages = Arc::new(SupportedLanguages::default());
    tracing::info!(
        glossary_terms = glossary.len(),
        supported_languages = languages.len(),
        "prompt inputs ready"
    );

    let generator: Arc<dyn TextGenerator> = Arc::new(
        GeminiClient::new(&cfg.llm.api_key, &cfg.llm.model, cfg.llm_timeout())?
            .with_base_url(&cfg.llm.base_url),
    );
    let discord = DiscordAdapter::new(&cfg.discord.bot_token, cfg.discord_timeout())?;
    let platform: Arc<dyn ChatPlatform> = Arc::new(discord.clone());

    if cfg.liveness.enabled {
        spawn_liveness(cfg.liveness.bind_addr());
    }

    let translator = Translator::new(
        platform.clone(),
        generator.clone(),
        prompts.clone(),
        languages,
    );
    let summary = SummaryCommand::new(
        platform.clone(),
        Summarizer::new(generator, prompts),
        cfg.summary.max_chunk_chars,
        cfg.summary.window_hours,
    );
    let gateway = Arc::new(Gateway::new(platform.clone(), translator, summary));

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();
    let gateway_handle = gateway.start(events_rx, shutdown.child_token());
    platform.start(events_tx).await?;
    tracing::info!(platform = platform.platform_id(), "gateway started");

    shutdown_signal(shutdown.clone()).await;
    discord.shutdown();
    match gateway_handle.await {
        Ok(()) => tracing::info!("gateway shutdown completed"),
        Err(e) => tracing::error!(error = %e, "gateway task join failed during shutdown"),
    }
    Ok(())
}

/// Runs detached from the bot: a bind or serve failure is logged and the
/// gateway keeps running without a liveness endpoint.
fn spawn_liveness(addr: SocketAddr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match bind_listener(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(%e, "liveness server disabled");
                return;
            }
        };
        if let Err(e) = serve_liveness(listener).await {
            tracing::error!(%e, "liveness server exited");
        }
    })
}

async fn bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("liveness bind failed for {addr}: {e}"))
}

async fn serve_liveness(listener: tokio::net::TcpListener) -> Result<()> {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::debug_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::debug!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let app = routes::router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            LIVENESS_REQUEST_TIMEOUT,
        ))
        .layer(trace_layer);

    tracing::info!(addr = ?listener.local_addr().ok(), "liveness server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; waiting on ctrl-c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                shutdown.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; shutting down");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; shutting down");
        }
    }
    shutdown.cancel();
}
