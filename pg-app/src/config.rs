//! Polyglot configuration loader.
//!
//! Optional TOML file first, then environment overrides (`.env` is loaded by
//! `main` before this runs), then validation. Missing credentials are fatal.

use anyhow::Context;
use pg_llm::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub glossary: GlossaryConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound for a single generation call.
    #[serde(default = "default_http_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            timeout_seconds: default_http_timeout_seconds(),
            base_url: default_llm_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlossaryConfig {
    #[serde(default = "default_glossary_path")]
    pub path: PathBuf,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            path: default_glossary_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    /// Character budget per transcript chunk; more than one chunk switches to map-reduce.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            window_hours: default_window_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_liveness_enabled")]
    pub enabled: bool,
    #[serde(default = "default_liveness_host")]
    pub host: IpAddr,
    #[serde(default = "default_liveness_port")]
    pub port: u16,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: default_liveness_enabled(),
            host: default_liveness_host(),
            port: default_liveness_port(),
        }
    }
}

impl LivenessConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_http_timeout_seconds() -> u64 {
    60
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_llm_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_glossary_path() -> PathBuf {
    PathBuf::from("slang.json")
}

fn default_max_chunk_chars() -> usize {
    crate::chunking::DEFAULT_MAX_CHUNK_CHARS
}

fn default_window_hours() -> u32 {
    24
}

fn default_liveness_enabled() -> bool {
    true
}

fn default_liveness_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_liveness_port() -> u16 {
    8080
}

impl BotConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(&path).await?,
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("DISCORD_TOKEN") {
            self.discord.bot_token = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("SLANG_GLOSSARY_PATH") {
            self.glossary.path = PathBuf::from(v);
        }
        if let Some(v) = get("PORT") {
            self.liveness.port = v.parse().with_context(|| format!("PORT={v:?}"))?;
        }
        if let Some(v) = get("SUMMARY_MAX_CHUNK_CHARS") {
            self.summary.max_chunk_chars = v
                .parse()
                .with_context(|| format!("SUMMARY_MAX_CHUNK_CHARS={v:?}"))?;
        }
        if let Some(v) = get("SUMMARY_WINDOW_HOURS") {
            self.summary.window_hours = v
                .parse()
                .with_context(|| format!("SUMMARY_WINDOW_HOURS={v:?}"))?;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECONDS") {
            self.llm.timeout_seconds = v
                .parse()
                .with_context(|| format!("LLM_TIMEOUT_SECONDS={v:?}"))?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("missing DISCORD_TOKEN (discord.bot_token)"));
        }
        if self.llm.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("missing GEMINI_API_KEY (llm.api_key)"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow::anyhow!("llm.model is required"));
        }
        if self.llm.timeout_seconds == 0 || self.discord.http_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("http timeouts must be > 0"));
        }
        if self.summary.max_chunk_chars == 0 {
            return Err(anyhow::anyhow!("summary.max_chunk_chars must be > 0"));
        }
        if !(1..=168).contains(&self.summary.window_hours) {
            return Err(anyhow::anyhow!(
                "summary.window_hours must be between 1 and 168"
            ));
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_seconds)
    }

    pub fn discord_timeout(&self) -> Duration {
        Duration::from_secs(self.discord.http_timeout_seconds)
    }
}
