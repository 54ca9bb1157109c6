//! Project configuration file support for postloop.
//!
//! Loads configuration from `postloop.toml` in the working directory and
//! resolves it against environment overrides and built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use postloop_llm::{OLLAMA_DEFAULT_HOST, OLLAMA_DEFAULT_MODEL};
use postloop_logging::PostHistory;
use postloop_publish::X_API_BASE;

use crate::scheduler::{Schedule, DEFAULT_POSTS_PER_RUN, DEFAULT_TIMES, DEFAULT_TIMEZONE};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "postloop.toml";

pub const DEFAULT_KNOWLEDGE_FILE: &str = "knowledge_base.json";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Project-level configuration loaded from `postloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default, rename = "loop")]
    pub refinement: LoopConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Text-generation backend
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub host: Option<String>,
    /// Model for both roles
    pub model: Option<String>,
    pub generator_model: Option<String>,
    pub critic_model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeConfig {
    /// Relative paths resolve against the working directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    /// Keep the first topic and style for every revision of a run
    pub pin_sources: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    pub dry_run: Option<bool>,
    pub publish_unapproved: Option<bool>,
    pub api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Daily slots as "HH:MM"
    pub times: Option<Vec<String>>,
    /// IANA name such as "Asia/Kolkata", or a fixed offset like "+05:30"
    #[serde(alias = "utc_offset")]
    pub timezone: Option<String>,
    pub posts_per_run: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    pub path: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Priority: [model].generator_model > [model].model
    pub fn generator_model(&self) -> Option<&str> {
        self.model
            .generator_model
            .as_deref()
            .or(self.model.model.as_deref())
    }

    /// Priority: [model].critic_model > [model].model
    pub fn critic_model(&self) -> Option<&str> {
        self.model
            .critic_model
            .as_deref()
            .or(self.model.model.as_deref())
    }
}

/// Effective settings after applying file, environment and defaults.
/// CLI flags are applied on top by the caller.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub generator_model: String,
    pub critic_model: String,
    pub request_timeout: Duration,
    pub knowledge_path: PathBuf,
    pub pin_sources: bool,
    pub dry_run: bool,
    pub publish_unapproved: bool,
    pub api_base: String,
    pub schedule: Schedule,
    pub port: u16,
    pub history_path: PathBuf,
}

impl Settings {
    /// Resolve with `OLLAMA_HOST`, `OLLAMA_MODEL` and `PORT` read from the
    /// process environment
    pub fn resolve(config: &ProjectConfig, working_dir: &Path) -> Result<Self> {
        Self::resolve_with_env(config, working_dir, |name| std::env::var(name).ok())
    }

    /// Priority: environment > file > default. `OLLAMA_MODEL` replaces the
    /// model for both roles.
    pub fn resolve_with_env<F>(config: &ProjectConfig, working_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let host = env("OLLAMA_HOST")
            .or_else(|| config.model.host.clone())
            .unwrap_or_else(|| OLLAMA_DEFAULT_HOST.to_string());

        let env_model = env("OLLAMA_MODEL");
        let generator_model = env_model
            .clone()
            .or_else(|| config.generator_model().map(str::to_string))
            .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string());
        let critic_model = env_model
            .or_else(|| config.critic_model().map(str::to_string))
            .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string());

        let port = match env("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", port))?,
            None => config.server.port.unwrap_or(DEFAULT_PORT),
        };

        let knowledge_path = working_dir.join(
            config
                .knowledge
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_FILE)),
        );

        let history_path = match &config.history.path {
            Some(path) => working_dir.join(path),
            None => PostHistory::default_path()
                .context("Could not determine history location; set [history] path")?,
        };

        let times = config
            .schedule
            .times
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMES.iter().map(|t| t.to_string()).collect());
        let schedule = Schedule::new(
            &times,
            config
                .schedule
                .timezone
                .as_deref()
                .unwrap_or(DEFAULT_TIMEZONE),
            config
                .schedule
                .posts_per_run
                .unwrap_or(DEFAULT_POSTS_PER_RUN),
        )?;

        Ok(Self {
            host,
            generator_model,
            critic_model,
            request_timeout: Duration::from_secs(
                config
                    .model
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            knowledge_path,
            pin_sources: config.refinement.pin_sources.unwrap_or(false),
            dry_run: config.publish.dry_run.unwrap_or(false),
            publish_unapproved: config.publish.publish_unapproved.unwrap_or(true),
            api_base: config
                .publish
                .api_base
                .clone()
                .unwrap_or_else(|| X_API_BASE.to_string()),
            schedule,
            port,
            history_path,
        })
    }
}
