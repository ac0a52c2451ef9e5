use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::budget::default_ledger_path;
use crate::money::Usd;
use crate::ralph_config::{BOT_TOKEN_ENV, CHAT_ID_ENV, RalphToml, resolve_config_path};
use crate::util::{expand_tilde, slugify};

/// Shortest pause between `getUpdates` polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Chat credentials, resolved once at start-up and injected into the bridge.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Runtime configuration for Ralph.
///
/// Bridges the `ralph.toml` file with environment overrides and resolves every
/// path the orchestrator touches. Built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_file: PathBuf,
    pub build_root: PathBuf,
    pub ledger_file: PathBuf,
    pub daily_limit: Usd,
    pub max_iterations: u32,
    pub max_questions: usize,
    pub max_revisions: u32,
    pub reply_timeout: Duration,
    pub poll_interval: Duration,
    pub api_base: String,
    pub credentials: Option<TelegramCredentials>,
    pub verbose: bool,
    file_warnings: Vec<String>,
}

impl Config {
    /// Load configuration from the resolved config file plus the process environment.
    pub fn load(explicit: Option<&Path>, verbose: bool) -> Result<Self> {
        let config_file = resolve_config_path(explicit);
        let toml = if explicit.is_some() {
            RalphToml::load(&config_file)?
        } else {
            RalphToml::load_or_default(&config_file)?
        };
        let env_token = std::env::var(BOT_TOKEN_ENV).ok();
        let env_chat = std::env::var(CHAT_ID_ENV).ok();
        let mut config = Self::from_toml(toml, env_token, env_chat);
        config.config_file = config_file;
        config.verbose = verbose;
        Ok(config)
    }

    /// Build from parsed settings; environment values take precedence over the file.
    pub fn from_toml(toml: RalphToml, env_token: Option<String>, env_chat: Option<String>) -> Self {
        let file_warnings = toml.validate();
        let build_root = expand_tilde(&toml.build_directory);
        let ledger_file = toml
            .ledger_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| default_ledger_path(&build_root));

        let bot_token = env_token
            .filter(|t| !t.is_empty())
            .or(toml.telegram.bot_token.clone());
        let chat_id = env_chat
            .filter(|c| !c.is_empty())
            .or(toml.telegram.chat_id.clone());
        let credentials = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramCredentials { bot_token, chat_id }),
            _ => None,
        };

        Self {
            config_file: PathBuf::new(),
            build_root,
            ledger_file,
            daily_limit: Usd::from_dollars(toml.max_daily_cost),
            max_iterations: toml.max_iterations,
            max_questions: toml.phases.interview.max_questions,
            max_revisions: toml.phases.planning.max_revisions,
            reply_timeout: Duration::from_secs(toml.telegram.reply_timeout_minutes * 60),
            poll_interval: Duration::from_secs(toml.telegram.poll_interval_secs)
                .max(MIN_POLL_INTERVAL),
            api_base: toml.telegram.api_base.clone(),
            credentials,
            verbose: false,
            file_warnings,
        }
    }

    /// Configuration rooted at `build_root` with defaults everywhere else (used by tests and tooling).
    pub fn with_build_root(build_root: &Path) -> Self {
        let mut toml = RalphToml::default();
        toml.build_directory = build_root.to_path_buf();
        Self::from_toml(toml, None, None)
    }

    /// Directory for a new build: `<build_root>/<YYYY-MM-DD>-<project-slug>`.
    pub fn build_dir_for(&self, project_name: &str, date: chrono::NaiveDate) -> PathBuf {
        let slug = slugify(project_name);
        let slug = if slug.is_empty() { "build".to_string() } else { slug };
        self.build_root
            .join(format!("{}-{}", date.format("%Y-%m-%d"), slug))
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.build_root).with_context(|| {
            format!("Failed to create build directory: {}", self.build_root.display())
        })?;
        if let Some(parent) = self.ledger_file.parent() {
            std::fs::create_dir_all(parent).context("Failed to create ledger directory")?;
        }
        Ok(())
    }

    /// Reply timeout in whole minutes, for messages and errors.
    pub fn reply_timeout_minutes(&self) -> u64 {
        self.reply_timeout.as_secs() / 60
    }

    /// Warnings about the effective configuration: invalid file values plus
    /// missing credentials.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.file_warnings.clone();
        if self.credentials.is_none() {
            warnings.push(format!(
                "Chat credentials not configured; set {} and {}",
                BOT_TOKEN_ENV, CHAT_ID_ENV
            ));
        }
        warnings
    }
}
