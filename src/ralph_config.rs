//! Configuration file support for Ralph.
//!
//! Settings are read from `ralph.toml`, located via `--config`, then `$RALPH_CONFIG`,
//! then `<config_dir>/ralph/ralph.toml`. Every key is optional; a missing file means
//! defaults. Layering is file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! build_directory = "~/ralph-builds"
//! max_daily_cost = 5.0
//! max_iterations = 10
//!
//! [phases.interview]
//! max_questions = 5
//!
//! [phases.planning]
//! max_revisions = 3
//!
//! [telegram]
//! chat_id = "123456789"
//! reply_timeout_minutes = 30
//! poll_interval_secs = 5
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RALPH_CONFIG";
/// Environment variable holding the bot token.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the recipient chat id.
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Interview phase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSettings {
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            max_questions: default_max_questions(),
        }
    }
}

/// Planning phase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSettings {
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
        }
    }
}

/// Per-phase section (`[phases.interview]`, `[phases.planning]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhasesSection {
    #[serde(default)]
    pub interview: InterviewSettings,
    #[serde(default)]
    pub planning: PlanningSettings,
}

/// Chat channel section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSection {
    /// Bot token; `TELEGRAM_BOT_TOKEN` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Recipient chat id; `TELEGRAM_CHAT_ID` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_reply_timeout_minutes")]
    pub reply_timeout_minutes: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_api_base(),
            reply_timeout_minutes: default_reply_timeout_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// The parsed contents of `ralph.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RalphToml {
    /// Root path for build artifacts (`~` is expanded).
    #[serde(default = "default_build_directory")]
    pub build_directory: PathBuf,
    /// Daily spend ceiling in dollars.
    #[serde(default = "default_max_daily_cost")]
    pub max_daily_cost: f64,
    /// Hard cap on build iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Cost ledger location (defaults to `<build_directory>/token_costs.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_file: Option<PathBuf>,
    #[serde(default)]
    pub phases: PhasesSection,
    #[serde(default)]
    pub telegram: TelegramSection,
}

fn default_build_directory() -> PathBuf {
    PathBuf::from("~/ralph-builds")
}

fn default_max_daily_cost() -> f64 {
    5.0
}

fn default_max_iterations() -> u32 {
    10
}

fn default_max_questions() -> usize {
    5
}

fn default_max_revisions() -> u32 {
    3
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_reply_timeout_minutes() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for RalphToml {
    fn default() -> Self {
        Self {
            build_directory: default_build_directory(),
            max_daily_cost: default_max_daily_cost(),
            max_iterations: default_max_iterations(),
            ledger_file: None,
            phases: PhasesSection::default(),
            telegram: TelegramSection::default(),
        }
    }
}

impl RalphToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid ralph.toml")
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Check values and return human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(self.max_daily_cost > 0.0) {
            warnings.push(format!(
                "max_daily_cost must be positive (got {}); every operation will be refused",
                self.max_daily_cost
            ));
        }
        if self.max_iterations == 0 {
            warnings.push("max_iterations is 0; the build phase will only scaffold".to_string());
        }
        if self.phases.interview.max_questions == 0 {
            warnings.push("phases.interview.max_questions is 0; no questions will be asked".to_string());
        }
        if self.telegram.reply_timeout_minutes == 0 {
            warnings.push("telegram.reply_timeout_minutes is 0; every reply wait times out".to_string());
        }
        if self.telegram.poll_interval_secs == 0 {
            warnings.push("telegram.poll_interval_secs is 0; polling once per second instead".to_string());
        }
        warnings
    }
}

/// Resolve which config file to read: explicit path, `$RALPH_CONFIG`, then the user config dir.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralph")
        .join("ralph.toml")
}
