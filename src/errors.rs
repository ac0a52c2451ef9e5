//! Typed error hierarchy for the Ralph orchestrator.
//!
//! Three enums cover the three layers:
//! - `BuildError` — phase-step failures the orchestrator recovers from (pause/fail)
//! - `BridgeError` — chat channel transport and reply-wait failures
//! - `TransitionError` — rejected phase transitions from the pure state machine

use thiserror::Error;

use crate::orchestrator::{BuildPhase, PhaseEvent};

/// Errors raised while driving a build through its phases.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Budget exceeded: {message}")]
    BudgetExceeded { message: String },

    #[error("No reply to {context} within {minutes} minutes")]
    ReplyTimeout { context: String, minutes: u64 },

    #[error("Max revisions ({max}) exceeded")]
    MaxRevisionsExceeded { max: u32 },

    #[error("Plan rejected by user")]
    PlanRejected,

    #[error("Channel error: {0}")]
    Transport(#[source] BridgeError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn budget(message: impl Into<String>) -> Self {
        BuildError::BudgetExceeded {
            message: message.into(),
        }
    }

    /// Map a bridge failure during a reply wait, tagging timeouts with what was being awaited.
    pub fn from_reply(err: BridgeError, context: &str) -> Self {
        match err {
            BridgeError::Timeout { minutes } => BuildError::ReplyTimeout {
                context: context.to_string(),
                minutes,
            },
            other => BuildError::Transport(other),
        }
    }
}

/// Errors from the chat channel.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Chat credentials not configured (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID)")]
    MissingCredentials,

    #[error("Request failed after {attempts} attempts: {source}")]
    Http {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Chat API error: {description}")]
    Api { description: String },

    #[error("Failed to send prompt message")]
    SendFailed,

    #[error("No response within {minutes} minutes")]
    Timeout { minutes: u64 },
}

/// A phase transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot apply {event:?} in phase {from}")]
    Invalid { from: BuildPhase, event: PhaseEvent },
}
