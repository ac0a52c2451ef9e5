use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::phase::{BuildPhase, PhaseEvent};
use crate::builder::IterationOutcome;
use crate::errors::TransitionError;
use crate::interview::QaPair;
use crate::money::Usd;

pub const STATE_FILE: &str = "BUILD_STATE.json";
pub const PLAN_FILE: &str = "IMPLEMENTATION_PLAN.md";

/// Persistent snapshot of one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    pub phase: BuildPhase,
    pub project_name: String,
    pub source_idea: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub qa_pairs: Vec<QaPair>,

    #[serde(default)]
    pub approved_plan: String,
    #[serde(default)]
    pub plan_revisions: u32,

    #[serde(default)]
    pub current_iteration: u32,
    #[serde(default)]
    pub iterations: Vec<IterationOutcome>,
    #[serde(default)]
    pub last_iteration_path: Option<PathBuf>,

    #[serde(default)]
    pub total_cost: Usd,

    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pause_reason: Option<String>,
    /// Active phase the build was in when it paused.
    #[serde(default)]
    pub paused_from: Option<BuildPhase>,
    /// Message of the error that failed the build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildState {
    pub fn new(project_name: &str, source_idea: &str) -> Self {
        let now = Utc::now();
        Self {
            phase: BuildPhase::Idle,
            project_name: project_name.to_string(),
            source_idea: source_idea.to_string(),
            started_at: now,
            updated_at: now,
            qa_pairs: Vec::new(),
            approved_plan: String::new(),
            plan_revisions: 0,
            current_iteration: 0,
            iterations: Vec::new(),
            last_iteration_path: None,
            total_cost: Usd::ZERO,
            paused_at: None,
            pause_reason: None,
            paused_from: None,
            error: None,
        }
    }

    /// Move to the next phase through the state machine.
    pub fn apply(&mut self, event: PhaseEvent) -> Result<(), TransitionError> {
        let from = self.phase;
        self.phase = from.apply(event)?;
        if from == BuildPhase::Paused && self.phase != BuildPhase::Paused {
            self.paused_at = None;
            self.pause_reason = None;
            self.paused_from = None;
        }
        Ok(())
    }

    /// Pause with a reason, remembering which phase to continue into.
    pub fn pause(&mut self, reason: &str) -> Result<(), TransitionError> {
        let from = self.phase;
        self.apply(PhaseEvent::Pause)?;
        if from.is_active() {
            self.paused_from = Some(from);
        }
        self.paused_at = Some(Utc::now());
        self.pause_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> Result<(), TransitionError> {
        self.apply(PhaseEvent::Fail)?;
        self.error = Some(message.to_string());
        Ok(())
    }

    pub fn add_cost(&mut self, amount: Usd) {
        if amount.is_positive() {
            self.total_cost += amount;
        }
    }

    /// Append an outcome and make it the latest artifact.
    pub fn push_outcome(&mut self, outcome: IterationOutcome) {
        self.current_iteration = outcome.iteration_num;
        self.last_iteration_path = Some(outcome.path.clone());
        self.iterations.push(outcome);
    }

    /// Most recent outcome recorded for iteration `index`.
    pub fn outcome_for(&self, index: u32) -> Option<&IterationOutcome> {
        self.iterations.iter().rev().find(|o| o.iteration_num == index)
    }

    /// Outcome a rollback to `index` returns to. Iterations past the current one
    /// were built on a discarded chain and are not valid targets.
    pub fn rollback_target(&self, index: u32) -> Option<&IterationOutcome> {
        if index > self.current_iteration {
            return None;
        }
        self.outcome_for(index)
    }

    pub fn has_scaffold(&self) -> bool {
        self.outcome_for(0).is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Reads and overwrites `BUILD_STATE.json`.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(build_dir: &Path) -> Self {
        Self {
            state_file: build_dir.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    pub fn exists(&self) -> bool {
        self.state_file.exists()
    }

    pub fn save(&self, state: &BuildState) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(state).context("Failed to serialize build state")?;
        fs::write(&self.state_file, json).with_context(|| {
            format!("Failed to write state file: {}", self.state_file.display())
        })?;
        tracing::debug!(phase = %state.phase, "State saved");
        Ok(())
    }

    pub fn load(&self) -> Result<BuildState> {
        let content = fs::read_to_string(&self.state_file).with_context(|| {
            format!("No state file found at {}", self.state_file.display())
        })?;
        serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse state file: {}", self.state_file.display())
        })
    }
}
