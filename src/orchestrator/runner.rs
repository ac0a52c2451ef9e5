//! Drives one build through interview, planning, build and finalization.
//!
//! Each step is a method returning `Result<_, BuildError>`; `run`/`resume` wrap the
//! pipeline and turn errors into a paused or failed snapshot plus a notification,
//! so callers always get a `RunReport` back. State is saved after every mutation.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::phase::{BuildPhase, PhaseEvent};
use super::state::{BuildState, PLAN_FILE, StateStore};
use crate::bridge::messages::{self, AlertKind};
use crate::bridge::{Command, CommunicationBridge, parse_command};
use crate::budget::BudgetGuardian;
use crate::builder::{FinalArtifact, IterationBuilder, IterationOutcome, SCAFFOLD_COST};
use crate::config::Config;
use crate::errors::BuildError;
use crate::interview::{self, QaPair, Requirements};
use crate::journal::BuildJournal;
use crate::money::Usd;
use crate::planner;

/// Budget headroom required before asking an interview question.
pub const INTERVIEW_CHECK: Usd = Usd::cents(10);
/// Recorded per answered question.
pub const INTERVIEW_COST: Usd = Usd::cents(5);
/// Budget headroom required before presenting a plan.
pub const PLANNING_CHECK: Usd = Usd::cents(30);
/// Recorded when a plan is approved.
pub const PLANNING_COST: Usd = Usd::cents(30);
/// Budget headroom required before each build iteration.
pub const ITERATION_CHECK: Usd = Usd::cents(50);
/// Re-prompts allowed for unclear checkpoint replies before stopping.
pub const MAX_UNCLEAR_REPLIES: u32 = 3;

/// Build iteration tasks, in order. Truncated to the configured maximum.
pub const BUILD_TASKS: [&str; 7] = [
    "Create scaffold and project structure",
    "Implement core functionality",
    "Add error handling and validation",
    "Implement data processing",
    "Add output/formatting",
    "Create tests",
    "Final polish and documentation",
];

/// Limits the orchestrator works within.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub max_questions: usize,
    pub max_revisions: u32,
    pub max_iterations: u32,
    pub reply_timeout: Duration,
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_questions: config.max_questions,
            max_revisions: config.max_revisions,
            max_iterations: config.max_iterations,
            reply_timeout: config.reply_timeout,
        }
    }
}

/// Why a run ended without finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    BudgetExceeded,
    Paused,
    Incomplete,
    Error,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::BudgetExceeded => "budget_exceeded",
            FailureReason::Paused => "paused",
            FailureReason::Incomplete => "incomplete",
            FailureReason::Error => "error",
        }
    }
}

/// Result of a `run` or `resume` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub reason: Option<FailureReason>,
    pub phase: BuildPhase,
    pub build_dir: PathBuf,
    pub final_path: Option<PathBuf>,
    pub total_cost: Usd,
    pub iterations: u32,
    pub error: Option<String>,
}

enum BuildLoop {
    Completed,
    Stopped,
}

enum Completion {
    Finished(FinalArtifact),
    Stopped,
}

pub struct PhaseOrchestrator {
    settings: OrchestratorSettings,
    build_dir: PathBuf,
    state: BuildState,
    store: StateStore,
    journal: BuildJournal,
    guardian: BudgetGuardian,
    bridge: CommunicationBridge,
    builder: IterationBuilder,
}

impl PhaseOrchestrator {
    /// Orchestrator for `project_name` in `build_dir`. Picks up an existing snapshot
    /// there; otherwise starts a fresh IDLE build.
    pub fn new(
        settings: OrchestratorSettings,
        build_dir: &Path,
        project_name: &str,
        source_idea: &str,
        guardian: BudgetGuardian,
        bridge: CommunicationBridge,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(build_dir)?;
        let store = StateStore::new(build_dir);
        let state = if store.exists() {
            let state = store.load()?;
            tracing::info!(phase = %state.phase, "Loaded existing build state");
            state
        } else {
            let state = BuildState::new(project_name, source_idea);
            store.save(&state)?;
            state
        };
        Ok(Self::assemble(settings, build_dir, state, store, guardian, bridge))
    }

    /// Orchestrator over an existing snapshot in `build_dir`.
    pub fn open(
        settings: OrchestratorSettings,
        build_dir: &Path,
        guardian: BudgetGuardian,
        bridge: CommunicationBridge,
    ) -> anyhow::Result<Self> {
        let store = StateStore::new(build_dir);
        let state = store.load()?;
        Ok(Self::assemble(settings, build_dir, state, store, guardian, bridge))
    }

    fn assemble(
        settings: OrchestratorSettings,
        build_dir: &Path,
        state: BuildState,
        store: StateStore,
        guardian: BudgetGuardian,
        bridge: CommunicationBridge,
    ) -> Self {
        let builder = IterationBuilder::new(build_dir, &state.project_name);
        Self {
            settings,
            build_dir: build_dir.to_path_buf(),
            journal: BuildJournal::new(build_dir),
            state,
            store,
            guardian,
            bridge,
            builder,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn tasks(&self) -> Vec<&'static str> {
        BUILD_TASKS
            .iter()
            .copied()
            .take(self.settings.max_iterations as usize)
            .collect()
    }

    /// Run the whole workflow from IDLE. A build that already has a snapshot
    /// past IDLE is resumed instead (without continuing a pause).
    pub async fn run(&mut self) -> RunReport {
        if self.state.phase != BuildPhase::Idle {
            return self.resume(false).await;
        }
        tracing::info!(project = %self.state.project_name, "Starting build");
        self.drive(BuildPhase::Interview).await
    }

    /// Resume from whatever phase the snapshot records. Interview and planning
    /// restart from scratch; build continues after `current_iteration`. A paused
    /// build only proceeds when `continue_paused` is set.
    pub async fn resume(&mut self, continue_paused: bool) -> RunReport {
        match self.state.phase {
            BuildPhase::Idle => self.drive(BuildPhase::Interview).await,
            BuildPhase::Done => self.report(None, None),
            BuildPhase::Failed => self.report(Some(FailureReason::Error), self.state.error.clone()),
            BuildPhase::Paused if !continue_paused => {
                self.bridge
                    .send_message(&messages::still_paused(self.state.pause_reason.as_deref()))
                    .await;
                self.report(Some(FailureReason::Paused), None)
            }
            BuildPhase::Paused => {
                let to = self.state.paused_from.unwrap_or(BuildPhase::Interview);
                if let Err(e) = self.transition(PhaseEvent::Continue { to }) {
                    return self.handle_error(e).await;
                }
                self.journal.note("BUILD CONTINUED", &format!("Continuing into {}", to));
                self.bridge
                    .send_message(&messages::build_resumed(&self.state.project_name, to.as_str()))
                    .await;
                self.drive(to).await
            }
            phase => {
                self.bridge
                    .send_message(&messages::build_resumed(&self.state.project_name, phase.as_str()))
                    .await;
                self.journal.note("BUILD RESUMED", &format!("Phase: {}", phase));
                self.drive(phase).await
            }
        }
    }

    async fn drive(&mut self, start: BuildPhase) -> RunReport {
        match self.pipeline(start).await {
            Ok(Completion::Finished(artifact)) => {
                let mut report = self.report(None, None);
                report.final_path = Some(artifact.path);
                report
            }
            Ok(Completion::Stopped) => self.report(Some(FailureReason::Incomplete), None),
            Err(e) => self.handle_error(e).await,
        }
    }

    async fn pipeline(&mut self, start: BuildPhase) -> Result<Completion, BuildError> {
        match start {
            BuildPhase::Idle | BuildPhase::Interview => {
                let requirements = self.run_interview().await?;
                self.run_planning(&requirements).await?;
            }
            BuildPhase::Planning => {
                let requirements =
                    interview::summarize_requirements(&self.state.source_idea, &self.state.qa_pairs);
                self.run_planning(&requirements).await?;
            }
            _ => {}
        }
        match self.run_build().await? {
            BuildLoop::Completed => Ok(Completion::Finished(self.run_done().await?)),
            BuildLoop::Stopped => Ok(Completion::Stopped),
        }
    }

    async fn handle_error(&mut self, err: BuildError) -> RunReport {
        match err {
            BuildError::BudgetExceeded { message } => {
                tracing::error!(%message, "Budget exceeded");
                self.pause("Budget limit reached", &message).await;
                let mut report = self.report(Some(FailureReason::BudgetExceeded), None);
                report.error = Some(message);
                report
            }
            BuildError::ReplyTimeout { ref context, .. } => {
                let reason = format!("{} timeout", capitalize(context));
                self.pause(&reason, &err.to_string()).await;
                self.report(Some(FailureReason::Paused), Some(err.to_string()))
            }
            other => {
                let message = other.to_string();
                tracing::error!(error = %message, "Build failed");
                if let Err(e) = self.state.fail(&message) {
                    tracing::warn!(error = %e, "Could not mark build failed");
                }
                self.persist_quietly();
                self.journal.note("BUILD FAILED", &message);
                self.bridge
                    .send_message(&messages::alert("Build Failed", &message, AlertKind::Error))
                    .await;
                self.report(Some(FailureReason::Error), Some(message))
            }
        }
    }

    async fn pause(&mut self, reason: &str, details: &str) {
        tracing::warn!(reason, details, "Build paused");
        if let Err(e) = self.state.pause(reason) {
            tracing::warn!(error = %e, "Could not mark build paused");
        }
        self.persist_quietly();
        self.journal
            .note("BUILD PAUSED", &format!("{}: {}", reason, details));
        self.bridge
            .send_message(&messages::alert(
                "Build Paused",
                &format!("{}\n\n{}", reason, details),
                AlertKind::Warning,
            ))
            .await;
    }

    fn report(&self, reason: Option<FailureReason>, error: Option<String>) -> RunReport {
        RunReport {
            success: self.state.phase == BuildPhase::Done && reason.is_none(),
            reason,
            phase: self.state.phase,
            build_dir: self.build_dir.clone(),
            final_path: None,
            total_cost: self.state.total_cost,
            iterations: self.state.current_iteration,
            error,
        }
    }

    fn save(&mut self) -> Result<(), BuildError> {
        self.state.touch();
        self.store.save(&self.state)?;
        Ok(())
    }

    fn persist_quietly(&mut self) {
        if let Err(e) = self.save() {
            tracing::error!(error = %e, "Failed to persist build state");
        }
    }

    fn transition(&mut self, event: PhaseEvent) -> Result<(), BuildError> {
        let from = self.state.phase;
        self.state.apply(event)?;
        tracing::info!(%from, to = %self.state.phase, "Phase transition");
        self.save()
    }

    fn record_cost(&mut self, operation: &str, phase: &str, iteration: u32, amount: Usd) -> Result<(), BuildError> {
        self.guardian.record_cost(
            operation,
            phase,
            iteration,
            amount,
            Some(self.state.project_name.as_str()),
        )?;
        self.state.add_cost(amount);
        self.save()
    }

    async fn ask(&self, prompt: &str, context: &str) -> Result<String, BuildError> {
        self.bridge
            .request_reply(prompt, self.settings.reply_timeout)
            .await
            .map_err(|e| BuildError::from_reply(e, context))
    }

    async fn run_interview(&mut self) -> Result<Requirements, BuildError> {
        self.transition(PhaseEvent::BeginInterview)?;
        self.guardian.assert_under_limit("Interview not started.")?;
        self.journal.note("PHASE 1 START", "Interview phase");
        self.bridge
            .send_message(&messages::build_started(&self.state.project_name))
            .await;

        self.state.qa_pairs.clear();
        self.save()?;

        let questions = interview::generate_questions(&self.state.source_idea, self.settings.max_questions);
        let total = questions.len();
        for (i, question) in questions.iter().enumerate() {
            if !self.guardian.has_budget_for(INTERVIEW_CHECK) {
                return Err(BuildError::budget("Budget exhausted during interview"));
            }
            let answer = self
                .ask(&messages::interview_question(i + 1, total, question), "interview")
                .await?;
            self.journal
                .note("Question answered", &format!("Q: {}\nA: {}", question, answer));
            self.state.qa_pairs.push(QaPair::new(question, &answer));
            self.record_cost("interview_question", "interview", (i + 1) as u32, INTERVIEW_COST)?;
        }

        let requirements = interview::summarize_requirements(&self.state.source_idea, &self.state.qa_pairs);
        let summary = serde_json::to_string_pretty(&requirements).map_err(anyhow::Error::from)?;
        self.journal.note("Phase 1 Complete", &format!("Requirements gathered:\n{}", summary));
        Ok(requirements)
    }

    async fn run_planning(&mut self, requirements: &Requirements) -> Result<String, BuildError> {
        self.transition(PhaseEvent::BeginPlanning)?;
        self.guardian.assert_under_limit("Planning not started.")?;
        self.journal.note("PHASE 2 START", "Planning phase");
        self.state.plan_revisions = 0;
        self.save()?;

        let plan = planner::create_plan(requirements, &self.state.project_name);
        let estimated_cost = plan.estimate.cost;
        let mut markdown = plan.markdown;

        loop {
            if !self.guardian.has_budget_for(PLANNING_CHECK) {
                return Err(BuildError::budget("Budget exhausted during planning"));
            }
            let reply = self
                .ask(&messages::plan_approval(&markdown, estimated_cost), "approval")
                .await?;

            let feedback = match parse_command(&reply) {
                Command::Approve => return self.approve_plan(markdown),
                Command::Reject => {
                    self.journal.note("Plan rejected", "");
                    return Err(BuildError::PlanRejected);
                }
                Command::Revise(feedback) => feedback,
                other => {
                    tracing::warn!(reply = %reply, command = %other, "Unclear approval reply, treating as revision");
                    String::new()
                }
            };

            self.state.plan_revisions += 1;
            self.save()?;
            if self.state.plan_revisions > self.settings.max_revisions {
                return Err(BuildError::MaxRevisionsExceeded {
                    max: self.settings.max_revisions,
                });
            }
            self.journal.note("Plan revision requested", &feedback);
            markdown = planner::revise_plan(&markdown, &feedback);
            self.bridge
                .send_message(&messages::plan_revising(self.state.plan_revisions + 1))
                .await;
        }
    }

    fn approve_plan(&mut self, markdown: String) -> Result<String, BuildError> {
        let plan_file = self.build_dir.join(PLAN_FILE);
        std::fs::write(&plan_file, &markdown).map_err(|source| BuildError::Io {
            path: plan_file.clone(),
            source,
        })?;
        self.state.approved_plan = markdown.clone();
        self.journal
            .note("Plan approved", &format!("Revisions: {}", self.state.plan_revisions));
        self.record_cost("plan_approved", "planning", 0, PLANNING_COST)?;
        Ok(markdown)
    }

    async fn run_build(&mut self) -> Result<BuildLoop, BuildError> {
        self.transition(PhaseEvent::BeginBuild)?;
        self.guardian.assert_under_limit("Build not started.")?;
        self.journal.note("PHASE 3 START", "Build phase");

        let tasks = self.tasks();
        let total = tasks.len() as u32;
        self.bridge
            .send_message(&messages::build_phase_started(tasks.len()))
            .await;

        if !self.state.has_scaffold() {
            if !self.guardian.has_budget_for(SCAFFOLD_COST) {
                return Err(BuildError::budget("Budget exhausted before scaffold"));
            }
            let outcome = self.builder.create_scaffold(&self.state.approved_plan)?;
            let cost = outcome.cost;
            self.state.push_outcome(outcome);
            self.record_cost("scaffold", "build", 0, cost)?;
        }

        let mut fix_note: Option<String> = None;
        while self.state.current_iteration < total {
            let index = self.state.current_iteration + 1;
            if !self.guardian.has_budget_for(ITERATION_CHECK) {
                return Err(BuildError::budget("Budget exhausted during build"));
            }

            let task = tasks[(index - 1) as usize];
            let previous = self
                .state
                .last_iteration_path
                .clone()
                .unwrap_or_else(|| self.build_dir.clone());
            let outcome = self
                .builder
                .build_iteration(index, task, &previous, fix_note.take().as_deref())?;
            let cost = outcome.cost;
            self.state.push_outcome(outcome.clone());
            self.record_cost(&format!("build_iter_{}", index), "build", index, cost)?;

            match self.checkpoint(&outcome, total).await? {
                Command::Continue | Command::Approve => {}
                Command::Stop | Command::Reject | Command::Unknown => {
                    self.journal
                        .note("Build stopped by user", &format!("At iteration {}", index));
                    self.bridge.send_message(&messages::build_stopped(index)).await;
                    return Ok(BuildLoop::Stopped);
                }
                Command::Fix(note) | Command::Revise(note) => {
                    let note = if note.is_empty() { "general fix".to_string() } else { note };
                    self.journal.note("Fix requested", &note);
                    self.bridge.send_message(&messages::applying_fix(&note)).await;
                    fix_note = Some(note);
                }
                Command::Rollback(target) => {
                    let target = target.unwrap_or(index - 1);
                    self.rollback(target).await?;
                }
            }
        }
        Ok(BuildLoop::Completed)
    }

    /// Present an outcome and wait for a usable command, re-prompting on unclear replies.
    async fn checkpoint(&mut self, outcome: &IterationOutcome, total: u32) -> Result<Command, BuildError> {
        let mut prompt = messages::iteration_result(
            outcome.iteration_num,
            total,
            &outcome.changed_files(),
            outcome.tests_passed,
            outcome.cost,
        );
        for _ in 0..=MAX_UNCLEAR_REPLIES {
            let reply = self.ask(&prompt, "checkpoint").await?;
            let command = parse_command(&reply);
            if command != Command::Unknown {
                return Ok(command);
            }
            tracing::warn!(reply = %reply, "Unclear checkpoint reply");
            self.journal.note("Unclear checkpoint reply", &reply);
            prompt = messages::unclear_reply(&reply);
        }
        tracing::warn!("No usable checkpoint reply, stopping build");
        Ok(Command::Stop)
    }

    async fn rollback(&mut self, target: u32) -> Result<(), BuildError> {
        self.journal
            .note("Rollback requested", &format!("To iteration {}", target));
        let Some(outcome) = self.state.rollback_target(target).cloned() else {
            tracing::warn!(target, "Rollback target not found");
            self.bridge.send_message(&messages::rollback_unknown(target)).await;
            return Ok(());
        };
        self.state.current_iteration = target;
        self.state.last_iteration_path = Some(outcome.path);
        self.save()?;
        tracing::info!(target, "Rolled back");
        self.bridge.send_message(&messages::rolled_back(target)).await;
        Ok(())
    }

    async fn run_done(&mut self) -> Result<FinalArtifact, BuildError> {
        self.journal.note("PHASE 4 START", "Finalization");
        let source = self
            .state
            .last_iteration_path
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No iteration output to finalize"))?;
        let artifact = self.builder.create_final(&source)?;
        self.transition(PhaseEvent::Finish)?;

        self.bridge
            .send_message(&messages::build_complete(
                &artifact.path.display().to_string(),
                self.state.total_cost,
                self.state.current_iteration,
                &artifact.files,
            ))
            .await;
        self.journal.note(
            "BUILD COMPLETE",
            &format!(
                "Total cost: {}, Iterations: {}",
                self.state.total_cost, self.state.current_iteration
            ),
        );
        Ok(artifact)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::scripted::ScriptedTransport;
    use crate::budget::Clock;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    const CHAT: &str = "42";
    const IDEA: &str = "Build a scraper for website data";
    const ANSWERS: [&str; 5] = ["title, price", "example.com", "daily", "CSV", "no"];

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            max_questions: 5,
            max_revisions: 3,
            max_iterations: 10,
            reply_timeout: Duration::from_secs(60),
        }
    }

    fn clock() -> Clock {
        Arc::new(|| NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    struct Harness {
        _dir: TempDir,
        build_dir: PathBuf,
        ledger: PathBuf,
        transport: Arc<ScriptedTransport>,
    }

    impl Harness {
        fn new(replies: &[&str]) -> Self {
            let dir = tempdir().unwrap();
            let build_dir = dir.path().join("2026-10-19-demo");
            let ledger = dir.path().join("token_costs.json");
            Self {
                _dir: dir,
                build_dir,
                ledger,
                transport: Arc::new(ScriptedTransport::with_replies(CHAT, replies)),
            }
        }

        fn parts(&self, limit: Usd) -> (BudgetGuardian, CommunicationBridge) {
            let guardian = BudgetGuardian::with_clock(&self.ledger, limit, clock()).unwrap();
            let bridge = CommunicationBridge::new(self.transport.clone(), CHAT, Duration::from_secs(5));
            (guardian, bridge)
        }

        fn orchestrator(&self, settings: OrchestratorSettings, limit: Usd) -> PhaseOrchestrator {
            let (guardian, bridge) = self.parts(limit);
            PhaseOrchestrator::new(settings, &self.build_dir, "demo", IDEA, guardian, bridge).unwrap()
        }

        fn reopen(&self, limit: Usd) -> PhaseOrchestrator {
            let (guardian, bridge) = self.parts(limit);
            PhaseOrchestrator::open(settings(), &self.build_dir, guardian, bridge).unwrap()
        }

        fn sent_containing(&self, needle: &str) -> usize {
            self.transport.sent().iter().filter(|m| m.contains(needle)).count()
        }
    }

    fn replies(tail: &[&'static str]) -> Vec<&'static str> {
        let mut all: Vec<&str> = ANSWERS.to_vec();
        all.push("approve");
        all.extend_from_slice(tail);
        all
    }

    fn iteration_numbers(state: &BuildState) -> Vec<u32> {
        state.iterations.iter().map(|o| o.iteration_num).collect()
    }

    /// Orchestrator parked in PLANNING with an approved plan, ready for the build loop.
    fn at_build_start(h: &Harness) -> PhaseOrchestrator {
        at_build_start_with_limit(h, Usd::cents(2000))
    }

    fn at_build_start_with_limit(h: &Harness, limit: Usd) -> PhaseOrchestrator {
        let mut orch = h.orchestrator(settings(), limit);
        orch.state.apply(PhaseEvent::BeginInterview).unwrap();
        orch.state.apply(PhaseEvent::BeginPlanning).unwrap();
        orch.state.approved_plan = "# Implementation Plan: demo".to_string();
        orch
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_reaches_done() {
        let h = Harness::new(&replies(&["continue"; 7]));
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert!(report.success, "{report:?}");
        assert_eq!(report.reason, None);
        assert_eq!(report.phase, BuildPhase::Done);
        assert_eq!(report.iterations, 7);
        // 5 x 0.05 + 0.30 + 0.10 + 7 x 0.50
        assert_eq!(report.total_cost, Usd::cents(415));
        assert_eq!(report.final_path, Some(h.build_dir.join("FINAL")));
        assert!(h.build_dir.join("FINAL/notes/iteration_07.md").exists());
        assert!(h.build_dir.join(PLAN_FILE).exists());
        assert!(h.build_dir.join("RALPH_LITE_LOG.md").exists());

        let saved = StateStore::new(&h.build_dir).load().unwrap();
        assert_eq!(saved.phase, BuildPhase::Done);
        assert_eq!(saved.qa_pairs.len(), 5);
        assert_eq!(saved.qa_pairs[0].answer, "title, price");
        assert_eq!(h.sent_containing("BUILD COMPLETE"), 1);
        assert_eq!(h.transport.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_planning_fourth_revise_exceeds_max_revisions() {
        let h = Harness::new(&["revise: a", "revise: b", "revise: c", "revise: d"]);
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        orch.state.apply(PhaseEvent::BeginInterview).unwrap();
        let requirements = interview::summarize_requirements(IDEA, &[]);

        let err = orch.run_planning(&requirements).await.unwrap_err();
        assert!(matches!(err, BuildError::MaxRevisionsExceeded { max: 3 }));
        assert_eq!(orch.state.plan_revisions, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_planning_approve_after_three_revisions() {
        let h = Harness::new(&["revise: a", "revise: b", "revise: more tests", "approve"]);
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        orch.state.apply(PhaseEvent::BeginInterview).unwrap();
        let requirements = interview::summarize_requirements(IDEA, &[]);

        let plan = orch.run_planning(&requirements).await.unwrap();
        assert!(plan.contains("demo"));
        assert!(plan.contains("User feedback: more tests"));
        assert_eq!(orch.state.plan_revisions, 3);
        assert_eq!(orch.state.approved_plan, plan);
        assert_eq!(orch.state.total_cost, PLANNING_COST);
        assert_eq!(std::fs::read_to_string(h.build_dir.join(PLAN_FILE)).unwrap(), plan);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_rejection_fails_build() {
        let mut all: Vec<&str> = ANSWERS.to_vec();
        all.push("reject");
        let h = Harness::new(&all);
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert!(!report.success);
        assert_eq!(report.reason, Some(FailureReason::Error));
        assert_eq!(report.phase, BuildPhase::Failed);
        assert_eq!(report.error.as_deref(), Some("Plan rejected by user"));
        assert_eq!(h.sent_containing("Build Failed"), 1);
        assert_eq!(orch.state().error.as_deref(), Some("Plan rejected by user"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_at_iteration_three_is_incomplete() {
        let h = Harness::new(&replies(&["continue", "continue", "stop"]));
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert!(!report.success);
        assert_eq!(report.reason, Some(FailureReason::Incomplete));
        assert_eq!(report.phase, BuildPhase::Build);
        assert_eq!(report.iterations, 3);
        assert_eq!(orch.state().current_iteration, 3);
        assert!(!h.build_dir.join("FINAL").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_resumes_after_target() {
        let h = Harness::new(&["c", "c", "c", "rollback 2", "stop"]);
        let mut orch = at_build_start(&h);

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Stopped));
        // scaffold, 1..4, then iteration 3 rebuilt on top of iteration 2
        assert_eq!(iteration_numbers(&orch.state), vec![0, 1, 2, 3, 4, 3]);
        assert_eq!(orch.state.current_iteration, 3);
        assert_eq!(h.sent_containing("Rolled back to iteration 2"), 1);

        let rebuilt = orch.state.iterations.last().unwrap();
        let notes = std::fs::read_dir(rebuilt.path.join("notes")).unwrap().count();
        assert_eq!(notes, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_sets_current_iteration_to_target() {
        let h = Harness::new(&["c", "c", "c"]);
        let mut orch = at_build_start(&h);
        orch.transition(PhaseEvent::BeginBuild).unwrap();
        let scaffold = orch.builder.create_scaffold("plan").unwrap();
        orch.state.push_outcome(scaffold);
        for i in 1..=4 {
            let prev = orch.state.last_iteration_path.clone().unwrap();
            let outcome = orch.builder.build_iteration(i, BUILD_TASKS[i as usize - 1], &prev, None).unwrap();
            orch.state.push_outcome(outcome);
        }

        orch.rollback(2).await.unwrap();
        assert_eq!(orch.state.current_iteration, 2);
        assert_eq!(
            orch.state.last_iteration_path,
            Some(orch.state.outcome_for(2).unwrap().path.clone())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_to_unknown_iteration_is_ignored() {
        let h = Harness::new(&["rollback 9", "stop"]);
        let mut orch = at_build_start(&h);

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Stopped));
        assert_eq!(iteration_numbers(&orch.state), vec![0, 1, 2]);
        assert_eq!(h.sent_containing("No iteration 9"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_rollback_target_is_not_a_bare_rollback() {
        let h = Harness::new(&["c", "c", "rollback 99999999999", "stop"]);
        let mut orch = at_build_start(&h);

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Stopped));
        assert_eq!(iteration_numbers(&orch.state), vec![0, 1, 2, 3, 4]);
        assert_eq!(h.sent_containing(&format!("No iteration {}", u32::MAX)), 1);
        assert_eq!(h.sent_containing("Rolled back"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_forward_onto_discarded_iteration_is_refused() {
        let h = Harness::new(&["c", "c", "c", "rollback 2", "rollback 4", "stop"]);
        let mut orch = at_build_start(&h);

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Stopped));
        // 3 rebuilt after the rollback, the stale 4 ignored, then 4 rebuilt
        assert_eq!(iteration_numbers(&orch.state), vec![0, 1, 2, 3, 4, 3, 4]);
        assert_eq!(h.sent_containing("Rolled back to iteration 2"), 1);
        assert_eq!(h.sent_containing("No iteration 4"), 1);
        assert_eq!(orch.state.current_iteration, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_note_applies_to_next_iteration() {
        let h = Harness::new(&["fix: handle timeouts", "stop"]);
        let mut orch = at_build_start(&h);

        orch.run_build().await.unwrap();
        let second = orch.state.outcome_for(2).unwrap();
        assert!(second.summary.contains("fix: handle timeouts"));
        assert!(!orch.state.outcome_for(1).unwrap().summary.contains("fix"));
        assert_eq!(h.sent_containing("Applying fix: handle timeouts"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclear_checkpoint_replies_stop_after_three_reprompts() {
        let h = Harness::new(&["hmm", "what", "maybe", "later"]);
        let mut orch = at_build_start(&h);

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Stopped));
        assert_eq!(orch.state.current_iteration, 1);
        assert_eq!(h.sent_containing("Didn't understand"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_iterations_truncates_tasks() {
        let h = Harness::new(&["c", "c", "c"]);
        let mut orch = at_build_start(&h);
        orch.settings.max_iterations = 3;

        assert!(matches!(orch.run_build().await.unwrap(), BuildLoop::Completed));
        assert_eq!(iteration_numbers(&orch.state), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_pauses_interview() {
        let h = Harness::new(&ANSWERS);
        // room for one question check (0.10) but not a second after recording 0.05
        let mut orch = h.orchestrator(settings(), Usd::cents(12));
        let report = orch.run().await;

        assert!(!report.success);
        assert_eq!(report.reason, Some(FailureReason::BudgetExceeded));
        assert_eq!(report.phase, BuildPhase::Paused);
        assert_eq!(orch.state().qa_pairs.len(), 1);
        assert_eq!(orch.state().pause_reason.as_deref(), Some("Budget limit reached"));
        assert_eq!(orch.state().paused_from, Some(BuildPhase::Interview));
        assert_eq!(h.sent_containing("Build Paused"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_before_scaffold_pauses_build() {
        let h = Harness::new(&[]);
        let mut orch = at_build_start_with_limit(&h, SCAFFOLD_COST);
        let report = orch.drive(BuildPhase::Build).await;

        assert_eq!(report.reason, Some(FailureReason::BudgetExceeded));
        assert_eq!(report.phase, BuildPhase::Paused);
        assert!(report.error.unwrap().contains("before scaffold"));
        assert!(orch.state().iterations.is_empty());
        assert_eq!(orch.state().paused_from, Some(BuildPhase::Build));
        assert_eq!(orch.state().pause_reason.as_deref(), Some("Budget limit reached"));
        assert_eq!(h.sent_containing("Build Paused"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_between_iterations_pauses_build() {
        let h = Harness::new(&["continue"]);
        // scaffold (0.10) and one iteration (0.50) fit; the next 0.50 check does not
        let mut orch = at_build_start_with_limit(&h, Usd::cents(110));
        let report = orch.drive(BuildPhase::Build).await;

        assert_eq!(report.reason, Some(FailureReason::BudgetExceeded));
        assert!(report.error.unwrap().contains("during build"));
        assert_eq!(iteration_numbers(orch.state()), vec![0, 1]);
        assert_eq!(orch.state().paused_from, Some(BuildPhase::Build));
        let saved = StateStore::new(&h.build_dir).load().unwrap();
        assert_eq!(saved.phase, BuildPhase::Paused);
        assert_eq!(saved.current_iteration, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spent_budget_blocks_phase_start() {
        let h = Harness::new(&ANSWERS);
        {
            let (mut guardian, _) = h.parts(Usd::cents(100));
            guardian.record_cost("other", "build", 1, Usd::cents(100), Some("other")).unwrap();
        }
        let mut orch = h.orchestrator(settings(), Usd::cents(100));
        let report = orch.run().await;
        assert_eq!(report.reason, Some(FailureReason::BudgetExceeded));
        assert!(orch.state().qa_pairs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interview_timeout_pauses() {
        let h = Harness::new(&["title"]);
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert_eq!(report.reason, Some(FailureReason::Paused));
        assert_eq!(report.phase, BuildPhase::Paused);
        assert_eq!(orch.state().pause_reason.as_deref(), Some("Interview timeout"));
        assert_eq!(orch.state().qa_pairs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_timeout_pauses_in_planning() {
        let h = Harness::new(&ANSWERS);
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert_eq!(report.reason, Some(FailureReason::Paused));
        assert_eq!(orch.state().pause_reason.as_deref(), Some("Approval timeout"));
        assert_eq!(orch.state().paused_from, Some(BuildPhase::Planning));
        assert!(orch.state().approved_plan.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_timeout_pauses_in_build() {
        let h = Harness::new(&replies(&["continue"]));
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert_eq!(report.reason, Some(FailureReason::Paused));
        assert_eq!(report.phase, BuildPhase::Paused);
        assert_eq!(orch.state().pause_reason.as_deref(), Some("Checkpoint timeout"));
        assert_eq!(orch.state().paused_from, Some(BuildPhase::Build));
        assert_eq!(orch.state().current_iteration, 2);
        assert_eq!(h.sent_containing("Checkpoint timeout"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_paused_build_keeps_scaffold_and_iterations() {
        let h = Harness::new(&replies(&["continue"]));
        {
            let mut orch = h.orchestrator(settings(), Usd::cents(2000));
            orch.run().await;
            assert_eq!(orch.state().paused_from, Some(BuildPhase::Build));
        }

        for _ in 0..5 {
            h.transport.queue_reply("continue");
        }
        let mut orch = h.reopen(Usd::cents(2000));
        let report = orch.resume(true).await;
        assert!(report.success, "{report:?}");
        assert_eq!(
            iteration_numbers(orch.state()),
            vec![0, 1, 2, 3, 4, 5, 6, 7]
        );
        // interview and planning are not repeated
        assert_eq!(h.sent_containing("Question 1/5"), 1);
        assert_eq!(h.sent_containing("PHASE 2 COMPLETE"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undeliverable_prompt_fails_build() {
        let h = Harness::new(&ANSWERS);
        h.transport.fail_sends();
        let mut orch = h.orchestrator(settings(), Usd::cents(2000));
        let report = orch.run().await;

        assert_eq!(report.reason, Some(FailureReason::Error));
        assert_eq!(report.phase, BuildPhase::Failed);
        assert!(report.error.unwrap().contains("Failed to send prompt"));
        let saved = StateStore::new(&h.build_dir).load().unwrap();
        assert_eq!(saved.phase, BuildPhase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_build_requires_explicit_continue() {
        let h = Harness::new(&[]);
        {
            let mut orch = h.orchestrator(settings(), Usd::cents(2000));
            orch.run().await;
            assert_eq!(orch.state().phase, BuildPhase::Paused);
        }

        let mut orch = h.reopen(Usd::cents(2000));
        let report = orch.resume(false).await;
        assert_eq!(report.reason, Some(FailureReason::Paused));
        assert_eq!(h.sent_containing("ralph resume --continue"), 1);

        for reply in replies(&["continue"; 7]) {
            h.transport.queue_reply(reply);
        }
        let report = orch.resume(true).await;
        assert!(report.success, "{report:?}");
        assert_eq!(report.phase, BuildPhase::Done);
        // the interview restarted from scratch
        assert_eq!(orch.state().qa_pairs.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_build_continues_after_current_iteration() {
        let h = Harness::new(&replies(&["continue", "continue", "stop"]));
        {
            let mut orch = h.orchestrator(settings(), Usd::cents(2000));
            let report = orch.run().await;
            assert_eq!(report.reason, Some(FailureReason::Incomplete));
        }

        for _ in 0..4 {
            h.transport.queue_reply("continue");
        }
        let mut orch = h.reopen(Usd::cents(2000));
        let report = orch.resume(false).await;
        assert!(report.success, "{report:?}");
        assert_eq!(
            iteration_numbers(orch.state()),
            vec![0, 1, 2, 3, 4, 5, 6, 7]
        );
        assert_eq!(h.sent_containing("Resuming build"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_done_build_is_noop() {
        let h = Harness::new(&replies(&["continue"; 7]));
        {
            let mut orch = h.orchestrator(settings(), Usd::cents(2000));
            assert!(orch.run().await.success);
        }
        let sent_before = h.transport.sent().len();
        let mut orch = h.reopen(Usd::cents(2000));
        let report = orch.resume(true).await;
        assert!(report.success);
        assert_eq!(h.transport.sent().len(), sent_before);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("checkpoint"), "Checkpoint");
        assert_eq!(capitalize(""), "");
    }
}
