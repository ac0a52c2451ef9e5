//! Build phase state machine.
//!
//! `BuildPhase::apply` is a pure function from (phase, event) to the next phase.
//! The runner performs all I/O around it; nothing here touches the disk or network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildPhase {
    Idle,
    Interview,
    Planning,
    Build,
    Done,
    Paused,
    Failed,
}

/// Something that moves a build between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Start (or restart) the interview.
    BeginInterview,
    /// Start (or restart) planning.
    BeginPlanning,
    /// Start (or resume) the build loop.
    BeginBuild,
    /// Build loop completed.
    Finish,
    /// Budget exhausted or a reply timed out.
    Pause,
    /// Unrecoverable error.
    Fail,
    /// Operator continuation of a paused build into an active phase.
    Continue { to: BuildPhase },
}

impl BuildPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildPhase::Idle => "IDLE",
            BuildPhase::Interview => "INTERVIEW",
            BuildPhase::Planning => "PLANNING",
            BuildPhase::Build => "BUILD",
            BuildPhase::Done => "DONE",
            BuildPhase::Paused => "PAUSED",
            BuildPhase::Failed => "FAILED",
        }
    }

    /// Interview, planning and build are the phases that do work.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            BuildPhase::Interview | BuildPhase::Planning | BuildPhase::Build
        )
    }

    /// No transition leaves these phases.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildPhase::Done | BuildPhase::Failed)
    }

    pub fn apply(self, event: PhaseEvent) -> Result<BuildPhase, TransitionError> {
        use BuildPhase::*;
        use PhaseEvent::*;

        let next = match (self, event) {
            (Idle | Interview, BeginInterview) => Some(Interview),
            (Interview | Planning, BeginPlanning) => Some(Planning),
            (Planning | Build, BeginBuild) => Some(Build),
            (Build, Finish) => Some(Done),
            (Interview | Planning | Build | Paused, Pause) => Some(Paused),
            (Idle | Interview | Planning | Build | Paused, Fail) => Some(Failed),
            (Paused, Continue { to }) if to.is_active() => Some(to),
            _ => None,
        };
        next.ok_or(TransitionError::Invalid { from: self, event })
    }

    pub fn can_apply(self, event: PhaseEvent) -> bool {
        self.apply(event).is_ok()
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
