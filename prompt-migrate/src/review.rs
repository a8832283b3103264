//! Review modes and the accept/reject decision surface.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::planner::PlannedCandidate;

/// How planned candidates are confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// Report candidates without writing anything.
    #[default]
    DryRun,
    /// Ask the [`Reviewer`] about every candidate.
    Interactive,
    /// Accept every candidate.
    Auto,
}

/// Answer for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Extract the candidate.
    Accept,
    /// Leave the literal as it is.
    Reject,
    /// Stop the run; already applied candidates stay applied.
    Quit,
}

/// Source of decisions in interactive mode.
///
/// Reviewing blocks the run until a decision is returned.
pub trait Reviewer {
    /// Decides what to do with `candidate`.
    fn review(&mut self, candidate: &PlannedCandidate) -> Decision;
}

impl<F> Reviewer for F
where
    F: FnMut(&PlannedCandidate) -> Decision,
{
    fn review(&mut self, candidate: &PlannedCandidate) -> Decision {
        (self)(candidate)
    }
}

/// Reviewer that accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Reviewer for AutoApprove {
    fn review(&mut self, _candidate: &PlannedCandidate) -> Decision {
        Decision::Accept
    }
}

/// Reviewer that replays a fixed list of decisions, then rejects.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReviewer {
    decisions: VecDeque<Decision>,
}

impl ScriptedReviewer {
    /// Creates a reviewer answering with `decisions` in order.
    #[must_use]
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
        }
    }

    /// Returns how many scripted decisions are left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.decisions.len()
    }
}

impl Reviewer for ScriptedReviewer {
    fn review(&mut self, _candidate: &PlannedCandidate) -> Decision {
        self.decisions.pop_front().unwrap_or(Decision::Reject)
    }
}
