//! Step outcome kinds and their severity order

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Classification of what a step did to one repository.
///
/// Ordered by severity: `Failed > Applied > Skipped > NoOp > Unknown`.
/// The order is explicit (see [`OutcomeKind::severity`]) rather than derived
/// from declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    #[default]
    Unknown,
    NoOp,
    Skipped,
    Applied,
    Failed,
}

impl OutcomeKind {
    pub fn severity(self) -> u8 {
        match self {
            OutcomeKind::Unknown => 0,
            OutcomeKind::NoOp => 1,
            OutcomeKind::Skipped => 2,
            OutcomeKind::Applied => 3,
            OutcomeKind::Failed => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutcomeKind::Unknown => "unknown",
            OutcomeKind::NoOp => "no-op",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Applied => "applied",
            OutcomeKind::Failed => "failed",
        }
    }
}

impl PartialOrd for OutcomeKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OutcomeKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accumulated outcome of one step for one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StepOutcome {
    pub fn new(kind: OutcomeKind, reason: Option<String>) -> Self {
        Self { kind, reason }
    }

    /// Fold a newly observed outcome into this one, keeping the worst.
    ///
    /// A higher-severity observation replaces the kind; a lower one is
    /// ignored. The reason is only ever filled in, never replaced: the first
    /// reason recorded for the step sticks.
    pub fn absorb(&mut self, observed: StepOutcome) {
        if observed.kind < self.kind {
            return;
        }
        self.kind = observed.kind;
        if self.reason.is_none() {
            self.reason = observed.reason;
        }
    }

    /// Label for summaries: `ok` stands in for an outcome nothing was recorded for.
    pub fn summary_label(&self) -> &'static str {
        match self.kind {
            OutcomeKind::Unknown => "ok",
            kind => kind.label(),
        }
    }
}
