//! Event model and outcome classification
//!
//! Operations push [`Event`]s through the environment. Each event is
//! classified into a [`StepOutcome`] and folded, per (repository, step),
//! into the worst outcome observed so far. When a step finishes, the run
//! coordinator emits one synthetic [`EventCode::StepSummary`] per repository.

mod classify;
mod event;
mod kind;

#[cfg(test)]
mod tests;

pub use classify::{
    classify_step_outcome, final_outcome, step_summary_event, StepCompletion,
    CHANGES_REQUIRED_MARKER,
};
pub use event::{CodeFamily, Event, EventCode, EventLevel};
pub use kind::{OutcomeKind, StepOutcome};
