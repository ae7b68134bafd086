//! Reduce events to step outcomes

use super::event::{CodeFamily, Event, EventCode, EventLevel};
use super::kind::{OutcomeKind, StepOutcome};
use crate::repository::RepositoryState;

/// Marker carried by the failure reason of the `require_changes` safeguard.
///
/// A skip whose message mentions it means "nothing happened upstream", which
/// is reported as a no-op rather than a skip.
pub const CHANGES_REQUIRED_MARKER: &str = "require_changes";

const DECLINED_REASON: &str = "user declined";

/// Classify a single event.
///
/// Returns `None` for the synthetic step summary, which reports an outcome
/// rather than contributing to one.
///
/// | event                                        | outcome   |
/// |----------------------------------------------|-----------|
/// | any error level                              | failed    |
/// | update/apply codes                           | applied   |
/// | declined                                     | skipped   |
/// | skip code mentioning `require_changes`       | no-op     |
/// | other skip codes                             | skipped   |
/// | no-op codes                                  | no-op     |
/// | anything else                                | unknown   |
pub fn classify_step_outcome(event: &Event) -> Option<StepOutcome> {
    let family = event.code.family();
    if family == CodeFamily::Summary {
        return None;
    }

    let reason = event_reason(event);

    if event.level == EventLevel::Error || family == CodeFamily::Error {
        return Some(StepOutcome::new(OutcomeKind::Failed, reason));
    }

    let outcome = match family {
        CodeFamily::Applied => StepOutcome::new(OutcomeKind::Applied, reason),
        CodeFamily::Declined => StepOutcome::new(
            OutcomeKind::Skipped,
            reason.or_else(|| Some(DECLINED_REASON.to_string())),
        ),
        CodeFamily::Skip if event.message.contains(CHANGES_REQUIRED_MARKER) => {
            StepOutcome::new(OutcomeKind::NoOp, reason)
        }
        CodeFamily::Skip => StepOutcome::new(OutcomeKind::Skipped, reason),
        CodeFamily::NoOp => StepOutcome::new(OutcomeKind::NoOp, reason),
        _ => StepOutcome::new(OutcomeKind::Unknown, None),
    };
    Some(outcome)
}

fn event_reason(event: &Event) -> Option<String> {
    event
        .detail("reason")
        .map(str::to_string)
        .or_else(|| (!event.message.trim().is_empty()).then(|| event.message.clone()))
}

/// How a step ended for one repository, as seen by the run coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCompletion {
    /// The step returned normally
    Completed,
    /// The repository was skipped (hard stop) during this step
    RepositorySkipped(String),
    /// The step returned an error
    Errored(String),
}

/// Final outcome of a step given what was accumulated and how it ended
pub fn final_outcome(accumulated: Option<StepOutcome>, completion: &StepCompletion) -> StepOutcome {
    let mut outcome = accumulated.unwrap_or_default();
    match completion {
        StepCompletion::Completed => {}
        StepCompletion::RepositorySkipped(reason) => {
            outcome.absorb(StepOutcome::new(OutcomeKind::Skipped, Some(reason.clone())));
        }
        StepCompletion::Errored(message) => {
            outcome.absorb(StepOutcome::new(OutcomeKind::Failed, Some(message.clone())));
        }
    }
    outcome
}

/// Build the synthetic summary event for a (repository, step)
pub fn step_summary_event(
    repository: &RepositoryState,
    step: &str,
    outcome: &StepOutcome,
) -> Event {
    let label = outcome.summary_label();
    let message = match &outcome.reason {
        Some(reason) => format!("{step}: {label} ({reason})"),
        None => format!("{step}: {label}"),
    };
    let event = match outcome.kind {
        OutcomeKind::Failed => Event::error(EventCode::StepSummary, message),
        OutcomeKind::Skipped => Event::warn(EventCode::StepSummary, message),
        _ => Event::info(EventCode::StepSummary, message),
    };
    let event = event
        .for_repository(repository)
        .with_step(step)
        .with_detail("outcome", label);
    match &outcome.reason {
        Some(reason) => event.with_detail("reason", reason.clone()),
        None => event,
    }
}
