//! Event sinks

use colored::{ColoredString, Colorize};
use std::sync::{Mutex, PoisonError};

use crate::outcome::{Event, EventCode, EventLevel};

pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event);
}

/// Prints events to stdout, one line each
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Emit JSON lines instead of colored text
    json: bool,
    /// Print informational planning events too
    verbose: bool,
    lock: Mutex<()>,
}

impl ConsoleReporter {
    pub fn new(json: bool, verbose: bool) -> Self {
        Self {
            json,
            verbose,
            lock: Mutex::new(()),
        }
    }

    fn render(&self, event: &Event) -> String {
        let subject = match (&event.repository, &event.repository_path) {
            (Some(id), Some(path)) => format!("{id} ({})", path.display()),
            (Some(id), None) => id.clone(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => String::new(),
        };
        format!(
            "{} {} {} {}",
            level_indicator(event),
            event.code.as_str().dimmed(),
            subject.bold(),
            event.message
        )
    }
}

fn level_indicator(event: &Event) -> ColoredString {
    match (event.level, event.code) {
        (EventLevel::Error, _) => "✗".red().bold(),
        (EventLevel::Warn, _) => "!".yellow().bold(),
        (_, EventCode::StepSummary) => "●".blue().bold(),
        _ => "✓".green().bold(),
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: &Event) {
        let quiet = matches!(
            event.code,
            EventCode::ActionPlanned | EventCode::ActionApplied
        );
        if quiet && !self.verbose && !self.json {
            return;
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("failed to serialise event: {e}"),
            }
        } else {
            println!("{}", self.render(event));
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_with_code(&self, code: EventCode) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.code == code)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
