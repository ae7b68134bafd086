//! Interactive confirmation

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};

/// Answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    /// Yes, and do not ask again for the rest of the run
    All,
}

impl Confirmation {
    pub fn accepted(self) -> bool {
        matches!(self, Confirmation::Yes | Confirmation::All)
    }

    /// Parse a typed answer. Empty input means no.
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(Confirmation::Yes),
            "" | "n" | "no" => Some(Confirmation::No),
            "a" | "all" => Some(Confirmation::All),
            _ => None,
        }
    }
}

pub trait Prompter: Send + Sync {
    fn confirm(&self, question: &str) -> Result<Confirmation>;
}

/// Accepts everything without asking (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Prompter for AutoConfirm {
    fn confirm(&self, _question: &str) -> Result<Confirmation> {
        Ok(Confirmation::Yes)
    }
}

/// Asks on the terminal. Concurrent prompts are serialized.
#[derive(Debug, Default)]
pub struct TerminalPrompter {
    lock: Mutex<()>,
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<Confirmation> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let stdin = io::stdin();
        loop {
            print!("{question} [y/N/a] ");
            io::stdout().flush().context("Failed to flush prompt")?;

            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .context("Failed to read confirmation")?;
            if read == 0 {
                return Ok(Confirmation::No);
            }
            if let Some(answer) = Confirmation::parse(&line) {
                return Ok(answer);
            }
            println!("Please answer y (yes), n (no) or a (yes to all).");
        }
    }
}

/// Replays pre-recorded answers; answers `No` once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Confirmation>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Confirmation>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order
    pub fn questions(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<Confirmation> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(question.to_string());
        Ok(self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Confirmation::No))
    }
}
