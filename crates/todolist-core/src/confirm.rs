use std::io::{self, BufRead, Write};

use tracing::debug;

/// A two-choice question shown before a destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    pub message: String,
    pub cancel_label: String,
    pub confirm_label: String,
}

impl Prompt {
    pub fn delete_todo() -> Self {
        Self {
            title: "Delete ToDo".to_string(),
            message: "Are you sure?".to_string(),
            cancel_label: "Cancel".to_string(),
            confirm_label: "Sure".to_string(),
        }
    }
}

pub trait Confirm {
    /// `Ok(true)` only when the destructive choice was picked.
    fn confirm(&mut self, prompt: &Prompt) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, prompt: &Prompt) -> anyhow::Result<bool> {
        debug!(title = %prompt.title, "confirmation assumed");
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&mut self, _prompt: &Prompt) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Asks on stderr and reads the answer from any line reader.
pub struct TerminalConfirm<R, W> {
    input: R,
    output: W,
}

impl TerminalConfirm<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, prompt: &Prompt) -> anyhow::Result<bool> {
        write!(
            self.output,
            "{}\n{} [{}/{}] ",
            prompt.title, prompt.message, prompt.cancel_label, prompt.confirm_label
        )?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim();

        let confirmed = answer.eq_ignore_ascii_case(&prompt.confirm_label)
            || answer.eq_ignore_ascii_case("y")
            || answer.eq_ignore_ascii_case("yes");
        debug!(answer, confirmed, "confirmation answered");
        Ok(confirmed)
    }
}
