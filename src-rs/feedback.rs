use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::reward::{FeedbackMode, Judgment};

pub trait FeedbackSource {
    fn present(&mut self, hint: &str) -> Result<()>;

    fn collect(&mut self, generated: &str, mode: FeedbackMode) -> Result<Judgment>;
}

/// Asks the operator on a terminal. Generic over the streams so tests can
/// script the answers.
pub struct TerminalFeedback<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalFeedback<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read operator input")?;
        if read == 0 {
            bail!("operator input closed");
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> FeedbackSource for TerminalFeedback<R, W> {
    fn present(&mut self, hint: &str) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{}", "=".repeat(20))?;
        writeln!(self.output, "HINT SUGGESTION: {hint}")?;
        writeln!(self.output, "{}", "=".repeat(20))?;
        self.output.flush()?;
        Ok(())
    }

    fn collect(&mut self, _generated: &str, mode: FeedbackMode) -> Result<Judgment> {
        match mode {
            FeedbackMode::Endorsement => loop {
                let answer = self.ask("Is this hint correct? (yes/no): ")?;
                match answer.to_lowercase().as_str() {
                    "yes" => return Ok(Judgment::Endorsed),
                    "no" => {
                        let corrected = self.ask("Please provide the correct hint: ")?;
                        return Ok(Judgment::Corrected(corrected));
                    }
                    _ => writeln!(self.output, "Please answer 'yes' or 'no'.")?,
                }
            },
            FeedbackMode::Reference => {
                let reference = self.ask("Please provide the ideal/reference hint: ")?;
                if reference.is_empty() {
                    writeln!(self.output, "No reference provided. Skipping this item.")?;
                    return Ok(Judgment::Skipped);
                }
                Ok(Judgment::Reference(reference))
            }
        }
    }
}
