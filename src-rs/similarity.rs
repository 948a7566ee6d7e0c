use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;

use crate::exec::{command_exists, program_of, run_shell};

pub trait SimilarityModel {
    /// Semantic similarity in `[0, 1]`; empty input on either side is 0.
    fn similarity(&self, a: &str, b: &str) -> Result<f64>;
}

pub struct CommandSimilarity {
    command: String,
    timeout: Duration,
}

impl CommandSimilarity {
    pub fn open(command: &str, timeout: Duration) -> Result<Self> {
        let program = program_of(command);
        if program.is_empty() || !command_exists(program) {
            bail!("similarity command not found: `{command}`");
        }
        Ok(Self {
            command: command.to_string(),
            timeout,
        })
    }
}

impl SimilarityModel for CommandSimilarity {
    fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        if a.trim().is_empty() || b.trim().is_empty() {
            return Ok(0.0);
        }
        let output = run_shell(&self.command, &[a, b], None, self.timeout)?;
        let score = parse_score(&output.stdout)
            .with_context(|| format!("similarity command printed no score: {:?}", output.stdout))?;
        debug!("similarity({a:?}, {b:?}) = {score:.4}");
        Ok(score)
    }
}

/// First number in the output, clamped into `[0, 1]`.
pub fn parse_score(raw: &str) -> Option<f64> {
    let value = raw
        .split(|c: char| c.is_whitespace() || c == ',' || c == '[' || c == ']')
        .find_map(|token| token.parse::<f64>().ok())?;
    if value.is_nan() {
        return Some(0.0);
    }
    Some(value.clamp(0.0, 1.0))
}
