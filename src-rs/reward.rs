use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use crate::similarity::SimilarityModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStrategy {
    /// yes/no endorsement, +1 or -1
    Binary,
    /// 1..=5 from semantic similarity to a human reference
    Graded,
}

impl RewardStrategy {
    pub fn default_min_reward(self) -> i32 {
        match self {
            RewardStrategy::Binary => 1,
            RewardStrategy::Graded => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMode {
    Endorsement,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgment {
    Endorsed,
    Corrected(String),
    Reference(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub reward: i32,
    pub reference: String,
    pub similarity: Option<f64>,
}

pub trait RewardPolicy {
    fn strategy(&self) -> RewardStrategy;

    fn feedback_mode(&self) -> FeedbackMode;

    /// `None` when the human gave nothing to learn from.
    fn score(&self, generated: &str, judgment: Judgment) -> Result<Option<Score>>;

    fn min_reward(&self) -> i32;

    fn qualifies(&self, reward: i32) -> bool {
        reward >= self.min_reward()
    }

    /// Whether the human reference should be put on screen after scoring.
    fn shows_reference(&self, score: &Score) -> bool;
}

pub struct BinaryPolicy {
    min_reward: i32,
}

impl BinaryPolicy {
    pub fn new(min_reward: Option<i32>) -> Self {
        Self {
            min_reward: min_reward.unwrap_or(RewardStrategy::Binary.default_min_reward()),
        }
    }
}

impl RewardPolicy for BinaryPolicy {
    fn strategy(&self) -> RewardStrategy {
        RewardStrategy::Binary
    }

    fn feedback_mode(&self) -> FeedbackMode {
        FeedbackMode::Endorsement
    }

    fn score(&self, generated: &str, judgment: Judgment) -> Result<Option<Score>> {
        let score = match judgment {
            Judgment::Endorsed => endorse(generated),
            Judgment::Reference(reference) if reference == generated => endorse(generated),
            Judgment::Corrected(reference) | Judgment::Reference(reference) => Score {
                reward: -1,
                reference,
                similarity: None,
            },
            Judgment::Skipped => return Ok(None),
        };
        Ok(Some(score))
    }

    fn min_reward(&self) -> i32 {
        self.min_reward
    }

    fn shows_reference(&self, score: &Score) -> bool {
        score.reward < 0
    }
}

fn endorse(generated: &str) -> Score {
    Score {
        reward: 1,
        reference: generated.to_string(),
        similarity: None,
    }
}

/// Lower bounds, checked top-down; anything below the last band scores 1.
pub const GRADED_BANDS: [(f64, i32); 4] = [(0.95, 5), (0.80, 4), (0.60, 3), (0.40, 2)];

pub fn grade(similarity: f64) -> i32 {
    GRADED_BANDS
        .iter()
        .find(|(floor, _)| similarity >= *floor)
        .map(|(_, reward)| *reward)
        .unwrap_or(1)
}

pub struct GradedPolicy {
    similarity: Box<dyn SimilarityModel>,
    min_reward: i32,
}

impl GradedPolicy {
    pub fn new(similarity: Box<dyn SimilarityModel>, min_reward: Option<i32>) -> Self {
        Self {
            similarity,
            min_reward: min_reward.unwrap_or(RewardStrategy::Graded.default_min_reward()),
        }
    }
}

impl RewardPolicy for GradedPolicy {
    fn strategy(&self) -> RewardStrategy {
        RewardStrategy::Graded
    }

    fn feedback_mode(&self) -> FeedbackMode {
        FeedbackMode::Reference
    }

    fn score(&self, generated: &str, judgment: Judgment) -> Result<Option<Score>> {
        let reference = match judgment {
            Judgment::Endorsed => generated.to_string(),
            Judgment::Corrected(reference) | Judgment::Reference(reference) => reference,
            Judgment::Skipped => return Ok(None),
        };
        let similarity = self
            .similarity
            .similarity(generated, &reference)
            .context("similarity model failed")?;
        Ok(Some(Score {
            reward: grade(similarity),
            reference,
            similarity: Some(similarity),
        }))
    }

    fn min_reward(&self) -> i32 {
        self.min_reward
    }

    fn shows_reference(&self, score: &Score) -> bool {
        score.reward < 4
    }
}
