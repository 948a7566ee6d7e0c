use log::{error, info, warn};
use serde::Serialize;

use crate::ledger::FeedbackRecord;
use crate::model::HintModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingExample {
    pub prompt: String,
    pub target: String,
}

/// Records whose reward meets `min_reward`, paired with the human reference.
pub fn training_subset(records: &[FeedbackRecord], min_reward: i32) -> Vec<TrainingExample> {
    records
        .iter()
        .filter(|record| record.reward >= min_reward)
        .map(|record| TrainingExample {
            prompt: record.prompt.clone(),
            target: record.reference_response.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    Pending { remaining: usize },
    Skipped,
    Trained { examples: usize },
    Failed { examples: usize, error: String },
}

#[derive(Debug, Clone)]
pub struct TrainingScheduler {
    interval: usize,
    pending: usize,
}

impl TrainingScheduler {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            pending: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Counts one appended record. Once `interval` records have
    /// accumulated, fine-tunes on the qualifying part of `records` and
    /// resets the counter whatever the result.
    pub fn record_appended(
        &mut self,
        records: &[FeedbackRecord],
        min_reward: i32,
        model: &mut dyn HintModel,
    ) -> TrainingOutcome {
        self.pending += 1;
        if self.pending < self.interval {
            let remaining = self.interval - self.pending;
            info!("feedback stored; training in {remaining} more item(s)");
            return TrainingOutcome::Pending { remaining };
        }

        info!("collected {} new feedback item(s); starting training", self.pending);
        let outcome = run_training(records, min_reward, model);
        self.pending = 0;
        outcome
    }
}

pub fn run_training(
    records: &[FeedbackRecord],
    min_reward: i32,
    model: &mut dyn HintModel,
) -> TrainingOutcome {
    let examples = training_subset(records, min_reward);
    if examples.is_empty() {
        warn!("training skipped: no feedback meets reward >= {min_reward}");
        return TrainingOutcome::Skipped;
    }

    info!("fine-tuning on {} qualifying example(s)", examples.len());
    match model.fine_tune(&examples) {
        Ok(()) => TrainingOutcome::Trained {
            examples: examples.len(),
        },
        Err(err) => {
            error!("training failed: {err:#}");
            TrainingOutcome::Failed {
                examples: examples.len(),
                error: format!("{err:#}"),
            }
        }
    }
}
