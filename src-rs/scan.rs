use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::context::FieldContext;
use crate::device::UiDriver;
use crate::feedback::FeedbackSource;
use crate::geometry::ScreenSize;
use crate::hierarchy::{select_input_fields, Hierarchy, UiElement};
use crate::ledger::{FeedbackLedger, FeedbackRecord};
use crate::model::HintModel;
use crate::overlay::HintOverlay;
use crate::prompt::compile_prompt;
use crate::reward::RewardPolicy;
use crate::session::{field_key, ScreenChange, ScreenSession};
use crate::training::{TrainingOutcome, TrainingScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Wait after a cycle that saw an unchanged screen.
    pub idle: Duration,
    /// Wait after a processed cycle or a failed one.
    pub retry: Duration,
    /// How long a shown reference hint stays up before moving on.
    pub confirm_hold: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(5),
            retry: Duration::from_secs(15),
            confirm_hold: Duration::from_secs(3),
        }
    }
}

pub struct Collaborators {
    pub driver: Box<dyn UiDriver>,
    pub model: Box<dyn HintModel>,
    pub overlay: Box<dyn HintOverlay>,
    pub feedback: Box<dyn FeedbackSource>,
    pub policy: Box<dyn RewardPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Recorded {
        reward: i32,
        qualifies: bool,
        training: TrainingOutcome,
    },
    Skipped,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub key: String,
    pub outcome: FieldOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub changed: bool,
    pub candidates: usize,
    pub fields: Vec<FieldReport>,
}

impl CycleReport {
    fn unchanged() -> Self {
        Self {
            changed: false,
            candidates: 0,
            fields: Vec::new(),
        }
    }
}

pub struct HintLoop {
    driver: Box<dyn UiDriver>,
    model: Box<dyn HintModel>,
    overlay: Box<dyn HintOverlay>,
    feedback: Box<dyn FeedbackSource>,
    policy: Box<dyn RewardPolicy>,
    ledger: FeedbackLedger,
    records: Vec<FeedbackRecord>,
    session: ScreenSession,
    scheduler: TrainingScheduler,
    timing: LoopTiming,
}

impl HintLoop {
    /// Loads prior feedback from `ledger`; new records are appended to it.
    pub fn new(
        parts: Collaborators,
        ledger: FeedbackLedger,
        training_interval: usize,
        timing: LoopTiming,
    ) -> Self {
        let records = ledger.load();
        info!(
            "loaded {} feedback record(s) from {}",
            records.len(),
            ledger.path().display()
        );
        Self {
            driver: parts.driver,
            model: parts.model,
            overlay: parts.overlay,
            feedback: parts.feedback,
            policy: parts.policy,
            ledger,
            records,
            session: ScreenSession::new(),
            scheduler: TrainingScheduler::new(training_interval),
            timing,
        }
    }

    pub fn run_forever(&mut self) {
        loop {
            let wait = match self.run_cycle() {
                Ok(report) if !report.changed => self.timing.idle,
                Ok(report) => {
                    info!(
                        "cycle done: {} candidate(s), {} handled; ledger holds {} record(s), {} awaiting training",
                        report.candidates,
                        report.fields.len(),
                        self.records.len(),
                        self.scheduler.pending()
                    );
                    self.timing.retry
                }
                Err(err) => {
                    error!("cycle failed: {err:#}");
                    self.timing.retry
                }
            };
            thread::sleep(wait);
        }
    }

    /// One scan: snapshot, change check, then every unhandled input field.
    /// A failing field is logged and marked handled; only snapshot and
    /// hierarchy failures abort the cycle.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        info!("reading screen from device");
        let snapshot = self.driver.snapshot().context("device unavailable")?;

        if self.session.observe(&snapshot.raw) == ScreenChange::Unchanged {
            info!("screen unchanged; waiting");
            return Ok(CycleReport::unchanged());
        }
        info!("screen changed; scanning for input fields");
        debug!("screen hash {}", self.session.last_hash().unwrap_or_default());

        let hierarchy = Hierarchy::parse(&snapshot.raw).context("unreadable UI hierarchy")?;
        let leaves = hierarchy.leaves();
        let fields = select_input_fields(&leaves);
        info!("found {} input field(s) without hints", fields.len());

        let mut report = CycleReport {
            changed: true,
            candidates: fields.len(),
            fields: Vec::new(),
        };
        for field in fields {
            let key = field_key(field);
            if self.session.is_processed(&key) {
                debug!("already handled on this screen: {key}");
                continue;
            }
            let outcome = match self.process_field(&leaves, field, snapshot.screen) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("field {key} failed: {err:#}");
                    FieldOutcome::Failed {
                        error: format!("{err:#}"),
                    }
                }
            };
            self.session.mark_processed(key.clone());
            report.fields.push(FieldReport { key, outcome });
        }
        debug!("{} field(s) handled on this screen", self.session.processed_count());
        Ok(report)
    }

    fn process_field(
        &mut self,
        leaves: &[&UiElement],
        field: &UiElement,
        screen: ScreenSize,
    ) -> Result<FieldOutcome> {
        let context = FieldContext::build(leaves, field, screen);
        debug!("target: {:?}", context.target);
        let prompt = compile_prompt(&context);
        debug!("prompt:\n{prompt}");

        let hint = self.model.generate(&prompt).context("hint generation failed")?;
        info!("suggested hint: {hint}");
        self.feedback.present(&hint)?;
        self.overlay.show(context.bounds, &hint);

        let judgment = self.feedback.collect(&hint, self.policy.feedback_mode())?;
        let Some(score) = self.policy.score(&hint, judgment)? else {
            info!("no feedback given; field skipped");
            return Ok(FieldOutcome::Skipped);
        };
        match score.similarity {
            Some(similarity) => info!("reward {} (similarity {similarity:.4})", score.reward),
            None => info!("reward {}", score.reward),
        }

        if self.policy.shows_reference(&score) {
            self.overlay.show(context.bounds, &score.reference);
            thread::sleep(self.timing.confirm_hold);
        }

        let reward = score.reward;
        self.records.push(FeedbackRecord {
            prompt,
            generated_response: hint,
            reference_response: score.reference,
            reward,
            similarity: score.similarity,
        });
        if let Err(err) = self.ledger.save(&self.records) {
            self.records.pop();
            return Err(err.context("feedback not stored"));
        }

        let training = self.scheduler.record_appended(
            &self.records,
            self.policy.min_reward(),
            self.model.as_mut(),
        );
        Ok(FieldOutcome::Recorded {
            reward,
            qualifies: self.policy.qualifies(reward),
            training,
        })
    }
}
