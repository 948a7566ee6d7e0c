use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{ArgAction, Args};

use crate::model::ModelSettings;
use crate::overlay::DEFAULT_OVERLAY_PACKAGE;
use crate::paths::{default_ledger_path, out_root};
use crate::reward::{BinaryPolicy, GradedPolicy, RewardPolicy, RewardStrategy};
use crate::scan::LoopTiming;
use crate::similarity::CommandSimilarity;

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Artifact root (ledger, training batches)
    #[arg(long, env = "FIELDHINT_OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Feedback ledger path (default: <out-dir>/feedback_data.json)
    #[arg(long, env = "FIELDHINT_LEDGER")]
    pub ledger: Option<PathBuf>,
}

impl StoreArgs {
    pub fn out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(out_root)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger
            .clone()
            .unwrap_or_else(|| default_ledger_path(&self.out_dir()))
    }
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    #[arg(long, value_enum, env = "FIELDHINT_REWARD_POLICY", default_value = "binary")]
    pub reward_policy: RewardStrategy,

    /// Minimum reward for a record to be trained on (default: 1 binary, 3 graded)
    #[arg(long, env = "FIELDHINT_REWARD_THRESHOLD", allow_negative_numbers = true)]
    pub reward_threshold: Option<i32>,

    /// Prints the similarity of its two arguments; required for graded
    #[arg(long, env = "FIELDHINT_SIMILARITY_CMD")]
    pub similarity_cmd: Option<String>,

    #[arg(long, env = "FIELDHINT_SIMILARITY_TIMEOUT_SECS", default_value_t = 60)]
    pub similarity_timeout_secs: u64,
}

impl PolicyArgs {
    pub fn min_reward(&self) -> i32 {
        self.reward_threshold
            .unwrap_or(self.reward_policy.default_min_reward())
    }

    pub fn validate(&self) -> Result<()> {
        if self.reward_policy == RewardStrategy::Graded && self.similarity_cmd.is_none() {
            bail!("--reward-policy graded requires --similarity-cmd");
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn RewardPolicy>> {
        match (self.reward_policy, self.similarity_cmd.as_deref()) {
            (RewardStrategy::Binary, _) => Ok(Box::new(BinaryPolicy::new(self.reward_threshold))),
            (RewardStrategy::Graded, Some(cmd)) => {
                let similarity = CommandSimilarity::open(
                    cmd,
                    Duration::from_secs(self.similarity_timeout_secs),
                )?;
                Ok(Box::new(GradedPolicy::new(
                    Box::new(similarity),
                    self.reward_threshold,
                )))
            }
            (RewardStrategy::Graded, None) => bail!("--reward-policy graded requires --similarity-cmd"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model directory or file handed to the generate/train commands
    #[arg(long, env = "FIELDHINT_MODEL_PATH")]
    pub model_path: PathBuf,

    /// Reads a prompt on stdin, prints a hint; called as `<cmd> <model-path>`
    #[arg(long, env = "FIELDHINT_GENERATE_CMD")]
    pub generate_cmd: String,

    /// Fine-tunes in place; called as `<cmd> <model-path> <batch.jsonl>`
    #[arg(long, env = "FIELDHINT_TRAIN_CMD")]
    pub train_cmd: Option<String>,

    #[arg(long, env = "FIELDHINT_GENERATE_TIMEOUT_SECS", default_value_t = 120)]
    pub generate_timeout_secs: u64,

    #[arg(long, env = "FIELDHINT_TRAIN_TIMEOUT_SECS", default_value_t = 3600)]
    pub train_timeout_secs: u64,
}

impl ModelArgs {
    pub fn settings(&self, store: &StoreArgs) -> ModelSettings {
        ModelSettings {
            model_path: self.model_path.clone(),
            generate_cmd: self.generate_cmd.clone(),
            train_cmd: self.train_cmd.clone(),
            generate_timeout: Duration::from_secs(self.generate_timeout_secs),
            train_timeout: Duration::from_secs(self.train_timeout_secs),
            training_dir: store.out_dir().join("training"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Prints the UI hierarchy of the connected device (uiautomator XML or JSON)
    #[arg(
        long,
        env = "FIELDHINT_DUMP_CMD",
        default_value = "adb exec-out uiautomator dump /dev/tty"
    )]
    pub dump_cmd: String,

    #[arg(long, env = "FIELDHINT_SIZE_CMD", default_value = "adb shell wm size")]
    pub size_cmd: String,

    #[arg(long, env = "FIELDHINT_SNAPSHOT_TIMEOUT_SECS", default_value_t = 30)]
    pub snapshot_timeout_secs: u64,

    /// New feedback records between fine-tuning runs
    #[arg(long, env = "FIELDHINT_TRAINING_INTERVAL", default_value_t = 5)]
    pub training_interval: usize,

    #[arg(long, env = "FIELDHINT_IDLE_SECS", default_value_t = 5)]
    pub idle_secs: u64,

    #[arg(long, env = "FIELDHINT_RETRY_SECS", default_value_t = 15)]
    pub retry_secs: u64,

    #[arg(long, env = "FIELDHINT_CONFIRM_HOLD_SECS", default_value_t = 3)]
    pub confirm_hold_secs: u64,

    #[arg(long, env = "FIELDHINT_OVERLAY_PACKAGE", default_value = DEFAULT_OVERLAY_PACKAGE)]
    pub overlay_package: String,

    #[arg(long, env = "FIELDHINT_OVERLAY_TIMEOUT_SECS", default_value_t = 10)]
    pub overlay_timeout_secs: u64,

    /// Log hints instead of launching the on-device overlay
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_overlay: bool,
}

impl RunArgs {
    pub fn validate(&self) -> Result<()> {
        if self.training_interval == 0 {
            bail!("--training-interval must be at least 1");
        }
        self.policy.validate()
    }

    pub fn timing(&self) -> LoopTiming {
        LoopTiming {
            idle: Duration::from_secs(self.idle_secs),
            retry: Duration::from_secs(self.retry_secs),
            confirm_hold: Duration::from_secs(self.confirm_hold_secs),
        }
    }
}
