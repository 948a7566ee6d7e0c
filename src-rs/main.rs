mod config;
mod context;
mod device;
mod error;
mod exec;
mod feedback;
mod geometry;
mod hierarchy;
mod ledger;
mod model;
mod overlay;
mod paths;
mod prompt;
mod reward;
mod scan;
mod session;
mod similarity;
mod training;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::info;
use serde_json::{json, Value};

use crate::config::{ModelArgs, PolicyArgs, RunArgs, StoreArgs};
use crate::context::FieldContext;
use crate::device::CommandDriver;
use crate::error::LedgerError;
use crate::feedback::TerminalFeedback;
use crate::geometry::ScreenSize;
use crate::hierarchy::{select_input_fields, Hierarchy};
use crate::ledger::{FeedbackLedger, FeedbackRecord, LedgerSummary};
use crate::model::CommandModel;
use crate::overlay::{AdbOverlay, HintOverlay, LogOverlay};
use crate::prompt::compile_prompt;
use crate::scan::{Collaborators, HintLoop};
use crate::session::field_key;
use crate::training::{run_training, TrainingOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "fieldhint",
    version,
    about = "Suggests hint text for unlabeled Android input fields and learns from operator feedback"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print supported commands in JSON
    Commands,
    /// Watch the device, suggest hints, collect feedback and fine-tune periodically
    Run(RunArgs),
    /// Build prompts for every hintless input field of a saved hierarchy dump
    Prompt(PromptArgs),
    /// Summarise the feedback ledger
    Ledger(LedgerArgs),
    /// Fine-tune now on the qualifying part of the ledger
    Train(TrainArgs),
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// Saved hierarchy dump (uiautomator XML or JSON)
    #[arg(long)]
    hierarchy: PathBuf,

    #[arg(long)]
    width: i32,

    #[arg(long)]
    height: i32,

    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct LedgerArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    policy: PolicyArgs,

    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    policy: PolicyArgs,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Commands => print_commands(),
        Commands::Run(args) => command_run(args),
        Commands::Prompt(args) => command_prompt(args),
        Commands::Ledger(args) => command_ledger(args),
        Commands::Train(args) => command_train(args),
    }
}

fn print_commands() -> Result<()> {
    let rows = vec![
        json!({
            "name": "run",
            "description": "Scan the device screen, suggest hints and learn from feedback."
        }),
        json!({
            "name": "prompt",
            "description": "Compile hint prompts from a saved hierarchy dump."
        }),
        json!({
            "name": "ledger",
            "description": "Summarise stored feedback under a reward policy."
        }),
        json!({
            "name": "train",
            "description": "Fine-tune on qualifying feedback immediately."
        }),
    ];

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "commands": rows }))?
    );
    Ok(())
}

fn command_run(args: RunArgs) -> Result<()> {
    args.validate()?;

    let model = CommandModel::open(args.model.settings(&args.store))?;
    let policy = args.policy.build()?;
    info!(
        "reward policy {:?}, training on reward >= {}, every {} record(s)",
        policy.strategy(),
        policy.min_reward(),
        args.training_interval
    );

    let driver = CommandDriver::new(
        args.dump_cmd.clone(),
        args.size_cmd.clone(),
        Duration::from_secs(args.snapshot_timeout_secs),
    );
    let overlay: Box<dyn HintOverlay> = if args.no_overlay {
        Box::new(LogOverlay)
    } else {
        Box::new(AdbOverlay::new(
            args.overlay_package.clone(),
            Duration::from_secs(args.overlay_timeout_secs),
        ))
    };
    let parts = Collaborators {
        driver: Box::new(driver),
        model: Box::new(model),
        overlay,
        feedback: Box::new(TerminalFeedback::new(io::stdin().lock(), io::stdout())),
        policy,
    };

    let ledger = FeedbackLedger::new(args.store.ledger_path());
    let mut hint_loop = HintLoop::new(parts, ledger, args.training_interval, args.timing());
    hint_loop.run_forever();
    Ok(())
}

fn command_prompt(args: PromptArgs) -> Result<()> {
    if args.width <= 0 || args.height <= 0 {
        bail!("--width and --height must be positive");
    }
    let raw = fs::read_to_string(&args.hierarchy)
        .with_context(|| format!("failed to read hierarchy: {}", args.hierarchy.display()))?;
    let rows = prompt_rows(&raw, ScreenSize::new(args.width, args.height))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no input fields without hints");
    }
    for row in &rows {
        println!("== {}", row["key"].as_str().unwrap_or_default());
        println!("{}", row["prompt"].as_str().unwrap_or_default());
        println!();
    }
    Ok(())
}

fn prompt_rows(raw: &str, screen: ScreenSize) -> Result<Vec<Value>> {
    let hierarchy = Hierarchy::parse(raw)?;
    let leaves = hierarchy.leaves();
    let rows = select_input_fields(&leaves)
        .into_iter()
        .map(|field| {
            let context = FieldContext::build(&leaves, field, screen);
            json!({
                "key": field_key(field),
                "bounds": context.bounds.as_array(),
                "window": context.window.as_array(),
                "nearby": context.nearby.len(),
                "prompt": compile_prompt(&context),
            })
        })
        .collect();
    Ok(rows)
}

fn read_ledger(path: &Path) -> Result<Vec<FeedbackRecord>> {
    match FeedbackLedger::new(path).read() {
        Ok(records) => Ok(records),
        Err(LedgerError::NotFound(_) | LedgerError::Empty(_)) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn command_ledger(args: LedgerArgs) -> Result<()> {
    let path = args.store.ledger_path();
    let records = read_ledger(&path)?;
    let summary = LedgerSummary::from_records(&records, args.policy.min_reward());

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ledger": path.display().to_string(),
                "reward_policy": args.policy.reward_policy,
                "summary": summary,
            }))?
        );
        return Ok(());
    }

    println!("ledger: {}", path.display());
    println!(
        "records: {} ({} with reward >= {})",
        summary.total, summary.qualifying, summary.min_reward
    );
    for (reward, count) in &summary.by_reward {
        println!("  reward {reward:>2}: {count}");
    }
    if let Some(mean) = summary.mean_similarity {
        println!("mean similarity: {mean:.4}");
    }
    Ok(())
}

fn command_train(args: TrainArgs) -> Result<()> {
    let path = args.store.ledger_path();
    let records = read_ledger(&path)?;
    let min_reward = args.policy.min_reward();
    let mut model = CommandModel::open(args.model.settings(&args.store))?;

    let (status, examples) = match run_training(&records, min_reward, &mut model) {
        TrainingOutcome::Trained { examples } => ("trained", examples),
        TrainingOutcome::Skipped => ("skipped", 0),
        TrainingOutcome::Failed { error, .. } => bail!("training failed: {error}"),
        TrainingOutcome::Pending { .. } => ("pending", 0),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ledger": path.display().to_string(),
            "records": records.len(),
            "min_reward": min_reward,
            "status": status,
            "examples": examples,
        }))?
    );
    Ok(())
}
