use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde_json::json;

use crate::exec::{command_exists, program_of, run_shell, truncate_text};
use crate::paths::{abs_path, ensure_parent_dir, run_id, timestamp_iso, write_json_pretty};
use crate::training::TrainingExample;

pub trait HintModel {
    fn generate(&mut self, prompt: &str) -> Result<String>;

    fn fine_tune(&mut self, examples: &[TrainingExample]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model_path: PathBuf,
    pub generate_cmd: String,
    pub train_cmd: Option<String>,
    pub generate_timeout: Duration,
    pub train_timeout: Duration,
    pub training_dir: PathBuf,
}

/// A model served by external commands: `<generate-cmd> <model-path>` reads
/// the prompt on stdin and prints the hint; `<train-cmd> <model-path>
/// <batch.jsonl>` fine-tunes in place.
pub struct CommandModel {
    settings: ModelSettings,
    model_arg: String,
}

impl CommandModel {
    pub fn open(settings: ModelSettings) -> Result<Self> {
        if !settings.model_path.exists() {
            bail!(
                "could not load model: path does not exist: {}",
                settings.model_path.display()
            );
        }
        let program = program_of(&settings.generate_cmd);
        if program.is_empty() || !command_exists(program) {
            bail!(
                "could not load model: generate command not found: `{}`",
                settings.generate_cmd
            );
        }
        if let Some(train_cmd) = settings.train_cmd.as_deref() {
            let program = program_of(train_cmd);
            if program.is_empty() || !command_exists(program) {
                bail!("train command not found: `{train_cmd}`");
            }
        }
        let model_arg = abs_path(&settings.model_path).display().to_string();
        info!("model ready: {model_arg}");
        Ok(Self {
            settings,
            model_arg,
        })
    }
}

impl HintModel for CommandModel {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        let output = run_shell(
            &self.settings.generate_cmd,
            &[self.model_arg.as_str()],
            Some(prompt),
            self.settings.generate_timeout,
        )?;
        if !output.stderr.trim().is_empty() {
            debug!("generate stderr: {}", truncate_text(output.stderr.trim(), 600));
        }
        let hint = output.stdout.trim();
        if hint.is_empty() {
            bail!("model returned no text");
        }
        Ok(hint.to_string())
    }

    fn fine_tune(&mut self, examples: &[TrainingExample]) -> Result<()> {
        let Some(train_cmd) = self.settings.train_cmd.clone() else {
            bail!("no train command configured");
        };

        let run_id = run_id();
        let batch_path = self.settings.training_dir.join(format!("batch-{run_id}.jsonl"));
        let report_path = self.settings.training_dir.join(format!("batch-{run_id}.json"));
        write_batch(&batch_path, examples)?;

        let started_at = timestamp_iso();
        let started = Instant::now();
        let batch_arg = abs_path(&batch_path).display().to_string();
        let result = run_shell(
            &train_cmd,
            &[self.model_arg.as_str(), batch_arg.as_str()],
            None,
            self.settings.train_timeout,
        );

        let report = json!({
            "run_id": run_id,
            "started_at": started_at,
            "finished_at": timestamp_iso(),
            "duration_ms": started.elapsed().as_millis() as u64,
            "model_path": self.model_arg,
            "batch_path": batch_arg,
            "examples": examples.len(),
            "success": result.is_ok(),
            "stdout_tail": result.as_ref().map(|o| truncate_text(o.stdout.trim(), 2400)).ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        write_json_pretty(&report_path, &report)?;

        result.with_context(|| format!("fine-tune failed; report at {}", report_path.display()))?;
        info!(
            "model fine-tuned on {} example(s) in {}ms",
            examples.len(),
            started.elapsed().as_millis()
        );
        Ok(())
    }
}

pub fn write_batch(path: &Path, examples: &[TrainingExample]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut raw = String::new();
    for example in examples {
        raw.push_str(&serde_json::to_string(example)?);
        raw.push('\n');
    }
    fs::write(path, raw).with_context(|| format!("failed to write batch: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(dir: &Path, generate_cmd: &str, train_cmd: Option<&str>) -> ModelSettings {
        ModelSettings {
            model_path: dir.to_path_buf(),
            generate_cmd: generate_cmd.to_string(),
            train_cmd: train_cmd.map(str::to_string),
            generate_timeout: Duration::from_secs(10),
            train_timeout: Duration::from_secs(10),
            training_dir: dir.join("training"),
        }
    }

    fn example(prompt: &str, target: &str) -> TrainingExample {
        TrainingExample {
            prompt: prompt.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn open_fails_without_model_path() {
        let dir = tempdir().unwrap();
        let mut s = settings(dir.path(), "cat", None);
        s.model_path = dir.path().join("missing-model");
        assert!(CommandModel::open(s).is_err());

        let s = settings(dir.path(), "fieldhint-no-such-generator", None);
        assert!(CommandModel::open(s).is_err());
    }

    #[test]
    fn generate_reads_prompt_from_stdin() {
        let dir = tempdir().unwrap();
        let mut model = CommandModel::open(settings(dir.path(), "sh -c 'head -c 5; echo' sh", None))
            .unwrap();
        assert_eq!(model.generate("Enter email please").unwrap(), "Enter");
    }

    #[test]
    fn generate_rejects_empty_output() {
        let dir = tempdir().unwrap();
        let mut model =
            CommandModel::open(settings(dir.path(), "sh -c 'cat >/dev/null' sh", None)).unwrap();
        assert!(model.generate("prompt").is_err());
    }

    #[test]
    fn fine_tune_writes_batch_and_report() {
        let dir = tempdir().unwrap();
        let mut model = CommandModel::open(settings(
            dir.path(),
            "cat",
            Some("sh -c 'test -d \"$1\" && wc -l < \"$2\"' sh"),
        ))
        .unwrap();
        model
            .fine_tune(&[example("p1", "Email"), example("p2", "Password")])
            .unwrap();

        let mut batches = Vec::new();
        let mut reports = Vec::new();
        for entry in fs::read_dir(dir.path().join("training")).unwrap() {
            let path = entry.unwrap().path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("jsonl") => batches.push(path),
                Some("json") => reports.push(path),
                _ => {}
            }
        }
        assert_eq!(batches.len(), 1);
        assert_eq!(reports.len(), 1);

        let lines: Vec<serde_json::Value> = fs::read_to_string(&batches[0])
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[1]["target"], "Password");

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
        assert_eq!(report["success"], true);
        assert_eq!(report["examples"], 2);
        assert_eq!(report["stdout_tail"], "2");
    }

    #[test]
    fn fine_tune_failure_is_reported() {
        let dir = tempdir().unwrap();
        let mut model =
            CommandModel::open(settings(dir.path(), "cat", Some("sh -c 'exit 4' sh"))).unwrap();
        let err = model.fine_tune(&[example("p", "t")]).unwrap_err();
        assert!(format!("{err:#}").contains("status 4"));

        let mut untrained = CommandModel::open(settings(dir.path(), "cat", None)).unwrap();
        assert!(untrained.fine_tune(&[example("p", "t")]).is_err());
    }
}
