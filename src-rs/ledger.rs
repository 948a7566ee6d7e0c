use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::LedgerError;
use crate::paths::ensure_parent_dir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub prompt: String,
    pub generated_response: String,
    #[serde(rename = "correct_response")]
    pub reference_response: String,
    pub reward: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

pub struct FeedbackLedger {
    path: PathBuf,
}

impl FeedbackLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<FeedbackRecord>, LedgerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(LedgerError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Err(LedgerError::Empty(self.path.clone()));
        }
        serde_json::from_str(&raw).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Every persisted record, or nothing when the ledger is missing, empty
    /// or unreadable. A corrupt file is copied to `<ledger>.corrupt` first.
    pub fn load(&self) -> Vec<FeedbackRecord> {
        match self.read() {
            Ok(records) => records,
            Err(LedgerError::NotFound(_) | LedgerError::Empty(_)) => Vec::new(),
            Err(err @ LedgerError::Corrupt { .. }) => {
                let aside = self.corrupt_copy_path();
                match fs::copy(&self.path, &aside) {
                    Ok(_) => warn!("{err}; starting fresh, copy kept at {}", aside.display()),
                    Err(copy_err) => warn!("{err}; starting fresh (copy failed: {copy_err})"),
                }
                Vec::new()
            }
            Err(err) => {
                warn!("{err}; starting with no prior feedback");
                Vec::new()
            }
        }
    }

    /// Replaces the ledger with `records` via a temp file in the same
    /// directory, so readers see either the old or the new content.
    pub fn save(&self, records: &[FeedbackRecord]) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        records.serialize(&mut ser)?;

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp ledger in {}", dir.display()))?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to replace ledger: {}", self.path.display()))?;
        Ok(())
    }

    fn corrupt_copy_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub qualifying: usize,
    pub min_reward: i32,
    pub by_reward: BTreeMap<i32, usize>,
    pub mean_similarity: Option<f64>,
}

impl LedgerSummary {
    pub fn from_records(records: &[FeedbackRecord], min_reward: i32) -> Self {
        let mut by_reward = BTreeMap::new();
        for record in records {
            *by_reward.entry(record.reward).or_insert(0usize) += 1;
        }
        let similarities: Vec<f64> = records.iter().filter_map(|r| r.similarity).collect();
        let mean_similarity = (!similarities.is_empty())
            .then(|| similarities.iter().sum::<f64>() / similarities.len() as f64);
        Self {
            total: records.len(),
            qualifying: records.iter().filter(|r| r.reward >= min_reward).count(),
            min_reward,
            by_reward,
            mean_similarity,
        }
    }
}
