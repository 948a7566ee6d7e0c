use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundsError {
    #[error("bounds `{0}` do not have four coordinates")]
    Malformed(String),

    #[error("bounds `{raw}` contain a non-integer coordinate `{part}`")]
    ParseFailure { raw: String, part: String },

    #[error("bounds `{0}` are inverted (right < left or bottom < top)")]
    Inverted(String),
}

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("hierarchy document is empty")]
    Empty,

    #[error("failed to decode hierarchy document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("malformed hierarchy XML: {0}")]
    Xml(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger not found: {0}")]
    NotFound(PathBuf),

    #[error("ledger is empty: {0}")]
    Empty(PathBuf),

    #[error("ledger is corrupt: {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger I/O failed: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with status {code}: {stderr}")]
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("I/O with `{command}` failed: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
