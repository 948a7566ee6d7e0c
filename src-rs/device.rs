use std::time::Duration;

use anyhow::{Context, Result};

use crate::exec::run_shell;
use crate::geometry::ScreenSize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub raw: String,
    pub screen: ScreenSize,
}

pub trait UiDriver {
    /// Current hierarchy document plus the display size.
    fn snapshot(&mut self) -> Result<Snapshot>;
}

/// Reads the device through shell commands, e.g. an `adb`-backed dump
/// script for the hierarchy and `adb shell wm size` for the display.
pub struct CommandDriver {
    dump_cmd: String,
    size_cmd: String,
    timeout: Duration,
}

impl CommandDriver {
    pub fn new(dump_cmd: String, size_cmd: String, timeout: Duration) -> Self {
        Self {
            dump_cmd,
            size_cmd,
            timeout,
        }
    }
}

impl UiDriver for CommandDriver {
    fn snapshot(&mut self) -> Result<Snapshot> {
        let dump = run_shell(&self.dump_cmd, &[], None, self.timeout)
            .context("failed to dump UI hierarchy")?;
        let size = run_shell(&self.size_cmd, &[], None, self.timeout)
            .context("failed to read display size")?;
        let screen = ScreenSize::parse_wm_size(&size.stdout)
            .with_context(|| format!("unrecognised display size output: {:?}", size.stdout.trim()))?;
        Ok(Snapshot {
            raw: dump.stdout,
            screen,
        })
    }
}
