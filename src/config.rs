//! Run configuration
//!
//! Defaults mirror what a tester gets from `goal-driven-test run <url> <goal>`
//! without any flags. The CLI overrides individual fields.

use crate::browser::screenshot::SCREENSHOT_MAX_SIZE;
use crate::browser::{DeviceProfile, Viewport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_STEPS: usize = 10;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(4000);
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Which browser the tester asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

/// How the loop waits for the page after navigation and after each action
#[derive(Debug, Clone, PartialEq)]
pub enum SettleConfig {
    /// Sleep for a fixed interval
    FixedDelay(Duration),
    /// Poll the page until it looks idle, falling back to `timeout`
    IdleDetection {
        poll_interval: Duration,
        quiet_period: Duration,
        timeout: Duration,
    },
}

impl Default for SettleConfig {
    fn default() -> Self {
        SettleConfig::FixedDelay(DEFAULT_SETTLE_DELAY)
    }
}

/// Configuration of one goal-driven run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Natural-language goal handed to the oracle
    pub goal: String,

    /// Starting URL
    pub start_url: String,

    /// Hard cap on the number of steps
    pub max_steps: usize,

    /// Viewport forced on the page before the first observation
    pub viewport: Viewport,

    /// Device to emulate instead of a plain viewport
    pub device: Option<DeviceProfile>,

    /// Screenshots are shrunk to fit these bounds before they reach the oracle
    pub screenshot_max_size: Option<(u32, u32)>,

    pub settle: SettleConfig,

    /// Upper bound on a single oracle round trip
    pub oracle_timeout: Duration,

    /// Where screenshots and `trace.json` are written
    pub output_dir: PathBuf,

    /// Write the dialogue history here after every step (playback format)
    pub store_history: Option<PathBuf>,
}

impl AgentConfig {
    pub fn new(start_url: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            start_url: start_url.into(),
            max_steps: DEFAULT_MAX_STEPS,
            viewport: Viewport::default(),
            device: None,
            screenshot_max_size: Some(SCREENSHOT_MAX_SIZE),
            settle: SettleConfig::default(),
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            output_dir: PathBuf::from("./goal-driven-test-output"),
            store_history: None,
        }
    }

    /// Emulate `device`, taking over its viewport
    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.viewport = device.viewport();
        self.device = Some(device);
        self
    }
}
