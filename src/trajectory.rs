//! Trajectory of a run and the `trace.json` artifact.
//!
//! Each step leaves one [`StepRecord`]: the screenshot it was decided on, the
//! raw oracle exchange, the resolved target and what the browser actually did.
//! The [`TraceWriter`] keeps `trace.json` next to the `step_NNNN.png`
//! screenshots so an external viewer can render the run.

use crate::action::{ExecutedAction, OracleResponse};
use crate::browser::Point;
use crate::error::AgentError;
use crate::session::Termination;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Screenshot information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenshotInfo {
    /// Path relative to the trace directory
    pub path: String,

    pub format: String,

    pub size_bytes: usize,

    /// SHA-256 of the image bytes
    pub hash: String,
}

impl ScreenshotInfo {
    pub fn for_png(step_index: usize, png: &[u8]) -> Self {
        Self {
            path: screenshot_filename(step_index),
            format: "png".to_string(),
            size_bytes: png.len(),
            hash: compute_hash(png),
        }
    }
}

/// One completed step. Never modified after it is appended.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step_index: usize,

    /// RFC 3339 time the step was observed
    pub timestamp: String,

    pub url: String,

    pub screenshot: ScreenshotInfo,

    /// Clickable elements seen in this step
    pub element_count: usize,

    /// Text of the user turn sent to the oracle
    pub oracle_request: String,

    /// Oracle answer exactly as received
    pub oracle_raw_response: String,

    pub oracle_response: OracleResponse,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_coordinates: Option<Point>,

    pub executed_action: ExecutedAction,
}

/// Append-only history of one run
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub goal: String,
    pub start_url: String,
    pub started_at: DateTime<Utc>,
    steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Termination>,
}

impl Trajectory {
    pub fn new(goal: impl Into<String>, start_url: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            start_url: start_url.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
            outcome: None,
        }
    }

    /// Append the next step; its index must equal the number of steps so far
    pub fn append(&mut self, record: StepRecord) -> Result<(), AgentError> {
        if self.outcome.is_some() {
            return Err(AgentError::InvariantViolation(
                "step appended to a finished trajectory".to_string(),
            ));
        }
        if record.step_index != self.steps.len() {
            return Err(AgentError::InvariantViolation(format!(
                "step {} appended after {} recorded steps",
                record.step_index,
                self.steps.len()
            )));
        }
        self.steps.push(record);
        Ok(())
    }

    pub fn finish(&mut self, termination: Termination) {
        self.outcome = Some(termination);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn outcome(&self) -> Option<&Termination> {
        self.outcome.as_ref()
    }
}

/// Writes screenshots and `trace.json` into one directory
#[derive(Debug, Clone)]
pub struct TraceWriter {
    dir: PathBuf,
}

impl TraceWriter {
    pub const TRACE_FILE: &'static str = "trace.json";

    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn trace_path(&self) -> PathBuf {
        self.dir.join(Self::TRACE_FILE)
    }

    /// Save the screenshot of `step_index` and describe it
    pub fn save_screenshot(&self, step_index: usize, png: &[u8]) -> std::io::Result<ScreenshotInfo> {
        let info = ScreenshotInfo::for_png(step_index, png);
        std::fs::write(self.dir.join(&info.path), png)?;
        log::debug!("Saved screenshot {} ({} bytes)", info.path, info.size_bytes);
        Ok(info)
    }

    /// Rewrite `trace.json` with the current trajectory
    pub fn write(&self, trajectory: &Trajectory) -> std::io::Result<PathBuf> {
        let path = self.trace_path();
        let json = serde_json::to_string_pretty(trajectory)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

pub fn screenshot_filename(step_index: usize) -> String {
    format!("step_{:04}.png", step_index)
}

fn compute_hash(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::parse_oracle_response;

    fn record(step_index: usize) -> StepRecord {
        let raw = r#"{"description": "scroll", "action": {"actionType": "scroll", "direction": "down", "distance": "little"}}"#;
        StepRecord {
            step_index,
            timestamp: Utc::now().to_rfc3339(),
            url: "https://example.com/".to_string(),
            screenshot: ScreenshotInfo::for_png(step_index, b"png"),
            element_count: 0,
            oracle_request: "This is step 0.".to_string(),
            oracle_raw_response: raw.to_string(),
            oracle_response: parse_oracle_response(raw).unwrap(),
            resolved_coordinates: None,
            executed_action: ExecutedAction::Scroll {
                origin: None,
                dx: 0.0,
                dy: 192.0,
            },
        }
    }

    #[test]
    fn test_append_only_in_order() {
        let mut trajectory = Trajectory::new("goal", "https://example.com/");
        trajectory.append(record(0)).unwrap();
        trajectory.append(record(1)).unwrap();

        let err = trajectory.append(record(5)).unwrap_err();
        assert!(matches!(err, AgentError::InvariantViolation(_)));
        assert_eq!(trajectory.len(), 2);

        trajectory.finish(Termination::MaxStepsReached { steps: 2 });
        assert!(trajectory.append(record(2)).is_err());
    }

    #[test]
    fn test_screenshot_info() {
        let info = ScreenshotInfo::for_png(7, b"abc");
        assert_eq!(info.path, "step_0007.png");
        assert_eq!(info.size_bytes, 3);
        assert_eq!(
            info.hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_writer_outputs_trace_and_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TraceWriter::new(dir.path().join("run")).unwrap();

        writer.save_screenshot(0, b"png-bytes").unwrap();
        let mut trajectory = Trajectory::new("Find the docs", "https://example.com/");
        trajectory.append(record(0)).unwrap();
        trajectory.finish(Termination::Achieved { steps: 1 });
        let path = writer.write(&trajectory).unwrap();

        assert!(writer.dir().join("step_0000.png").exists());
        let trace: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(trace["goal"], "Find the docs");
        assert_eq!(trace["steps"][0]["screenshot"]["path"], "step_0000.png");
        assert_eq!(trace["steps"][0]["executed_action"]["type"], "scroll");
        assert_eq!(trace["outcome"]["reason"], "achieved");
    }
}
