//! Session Loop
//!
//! Drives one browser towards one goal:
//!
//! ```text
//! Init -> Observing -> Deciding -> Resolving -> Executing -> Recording -> Observing ...
//!                                                                      |-> Achieved
//!                                                                      |-> MaxStepsReached
//!                                                                      |-> Failed(kind)
//! ```
//!
//! The loop continues while the goal is not achieved and fewer than
//! `max_steps` steps have been recorded. Any error ends the run as
//! `Failed`; the only failure absorbed along the way is a rejected scroll.
//! The browser is closed on every exit path.

use crate::action::{parse_oracle_response, resolve, ActionExecutor, ExecutedAction};
use crate::browser::screenshot::fit_within;
use crate::browser::{BrowserSession, ElementRegistry};
use crate::config::AgentConfig;
use crate::error::{AgentError, FailureKind};
use crate::oracle::prompt::{step_prompt, system_prompt};
use crate::oracle::{DialogueHistory, Message, Oracle, OracleError};
use crate::settle::SettleStrategy;
use crate::trajectory::{ScreenshotInfo, StepRecord, TraceWriter, Trajectory};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Init,
    Observing,
    Deciding,
    Resolving,
    Executing,
    Recording,
    Achieved,
    MaxStepsReached,
    Failed,
}

/// How a run ended. `Achieved` and `MaxStepsReached` are both regular endings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    Achieved { steps: usize },
    MaxStepsReached { steps: usize },
    Failed { kind: FailureKind, message: String },
}

impl Termination {
    pub fn is_success(&self) -> bool {
        !matches!(self, Termination::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Termination::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    fn phase(&self) -> SessionPhase {
        match self {
            Termination::Achieved { .. } => SessionPhase::Achieved,
            Termination::MaxStepsReached { .. } => SessionPhase::MaxStepsReached,
            Termination::Failed { .. } => SessionPhase::Failed,
        }
    }
}

impl From<&AgentError> for Termination {
    fn from(error: &AgentError) -> Self {
        Termination::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Mutable state of the running session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub goal: String,
    pub step_count: usize,
    pub achieved: bool,
    pub phase: SessionPhase,
    pub termination: Option<Termination>,
}

impl SessionState {
    fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            step_count: 0,
            achieved: false,
            phase: SessionPhase::Init,
            termination: None,
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        log::debug!("Step {}: {:?} -> {:?}", self.step_count, self.phase, phase);
        self.phase = phase;
    }
}

/// Everything a finished run leaves behind
#[derive(Debug)]
pub struct SessionOutcome {
    pub termination: Termination,
    pub state: SessionState,
    pub trajectory: Trajectory,
    pub history: DialogueHistory,
}

pub struct GoalSession {
    config: AgentConfig,
    browser: Box<dyn BrowserSession>,
    oracle: Box<dyn Oracle>,
    settle: Box<dyn SettleStrategy>,
    trace: Option<TraceWriter>,
}

impl GoalSession {
    pub fn new(config: AgentConfig, browser: Box<dyn BrowserSession>, oracle: Box<dyn Oracle>) -> Self {
        let settle: Box<dyn SettleStrategy> = (&config.settle).into();
        Self {
            config,
            browser,
            oracle,
            settle,
            trace: None,
        }
    }

    pub fn with_settle(mut self, settle: Box<dyn SettleStrategy>) -> Self {
        self.settle = settle;
        self
    }

    /// Write screenshots and `trace.json` while running
    pub fn with_trace_writer(mut self, trace: TraceWriter) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Run to a terminal state. Never fails: errors end up in the termination.
    pub async fn run(mut self) -> SessionOutcome {
        let mut state = SessionState::new(&self.config.goal);
        let mut trajectory = Trajectory::new(&self.config.goal, &self.config.start_url);
        let mut history = DialogueHistory::with_system_prompt(system_prompt(&self.config.goal));

        log::info!("Goal: {}", self.config.goal);
        log::info!("Start URL: {}", self.config.start_url);

        let termination = match self.drive(&mut state, &mut trajectory, &mut history).await {
            Ok(termination) => termination,
            Err(e) => {
                log::error!("Run failed after {} step(s): {}", state.step_count, e);
                Termination::from(&e)
            }
        };

        state.enter(termination.phase());
        state.termination = Some(termination.clone());

        if let Err(e) = self.browser.close().await {
            log::warn!("Failed to close browser: {}", e);
        }

        trajectory.finish(termination.clone());
        self.write_trace(&trajectory);
        self.store_history(&history);

        match &termination {
            Termination::Achieved { steps } => log::info!("Goal achieved after {} step(s)", steps),
            Termination::MaxStepsReached { steps } => {
                log::info!("Stopped at the cap of {} step(s) without reaching the goal", steps)
            }
            Termination::Failed { kind, message } => log::info!("Run failed ({}): {}", kind, message),
        }

        SessionOutcome {
            termination,
            state,
            trajectory,
            history,
        }
    }

    async fn drive(
        &mut self,
        state: &mut SessionState,
        trajectory: &mut Trajectory,
        history: &mut DialogueHistory,
    ) -> Result<Termination, AgentError> {
        let max_steps = match self.oracle.remaining_turns() {
            Some(turns) if turns < self.config.max_steps => {
                log::info!(
                    "Max steps {} exceeds the {} recorded responses, capping to {}",
                    self.config.max_steps,
                    turns,
                    turns
                );
                turns
            }
            _ => self.config.max_steps,
        };

        let viewport = self.config.viewport;
        let prepared = match &self.config.device {
            Some(device) => {
                log::info!("Emulating {}", device.name);
                self.browser.emulate_device(device).await
            }
            None => self.browser.set_viewport_size(viewport.width, viewport.height).await,
        };
        prepared.map_err(AgentError::DriverError)?;
        self.browser
            .navigate(&self.config.start_url)
            .await
            .map_err(AgentError::DriverError)?;
        self.settle.settle(self.browser.as_ref()).await;

        while !state.achieved && state.step_count < max_steps {
            let step_index = state.step_count;
            log::info!("Step {}", step_index + 1);

            state.enter(SessionPhase::Observing);
            let registry = ElementRegistry::observe(self.browser.as_ref())
                .await
                .map_err(AgentError::DriverError)?;
            let png = self.browser.screenshot().await.map_err(AgentError::DriverError)?;
            let png = self.fit_screenshot(png);
            let url = self.browser.current_url().await.map_err(AgentError::DriverError)?;
            let viewport = self
                .browser
                .viewport_size()
                .await
                .map_err(AgentError::DriverError)?;
            let timestamp = Utc::now().to_rfc3339();
            let screenshot = self.save_screenshot(step_index, &png);

            state.enter(SessionPhase::Deciding);
            let prompt = step_prompt(step_index, &url, &png);
            let raw = self.ask_oracle(history, &prompt).await?;
            history.push(prompt.clone());
            history.push(Message::assistant(raw.clone()));
            self.store_history(history);

            let response = parse_oracle_response(&raw)?;
            log::info!("Oracle: {}", response.description);
            log::info!("Expectation: {}", response.expectation);
            log::info!(
                "Previous expectation satisfied: {}, frustration {}/10 ({})",
                response.previous_expectation_satisfied,
                response.frustration_level.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string()),
                response.frustration_reason
            );

            let (resolved_coordinates, executed_action) = if response.achieved {
                log::info!("Oracle reports the goal as achieved, not executing its action");
                state.achieved = true;
                (None, ExecutedAction::Skipped)
            } else {
                state.enter(SessionPhase::Resolving);
                let target = resolve(&response.action, &registry, viewport);

                state.enter(SessionPhase::Executing);
                let executed = ActionExecutor::new(self.browser.as_ref(), viewport)
                    .execute(&response.action, target.clone())
                    .await?;
                self.settle.settle(self.browser.as_ref()).await;
                (target.ok(), executed)
            };

            state.enter(SessionPhase::Recording);
            trajectory.append(StepRecord {
                step_index,
                timestamp,
                url,
                screenshot,
                element_count: registry.len(),
                oracle_request: prompt.joined_text(),
                oracle_raw_response: raw,
                oracle_response: response,
                resolved_coordinates,
                executed_action,
            })?;
            state.step_count += 1;
            self.write_trace(trajectory);

            if state.step_count > max_steps {
                return Err(AgentError::InvariantViolation(format!(
                    "step {} beyond cap of {}",
                    state.step_count, max_steps
                )));
            }
        }

        Ok(if state.achieved {
            Termination::Achieved {
                steps: state.step_count,
            }
        } else {
            Termination::MaxStepsReached {
                steps: state.step_count,
            }
        })
    }

    async fn ask_oracle(&mut self, history: &DialogueHistory, prompt: &Message) -> Result<String, AgentError> {
        let timeout = self.config.oracle_timeout;
        match tokio::time::timeout(timeout, self.oracle.complete(history, prompt)).await {
            Ok(answer) => Ok(answer?),
            Err(_) => Err(OracleError::Timeout(timeout).into()),
        }
    }

    fn fit_screenshot(&self, png: Vec<u8>) -> Vec<u8> {
        let Some((max_width, max_height)) = self.config.screenshot_max_size else {
            return png;
        };
        match fit_within(&png, max_width, max_height) {
            Ok(fitted) => fitted,
            Err(e) => {
                log::warn!("Sending screenshot as captured: {}", e);
                png
            }
        }
    }

    fn save_screenshot(&self, step_index: usize, png: &[u8]) -> ScreenshotInfo {
        match &self.trace {
            Some(trace) => trace.save_screenshot(step_index, png).unwrap_or_else(|e| {
                log::warn!("Failed to save screenshot of step {}: {}", step_index, e);
                ScreenshotInfo::for_png(step_index, png)
            }),
            None => ScreenshotInfo::for_png(step_index, png),
        }
    }

    fn write_trace(&self, trajectory: &Trajectory) {
        if let Some(trace) = &self.trace {
            if let Err(e) = trace.write(trajectory) {
                log::warn!("Failed to write {}: {}", trace.trace_path().display(), e);
            }
        }
    }

    fn store_history(&self, history: &DialogueHistory) {
        if let Some(path) = &self.config.store_history {
            if let Err(e) = history.save(path) {
                log::warn!("Failed to store dialogue history: {}", e);
            }
        }
    }
}
