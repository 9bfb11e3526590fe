use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::descriptor::ResponseError;
use crate::action::resolver::ResolveError;
use crate::oracle::OracleError;

/// Errors raised by the browser collaborator
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script execution failed: {0}")]
    ScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Input dispatch failed: {0}")]
    InputFailed(String),

    #[error("No page available")]
    NoPage,

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Label attached to a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedResponse,
    UnresolvableTarget,
    ExecutionError,
    OracleUnavailable,
    DriverError,
    InvariantViolation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::MalformedResponse => "MalformedResponse",
            FailureKind::UnresolvableTarget => "UnresolvableTarget",
            FailureKind::ExecutionError => "ExecutionError",
            FailureKind::OracleUnavailable => "OracleUnavailable",
            FailureKind::DriverError => "DriverError",
            FailureKind::InvariantViolation => "InvariantViolation",
        };
        f.write_str(label)
    }
}

/// Everything that can end a run early
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Malformed oracle response: {0}")]
    MalformedResponse(#[from] ResponseError),

    #[error("Unresolvable target: {0}")]
    UnresolvableTarget(#[from] ResolveError),

    #[error("Execution error: {0}")]
    ExecutionError(#[source] BrowserError),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("Driver error: {0}")]
    DriverError(#[source] BrowserError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::MalformedResponse(_) => FailureKind::MalformedResponse,
            AgentError::UnresolvableTarget(_) => FailureKind::UnresolvableTarget,
            AgentError::ExecutionError(_) => FailureKind::ExecutionError,
            AgentError::OracleUnavailable(_) => FailureKind::OracleUnavailable,
            AgentError::DriverError(_) => FailureKind::DriverError,
            AgentError::InvariantViolation(_) => FailureKind::InvariantViolation,
        }
    }
}
