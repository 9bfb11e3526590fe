pub mod action;
pub mod browser;
pub mod config;
pub mod error;
pub mod oracle;
pub mod session;
pub mod settle;
pub mod trajectory;

//  Re-export commonly used items
pub use action::{
    parse_oracle_response, resolve, ActionDescriptor, ActionExecutor, ActionKind, ExecutedAction,
    OracleResponse, ScrollDirection, ScrollDistance,
};
pub use browser::{
    BrowserSession, ChromeDriver, DeviceProfile, ElementRecord, ElementRegistry, LaunchOptions, Point, Viewport,
};
pub use config::{AgentConfig, BrowserKind, SettleConfig};
pub use error::{AgentError, BrowserError, FailureKind};
pub use oracle::{DialogueHistory, Message, OpenAiOracle, Oracle, OracleConfig, OracleError, PlaybackOracle};
pub use session::{GoalSession, SessionOutcome, SessionPhase, SessionState, Termination};
pub use settle::{FixedDelay, IdleDetection, SettleStrategy};
pub use trajectory::{StepRecord, TraceWriter, Trajectory};
