//! The decision oracle: given the dialogue so far and a fresh screenshot,
//! it answers with the next action as free text.

pub mod history;
pub mod openai;
pub mod playback;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

pub use history::{ContentPart, DialogueHistory, ImageUrl, Message, Role};
pub use openai::{OpenAiOracle, OracleConfig};
pub use playback::PlaybackOracle;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("OpenAI API key (OPENAI_API_KEY) not found in environment variables")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Oracle API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Oracle did not finish its answer: {0}")]
    Incomplete(String),

    #[error("Oracle returned no content: {0}")]
    EmptyResponse(String),

    #[error("Oracle did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("No more recorded responses available (replayed {0})")]
    PlaybackExhausted(usize),

    #[error("History file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("History format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Source of oracle answers
#[async_trait]
pub trait Oracle: Send {
    /// Ask for the next action. `history` holds every earlier turn; `prompt`
    /// is the new user turn with the current screenshot.
    async fn complete(&mut self, history: &DialogueHistory, prompt: &Message) -> Result<String, OracleError>;

    /// Upper bound on answers this oracle can give, if known
    fn remaining_turns(&self) -> Option<usize> {
        None
    }
}
