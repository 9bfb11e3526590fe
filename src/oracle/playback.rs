//! Replays the assistant turns of a stored dialogue.

use super::history::{DialogueHistory, Message};
use super::{Oracle, OracleError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;

pub struct PlaybackOracle {
    recorded: VecDeque<String>,
    replayed: usize,
}

impl PlaybackOracle {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            recorded: responses.into_iter().collect(),
            replayed: 0,
        }
    }

    /// Load a file written with `--store`.
    ///
    /// Only assistant turns are kept. Content may be a list of parts or, in
    /// older recordings, a plain string.
    pub fn from_file(path: &Path) -> Result<Self, OracleError> {
        let json = std::fs::read_to_string(path)?;
        let messages: Vec<Value> = serde_json::from_str(&json)?;

        let responses: Vec<String> = messages
            .iter()
            .filter(|message| message["role"] == "assistant")
            .map(|message| match &message["content"] {
                Value::String(text) => text.clone(),
                content => serde_json::from_value::<Message>(serde_json::json!({
                    "role": "assistant",
                    "content": content,
                }))
                .map(|message| message.joined_text())
                .unwrap_or_default(),
            })
            .collect();

        log::info!(
            "Loaded {} recorded responses from {}",
            responses.len(),
            path.display()
        );
        Ok(Self::new(responses))
    }

    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }
}

#[async_trait]
impl Oracle for PlaybackOracle {
    async fn complete(&mut self, _history: &DialogueHistory, _prompt: &Message) -> Result<String, OracleError> {
        let response = self
            .recorded
            .pop_front()
            .ok_or(OracleError::PlaybackExhausted(self.replayed))?;
        self.replayed += 1;
        Ok(response)
    }

    fn remaining_turns(&self) -> Option<usize> {
        Some(self.recorded.len())
    }
}
