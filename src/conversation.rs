use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::FinchError,
    value::{Message, ProcessingMode, TokenUsage},
};

/// Bookkeeping carried alongside a transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub usage: TokenUsage,
}

/// One turn of the conversation as recorded: the message plus how the answer
/// was produced (absent on user turns).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ProcessingMode>,
}

/// A chat transcript that can be saved to and restored from a JSON file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub turns: Vec<Turn>,
    pub metadata: ConversationMetadata,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            turns: Vec::new(),
            metadata: ConversationMetadata {
                created_at: now,
                updated_at: now,
                usage: TokenUsage::default(),
            },
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content), None, None);
    }

    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        mode: ProcessingMode,
        usage: &TokenUsage,
    ) {
        self.push(Message::assistant(content), Some(mode), Some(usage));
    }

    fn push(&mut self, message: Message, mode: Option<ProcessingMode>, usage: Option<&TokenUsage>) {
        self.turns.push(Turn { message, mode });
        if let Some(usage) = usage {
            self.metadata.usage.accumulate(usage);
        }
        self.metadata.updated_at = Utc::now();
    }

    /// The plain message history, for feeding back into the model.
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().map(|t| t.message.clone()).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FinchError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FinchError::Config(format!("cannot serialize conversation: {e}")))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| FinchError::Config(format!("cannot write conversation: {e}")))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FinchError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| FinchError::Config(format!("cannot read conversation: {e}")))?;
        serde_json::from_str(&raw)
            .map_err(|e| FinchError::Config(format!("cannot parse conversation: {e}")))
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
