//! Per-task message history persistence on top of [`Storage`].

use std::sync::Arc;

use super::errors::AgentError;
use super::storage::{get_typed, set_typed, Storage};
use super::types::Message;

const HISTORY_PREFIX: &str = "task_history_";

/// Saves and restores conversations keyed by task id.
#[derive(Clone)]
pub struct MessageHistory {
    storage: Arc<dyn Storage>,
}

impl MessageHistory {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn save(&self, task_id: &str, messages: &[Message]) -> Result<(), AgentError> {
        set_typed(self.storage.as_ref(), &history_key(task_id), messages).await?;
        tracing::debug!(task_id, count = messages.len(), "task history saved");
        Ok(())
    }

    /// The saved messages, or an empty history if none were saved.
    pub async fn load(&self, task_id: &str) -> Result<Vec<Message>, AgentError> {
        let messages: Option<Vec<Message>> =
            get_typed(self.storage.as_ref(), &history_key(task_id)).await?;
        Ok(messages.unwrap_or_default())
    }

    pub async fn delete(&self, task_id: &str) -> Result<(), AgentError> {
        self.storage.delete(&history_key(task_id)).await
    }

    /// Ids of every task with saved history.
    pub async fn list_tasks(&self) -> Result<Vec<String>, AgentError> {
        let keys = self.storage.keys().await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(HISTORY_PREFIX).map(String::from))
            .collect())
    }
}

fn history_key(task_id: &str) -> String {
    format!("{HISTORY_PREFIX}{task_id}")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
