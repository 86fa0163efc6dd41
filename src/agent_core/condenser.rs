//! Conversation condensation.
//!
//! Summarizes the older part of a conversation with the model itself and
//! replaces it by a synthetic user/assistant exchange carrying the summary.
//! The most recent messages are kept verbatim.

use futures::StreamExt;

use crate::inference::client::ModelClient;
use crate::inference::types::StreamChunk;

use super::errors::AgentError;
use super::tokens::estimate_tokens;
use super::types::Message;

// ─── Constants ──────────────────────────────────────────────────────────────

pub const DEFAULT_KEEP_RECENT_COUNT: usize = 4;

const SUMMARIZER_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes conversations concisely.";

pub const DEFAULT_CONDENSE_PROMPT: &str = "\
Please provide a concise summary of the following conversation between a user and an AI assistant.
Focus on:
1. The main task or goal being worked on
2. Key decisions made
3. Important code changes or file modifications
4. Current state of progress
5. Any unresolved issues or next steps

Keep the summary compact but comprehensive enough to continue the conversation.";

const SUMMARY_PREFIX: &str = "[Previous conversation summary]: ";

const ACKNOWLEDGEMENT: &str =
    "I understand the context from our previous conversation. Let me continue from where we left off.";

const NOTHING_TO_CONDENSE: &str = "No condensation needed";

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CondenseOptions {
    /// Messages at the end of the history that are kept verbatim.
    pub keep_recent_count: usize,
    pub prompt: String,
}

impl Default for CondenseOptions {
    fn default() -> Self {
        Self {
            keep_recent_count: DEFAULT_KEEP_RECENT_COUNT,
            prompt: DEFAULT_CONDENSE_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CondenseResult {
    pub messages: Vec<Message>,
    pub summary: String,
    /// Estimated tokens of the condensed transcript.
    pub tokens_before: u32,
    /// Estimated tokens of the summary.
    pub tokens_after: u32,
}

// ─── Condensation ───────────────────────────────────────────────────────────

/// Summarize all but the last `keep_recent_count` messages.
///
/// A stream error aborts condensation; the caller's history is untouched
/// because the input is only borrowed.
pub async fn condense_messages(
    messages: &[Message],
    model: &dyn ModelClient,
    options: &CondenseOptions,
) -> Result<CondenseResult, AgentError> {
    let keep = options.keep_recent_count;
    if messages.len() <= keep {
        return Ok(CondenseResult {
            messages: messages.to_vec(),
            summary: NOTHING_TO_CONDENSE.to_string(),
            tokens_before: 0,
            tokens_after: 0,
        });
    }

    let split = messages.len() - keep;
    let (older, recent) = messages.split_at(split);
    let transcript = render_transcript(older);
    let request = vec![Message::user(format!("{}\n\n---\n\n{transcript}", options.prompt))];

    let mut stream = model.create_message(SUMMARIZER_SYSTEM_PROMPT, &request).await?;
    let mut summary = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Text { text } => summary.push_str(&text),
            StreamChunk::Error { message } => {
                tracing::error!(error = %message, "condensation stream failed");
                return Err(AgentError::StreamError { reason: message });
            }
            StreamChunk::Reasoning { .. } | StreamChunk::Usage(_) => {}
        }
    }

    // `older` is non-empty because `split > 0`.
    let anchor = older[0].timestamp;
    let mut condensed = Vec::with_capacity(recent.len() + 2);
    condensed.push(Message::user(format!("{SUMMARY_PREFIX}{summary}")).with_timestamp(anchor));
    condensed.push(Message::assistant(ACKNOWLEDGEMENT).with_timestamp(anchor));
    condensed.extend_from_slice(recent);

    let result = CondenseResult {
        messages: condensed,
        tokens_before: estimate_tokens(&transcript),
        tokens_after: estimate_tokens(&summary),
        summary,
    };
    tracing::info!(
        condensed = older.len(),
        kept = recent.len(),
        tokens_before = result.tokens_before,
        tokens_after = result.tokens_after,
        "conversation condensed"
    );
    Ok(result)
}

/// `[role]: text` per message, blank line between messages.
fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}]: {}", m.role.as_str(), m.text_content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::types::Role;
    use crate::test_support::ScriptedModel;
    use chrono::{TimeZone, Utc};

    fn history(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
                let msg = if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::assistant(format!("answer {i}"))
                };
                msg.with_timestamp(ts)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_short_history_is_untouched() {
        let model = ScriptedModel::new(vec![]);
        let messages = history(4);
        let result = condense_messages(&messages, &model, &CondenseOptions::default())
            .await
            .unwrap();
        assert_eq!(result.messages, messages);
        assert_eq!(result.summary, "No condensation needed");
        assert_eq!(result.tokens_before, 0);
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_condenses_older_messages() {
        let model = ScriptedModel::new(vec![vec![
            StreamChunk::text("User asked "),
            StreamChunk::usage(50, 5),
            StreamChunk::text("two questions."),
        ]]);
        let messages = history(6);
        let result = condense_messages(&messages, &model, &CondenseOptions::default())
            .await
            .unwrap();

        assert_eq!(result.summary, "User asked two questions.");
        assert_eq!(result.messages.len(), 6);
        assert_eq!(
            result.messages[0].text_content(),
            "[Previous conversation summary]: User asked two questions."
        );
        assert_eq!(result.messages[0].timestamp, messages[0].timestamp);
        assert_eq!(result.messages[1].role, Role::Assistant);
        assert_eq!(result.messages[2..], messages[2..]);

        let requests = model.requests();
        assert_eq!(requests[0].system_prompt, SUMMARIZER_SYSTEM_PROMPT);
        let sent = requests[0].messages[0].text_content();
        assert!(sent.starts_with(DEFAULT_CONDENSE_PROMPT));
        assert!(sent.ends_with("[user]: question 0\n\n[assistant]: answer 1"));
        assert_eq!(
            result.tokens_before,
            estimate_tokens("[user]: question 0\n\n[assistant]: answer 1")
        );
    }

    #[tokio::test]
    async fn test_stream_error_aborts() {
        let model = ScriptedModel::new(vec![vec![
            StreamChunk::text("partial"),
            StreamChunk::error("overloaded"),
        ]]);
        let messages = history(8);
        let err = condense_messages(&messages, &model, &CondenseOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::StreamError { reason } if reason == "overloaded"));
    }

    #[tokio::test]
    async fn test_custom_keep_count() {
        let model = ScriptedModel::new(vec![vec![StreamChunk::text("summary")]]);
        let options = CondenseOptions {
            keep_recent_count: 1,
            ..CondenseOptions::default()
        };
        let result = condense_messages(&history(3), &model, &options).await.unwrap();
        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.messages[2].text_content(), "question 2");
    }
}
