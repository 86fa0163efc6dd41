//! Context window budget and history truncation.
//!
//! Budget: `context_window - system_prompt - history - reserved_for_response`,
//! where the response reservation is the model's `max_tokens`. When the
//! history does not fit, the oldest messages are dropped, but the last two
//! (the latest exchange) are always kept even if they alone overflow.

use crate::inference::types::ModelInfo;

use super::tokens::{estimate_message_tokens, estimate_tokens};
use super::types::{Message, TokenBudget};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Messages that truncation never removes.
const MIN_RETAINED_MESSAGES: usize = 2;

// ─── Budget ─────────────────────────────────────────────────────────────────

/// Compute the token budget for sending `messages` with `system_prompt`.
pub fn calculate_budget(info: &ModelInfo, system_prompt: &str, messages: &[Message]) -> TokenBudget {
    let history_tokens: u32 = messages.iter().map(estimate_message_tokens).sum();
    budget_from_parts(info, estimate_tokens(system_prompt), history_tokens)
}

fn budget_from_parts(info: &ModelInfo, system_prompt_tokens: u32, history_tokens: u32) -> TokenBudget {
    let available = i64::from(info.context_window)
        - i64::from(system_prompt_tokens)
        - i64::from(history_tokens)
        - i64::from(info.max_tokens);

    TokenBudget {
        context_window: info.context_window,
        system_prompt_tokens,
        history_tokens,
        reserved_for_response: info.max_tokens,
        available,
        is_over_budget: available < 0,
    }
}

// ─── Truncation ─────────────────────────────────────────────────────────────

/// Drop the oldest messages until the history fits.
///
/// Returns the input unchanged when it already fits. Never returns fewer than
/// two messages (or fewer than the input holds, if that is less).
pub fn truncate_history(messages: &[Message], info: &ModelInfo, system_prompt: &str) -> Vec<Message> {
    let system_prompt_tokens = estimate_tokens(system_prompt);
    let costs: Vec<u32> = messages.iter().map(estimate_message_tokens).collect();
    let mut history_tokens: u32 = costs.iter().sum();

    let initial = budget_from_parts(info, system_prompt_tokens, history_tokens);
    if !initial.is_over_budget {
        return messages.to_vec();
    }

    let mut start = 0;
    while messages.len() - start > MIN_RETAINED_MESSAGES
        && budget_from_parts(info, system_prompt_tokens, history_tokens).is_over_budget
    {
        history_tokens -= costs[start];
        start += 1;
    }

    let final_budget = budget_from_parts(info, system_prompt_tokens, history_tokens);
    tracing::warn!(
        dropped = start,
        retained = messages.len() - start,
        history_tokens_before = initial.history_tokens,
        history_tokens_after = history_tokens,
        still_over_budget = final_budget.is_over_budget,
        "history truncated to fit context window"
    );

    messages[start..].to_vec()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
