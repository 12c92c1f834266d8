//! Conversation history budget
//!
//! Token counts are estimated at four characters per token. When a history
//! exceeds the configured budget, whole exchanges are dropped oldest first:
//! an assistant message always leaves together with its tool results, and the
//! latest user message and the newest exchange are always kept. If the kept
//! messages still exceed the budget their contents are truncated.

use std::borrow::Cow;

use crate::llm::{Message, Role};

/// Appended to content cut by `truncate_to_token_limit`
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to token limit]";

/// Estimate the token count of a text
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Cut a text down to roughly `max_tokens` tokens, marking the cut
pub fn truncate_to_token_limit(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_tokens * 4).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Estimate the token count of a message, tool calls included
pub fn message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|call| estimate_tokens(&call.name) + estimate_tokens(&call.arguments.to_string()))
        .sum();
    estimate_tokens(&message.content) + calls
}

pub fn history_tokens(messages: &[Message]) -> usize {
    messages.iter().map(message_tokens).sum()
}

/// Start indices of exchanges. Tool results belong to the exchange of the
/// assistant message before them.
fn exchange_starts(messages: &[Message]) -> Vec<usize> {
    messages
        .iter()
        .enumerate()
        .filter(|(i, m)| *i == 0 || m.role != Role::Tool)
        .map(|(i, _)| i)
        .collect()
}

/// Fit a history into `max_tokens`, borrowing it when it already fits
pub fn trim_history(messages: &[Message], max_tokens: usize) -> Cow<'_, [Message]> {
    let total = history_tokens(messages);
    if total <= max_tokens {
        return Cow::Borrowed(messages);
    }

    let starts = exchange_starts(messages);
    let ranges: Vec<(usize, usize)> = starts
        .iter()
        .enumerate()
        .map(|(n, &start)| (start, starts.get(n + 1).copied().unwrap_or(messages.len())))
        .collect();

    let last = ranges.len() - 1;
    let pinned = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .and_then(|i| ranges.iter().position(|&(start, _)| start == i))
        .unwrap_or(0);

    // Before the latest user message first, then after it
    let drop_order = (0..pinned).chain((pinned + 1)..last);
    let mut dropped = vec![false; ranges.len()];
    let mut remaining = total;
    for n in drop_order {
        if remaining <= max_tokens {
            break;
        }
        let (start, end) = ranges[n];
        remaining -= history_tokens(&messages[start..end]);
        dropped[n] = true;
    }

    let mut kept: Vec<Message> = ranges
        .iter()
        .zip(&dropped)
        .filter(|(_, dropped)| !**dropped)
        .flat_map(|(&(start, end), _)| messages[start..end].iter().cloned())
        .collect();

    if remaining > max_tokens {
        let share = (max_tokens / kept.len()).max(1);
        for message in &mut kept {
            if estimate_tokens(&message.content) > share {
                message.content = truncate_to_token_limit(&message.content, share);
            }
        }
    }

    tracing::info!(
        "[AgentManager] Trimmed history from {} to {} messages (~{} tokens, limit {})",
        messages.len(),
        kept.len(),
        history_tokens(&kept),
        max_tokens
    );
    Cow::Owned(kept)
}
