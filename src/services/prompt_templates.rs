//! System prompts for the HTTP oracles and the deterministic texts used when
//! the oracle cannot produce a reply.

use crate::domain::models::{ActionResult, IntentMetadata};

/// Reply used when free chat fails.
pub const FREE_CHAT_FALLBACK: &str =
    "I'm sorry, I didn't quite catch that. I can help you open an account or buy shares.";

/// System prompt for intent recognition and slot extraction.
pub fn slot_extraction_prompt(allowed: &[IntentMetadata]) -> String {
    let mut prompt = String::from(
        "You are a task-oriented assistant for business transactions.\n\
         Decide whether the user's latest message matches one of the available tools.\n\
         - If it does, call that tool and fill in every argument you can find in the \
         latest message or the conversation history.\n\
         - If the user states the intent without giving any arguments, still call the \
         tool and leave the arguments empty.\n\
         - If the message matches none of the tools, do not call any tool.\n",
    );

    if !allowed.is_empty() {
        prompt.push_str("\nAvailable tools:\n");
        for intent in allowed {
            prompt.push_str("- ");
            prompt.push_str(&intent.name);
            if !intent.description.is_empty() {
                prompt.push_str(": ");
                prompt.push_str(&intent.description);
            }
            prompt.push('\n');
        }
    }

    prompt
}

/// System prompt asking for a natural-language summary of an action outcome.
pub fn summarization_prompt(user_message: &str, result: &ActionResult) -> String {
    let result_json = serde_json::to_string(result).unwrap_or_else(|_| result.status().to_string());
    format!(
        "You are a helpful assistant. The user's request was: '{user_message}'. \
         The backend returned: {result_json}. \
         Summarize this outcome for the user in friendly, natural language. Do not output JSON."
    )
}

/// System prompt for small talk.
pub fn free_chat_prompt() -> &'static str {
    "You are a professional financial assistant, but the user is just chatting. \
     Reply in a friendly and concise way."
}

/// Summary used when the oracle cannot summarize an action outcome.
pub fn fallback_summary(result: &ActionResult) -> String {
    match result {
        ActionResult::Success { data } if data.is_null() => "Done.".to_string(),
        ActionResult::Success { data } => format!("Done. Result: {data}"),
        ActionResult::PreconditionFailed { missing_dependency } => {
            format!("Another step is needed first: {missing_dependency}.")
        }
        ActionResult::Error { message } => {
            format!("Sorry, something went wrong while handling your request: {message}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IntentKind;
    use serde_json::json;

    #[test]
    fn test_extraction_prompt_lists_tools() {
        let allowed = vec![IntentMetadata::new(
            "check_weather",
            "Look up the weather",
            IntentKind::Digression,
        )];
        let prompt = slot_extraction_prompt(&allowed);
        assert!(prompt.contains("- check_weather: Look up the weather"));
    }

    #[test]
    fn test_summarization_prompt_embeds_result() {
        let prompt = summarization_prompt("buy AAPL", &ActionResult::success(json!({"order": 1})));
        assert!(prompt.contains("'buy AAPL'"));
        assert!(prompt.contains("\"status\":\"SUCCESS\""));
    }

    #[test]
    fn test_fallback_summary() {
        assert_eq!(fallback_summary(&ActionResult::success(json!(null))), "Done.");
        assert!(fallback_summary(&ActionResult::error("boom")).starts_with("Sorry"));
    }
}
