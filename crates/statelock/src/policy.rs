//! Automation policy helpers for agent integrations
//!
//! Pure functions an agent loop uses to pick a session id, decide whether
//! an exchange is worth storing, and flag low-confidence answers.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Session used when channel, thread or user is missing
pub const FALLBACK_SESSION_ID: &str = "agent:chat:main";

/// Answers with fewer words than this are flagged as too short
const MIN_CONFIDENT_WORDS: usize = 8;

static SAVE_TRIGGER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(decision|preference|todo|policy)\b").unwrap());

static UNCERTAINTY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i\s+am\s+not\s+sure|i\s+think|maybe|might|uncertain|not\s+confident)\b")
        .unwrap()
});

/// `channel:thread:user` when all three are non-blank, else `fallback`
/// (or [`FALLBACK_SESSION_ID`] when no fallback is given)
pub fn derive_session_id(
    channel: &str,
    thread: Option<&str>,
    user: Option<&str>,
    fallback: Option<&str>,
) -> String {
    let channel = channel.trim();
    let thread = thread.unwrap_or("").trim();
    let user = user.unwrap_or("").trim();

    if !channel.is_empty() && !thread.is_empty() && !user.is_empty() {
        format!("{channel}:{thread}:{user}")
    } else {
        fallback.unwrap_or(FALLBACK_SESSION_ID).to_string()
    }
}

/// Whether an exchange should be stored as a memory.
///
/// Forced saves always win. Otherwise the exchange must mention a
/// decision, preference, todo or policy.
pub fn should_save_memory(
    user_input: &str,
    model_output: &str,
    always_save: bool,
    explicit_command: bool,
) -> bool {
    if always_save || explicit_command {
        return true;
    }

    let text = format!("{user_input}\n{model_output}");
    let text = text.trim();
    if text.is_empty() {
        return false;
    }

    SAVE_TRIGGER_PATTERN.is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceReason {
    EmptyResponse,
    UncertaintyLanguage,
    TooShort,
    None,
}

impl ConfidenceReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceReason::EmptyResponse => "empty_response",
            ConfidenceReason::UncertaintyLanguage => "uncertainty_language",
            ConfidenceReason::TooShort => "too_short",
            ConfidenceReason::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfidenceSignal {
    pub confidence_low: bool,
    pub reason: ConfidenceReason,
}

/// Heuristic confidence check on a model answer
pub fn confidence_signal(model_output: &str) -> ConfidenceSignal {
    let output = model_output.trim();

    let reason = if output.is_empty() {
        ConfidenceReason::EmptyResponse
    } else if UNCERTAINTY_PATTERN.is_match(output) {
        ConfidenceReason::UncertaintyLanguage
    } else if output.split_whitespace().count() < MIN_CONFIDENT_WORDS {
        ConfidenceReason::TooShort
    } else {
        ConfidenceReason::None
    };

    ConfidenceSignal {
        confidence_low: reason != ConfidenceReason::None,
        reason,
    }
}
