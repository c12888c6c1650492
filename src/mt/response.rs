//! Parsing and validation of raw backend replies
//!
//! All providers funnel their HTTP failures and reply bodies through this
//! module, so a bad reply is always reported the same way: as
//! [`MtError::MalformedResponse`] or [`MtError::CountMismatch`].

use crate::mt::error::{MtError, MtResult};
use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```$").expect("valid fence pattern")
});

// Explicit refusal markers; bare words like "blocked" also appear in key and
// permission errors and must not count
const POLICY_MARKERS: &[&str] = &[
    "content_policy_violation",
    "content_filter",
    "prohibited_content",
];

// A structured finish or block reason of SAFETY, e.g. `"blockReason": "SAFETY"`
static SAFETY_REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:finish_?reason|block_?reason)"\s*:\s*"safety""#).expect("valid reason pattern")
});

const AUTH_MARKERS: &[&str] = &["permission_denied", "api_key_", "api key not valid", "unauthenticated"];

const QUOTA_MARKERS: &[&str] = &["quota", "rate limit", "rate_limit", "resource_exhausted"];

/// Map a non-success HTTP status and its body onto an [`MtError`]
///
/// | status | error |
/// |---|---|
/// | 429, or any status whose body mentions quota | `QuotaExceeded` |
/// | 401, 403, or a body with a permission or API key error | `ConfigError` |
/// | 400/403/451 with an explicit refusal marker | `ContentPolicyRejected` |
/// | 408, 5xx | `TransientServerError` |
/// | anything else | `Other` |
pub fn classify_http_failure(status: u16, body: &str) -> MtError {
    let lowered = body.to_lowercase();
    let message = format!("HTTP {}: {}", status, truncate(body, 300));

    if status == 429 || QUOTA_MARKERS.iter().any(|m| lowered.contains(m)) {
        return MtError::QuotaExceeded(message);
    }
    if AUTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        return MtError::ConfigError(message);
    }
    if matches!(status, 400 | 403 | 451)
        && (POLICY_MARKERS.iter().any(|m| lowered.contains(m)) || SAFETY_REASON.is_match(&lowered))
    {
        return MtError::ContentPolicyRejected(message);
    }
    match status {
        401 | 403 => MtError::ConfigError(message),
        408 | 500..=599 => MtError::TransientServerError(message),
        _ => MtError::Other(message),
    }
}

/// Strip a surrounding markdown code fence, if any
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// Validate a single-text reply from a model
///
/// Removes code fences and surrounding whitespace. An empty reply is
/// malformed.
pub fn clean_text_reply(raw: &str) -> MtResult<String> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(MtError::MalformedResponse("Empty reply".to_string()));
    }
    Ok(text.to_string())
}

/// Extract and validate the JSON string array of a multi-item reply
///
/// Accepts the array bare, fenced, or surrounded by chatter (the outermost
/// `[` ... `]` span is taken). Every element must be a string.
pub fn parse_string_array(raw: &str) -> MtResult<Vec<String>> {
    let body = strip_code_fence(raw);
    let start = body
        .find('[')
        .ok_or_else(|| MtError::MalformedResponse("No JSON array in reply".to_string()))?;
    let end = body
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| MtError::MalformedResponse("Unterminated JSON array in reply".to_string()))?;

    let values: Vec<serde_json::Value> = serde_json::from_str(&body[start..=end])?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            serde_json::Value::String(s) => Ok(s),
            other => Err(MtError::MalformedResponse(format!(
                "Element {} is not a string: {}",
                i, other
            ))),
        })
        .collect()
}

/// Check that a multi-item reply has one entry per input
pub fn ensure_count<T>(expected: usize, items: Vec<T>) -> MtResult<Vec<T>> {
    if items.len() != expected {
        return Err(MtError::CountMismatch {
            expected,
            got: items.len(),
        });
    }
    Ok(items)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
