//! Response triage, before any schema work is attempted.
//!
//! The platform returns HTTP 200 for its anti-automation challenge page, so
//! status codes alone cannot distinguish success from a blocked session —
//! the body has to be sniffed for markup first.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::EngineError;

/// What a raw response turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Parsed JSON with no top-level error envelope.
    JsonOk(Value),
    /// Parsed JSON carrying a non-empty top-level `errors` array, or an
    /// error-status JSON body. Never retried — the request itself is bad.
    JsonError(Value),
    /// A markup challenge page where JSON was expected.
    AntiAutomation,
    /// A server-side failure worth retrying unchanged.
    Transient(String),
}

const MARKUP_PREFIXES: &[&str] = &["<!doctype", "<html", "<head", "<?xml"];
const SNIPPET_LEN: usize = 120;

/// Classify one raw HTTP response. Pure function over the response data;
/// a body that is neither markup, nor empty, nor valid JSON is a
/// `MalformedResponse` error surfaced to the caller, never swallowed.
pub fn classify(
    status: u16,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Result<Classified, EngineError> {
    // Markup sniff comes first: the challenge page arrives with HTTP 200.
    if declares_markup(headers) || body_is_markup(body) {
        return Ok(Classified::AntiAutomation);
    }

    if status >= 500 {
        return Ok(Classified::Transient(format!(
            "upstream returned status {status}"
        )));
    }

    let trimmed = trim_ascii(body);
    if trimmed.is_empty() {
        // An empty 2xx body is indistinguishable from a dropped response.
        return Ok(Classified::Transient("empty response body".to_string()));
    }

    let parsed: Value = match serde_json::from_slice(trimmed) {
        Ok(v) => v,
        Err(e) => {
            return Err(EngineError::MalformedResponse {
                snippet: format!("{} ({e})", snippet(trimmed)),
            });
        }
    };

    if status >= 400 || has_error_envelope(&parsed) {
        return Ok(Classified::JsonError(parsed));
    }

    Ok(Classified::JsonOk(parsed))
}

/// Pull a human-readable message out of a `JsonError` body, for logs and
/// for the driver's outcome detail.
pub fn error_envelope_message(body: &Value) -> String {
    let messages: Vec<String> = body
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        "API returned an error envelope".to_string()
    } else {
        messages.join("; ")
    }
}

fn declares_markup(headers: &HashMap<String, String>) -> bool {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| {
            let v = v.to_ascii_lowercase();
            v.contains("text/html") || v.contains("application/xhtml")
        })
        .unwrap_or(false)
}

fn body_is_markup(body: &[u8]) -> bool {
    let trimmed = trim_ascii(body);
    let head = String::from_utf8_lossy(&trimmed[..trimmed.len().min(32)]).to_ascii_lowercase();
    MARKUP_PREFIXES.iter().any(|p| head.starts_with(p))
}

fn has_error_envelope(parsed: &Value) -> bool {
    parsed
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| !errors.is_empty())
}

fn trim_ascii(body: &[u8]) -> &[u8] {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let end = body
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &body[start..end]
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(SNIPPET_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn html_body_with_200_is_anti_automation() {
        let body = b"<!DOCTYPE html><html><body>Please verify</body></html>";
        let result = classify(200, &headers(&[]), body).unwrap();
        assert_eq!(result, Classified::AntiAutomation);
    }

    #[test]
    fn html_content_type_overrides_json_looking_body() {
        let result = classify(200, &headers(&[("Content-Type", "text/html; charset=utf-8")]), b"{}")
            .unwrap();
        assert_eq!(result, Classified::AntiAutomation);
    }

    #[test]
    fn error_envelope_on_200_is_json_error() {
        let body = json!({"errors": [{"message": "Could not authenticate you", "code": 32}]});
        let result = classify(200, &headers(&[]), body.to_string().as_bytes()).unwrap();
        match result {
            Classified::JsonError(v) => {
                assert_eq!(
                    error_envelope_message(&v),
                    "Could not authenticate you"
                );
            }
            other => panic!("expected JsonError, got {other:?}"),
        }
    }

    #[test]
    fn empty_errors_array_is_success() {
        let body = json!({"errors": [], "data": {}});
        let result = classify(200, &headers(&[]), body.to_string().as_bytes()).unwrap();
        assert!(matches!(result, Classified::JsonOk(_)));
    }

    #[test]
    fn five_hundreds_are_transient_without_body_inspection() {
        let result = classify(503, &headers(&[]), b"not even json").unwrap();
        assert!(matches!(result, Classified::Transient(_)));
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = classify(200, &headers(&[]), b"){ definitely not json").unwrap_err();
        match err {
            EngineError::MalformedResponse { snippet } => {
                assert!(snippet.starts_with("){ definitely not json"));
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn four_hundreds_with_json_body_are_json_error() {
        let body = json!({"message": "Rate limit exceeded"});
        let result = classify(429, &headers(&[]), body.to_string().as_bytes()).unwrap();
        assert!(matches!(result, Classified::JsonError(_)));
    }
}
