//! Action directives parsed from generated responses.
//!
//! The assistant may embed `CREATE_EVENT: {...}` or `CREATE_POLL: {...}`
//! in its answer; parsing is best-effort and malformed payloads are
//! silently ignored.

use serde_json::Value;

/// Directives extracted from a generated response.
#[derive(Debug, Default, PartialEq)]
pub struct BotActions {
    pub create_event: Option<Value>,
    pub create_poll: Option<Value>,
}

/// Scan a response for action directives.
pub fn parse_actions(response: &str) -> BotActions {
    BotActions {
        create_event: extract_payload(response, "CREATE_EVENT:"),
        create_poll: extract_payload(response, "CREATE_POLL:"),
    }
}

/// Find `marker` (case-insensitive) and parse the single-level JSON object
/// that follows it.
fn extract_payload(text: &str, marker: &str) -> Option<Value> {
    let start = find_ignore_case(text, marker)?;
    let rest = &text[start + marker.len()..];
    let open = rest.find('{')?;
    let close = rest[open..].find('}')?;
    serde_json::from_str(&rest[open..open + close + 1]).ok()
}

/// Byte-window scan with ASCII case folding; the markers are ASCII, so a
/// match is always on a char boundary of the original text.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_event_directive() {
        let response = r#"Sounds fun! CREATE_EVENT: {"title": "Picnic", "date": "2026-08-15"}"#;
        let actions = parse_actions(response);
        assert_eq!(
            actions.create_event,
            Some(json!({"title": "Picnic", "date": "2026-08-15"}))
        );
        assert!(actions.create_poll.is_none());
    }

    #[test]
    fn extracts_both_directives_case_insensitively() {
        let response = r#"create_event: {"title": "A"} and Create_Poll: {"question": "B?"}"#;
        let actions = parse_actions(response);
        assert_eq!(actions.create_event, Some(json!({"title": "A"})));
        assert_eq!(actions.create_poll, Some(json!({"question": "B?"})));
    }

    #[test]
    fn malformed_json_is_ignored() {
        let response = "CREATE_EVENT: {title: unquoted}";
        assert_eq!(parse_actions(response), BotActions::default());
    }

    #[test]
    fn plain_responses_yield_no_actions() {
        assert_eq!(parse_actions("How about Friday?"), BotActions::default());
    }
}
