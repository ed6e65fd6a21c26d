//! Extraction cascade for reasoning-service output.
//!
//! The reasoning service returns free text that is only expected to contain
//! JSON somewhere. Each strategy below pulls out a payload; callers try them
//! in order and keep the first one that parses into the shape they need.

use serde_json::Value;

/// One extraction strategy: returns a JSON payload substring if it can find
/// one in the text.
pub type Extractor = fn(&str) -> Option<String>;

/// Strategies tried, in order, when the caller expects a JSON array.
pub const ARRAY_EXTRACTORS: &[Extractor] = &[extract_fenced_block, extract_array_substring];

/// Strategies tried, in order, when the caller expects a JSON object.
pub const OBJECT_EXTRACTORS: &[Extractor] = &[
    extract_fenced_block,
    extract_whole_text,
    extract_object_substring,
];

/// Extract a JSON array from free text, or `None` if no strategy yields one.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    for extractor in ARRAY_EXTRACTORS {
        if let Some(payload) = extractor(text) {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&payload) {
                return Some(items);
            }
        }
    }
    None
}

/// Extract a JSON object from free text, or `None` if no strategy yields one.
pub fn extract_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    for extractor in OBJECT_EXTRACTORS {
        if let Some(payload) = extractor(text) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&payload) {
                return Some(map);
            }
        }
    }
    None
}

/// Contents of the first markdown code fence (```json ... ``` or ``` ... ```).
pub fn extract_fenced_block(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip the language identifier line if present
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim().to_string());
        }
    }

    None
}

/// The text itself, trimmed. Lets well-behaved responses parse directly.
pub fn extract_whole_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First top-level `[...]` substring, bracket-balanced and string-aware.
pub fn extract_array_substring(text: &str) -> Option<String> {
    balanced_slice(text, '[', ']')
}

/// First top-level `{...}` substring, brace-balanced and string-aware.
pub fn extract_object_substring(text: &str) -> Option<String> {
    balanced_slice(text, '{', '}')
}

fn balanced_slice(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(text[start..=start + i].to_string());
            }
        }
    }

    None
}

/// Truncate to a character budget without splitting a UTF-8 boundary.
pub fn clamp_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Last `max_lines` of captured output, for failure diagnostics.
pub fn output_tail(lines: &[String], max_lines: usize) -> String {
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_block_wins() {
        let text = "Here you go:\n```json\n[{\"name\": \"Ann\"}]\n```\nHope that helps!";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Ann");
    }

    #[test]
    fn bare_fence_with_language_line() {
        let text = "```\n[1, 2, 3]\n```";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn array_substring_when_no_fence() {
        let text = "The top picks are [\"a\", \"b\"] based on the query.";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn nested_brackets_stay_balanced() {
        let text = "result: [[1, 2], [3]] trailing ] noise";
        let payload = extract_array_substring(text).unwrap();
        assert_eq!(payload, "[[1, 2], [3]]");
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let text = r#"[{"bio": "likes [weird] brackets \" and quotes"}]"#;
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json_array("no structured data here").is_none());
        assert!(extract_json_object("still nothing").is_none());
    }

    #[test]
    fn object_falls_back_to_raw_parse() {
        let text = r#"{"avoid": ["agencies"]}"#;
        let map = extract_json_object(text).unwrap();
        assert!(map.contains_key("avoid"));
    }

    #[test]
    fn fenced_object_preferred_over_raw() {
        let text = "```json\n{\"preferred_skills\": [\"rust\"]}\n```";
        let map = extract_json_object(text).unwrap();
        assert!(map.contains_key("preferred_skills"));
    }

    #[test]
    fn clamp_respects_char_boundaries() {
        let clamped = clamp_chars("héllo wörld", 7);
        assert_eq!(clamped.chars().count(), 7);
        assert_eq!(clamp_chars("short", 500), "short");
    }
}
