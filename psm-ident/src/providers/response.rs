//! Parsing of free-text generative responses
//!
//! The generative provider answers with text that should hold exactly one
//! JSON object, sometimes wrapped in a ```json fence or surrounded by prose.
//! Anything that does not deserialize into the expected shape is rejected as
//! `MalformedResponse`; nothing downstream sees untyped JSON.

use serde::de::DeserializeOwned;

use super::ProviderError;

const EXCERPT_CHARS: usize = 160;

/// Remove a surrounding Markdown code fence (with or without a language tag)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    body.trim_end().trim_end_matches("```").trim()
}

/// Parse the single JSON object contained in a provider reply
pub fn parse_json_object<T: DeserializeOwned>(provider: &str, text: &str) -> Result<T, ProviderError> {
    let cleaned = strip_code_fences(text);

    let first_error = match serde_json::from_str::<T>(cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    // Prose around the object: retry on the outermost braces
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end && (start > 0 || end + 1 < cleaned.len()) {
            if let Ok(value) = serde_json::from_str::<T>(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    tracing::warn!(
        provider,
        error = %first_error,
        excerpt = %excerpt(text),
        "Provider returned malformed content"
    );
    Err(ProviderError::MalformedResponse(first_error.to_string()))
}

/// Short single-line excerpt for diagnostics
pub fn excerpt(text: &str) -> String {
    let single_line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(EXCERPT_CHARS)
        .collect();
    if text.chars().count() > EXCERPT_CHARS {
        format!("{}…", single_line)
    } else {
        single_line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        name: String,
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_object() {
        let probe: Probe = parse_json_object("test", "```json\n{\"name\": \"Rosa\"}\n```").unwrap();
        assert_eq!(probe.name, "Rosa");
    }

    #[test]
    fn test_parse_object_inside_prose() {
        let probe: Probe =
            parse_json_object("test", "Here you go: {\"name\": \"Rosa\"} Hope it helps.").unwrap();
        assert_eq!(probe.name, "Rosa");
    }

    #[test]
    fn test_malformed_is_rejected() {
        let result = parse_json_object::<Probe>("test", "I am not sure what plant that is.");
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));

        // Valid JSON, wrong shape
        let result = parse_json_object::<Probe>("test", "{\"other\": 1}");
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        let short = excerpt(&long);
        assert!(short.chars().count() <= EXCERPT_CHARS + 1);
        assert!(short.ends_with('…'));
        assert_eq!(excerpt("a\nb"), "a b");
    }
}
