//! Response text cleanup shared by scorers.

use std::sync::OnceLock;

use regex::Regex;

fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"))
}

/// Remove model self-reasoning segments wrapped in `<think>`/`</think>`.
///
/// A dangling `</think>` (open marker cut off by the endpoint) drops
/// everything up to and including the last close marker.
pub fn strip_thinking(text: &str) -> String {
    let stripped = think_block().replace_all(text, "");
    let stripped = match stripped.rfind("</think>") {
        Some(pos) => &stripped[pos + "</think>".len()..],
        None => &stripped,
    };
    stripped.trim().to_string()
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("Json"))
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_thinking_block() {
        let text = "<think>maybe A? or B</think>\nThe answer is (C).";
        assert_eq!(strip_thinking(text), "The answer is (C).");
    }

    #[test]
    fn test_strip_multiple_blocks() {
        let text = "<think>A</think>one <think>\nB\n</think>two";
        assert_eq!(strip_thinking(text), "one two");
    }

    #[test]
    fn test_strip_dangling_close_marker() {
        let text = "considering D and E</think>Final: B";
        assert_eq!(strip_thinking(text), "Final: B");
    }

    #[test]
    fn test_no_thinking_is_unchanged() {
        assert_eq!(strip_thinking("  plain  "), "plain");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences(" {\"a\": 1} "), "{\"a\": 1}");
    }
}
