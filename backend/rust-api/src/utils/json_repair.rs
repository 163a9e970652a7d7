//! Lenient parsing for structured model output.
//!
//! Model responses are expected to contain one JSON value, possibly wrapped
//! in prose or markdown code fences, and possibly cut off mid-generation.
//! `parse_lenient` always returns a syntactically valid value: a truncated
//! response is salvaged up to the last complete top-level structure, and an
//! unsalvageable one yields a fixed placeholder object. Broken syntax inside
//! a single incomplete structure is never repaired.

use serde_json::{json, Value};

use crate::metrics::PARSER_RECOVERIES_TOTAL;

pub fn parse_lenient(raw: &str) -> Value {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }

    // skip prose before the first structure, then cut after the last
    // point where everything opened has closed
    let start = text.find(['{', '[']).unwrap_or(0);
    if let Some(end) = last_complete_offset(&text[start..]) {
        if let Ok(value) = serde_json::from_str::<Value>(&text[start..start + end]) {
            PARSER_RECOVERIES_TOTAL
                .with_label_values(&["truncated"])
                .inc();
            tracing::warn!(
                "Recovered structured value by discarding {} surrounding bytes",
                text.len() - end
            );
            return value;
        }
    }

    PARSER_RECOVERIES_TOTAL
        .with_label_values(&["fallback"])
        .inc();
    tracing::warn!("Structured parse failed entirely, returning fallback value");
    fallback_value()
}

/// Placeholder returned when nothing parseable is found, so downstream
/// consumers never see an absent value.
pub fn fallback_value() -> Value {
    json!({
        "title": "Content Generation Error",
        "introduction": "Content is being generated. Please try again.",
        "sections": [],
        "summary": "Content generation encountered an issue."
    })
}

/// Extracts the body of the first markdown code fence, if any.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let after_open = match trimmed.find("```") {
        Some(pos) => {
            let rest = &trimmed[pos + 3..];
            // skip a language tag like "json" on the fence line
            match rest.find('\n') {
                Some(nl) => &rest[nl + 1..],
                None => rest,
            }
        }
        None => return trimmed,
    };
    match after_open.find("```") {
        Some(close) => after_open[..close].trim(),
        None => after_open.trim(),
    }
}

/// Byte offset just past the last point where every opened object and array
/// has closed again. String contents are skipped so braces inside literals
/// do not confuse the depth count.
fn last_complete_offset(text: &str) -> Option<usize> {
    let mut brace_depth: i64 = 0;
    let mut bracket_depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut opened = false;
    let mut last_valid = None;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                brace_depth += 1;
                opened = true;
            }
            '}' => {
                brace_depth -= 1;
                if opened && brace_depth == 0 && bracket_depth == 0 {
                    last_valid = Some(i + 1);
                }
            }
            '[' => {
                bracket_depth += 1;
                opened = true;
            }
            ']' => {
                bracket_depth -= 1;
                if opened && brace_depth == 0 && bracket_depth == 0 {
                    last_valid = Some(i + 1);
                }
            }
            _ => {}
        }
    }

    last_valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let value = parse_lenient(r#"{"a": 1}"#);
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn recovers_from_trailing_garbage() {
        let value = parse_lenient(r#"{"a":1,"b":[1,2]} trailing garbage"#);
        assert_eq!(value, json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn recovers_truncated_generation() {
        // second object cut off mid-way; the first complete array survives
        let value = parse_lenient(r#"[{"title": "ok"}] {"title": "cut of"#);
        assert_eq!(value, json!([{"title": "ok"}]));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let value = parse_lenient(r#"{"code": "if x { y }"} extra"#);
        assert_eq!(value["code"], "if x { y }");
    }

    #[test]
    fn unparseable_input_yields_fallback() {
        let value = parse_lenient("not json at all");
        assert_eq!(value, fallback_value());
        assert_eq!(value["title"], "Content Generation Error");
    }

    #[test]
    fn incomplete_single_structure_yields_fallback() {
        // nothing ever closes, so there is no salvage point
        let value = parse_lenient(r#"{"a": [1, 2"#);
        assert_eq!(value, fallback_value());
    }

    #[test]
    fn skips_leading_prose() {
        let value = parse_lenient(r#"Here is your content: {"a": 1} hope it helps"#);
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn strips_json_code_fence() {
        let value = parse_lenient("Here you go:\n```json\n{\"a\": 1}\n```\nEnjoy!");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn strips_plain_code_fence() {
        let value = parse_lenient("```\n[1, 2, 3]\n```");
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn never_panics_on_weird_input() {
        for input in ["", "}}}}", "\"unterminated", "]['{", "\\\\\\"] {
            let _ = parse_lenient(input);
        }
    }
}
