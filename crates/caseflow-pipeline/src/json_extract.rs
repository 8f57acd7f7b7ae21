// crates/caseflow-pipeline/src/json_extract.rs
// ============================================================================
// Module: LLM JSON Extraction
// Description: Recovers a JSON object from a raw LLM completion that may be
//              wrapped in markdown code fences or trailing commentary.
// ============================================================================

/// Strips code fences, then returns the first balanced `{...}` substring of
/// what remains, or `None` if no balanced object is found.
#[must_use]
pub fn extract_json(raw: &str) -> Option<String> {
    let stripped = strip_code_fences(raw);
    find_balanced_object(&stripped).map(str::to_string)
}

/// Removes literal ` ``` ` fence markers (with or without a `json` language
/// tag) from `raw`.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// Scans `s` for the first `{`, then returns the substring up to its
/// matching `}`, tracking quoted-string and escape state so braces inside
/// string values don't throw off the depth count.
fn find_balanced_object(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = s.find('{')?;
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_object() {
        let raw = r#"{"category": "Network"}"#;
        assert_eq!(extract_json(raw), Some(r#"{"category": "Network"}"#.to_string()));
    }

    #[test]
    fn strips_fenced_object_with_language_tag() {
        let raw = "```json\n{\"category\": \"Network\"}\n```";
        assert_eq!(extract_json(raw), Some("{\"category\": \"Network\"}".to_string()));
    }

    #[test]
    fn ignores_braces_inside_string_values() {
        let raw = r#"{"note": "use {placeholder} syntax"}"#;
        let extracted = extract_json(raw).expect("extracts");
        assert_eq!(extracted, raw);
    }

    #[test]
    fn takes_first_balanced_object_and_ignores_trailing_text() {
        let raw = r#"{"a": 1} and some trailing commentary {"b": 2}"#;
        assert_eq!(extract_json(raw), Some(r#"{"a": 1}"#.to_string()));
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert_eq!(extract_json("no json here"), None);
    }
}
