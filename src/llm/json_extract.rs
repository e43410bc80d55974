/// Pulls a JSON object out of free-form LLM text: a fenced ```json``` block
/// wins if present, otherwise the outermost balanced `{...}` slice,
/// otherwise the trimmed text as-is.
pub fn extract_json_object(raw: &str) -> String {
    extract_balanced(raw, '{', '}')
}

/// Same as [`extract_json_object`] but balances `[` / `]`, used by the
/// planner to pull a step list out of the response.
pub fn extract_json_array(raw: &str) -> String {
    extract_balanced(raw, '[', ']')
}

fn extract_balanced(raw: &str, open: char, close: char) -> String {
    if let Some(fenced) = extract_fenced_block(raw) {
        if fenced.contains(open) {
            return fenced;
        }
    }

    if let Some(slice) = balanced_slice(raw, open, close) {
        return slice;
    }

    raw.trim().to_string()
}

fn extract_fenced_block(raw: &str) -> Option<String> {
    let fence = "```";
    let start = raw.find(fence)?;
    let after_fence = &raw[start + fence.len()..];
    let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
    let end = after_lang.find(fence)?;
    Some(after_lang[..end].trim().to_string())
}

fn balanced_slice(raw: &str, open: char, close: char) -> Option<String> {
    let start = raw.find(open)?;
    let mut depth = 0i32;
    for (offset, ch) in raw[start..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                let end = start + offset + ch.len_utf8();
                return Some(raw[start..end].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_object() {
        let raw = "Here you go:\n```json\n{\"result\":\"PASS\"}\n```\nThanks.";
        assert_eq!(extract_json_object(raw), "{\"result\":\"PASS\"}");
    }

    #[test]
    fn extracts_outermost_array_ignoring_nested_objects() {
        let raw = "plan: [{\"type\":\"goto\",\"value\":\"x\"},{\"type\":\"click\"}] done";
        let extracted = extract_json_array(raw);
        assert!(extracted.starts_with('['));
        assert!(extracted.ends_with(']'));
    }

    #[test]
    fn falls_back_to_trimmed_text_when_nothing_matches() {
        assert_eq!(extract_json_object("  not json at all  "), "not json at all");
    }
}
