//! Result snippets / 搜索结果摘要

/// Default snippet length in characters / 默认摘要长度
pub const DEFAULT_SNIPPET_LENGTH: usize = 200;

/// Cut a snippet of `content` around the first case-insensitive occurrence
/// of `query` / 截取查询词附近的摘要
///
/// Works on characters, never on bytes. Without a match the head of the
/// content is returned.
pub fn generate_snippet(content: &str, query: &str, max_len: usize) -> Option<String> {
    if content.is_empty() || query.is_empty() {
        return None;
    }

    let chars: Vec<char> = content.chars().collect();
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();

    let found = find_ignore_case(&chars, &needle);
    let Some(index) = found else {
        if chars.len() > max_len {
            let head: String = chars[..max_len].iter().collect();
            return Some(format!("{}...", head));
        }
        return Some(content.to_string());
    };

    let half = max_len / 2;
    let start = index.saturating_sub(half);
    let end = (index + needle.len() + half).min(chars.len());

    let mut snippet: String = chars[start..end].iter().collect();
    if start > 0 {
        snippet.insert_str(0, "...");
    }
    if end < chars.len() {
        snippet.push_str("...");
    }
    Some(snippet)
}

/// Char index of the first match, comparing lowercase per character / 忽略大小写查找
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_lowercase().eq(std::iter::once(*n)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert_eq!(generate_snippet("", "felge", 200), None);
        assert_eq!(generate_snippet("Felge", "", 200), None);
    }

    #[test]
    fn test_no_match_returns_head() {
        assert_eq!(generate_snippet("kurzer Text", "felge", 200).as_deref(), Some("kurzer Text"));
        assert_eq!(generate_snippet("abcdefghij", "xyz", 4).as_deref(), Some("abcd..."));
    }

    #[test]
    fn test_window_around_match() {
        let content = "0123456789 FELGE 0123456789";
        assert_eq!(generate_snippet(content, "felge", 6).as_deref(), Some("...89 FELGE 01..."));
        assert_eq!(generate_snippet(content, "0123", 4).as_deref(), Some("012345..."));
    }

    #[test]
    fn test_multibyte_content() {
        let content = "Prüfbericht über Anhängerkupplung für Fahrzeug";
        let snippet = generate_snippet(content, "ANHÄNGER", 10).unwrap();
        assert_eq!(snippet, "...über Anhängerkuppl...");
    }
}
