//! Small text helpers for log and prompt previews.

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_ascii() {
        assert_eq!(preview("hello world", 5), "hello");
        assert_eq!(preview("hi", 5), "hi");
        assert_eq!(preview("", 5), "");
    }

    #[test]
    fn test_preview_multibyte() {
        let text = "héllo wörld";
        assert_eq!(preview(text, 2), "hé");
        assert_eq!(preview("日本語テキスト", 3), "日本語");
    }
}
