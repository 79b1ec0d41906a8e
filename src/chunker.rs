//! Splits oversized replies into segments that fit the platform message limit.
//!
//! Lengths are counted in `char`s so multi-byte text is never cut inside a
//! code point. Cuts prefer the last whitespace before the limit; a run of
//! non-whitespace longer than the limit is hard-cut.

/// Default Messenger text limit, in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 2_000;

/// Split `text` into ordered segments of at most `max_len` chars each.
///
/// Text that already fits is returned as-is. Otherwise every segment is
/// trimmed, and whitespace-only pieces are dropped.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let limit = (start + max_len).min(chars.len());
        let mut end = limit;

        if end < chars.len() && !chars[end].is_whitespace() {
            if let Some(ws) = (start..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }
        if end <= start {
            end = limit;
        }

        let segment: String = chars[start..end].iter().collect();
        let segment = segment.trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }

        // Skip the separator only when the cut landed on whitespace.
        start = if end < chars.len() && chars[end].is_whitespace() {
            end + 1
        } else {
            end
        };
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_text_is_returned_untouched() {
        assert_eq!(chunk("hello world", 2000), vec!["hello world".to_string()]);
        assert_eq!(chunk("  padded  ", 10), vec!["  padded  ".to_string()]);
        assert_eq!(chunk("", 5), vec![String::new()]);
    }

    #[test]
    fn text_at_exact_limit_is_single_segment() {
        let text = "x".repeat(2000);
        assert_eq!(chunk(&text, 2000), vec![text]);
    }

    #[test]
    fn long_word_is_hard_cut_without_losing_characters() {
        let text = "a".repeat(2500);
        let segments = chunk(&text, 2000);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].chars().count(), 2000);
        assert_eq!(segments[1].chars().count(), 500);
    }

    #[test]
    fn splits_at_last_space_before_limit() {
        let mut text = "b".repeat(1999);
        text.push(' ');
        text.push('c');
        assert_eq!(text.chars().count(), 2001);

        let segments = chunk(&text, 2000);
        assert_eq!(segments.len(), 2);
        assert!(segments[0].chars().count() <= 2000);
        assert_eq!(segments[0], "b".repeat(1999));
        assert_eq!(segments[1], "c");
    }

    #[test]
    fn whitespace_right_after_limit_keeps_full_prefix() {
        let segments = chunk("abcd efgh", 4);
        assert_eq!(segments, vec!["abcd", "efgh"]);
    }

    #[test]
    fn words_are_not_split_when_whitespace_exists() {
        let segments = chunk("the quick brown fox jumps", 10);
        assert_eq!(segments, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn segments_respect_limit_and_preserve_content() {
        let text = "lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(120);
        for max_len in [12, 16, 33, 100, 2000] {
            let segments = chunk(&text, max_len);
            assert!(
                segments.iter().all(|s| s.chars().count() <= max_len),
                "segment over {max_len} chars"
            );
            assert!(segments.iter().all(|s| !s.is_empty()));
            assert_eq!(
                collapse_whitespace(&segments.join(" ")),
                collapse_whitespace(&text)
            );
        }
    }

    #[test]
    fn mixed_long_words_and_spaces_lose_nothing() {
        let text = format!("{} tail {} end", "w".repeat(25), "z".repeat(12));
        let segments = chunk(&text, 10);
        assert!(segments.iter().all(|s| s.chars().count() <= 10));
        let rejoined: String = segments.concat().chars().filter(|c| !c.is_whitespace()).collect();
        let original: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "héllo wörld ✓ ".repeat(300);
        let segments = chunk(&text, 50);
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.chars().count() <= 50));
        assert_eq!(
            collapse_whitespace(&segments.join(" ")),
            collapse_whitespace(&text)
        );
    }

    #[test]
    fn newlines_count_as_break_points() {
        let segments = chunk("line one\nline two\nline three", 10);
        assert_eq!(segments, vec!["line one", "line two", "line three"]);
    }

    #[test]
    fn whitespace_only_pieces_are_dropped() {
        let text = format!("abc{}def", " ".repeat(20));
        let segments = chunk(&text, 5);
        assert_eq!(segments, vec!["abc", "def"]);
    }

    #[test]
    fn terminates_for_smallest_limit() {
        let segments = chunk("ab cd", 1);
        assert_eq!(segments, vec!["a", "b", "c", "d"]);
        assert_eq!(chunk("abc", 0), vec!["a", "b", "c"]);
    }
}
