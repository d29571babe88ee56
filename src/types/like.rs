//! SQL LIKE pattern matching.
//!
//! A LIKE pattern is translated to an anchored regular expression:
//! `%` matches any sequence (including empty), `_` matches exactly one
//! character, and every other character matches itself. Matching is
//! case-sensitive.

use regex::Regex;

/// Translates a LIKE pattern into an anchored regex pattern string.
fn pattern_to_regex(pattern: &str) -> String {
    let mut buf = String::with_capacity(pattern.len() + 8);
    buf.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => buf.push_str(".*"),
            '_' => buf.push('.'),
            _ => buf.push_str(&regex::escape(&c.to_string())),
        }
    }
    buf.push('$');
    buf
}

/// Returns true if `text` matches the LIKE `pattern`.
pub fn like_match(text: &str, pattern: &str) -> bool {
    // The translated pattern is always valid: every user character is escaped.
    let regex = Regex::new(&pattern_to_regex(pattern)).expect("escaped LIKE pattern is valid regex");
    regex.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_matches_any_sequence() {
        assert!(like_match("abc", "a%"));
        assert!(like_match("a", "a%"));
        assert!(like_match("abc", "%"));
        assert!(like_match("", "%"));
        assert!(like_match("abc", "%b%"));
        assert!(!like_match("abc", "b%"));
    }

    #[test]
    fn test_underscore_matches_one_character() {
        assert!(like_match("abc", "a_c"));
        assert!(!like_match("abc", "a_"));
        assert!(like_match("ab", "a_"));
        assert!(!like_match("a", "a_"));
    }

    #[test]
    fn test_literal_characters() {
        assert!(like_match("abc", "abc"));
        assert!(!like_match("abc", "abd"));
        assert!(!like_match("ABC", "abc")); // case-sensitive
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(like_match("a.c", "a.c"));
        assert!(!like_match("abc", "a.c"));
        assert!(like_match("a+b", "a+b"));
        assert!(like_match("(x)", "(x)"));
        assert!(like_match("a*", "%*"));
    }

    #[test]
    fn test_mixed_wildcards() {
        assert!(like_match("hello world", "h%o w_rld"));
        assert!(like_match("abcdef", "a%_f"));
        assert!(!like_match("af", "a%_x"));
    }
}
