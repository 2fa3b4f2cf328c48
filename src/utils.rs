/// Shared utility functions

/// Safely truncate a string at a UTF-8 boundary
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if max_bytes >= s.len() { return s; }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Collapse line breaks and whitespace runs to single spaces and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Round to the nearest integer, ties to even.
///
/// Layout measurements are compared the way the heading heuristics were tuned:
/// `12.5` rounds to `12`, `13.5` rounds to `14`.
pub fn round_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Round to two decimal places, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_ascii() {
        assert_eq!(safe_truncate("hello", 3), "hel");
        assert_eq!(safe_truncate("hello", 10), "hello");
        assert_eq!(safe_truncate("hello", 5), "hello");
    }

    #[test]
    fn test_safe_truncate_utf8() {
        // "é" is two bytes; cutting inside it backs off to the boundary
        assert_eq!(safe_truncate("café", 4), "caf");
    }

    #[test]
    fn test_clean_text_collapses_line_breaks() {
        assert_eq!(clean_text("  Travel\nPlanning  "), "Travel Planning");
        assert_eq!(clean_text("a \n b\r\nc"), "a b c");
    }

    #[test]
    fn test_round_even_matches_banker_rounding() {
        assert_eq!(round_even(12.5), 12);
        assert_eq!(round_even(13.5), 14);
        assert_eq!(round_even(11.96), 12);
        assert_eq!(round_even(-0.4), 0);
    }

    #[test]
    fn test_round2() {
        assert!((round2(14.256) - 14.26).abs() < 1e-9);
        assert!((round2(0.004) - 0.0).abs() < 1e-9);
    }
}
