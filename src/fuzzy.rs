//! Tolerant word comparison using Levenshtein distance
//!
//! Backs the `~word` fuzzy literal matcher, which absorbs small transcription
//! slips ("volum" for "volume").

/// Edit budget for a word: a third of its length, at least one
pub fn max_distance(expected: &str) -> usize {
    (expected.chars().count() / 3).max(1)
}

/// Case-insensitive fuzzy match within `max_distance(expected)` edits
pub fn fuzzy_match(expected: &str, actual: &str) -> bool {
    let expected = expected.to_lowercase();
    let actual = actual.to_lowercase();
    if expected == actual {
        return true;
    }
    levenshtein(&expected, &actual) <= max_distance(&expected)
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Drop punctuation the way the transcription front end does before tokenizing
pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() || c == '\'' { c } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(fuzzy_match("hello", "hello"));
        assert!(fuzzy_match("stop", "STOP"));
    }

    #[test]
    fn test_fuzzy_match() {
        assert!(fuzzy_match("hello", "helo"));
        // transposition costs two edits
        assert!(!fuzzy_match("stop", "stpo"));
        assert!(fuzzy_match("volume", "volum"));
        assert!(fuzzy_match("assistant", "asistant"));
    }

    #[test]
    fn test_no_match() {
        assert!(!fuzzy_match("hello", "world"));
        assert!(!fuzzy_match("stop", "start"));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("hello", "helo"), 1);
        assert_eq!(levenshtein("hello", "world"), 4);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(strip_punctuation("Set volume, 50!").trim(), "Set volume  50");
        assert_eq!(strip_punctuation("don't"), "don't");
    }
}
