//! Artist name normalization for matching
//!
//! Romanized names are compared as lowercase, diacritic-free word sequences
//! ("Jennie Kim" ~ "jénnie  KIM"); native (Hangul) names are compared with
//! spacing and punctuation removed ("김 지수" ~ "김지수").

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose, drop combining marks, recompose
fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

/// Lowercase, diacritic-free, punctuation replaced by single spaces
pub fn normalize_name(s: &str) -> String {
    let stripped = strip_diacritics(s).to_lowercase();
    let spaced: String = stripped
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Diacritic-free, lowercase, with whitespace and punctuation removed
pub fn normalize_native_name(s: &str) -> String {
    strip_diacritics(s)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// True when the words of `needle` appear contiguously among the words of
/// `haystack`. Both inputs must already be normalized.
pub fn contains_whole_words(haystack: &str, needle: &str) -> bool {
    let needle_words: Vec<&str> = needle.split(' ').filter(|w| !w.is_empty()).collect();
    if needle_words.is_empty() {
        return false;
    }
    let haystack_words: Vec<&str> = haystack.split(' ').filter(|w| !w.is_empty()).collect();

    haystack_words
        .windows(needle_words.len())
        .any(|window| window == needle_words.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_strips_case_diacritics_and_punctuation() {
        assert_eq!(normalize_name("  Jénnie   KIM "), "jennie kim");
        assert_eq!(normalize_name("G-Dragon"), "g dragon");
        assert_eq!(normalize_name("Rosé (ROSÉ)"), "rose rose");
        assert_eq!(normalize_name("!!!"), "");
    }

    #[test]
    fn test_normalize_native_name_keeps_hangul_intact() {
        assert_eq!(normalize_native_name("김 지수"), "김지수");
        assert_eq!(normalize_native_name("김지수"), "김지수");
        assert_eq!(normalize_native_name("아이유 (IU)"), "아이유iu");
        assert_eq!(normalize_native_name(" - "), "");
    }

    #[test]
    fn test_whole_word_containment() {
        assert!(contains_whole_words("kim jisoo", "jisoo"));
        assert!(contains_whole_words("lee ji eun", "ji eun"));
        assert!(contains_whole_words("jisoo", "jisoo"));
        assert!(!contains_whole_words("jisoo", "ji"));
        assert!(!contains_whole_words("kim jisoo", "kim jisoo choi"));
        assert!(!contains_whole_words("kim jisoo", ""));
    }
}
