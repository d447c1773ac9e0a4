use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub(crate) const MAX_QUERY_CHARS: usize = 512;

// Combining marks count as word characters so that Indic vowel signs and
// viramas stay attached to their base letter.
fn is_word_char(character: char) -> bool {
    character.is_alphanumeric() || is_combining_mark(character)
}

pub(crate) fn normalize_for_search(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut previous_space = false;
    for character in text.nfc() {
        if is_word_char(character) {
            previous_space = false;
            for lower in character.to_lowercase() {
                normalized.push(lower);
            }
        } else if !previous_space {
            normalized.push(' ');
            previous_space = true;
        }
    }
    normalized.trim().to_string()
}

/// Splits free text into lowercase search tokens. Blank input yields no tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    normalize_for_search(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
