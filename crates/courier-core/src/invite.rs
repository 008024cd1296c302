use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::Rng;

use crate::constants::INVITE_WORDS;
use crate::error::InviteError;

// Invite codes are 6 words drawn from the fixed 2048-word English list
// (~66 bits). The exchange server maps a live code to a (sender, recipient)
// pair; the codec here only generates and validates the words.

static WORDLIST: Lazy<&'static [&'static str]> =
    Lazy::new(|| bip39::Language::English.words_by_prefix(""));

static WORD_INDEX: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    WORDLIST
        .iter()
        .enumerate()
        .map(|(i, w)| (*w, i as u16))
        .collect()
});

pub fn generate_code() -> String {
    let mut rng = rand::rngs::OsRng;
    let words: Vec<&str> = (0..INVITE_WORDS)
        .map(|_| WORDLIST[rng.gen_range(0..WORDLIST.len())])
        .collect();
    words.join(" ")
}

/// Trim, lowercase, and collapse whitespace.
pub fn normalize(code: &str) -> String {
    code.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalise and check word count and membership.
pub fn parse(code: &str) -> Result<String, InviteError> {
    let normalized = normalize(code);
    let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() != INVITE_WORDS {
        return Err(InviteError::InvalidFormat);
    }
    for word in &words {
        if !WORD_INDEX.contains_key(word) {
            return Err(InviteError::UnknownWord(word.to_string()));
        }
    }
    Ok(normalized)
}
