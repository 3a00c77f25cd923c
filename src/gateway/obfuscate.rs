//! Fixed character substitution for API-key-like strings.
//!
//! This is a display-level scramble, not encryption: the table is public and
//! the mapping is trivially reversible.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const PLAIN_UPPER: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CIPHER_UPPER: &[u8; 26] = b"QWERTYUIOPASDFGHJKLZXCVBNM";
const PLAIN_LOWER: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
const CIPHER_LOWER: &[u8; 26] = b"zyxwvutsrqkjihgfedlcbaponm";
const PLAIN_DIGITS: &[u8; 10] = b"0123456789";
const CIPHER_DIGITS: &[u8; 10] = b"7894561230";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObfuscateError {
    #[error("Invalid key format")]
    InvalidKeyFormat,
}

struct SubstitutionTable {
    forward: [u8; 128],
    reverse: [u8; 128],
}

impl SubstitutionTable {
    fn build() -> Self {
        let mut forward = [0u8; 128];
        let mut reverse = [0u8; 128];
        for (idx, slot) in forward.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        reverse.copy_from_slice(&forward);

        for (plain, cipher) in [
            (&PLAIN_UPPER[..], &CIPHER_UPPER[..]),
            (&PLAIN_LOWER[..], &CIPHER_LOWER[..]),
            (&PLAIN_DIGITS[..], &CIPHER_DIGITS[..]),
        ] {
            for (from, to) in plain.iter().zip(cipher) {
                forward[usize::from(*from)] = *to;
                reverse[usize::from(*to)] = *from;
            }
        }
        Self { forward, reverse }
    }

    fn map(table: &[u8; 128], text: &str) -> String {
        text.chars()
            .map(|ch| {
                if ch.is_ascii() {
                    char::from(table[ch as usize])
                } else {
                    ch
                }
            })
            .collect()
    }
}

fn table() -> &'static SubstitutionTable {
    static TABLE: OnceLock<SubstitutionTable> = OnceLock::new();
    TABLE.get_or_init(SubstitutionTable::build)
}

fn key_prefix_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(sk|fk)-").expect("key prefix regex is valid"))
}

pub fn is_valid_key(key: &str) -> bool {
    key_prefix_regex().is_match(key)
}

pub fn obfuscate_key(key: &str) -> Result<String, ObfuscateError> {
    if !is_valid_key(key) {
        return Err(ObfuscateError::InvalidKeyFormat);
    }
    Ok(SubstitutionTable::map(&table().forward, key))
}

pub fn deobfuscate_key(obfuscated: &str) -> Result<String, ObfuscateError> {
    let key = SubstitutionTable::map(&table().reverse, obfuscated);
    if !is_valid_key(&key) {
        return Err(ObfuscateError::InvalidKeyFormat);
    }
    Ok(key)
}
