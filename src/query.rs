use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const FORBIDDEN_CHARACTERS: &[char] = &[
    '#', ',', '.', ':', ';', '!', '?', '"', '\'', '(', ')', '[', ']', '{', '}', '<', '>', '*',
    '&', '^', '%', '$', '@', '+', '=', '~', '`', '|', '\\',
];

#[derive(Clone, Copy, Debug, Deserialize, Serialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Casing {
    #[default]
    None,
    Camel,
    Pascal,
    Snake,
    Kebab,
}

impl Casing {
    pub fn apply(self, text: &str) -> String {
        match self {
            Casing::None => text.to_string(),
            Casing::Camel => join_words(text, false),
            Casing::Pascal => join_words(text, true),
            Casing::Snake => join_with(text, '_'),
            Casing::Kebab => join_with(text, '-'),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join_words(text: &str, capitalize_first: bool) -> String {
    text.to_lowercase()
        .split_whitespace()
        .enumerate()
        .map(|(idx, word)| {
            if idx == 0 && !capitalize_first {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect()
}

fn join_with(text: &str, separator: char) -> String {
    let mut joined = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !joined.is_empty() && !joined.ends_with(separator) {
            joined.push(separator);
        }
        joined.push_str(word);
    }
    collapse_repeats(&joined, separator)
}

fn collapse_repeats(text: &str, ch: char) -> String {
    let mut out = String::with_capacity(text.len());
    for current in text.chars() {
        if current == ch && out.ends_with(ch) {
            continue;
        }
        out.push(current);
    }
    out
}

/// Turns raw dialog input into a candidate tag: applies the preferred casing,
/// drops characters a tag cannot hold and collapses repeated `/`.
pub fn clean_query(raw: &str, casing: Casing) -> String {
    let cased = casing.apply(raw);
    let filtered: String = cased
        .chars()
        .filter(|ch| !ch.is_whitespace() && !FORBIDDEN_CHARACTERS.contains(ch))
        .collect();
    collapse_repeats(&filtered, '/')
}

/// Whether `tag` may be created as a brand new tag. Existing numeric tags stay
/// usable for removal; they are only refused here.
pub fn is_valid_new_tag(tag: &str) -> bool {
    !tag.is_empty()
        && !tag.chars().all(|ch| ch.is_ascii_digit())
        && !tag.chars().all(|ch| ch == '/')
        && !tag.contains("//")
}

/// Cleans a tag typed outside the dialog and refuses it unless it could be
/// created as a new tag.
pub fn clean_new_tag(raw: &str, casing: Casing) -> Result<String> {
    let tag = clean_query(raw, casing);
    if !is_valid_new_tag(&tag) {
        bail!("'{raw}' is not a valid tag");
    }
    Ok(tag)
}

/// Cleans a tag named on the command line that may already exist. Numeric
/// tags pass so that they can still be removed.
pub fn clean_tag_name(raw: &str) -> Result<String> {
    let tag = clean_query(raw, Casing::None);
    if tag.is_empty() || tag.chars().all(|ch| ch == '/') {
        bail!("'{raw}' is not a valid tag");
    }
    Ok(tag)
}
