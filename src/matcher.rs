//! Prefix matching of typed input against a target text.
//!
//! Everything here is a pure function of its arguments. Text is compared
//! per Unicode scalar value after canonical composition (NFC), so combining
//! sequences and astral characters count as one unit each.

use unicode_normalization::UnicodeNormalization;
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::model::AssistanceConfig;

/// The prose a user has to reproduce, NFC-normalized and indexed by `char`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    text: String,
    chars: Vec<char>,
}

impl Target {
    pub fn new(text: &str) -> Self {
        let text: String = text.nfc().collect();
        let chars = text.chars().collect();
        Self { text, chars }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }

    /// `target[start..end)` as a string, clamped to the target length.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::new(s)
    }
}

/// Outcome of matching an input against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Count of leading target characters the input satisfies.
    pub matched_len: usize,
    /// Target index where progress stopped on a mismatch, `None` when the
    /// input is a valid (possibly incomplete) prefix.
    pub mismatch_at: Option<usize>,
}

impl MatchResult {
    pub fn is_complete(&self, target_len: usize) -> bool {
        self.mismatch_at.is_none() && self.matched_len == target_len
    }
}

fn normalized(c: char) -> impl Iterator<Item = char> {
    std::iter::once(c).nfc()
}

/// Compare one target character with one typed character.
pub fn chars_match(expected: char, typed: char, ignore_case: bool) -> bool {
    if ignore_case {
        normalized(expected)
            .flat_map(char::to_lowercase)
            .eq(normalized(typed).flat_map(char::to_lowercase))
    } else {
        normalized(expected).eq(normalized(typed))
    }
}

/// Unicode general category P* or S*.
pub fn is_punctuation_or_symbol(c: char) -> bool {
    matches!(
        c.general_category_group(),
        GeneralCategoryGroup::Punctuation | GeneralCategoryGroup::Symbol
    )
}

/// Letters, numbers and the ASCII space.
pub fn is_alphanumeric_or_space(c: char) -> bool {
    c == ' '
        || matches!(
            c.general_category_group(),
            GeneralCategoryGroup::Letter | GeneralCategoryGroup::Number
        )
}

/// Two-cursor scan of `input` against `target`.
///
/// Under autocorrect, case is ignored and punctuation or symbols in the
/// target may be skipped without consuming input. Input left over once the
/// scan stops is reported as a mismatch at the current target index.
pub fn match_input(target: &[char], input: &[char], cfg: &AssistanceConfig) -> MatchResult {
    let (mut i, mut j) = (0, 0);

    while i < target.len() && j < input.len() {
        if chars_match(target[i], input[j], cfg.autocorrect) {
            i += 1;
            j += 1;
            continue;
        }

        if cfg.autocorrect && is_punctuation_or_symbol(target[i]) {
            i += 1;
            continue;
        }

        return MatchResult {
            matched_len: i,
            mismatch_at: Some(i),
        };
    }

    if j < input.len() {
        return MatchResult {
            matched_len: i,
            mismatch_at: Some(i),
        };
    }

    MatchResult {
        matched_len: i,
        mismatch_at: None,
    }
}
