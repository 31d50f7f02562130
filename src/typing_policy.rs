//! Per-keystroke admission and the autocorrect helpers built on it.
//!
//! The input buffer is always a literal prefix of the target, so it is
//! tracked here as a length: the buffer is `target[0..len]`.

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::matcher::{
    chars_match, is_alphanumeric_or_space, is_punctuation_or_symbol, match_input, Target,
};
use crate::model::AssistanceConfig;

/// A raw edit arriving from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keystroke {
    /// Text to insert; a single keypress or a paste.
    Insert(String),
    /// Any deletion (backspace, delete word, cut).
    Delete,
    /// Undo or redo.
    History,
}

impl Keystroke {
    pub fn char(c: char) -> Self {
        Keystroke::Insert(c.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TargetComplete,
    MultiCharInsert,
    Deletion,
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The buffer becomes `target[0..len]`.
    Admitted { len: usize },
    Rejected(RejectReason),
    /// Nothing to evaluate (empty insertion).
    Ignored,
}

/// Decide whether `key` may extend a buffer of `matched_len` characters.
///
/// Under autocorrect a typed character that matches the character after a
/// punctuation or symbol is admitted together with the skipped character.
pub fn admit(
    target: &Target,
    matched_len: usize,
    key: &Keystroke,
    cfg: &AssistanceConfig,
) -> Admission {
    if matched_len >= target.len() {
        return Admission::Rejected(RejectReason::TargetComplete);
    }

    let text = match key {
        Keystroke::Delete | Keystroke::History => {
            return Admission::Rejected(RejectReason::Deletion)
        }
        Keystroke::Insert(text) => text,
    };

    let mut chars = text.nfc();
    let typed = match (chars.next(), chars.next()) {
        (None, _) => return Admission::Ignored,
        (Some(c), None) => c,
        (Some(_), Some(_)) => return Admission::Rejected(RejectReason::MultiCharInsert),
    };

    let ignore_case = cfg.autocorrect;
    let expected = target.chars()[matched_len];
    if chars_match(expected, typed, ignore_case) {
        return Admission::Admitted {
            len: matched_len + 1,
        };
    }

    if cfg.autocorrect && is_punctuation_or_symbol(expected) {
        if let Some(next) = target.get(matched_len + 1) {
            if chars_match(next, typed, ignore_case) {
                debug!(skipped = %expected, typed = %typed, "autocorrect skipped punctuation");
                return Admission::Admitted {
                    len: matched_len + 2,
                };
            }
        }
    }

    Admission::Rejected(RejectReason::Mismatch)
}

/// Fold an arbitrary buffer back to the longest valid prefix of `target`.
///
/// Returns the length of the reconciled buffer, which is always
/// `target[0..len]` regardless of what `raw` contained.
pub fn reconcile(target: &Target, raw: &str, cfg: &AssistanceConfig) -> usize {
    let input: Vec<char> = raw.nfc().collect();
    match_input(target.chars(), &input, cfg).matched_len
}

/// End of the run of characters the user is never asked to type.
///
/// Under autocorrect everything up to the next letter, digit or space is
/// filled in: punctuation, symbols, newlines and tabs alike. Returns
/// `matched_len` unchanged when autocorrect is off.
pub fn auto_advance_end(target: &Target, matched_len: usize, cfg: &AssistanceConfig) -> usize {
    if !cfg.autocorrect {
        return matched_len;
    }
    let mut end = matched_len;
    while let Some(c) = target.get(end) {
        if is_alphanumeric_or_space(c) {
            break;
        }
        end += 1;
    }
    end
}

/// Up to `lookahead` upcoming characters after the validated prefix.
pub fn ghost_slice(target: &Target, matched_len: usize, lookahead: usize) -> String {
    target.slice(matched_len, matched_len.saturating_add(lookahead))
}
