// Property tests for the matcher and the keystroke gate over generated
// targets mixing letters, punctuation, symbols, combining marks, astral
// characters and line breaks.

use proptest::prelude::*;

use verbatim::matcher::{is_alphanumeric_or_space, match_input, Target};
use verbatim::model::AssistanceConfig;
use verbatim::session::{SessionController, SessionSettings, SessionState, StudyCard, StudyPlan};
use verbatim::typing_policy::{Admission, Keystroke};

const ALPHABET: &[char] = &[
    'a', 'b', 'e', 's', 't', 'S', 'T', 'é', 'É', 'ñ', 'ß', '7', ' ', ' ', '\n', '\t', ',', '.', '?',
    '!', '’', '"', '-', '$', '+', '€', '\u{301}', '\u{308}', '𝄞', '😀', '𝒜',
];

fn config(autocorrect: bool) -> AssistanceConfig {
    AssistanceConfig {
        autocorrect,
        ..Default::default()
    }
}

fn arb_char() -> impl Strategy<Value = char> {
    prop::sample::select(ALPHABET)
}

fn arb_target() -> impl Strategy<Value = Target> {
    prop::collection::vec(arb_char(), 0..40).prop_map(|chars| {
        let text: String = chars.into_iter().collect();
        Target::new(&text)
    })
}

#[derive(Debug, Clone)]
enum Key {
    /// The target character at this index (wrapped to the target length).
    FromTarget(usize),
    Other(char),
    Paste(String),
    Delete,
    History,
}

fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        4 => any::<usize>().prop_map(Key::FromTarget),
        2 => arb_char().prop_map(Key::Other),
        1 => "[a-z]{0,3}".prop_map(Key::Paste),
        1 => Just(Key::Delete),
        1 => Just(Key::History),
    ]
}

fn keystroke(target: &Target, key: &Key) -> Keystroke {
    match key {
        Key::FromTarget(i) => match target.len() {
            0 => Keystroke::char('x'),
            len => Keystroke::char(target.chars()[i % len]),
        },
        Key::Other(c) => Keystroke::char(*c),
        Key::Paste(text) => Keystroke::Insert(text.clone()),
        Key::Delete => Keystroke::Delete,
        Key::History => Keystroke::History,
    }
}

fn session(target: &Target, autocorrect: bool) -> SessionController {
    let plan = StudyPlan::single(StudyCard {
        id: "c1".into(),
        title: "generated".into(),
        content: target.as_str().to_string(),
    });
    SessionController::new(plan, SessionSettings::new(config(autocorrect)), 0).unwrap()
}

/// Flip the case of characters whose other case is a single character.
fn flip_case(c: char, flip: bool) -> char {
    if !flip {
        return c;
    }
    let mut other: Box<dyn Iterator<Item = char>> = if c.is_uppercase() {
        Box::new(c.to_lowercase())
    } else {
        Box::new(c.to_uppercase())
    };
    match (other.next(), other.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

proptest! {
    /// Whatever is typed, the buffer is the target prefix it claims to be.
    #[test]
    fn buffer_is_always_a_matched_prefix(
        target in arb_target(),
        keys in prop::collection::vec(arb_key(), 0..60),
        autocorrect in any::<bool>(),
    ) {
        let cfg = config(autocorrect);
        let mut s = session(&target, autocorrect);
        let mut previous = s.matched_len();

        for (step, key) in keys.iter().enumerate() {
            s.handle_key(&keystroke(&target, key), step as u64 * 10);
            let buffer: Vec<char> = s.buffer().chars().collect();

            prop_assert_eq!(buffer.len(), s.matched_len());
            prop_assert_eq!(&buffer[..], &target.chars()[..s.matched_len()]);
            prop_assert_eq!(match_input(target.chars(), &buffer, &cfg).matched_len, buffer.len());
            prop_assert!(s.matched_len() >= previous);
            previous = s.matched_len();
        }
    }

    /// A refused or ignored key changes nothing observable.
    #[test]
    fn refused_keys_are_inert(
        target in arb_target(),
        keys in prop::collection::vec(arb_key(), 0..60),
        autocorrect in any::<bool>(),
    ) {
        let mut s = session(&target, autocorrect);
        for (step, key) in keys.iter().enumerate() {
            let before = (s.buffer(), s.matched_len(), s.state(), s.has_started());
            let admission = s.handle_key(&keystroke(&target, key), step as u64 * 10);
            if !matches!(admission, Admission::Admitted { .. }) {
                prop_assert_eq!((s.buffer(), s.matched_len(), s.state(), s.has_started()), before);
            }
        }
    }

    /// Matching is a pure function of its arguments.
    #[test]
    fn matching_is_repeatable(
        target in arb_target(),
        input in prop::collection::vec(arb_char(), 0..40),
        autocorrect in any::<bool>(),
    ) {
        let cfg = config(autocorrect);
        let first = match_input(target.chars(), &input, &cfg);
        prop_assert_eq!(match_input(target.chars(), &input, &cfg), first);
    }

    /// Under autocorrect, letter case in a valid prefix does not matter.
    #[test]
    fn autocorrect_ignores_letter_case(
        target in arb_target(),
        cut in any::<usize>(),
        flips in prop::collection::vec(any::<bool>(), 40),
    ) {
        let cfg = config(true);
        let k = cut % (target.len() + 1);
        let exact = &target.chars()[..k];
        let recased: Vec<char> = exact
            .iter()
            .zip(&flips)
            .map(|(&c, &flip)| flip_case(c, flip))
            .collect();

        let expected = match_input(target.chars(), exact, &cfg).matched_len;
        prop_assert_eq!(expected, k);
        prop_assert_eq!(match_input(target.chars(), &recased, &cfg).matched_len, expected);
    }

    /// Typing every target character in order finishes the card.
    #[test]
    fn typing_the_whole_target_completes(target in arb_target()) {
        let mut s = session(&target, false);
        for (step, &c) in target.chars().iter().enumerate() {
            let admission = s.handle_key(&Keystroke::char(c), step as u64);
            prop_assert!(matches!(admission, Admission::Admitted { .. }), "{:?} at {}", c, step);
        }
        prop_assert_eq!(s.state(), SessionState::SessionComplete);
    }

    /// Under autocorrect only letters, digits and spaces need typing.
    #[test]
    fn autocorrect_needs_only_letters_digits_and_spaces(target in arb_target()) {
        let mut s = session(&target, true);
        let typed: Vec<char> = target
            .chars()
            .iter()
            .copied()
            .filter(|&c| is_alphanumeric_or_space(c))
            .collect();
        for (step, &c) in typed.iter().enumerate() {
            let admission = s.handle_key(&Keystroke::char(c), step as u64);
            prop_assert!(matches!(admission, Admission::Admitted { .. }), "{:?} at {}", c, step);
        }
        prop_assert_eq!(s.state(), SessionState::SessionComplete);
        prop_assert_eq!(s.buffer(), target.as_str());
    }
}
