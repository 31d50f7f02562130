use std::sync::mpsc;
use std::time::Duration;

use assert_matches::assert_matches;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use verbatim::model::{AssistanceConfig, Scope};
use verbatim::runtime::{keystroke_for, FixedTicker, Runner, StudyEvent, TestEventSource};
use verbatim::session::{SessionController, SessionEvent, SessionSettings, SessionState, StudyCard, StudyPlan};
use verbatim::store::{MemoryStore, Store};
use verbatim::typing_policy::{Admission, Keystroke, RejectReason};

// Headless integration using the runtime + SessionController without a TTY.
// Time is synthetic: every event advances a fake clock by a fixed step.

fn key(c: char) -> StudyEvent {
    StudyEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn single(content: &str) -> StudyPlan {
    StudyPlan::single(StudyCard {
        id: "card".into(),
        title: "Card".into(),
        content: content.into(),
    })
}

/// Drive the controller until the channel runs dry, returning the fake clock.
fn drive(controller: &mut SessionController, events: Vec<StudyEvent>, step_ms: u64) -> u64 {
    let (tx, rx) = mpsc::channel();
    let expected = events.len();
    for ev in events {
        tx.send(ev).unwrap();
    }
    drop(tx);

    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::new(Duration::from_millis(1)));
    let mut now = 0;
    for _ in 0..expected {
        now += step_ms;
        match runner.step() {
            StudyEvent::Tick => controller.tick(now),
            StudyEvent::Resize => {}
            StudyEvent::Paste(text) => {
                controller.handle_key(&Keystroke::Insert(text), now);
            }
            StudyEvent::Key(k) => {
                if let Some(stroke) = keystroke_for(&k) {
                    controller.handle_key(&stroke, now);
                }
            }
        }
    }
    now
}

#[test]
fn headless_typing_flow_completes() {
    let mut controller =
        SessionController::new(single("cat"), SessionSettings::new(AssistanceConfig::default()), 0).unwrap();

    drive(&mut controller, "cat".chars().map(key).collect(), 100);

    assert_eq!(controller.state(), SessionState::SessionComplete);
    assert_eq!(controller.buffer(), "cat");
    // clock starts on the first admitted key at 100, last key lands at 300
    assert_eq!(controller.elapsed_ms(10_000), 200);
}

#[test]
fn headless_wrong_keys_and_deletions_never_enter_the_buffer() {
    let mut controller =
        SessionController::new(single("cat"), SessionSettings::new(AssistanceConfig::default()), 0).unwrap();

    let events = vec![
        key('c'),
        key('x'),
        StudyEvent::Key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)),
        StudyEvent::Paste("at".into()),
        key('A'),
        key('a'),
    ];
    drive(&mut controller, events, 10);

    assert_eq!(controller.buffer(), "ca");
    let rejections: Vec<RejectReason> = controller
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Rejected(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(
        rejections,
        vec![
            RejectReason::Mismatch,
            RejectReason::Deletion,
            RejectReason::MultiCharInsert,
            RejectReason::Mismatch,
        ]
    );
}

#[test]
fn headless_autocorrect_skips_punctuation() {
    let settings = SessionSettings::new(AssistanceConfig {
        autocorrect: true,
        ..Default::default()
    });
    let mut controller = SessionController::new(single("it's"), settings, 0).unwrap();

    assert_eq!(controller.handle_key(&Keystroke::char('I'), 1), Admission::Admitted { len: 1 });
    assert_eq!(controller.handle_key(&Keystroke::char('t'), 2), Admission::Admitted { len: 2 });
    assert_eq!(controller.handle_key(&Keystroke::char('s'), 3), Admission::Admitted { len: 4 });

    assert_eq!(controller.buffer(), "it's");
    assert_eq!(controller.state(), SessionState::SessionComplete);
}

#[test]
fn headless_ghost_text_appears_after_idle_ticks() {
    let settings = SessionSettings::new(AssistanceConfig {
        ghost_text: true,
        ..Default::default()
    });
    let mut controller =
        SessionController::new(single("Shall I compare thee"), settings, 0).unwrap();

    // one key, then idle ticks 100ms apart
    let mut events = vec![key('S')];
    events.extend(std::iter::repeat_with(|| StudyEvent::Tick).take(7));
    drive(&mut controller, events, 100);

    assert_eq!(controller.ghost_text(), Some("hall I c"));
    assert!(controller
        .drain_events()
        .iter()
        .any(|e| matches!(e, SessionEvent::GhostRevealed(g) if g == "hall I c")));

    controller.handle_key(&Keystroke::char('h'), 900);
    assert_eq!(controller.ghost_text(), None);
}

#[test]
fn headless_deck_session_records_into_store() {
    let mut store = MemoryStore::new();
    let deck = store.create_deck("Verse", None).unwrap();
    let first = store.create_card(&deck.id, "one", "ab").unwrap();
    let second = store.create_card(&deck.id, "two", "cd").unwrap();

    let plan = store.deck_plan(&deck.id).unwrap().unwrap();
    let mut controller =
        SessionController::new(plan, SessionSettings::new(AssistanceConfig::default()), 0).unwrap();

    // card one finishes 5000ms after the first key, card two at 9000ms
    controller.handle_key(&Keystroke::char('a'), 1_000);
    controller.handle_key(&Keystroke::char('b'), 6_000);
    controller.handle_key(&Keystroke::char('c'), 8_000);
    controller.handle_key(&Keystroke::char('d'), 10_000);

    let mut handoff = None;
    while let Some(event) = controller.poll_event() {
        match event {
            SessionEvent::Record(r) => {
                store.add_time_record(r).unwrap();
            }
            SessionEvent::SessionCompleted(h) => handoff = Some(h),
            _ => {}
        }
    }

    let handoff = handoff.expect("session should complete");
    assert_eq!(handoff.mode, Scope::Deck);
    assert_eq!(handoff.title, "Verse");
    assert_eq!(handoff.elapsed_ms, 9_000);

    let times = |scope, id: &str| -> Vec<u64> {
        store
            .best_times(scope, id)
            .unwrap()
            .iter()
            .map(|r| r.elapsed_ms)
            .collect()
    };
    assert_eq!(times(Scope::Card, &first.id), vec![5_000]);
    assert_eq!(times(Scope::Card, &second.id), vec![4_000]);
    assert_eq!(times(Scope::Deck, &deck.id), vec![9_000]);
}

#[test]
fn headless_cancel_stops_the_session() {
    let mut controller =
        SessionController::new(single("cat"), SessionSettings::new(AssistanceConfig::default()), 0).unwrap();
    controller.handle_key(&Keystroke::char('c'), 10);
    controller.drain_events();

    controller.cancel();
    assert_eq!(controller.state(), SessionState::Cancelled);
    assert_matches!(
        controller.handle_key(&Keystroke::char('a'), 20),
        Admission::Rejected(RejectReason::TargetComplete)
    );
    assert!(controller
        .drain_events()
        .iter()
        .all(|e| !matches!(e, SessionEvent::Record(_))));
}
