use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::typing_policy::Keystroke;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum StudyEvent {
    Key(KeyEvent),
    Paste(String),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, paste, resize)
pub trait StudyEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<StudyEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => StudyEvent::Key(key),
                Ok(CtEvent::Paste(text)) => StudyEvent::Paste(text),
                Ok(CtEvent::Resize(_, _)) => StudyEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StudyEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<StudyEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<StudyEvent>) -> Self {
        Self { rx }
    }
}

impl StudyEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<StudyEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: StudyEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: StudyEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> StudyEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => StudyEvent::Tick,
        }
    }
}

/// Milliseconds since construction, never going backwards.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a terminal key into an edit attempt on the study buffer.
///
/// Navigation and other keys that do not edit text map to `None`.
pub fn keystroke_for(key: &KeyEvent) -> Option<Keystroke> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Backspace | KeyCode::Delete => Some(Keystroke::Delete),
        KeyCode::Char('h') | KeyCode::Char('w') | KeyCode::Char('u') if ctrl => {
            Some(Keystroke::Delete)
        }
        KeyCode::Char('z') | KeyCode::Char('y') if ctrl => Some(Keystroke::History),
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(c) => Some(Keystroke::char(c)),
        KeyCode::Enter => Some(Keystroke::char('\n')),
        KeyCode::Tab => Some(Keystroke::char('\t')),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        assert_matches!(runner.step(), StudyEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(StudyEvent::Paste("Hello".into())).unwrap();
        tx.send(StudyEvent::Resize).unwrap();
        let runner = Runner::new(TestEventSource::new(rx), FixedTicker::new(Duration::from_millis(10)));

        assert_matches!(runner.step(), StudyEvent::Paste(text) if text == "Hello");
        assert_matches!(runner.step(), StudyEvent::Resize);
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.now_ms() >= a + 1);
    }

    #[test]
    fn keys_map_to_keystrokes() {
        let key = |code, modifiers| KeyEvent::new(code, modifiers);
        let none = KeyModifiers::NONE;

        assert_eq!(keystroke_for(&key(KeyCode::Char('a'), none)), Some(Keystroke::char('a')));
        assert_eq!(
            keystroke_for(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(Keystroke::char('A'))
        );
        assert_eq!(keystroke_for(&key(KeyCode::Enter, none)), Some(Keystroke::char('\n')));
        assert_eq!(keystroke_for(&key(KeyCode::Backspace, none)), Some(Keystroke::Delete));
        assert_eq!(
            keystroke_for(&key(KeyCode::Char('w'), KeyModifiers::CONTROL)),
            Some(Keystroke::Delete)
        );
        assert_eq!(
            keystroke_for(&key(KeyCode::Char('z'), KeyModifiers::CONTROL)),
            Some(Keystroke::History)
        );
        assert_eq!(keystroke_for(&key(KeyCode::Char('a'), KeyModifiers::CONTROL)), None);
        assert_eq!(keystroke_for(&key(KeyCode::Left, none)), None);
    }
}
