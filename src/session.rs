//! The study session state machine.
//!
//! A [`SessionController`] walks a sequence of cards. It owns the input
//! buffer (as a validated length into the current target), gates every
//! keystroke, runs the autocorrect and ghost-text policies, keeps per-card
//! and whole-session time, and reports what happened through a queue of
//! [`SessionEvent`]s. It never touches storage or the terminal and is
//! driven entirely by explicit calls carrying a monotonic `now_ms`.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::SessionError;
use crate::ghost::{GhostText, DEFAULT_GHOST_DELAY_MS, DEFAULT_GHOST_LOOKAHEAD};
use crate::matcher::Target;
use crate::model::{AssistanceConfig, Card, Deck, Id, NewTimeRecord, Scope};
use crate::typing_policy::{admit, auto_advance_end, reconcile, Admission, Keystroke, RejectReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyCard {
    pub id: Id,
    pub title: String,
    pub content: String,
}

impl From<&Card> for StudyCard {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.clone(),
            title: card.title.clone(),
            content: card.content.clone(),
        }
    }
}

/// What is being studied: one card, or every card of a deck in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPlan {
    deck: Option<(Id, String)>,
    cards: Vec<StudyCard>,
}

impl StudyPlan {
    pub fn single(card: StudyCard) -> Self {
        Self {
            deck: None,
            cards: vec![card],
        }
    }

    pub fn deck(deck: &Deck, cards: Vec<StudyCard>) -> Self {
        Self {
            deck: Some((deck.id.clone(), deck.name.clone())),
            cards,
        }
    }

    pub fn cards(&self) -> &[StudyCard] {
        &self.cards
    }

    pub fn deck_id(&self) -> Option<&str> {
        self.deck.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn deck_name(&self) -> Option<&str> {
        self.deck.as_ref().map(|(_, name)| name.as_str())
    }

    /// Id the session-level record is filed under: the deck in deck mode,
    /// otherwise the single card.
    pub fn scope_id(&self) -> Option<&str> {
        match self.mode() {
            Scope::Deck => self.deck_id(),
            Scope::Card => self.cards.first().map(|c| c.id.as_str()),
        }
    }

    /// Deck mode only applies when more than one card is studied.
    pub fn mode(&self) -> Scope {
        match self.deck {
            Some(_) if self.cards.len() > 1 => Scope::Deck,
            _ => Scope::Card,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub assistance: AssistanceConfig,
    pub ghost_delay_ms: u64,
    pub ghost_lookahead: usize,
}

impl SessionSettings {
    pub fn new(assistance: AssistanceConfig) -> Self {
        Self {
            assistance,
            ghost_delay_ms: DEFAULT_GHOST_DELAY_MS,
            ghost_lookahead: DEFAULT_GHOST_LOOKAHEAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Before the first accepted keystroke; the clock is not running.
    Idle,
    Active,
    /// Transient while a finished card is being recorded.
    CardComplete,
    SessionComplete,
    Cancelled,
}

/// Final summary handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub elapsed_ms: u64,
    pub mode: Scope,
    pub title: String,
    pub assistance: AssistanceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// First accepted keystroke; the session clock started.
    Started,
    /// Invalid keystroke. The buffer is unchanged.
    Rejected(RejectReason),
    GhostRevealed(String),
    CardCompleted {
        index: usize,
        card_id: Id,
        elapsed_ms: u64,
    },
    /// A time record to persist.
    Record(NewTimeRecord),
    SessionCompleted(Handoff),
}

#[derive(Debug)]
pub struct SessionController {
    plan: StudyPlan,
    targets: Vec<Target>,
    assistance: AssistanceConfig,
    state: SessionState,
    index: usize,
    matched_len: usize,
    ghost: GhostText,
    started_at_ms: Option<u64>,
    /// Session elapsed time at which the current card began.
    card_mark_ms: u64,
    final_elapsed_ms: Option<u64>,
    events: VecDeque<SessionEvent>,
}

impl SessionController {
    pub fn new(plan: StudyPlan, settings: SessionSettings, now_ms: u64) -> Result<Self, SessionError> {
        if plan.cards.is_empty() {
            return Err(SessionError::EmptySequence);
        }

        let targets = plan.cards.iter().map(|c| Target::new(&c.content)).collect();
        let mut controller = Self {
            plan,
            targets,
            assistance: settings.assistance,
            state: SessionState::Idle,
            index: 0,
            matched_len: 0,
            ghost: GhostText::new(
                settings.assistance.ghost_text,
                settings.ghost_delay_ms,
                settings.ghost_lookahead,
            ),
            started_at_ms: None,
            card_mark_ms: 0,
            final_elapsed_ms: None,
            events: VecDeque::new(),
        };
        controller.enter_card(now_ms);
        controller.settle(now_ms);
        Ok(controller)
    }

    /// Gate one keystroke and apply it if admitted.
    pub fn handle_key(&mut self, key: &Keystroke, now_ms: u64) -> Admission {
        if self.is_finished() {
            return Admission::Rejected(RejectReason::TargetComplete);
        }

        let admission = admit(self.target(), self.matched_len, key, &self.assistance);
        match admission {
            Admission::Admitted { len } => {
                debug!(card = self.index, len, "keystroke admitted");
                self.start_clock(now_ms);
                self.set_matched(len, now_ms);
            }
            Admission::Rejected(reason) => {
                debug!(card = self.index, ?reason, "keystroke rejected");
                self.events.push_back(SessionEvent::Rejected(reason));
            }
            Admission::Ignored => {}
        }
        admission
    }

    /// Replace the buffer with arbitrary text (composition input, programmatic
    /// edits), folding it back to the longest valid prefix of the target.
    pub fn apply_raw_input(&mut self, raw: &str, now_ms: u64) {
        if self.is_finished() {
            return;
        }
        let len = reconcile(self.target(), raw, &self.assistance);
        if len == self.matched_len {
            return;
        }
        if len > 0 {
            self.start_clock(now_ms);
        }
        self.set_matched(len, now_ms);
    }

    /// Advance timers. Call on every tick of the event loop.
    pub fn tick(&mut self, now_ms: u64) {
        if self.is_finished() {
            return;
        }
        if let Some(hint) = self.ghost.on_tick(&self.targets[self.index], self.matched_len, now_ms) {
            self.events.push_back(SessionEvent::GhostRevealed(hint));
        }
    }

    /// Abandon the session. Nothing further is recorded.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        info!(card = self.index, "session cancelled");
        self.ghost.shutdown();
        self.state = SessionState::Cancelled;
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            SessionState::SessionComplete | SessionState::Cancelled
        )
    }

    pub fn assistance(&self) -> AssistanceConfig {
        self.assistance
    }

    pub fn plan(&self) -> &StudyPlan {
        &self.plan
    }

    pub fn card_index(&self) -> usize {
        self.index
    }

    pub fn card_count(&self) -> usize {
        self.plan.cards.len()
    }

    pub fn current_card(&self) -> &StudyCard {
        &self.plan.cards[self.index]
    }

    pub fn target(&self) -> &Target {
        &self.targets[self.index]
    }

    pub fn matched_len(&self) -> usize {
        self.matched_len
    }

    /// The validated input, always `target[0..matched_len]`.
    pub fn buffer(&self) -> String {
        self.target().slice(0, self.matched_len)
    }

    pub fn ghost_text(&self) -> Option<&str> {
        self.ghost.visible()
    }

    /// Whole target for reference, when full-text assistance is on.
    pub fn full_text(&self) -> Option<&str> {
        self.assistance
            .full_text
            .then(|| self.target().as_str())
    }

    pub fn has_started(&self) -> bool {
        self.started_at_ms.is_some()
    }

    /// Session time so far. Frozen once the session completes.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        if let Some(done) = self.final_elapsed_ms {
            return done;
        }
        self.started_at_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    pub fn card_elapsed_ms(&self, now_ms: u64) -> u64 {
        self.elapsed_ms(now_ms).saturating_sub(self.card_mark_ms)
    }

    fn start_clock(&mut self, now_ms: u64) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(now_ms);
            self.state = SessionState::Active;
            self.events.push_back(SessionEvent::Started);
        }
    }

    fn set_matched(&mut self, len: usize, now_ms: u64) {
        self.matched_len = auto_advance_end(self.target(), len, &self.assistance);
        self.ghost
            .on_buffer_change(&self.targets[self.index], self.matched_len, now_ms);
        self.settle(now_ms);
    }

    /// Reset the buffer for the current card, pre-filling leading punctuation
    /// under autocorrect.
    fn enter_card(&mut self, now_ms: u64) {
        self.matched_len = auto_advance_end(self.target(), 0, &self.assistance);
        self.ghost
            .on_buffer_change(&self.targets[self.index], self.matched_len, now_ms);
    }

    /// Complete every card whose target is fully matched, advancing through
    /// degenerate (empty) cards until one needs input or the session ends.
    fn settle(&mut self, now_ms: u64) {
        while !self.is_finished() && self.matched_len >= self.target().len() {
            self.state = SessionState::CardComplete;
            self.ghost.cancel();

            let total = self.elapsed_ms(now_ms);
            let card_elapsed = total.saturating_sub(self.card_mark_ms);
            self.card_mark_ms = total;

            let card_id = self.current_card().id.clone();
            info!(card = self.index, card_elapsed, "card complete");
            self.events.push_back(SessionEvent::CardCompleted {
                index: self.index,
                card_id: card_id.clone(),
                elapsed_ms: card_elapsed,
            });
            self.events.push_back(SessionEvent::Record(NewTimeRecord {
                scope: Scope::Card,
                scope_id: card_id,
                elapsed_ms: card_elapsed,
                assistance: self.assistance,
            }));

            if self.index + 1 < self.plan.cards.len() {
                self.index += 1;
                self.state = if self.has_started() {
                    SessionState::Active
                } else {
                    SessionState::Idle
                };
                self.enter_card(now_ms);
            } else {
                self.finish(total);
            }
        }
    }

    fn finish(&mut self, total: u64) {
        self.final_elapsed_ms = Some(total);
        self.state = SessionState::SessionComplete;

        let mode = self.plan.mode();
        let title = match (&self.plan.deck, mode) {
            (Some((deck_id, name)), Scope::Deck) => {
                self.events.push_back(SessionEvent::Record(NewTimeRecord {
                    scope: Scope::Deck,
                    scope_id: deck_id.clone(),
                    elapsed_ms: total,
                    assistance: self.assistance,
                }));
                name.clone()
            }
            _ => self.current_card().title.clone(),
        };

        info!(elapsed_ms = total, %mode, "session complete");
        self.events.push_back(SessionEvent::SessionCompleted(Handoff {
            elapsed_ms: total,
            mode,
            title,
            assistance: self.assistance,
        }));
    }
}
