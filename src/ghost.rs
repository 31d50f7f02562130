//! Ghost text: after a pause in typing, hint the next few target characters.

use crate::matcher::Target;
use crate::timer::{IdleTimers, TimerHandle};
use crate::typing_policy::ghost_slice;

pub const DEFAULT_GHOST_DELAY_MS: u64 = 600;
pub const DEFAULT_GHOST_LOOKAHEAD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GhostAction {
    Reveal,
}

/// Idle-triggered hint. Purely advisory: never touches the input buffer.
#[derive(Debug, Clone)]
pub struct GhostText {
    enabled: bool,
    delay_ms: u64,
    lookahead: usize,
    timers: IdleTimers<GhostAction>,
    pending: Option<TimerHandle>,
    visible: Option<String>,
}

impl GhostText {
    pub fn new(enabled: bool, delay_ms: u64, lookahead: usize) -> Self {
        Self {
            enabled,
            delay_ms,
            lookahead,
            timers: IdleTimers::new(),
            pending: None,
            visible: None,
        }
    }

    /// Hide the hint and restart the idle countdown.
    pub fn on_buffer_change(&mut self, target: &Target, matched_len: usize, now_ms: u64) {
        self.cancel();
        if !self.enabled || matched_len >= target.len() {
            return;
        }
        self.pending = Some(self.timers.schedule(self.delay_ms, now_ms, GhostAction::Reveal));
    }

    /// Fire the idle timer if due. Returns the hint when it becomes visible.
    pub fn on_tick(&mut self, target: &Target, matched_len: usize, now_ms: u64) -> Option<String> {
        let fired = self.timers.fire_due(now_ms);
        if !fired.contains(&GhostAction::Reveal) {
            return None;
        }
        self.pending = None;

        let hint = ghost_slice(target, matched_len, self.lookahead);
        if hint.is_empty() {
            return None;
        }
        self.visible = Some(hint.clone());
        Some(hint)
    }

    pub fn visible(&self) -> Option<&str> {
        self.visible.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some_and(|h| self.timers.is_pending(h))
    }

    /// Drop any pending reveal and hide the hint.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.timers.cancel(handle);
        }
        self.visible = None;
    }

    /// Stop for good: drop every scheduled timer and hide the hint.
    pub fn shutdown(&mut self) {
        self.timers.cancel_all();
        self.pending = None;
        self.visible = None;
    }
}
