/// Handle returned by [`IdleTimers::schedule`], used to cancel a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Pending<A> {
    handle: TimerHandle,
    deadline_ms: u64,
    action: A,
}

/// Cancelable one-shot timers keyed on a monotonic millisecond clock.
///
/// Nothing fires by itself: the owner calls [`IdleTimers::fire_due`] from its
/// tick handler and receives the actions whose deadline has passed.
#[derive(Debug, Clone)]
pub struct IdleTimers<A> {
    next_handle: u64,
    pending: Vec<Pending<A>>,
}

impl<A> Default for IdleTimers<A> {
    fn default() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }
}

impl<A> IdleTimers<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay_ms: u64, now_ms: u64, action: A) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Pending {
            handle,
            deadline_ms: now_ms.saturating_add(delay_ms),
            action,
        });
        handle
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every action due at `now_ms`, earliest deadline first.
    pub fn fire_due(&mut self, now_ms: u64) -> Vec<A> {
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.deadline_ms <= now_ms);
        self.pending = rest;
        due.sort_by_key(|p| p.deadline_ms);
        due.into_iter().map(|p| p.action).collect()
    }
}
