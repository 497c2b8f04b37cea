use std::time::{Duration, Instant};

/// Single-slot debounce with an in-flight guard.
///
/// Requests inside the window coalesce into one run. A request arriving while
/// a run is in flight is kept and becomes due once `finish` is called, so the
/// latest request always wins and is never dropped. `max_wait` bounds how long
/// a steady stream of requests can postpone a run.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    max_wait: Duration,
    first_request: Option<Instant>,
    deadline: Option<Instant>,
    forced: bool,
    in_flight: bool,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_wait: delay * 4,
            first_request: None,
            deadline: None,
            forced: false,
            in_flight: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn request(&mut self, now: Instant) {
        let first = *self.first_request.get_or_insert(now);
        let deadline = (now + self.delay).min(first + self.max_wait);
        self.deadline = Some(deadline);
    }

    /// Skips the window: the next `poll` runs immediately.
    pub fn force(&mut self, now: Instant) {
        self.first_request.get_or_insert(now);
        self.deadline = Some(now);
        self.forced = true;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight
            && match self.deadline {
                Some(deadline) => self.forced || deadline <= now,
                None => false,
            }
    }

    /// Claims the pending request if it is due. Returns whether the caller
    /// should run now; the caller must call `finish` afterwards.
    pub fn begin(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.deadline = None;
        self.first_request = None;
        self.forced = false;
        self.in_flight = true;
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
        self.first_request = None;
        self.forced = false;
    }
}

/// Loading flag with a minimum visible duration and a stability delay, so
/// sub-frame bursts of work do not make the indicator flicker.
#[derive(Debug, Clone)]
pub struct LoadingIndicator {
    min_duration: Duration,
    stability_delay: Duration,
    busy: bool,
    visible: bool,
    shown_at: Option<Instant>,
    idle_since: Option<Instant>,
}

impl LoadingIndicator {
    pub fn new(min_duration: Duration, stability_delay: Duration) -> Self {
        Self {
            min_duration,
            stability_delay,
            busy: false,
            visible: false,
            shown_at: None,
            idle_since: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_busy(&mut self, busy: bool, now: Instant) {
        if busy == self.busy {
            return;
        }
        self.busy = busy;
        self.idle_since = if busy { None } else { Some(now) };
    }

    /// Advances the indicator; returns the new visibility when it changed.
    pub fn tick(&mut self, now: Instant) -> Option<bool> {
        if self.busy && !self.visible {
            self.visible = true;
            self.shown_at = Some(now);
            return Some(true);
        }
        if !self.busy && self.visible {
            let shown_long_enough = self
                .shown_at
                .map_or(true, |at| now.saturating_duration_since(at) >= self.min_duration);
            let stable = self
                .idle_since
                .map_or(true, |at| now.saturating_duration_since(at) >= self.stability_delay);
            if shown_long_enough && stable {
                self.visible = false;
                self.shown_at = None;
                return Some(false);
            }
        }
        None
    }
}
