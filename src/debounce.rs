//! Single-value debounce filters.
//!
//! Three interchangeable policies validate a scalar (a `bool`, a bank byte
//! or a whole bank vector) against transient noise:
//!
//! - [`Policy::Holder`]: a change must hold for the window. Reverting to the
//!   committed value cancels the pending change. Latency is the time until
//!   the line is stable plus the window.
//! - [`Policy::Delayer`]: every raw change restarts the window, and the
//!   value present once the line has been quiet for the window is
//!   committed. Latency is at most the window after the last change.
//! - [`Policy::Blanker`]: the first change commits immediately, then input
//!   is ignored until the window has elapsed. Lowest latency, but a single
//!   glitch becomes an edge.

use crate::timing::{elapsed, Millis};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Policy {
    #[default]
    Holder,
    Delayer,
    Blanker,
}

/// Debounced view of one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debouncer<T> {
    output: T,
    candidate: T,
    since: Millis,
    pending: bool,
    window_ms: u16,
    policy: Policy,
}

impl<T: Copy + PartialEq> Debouncer<T> {
    pub const fn new(initial: T, window_ms: u16, policy: Policy) -> Self {
        Self {
            output: initial,
            candidate: initial,
            since: 0,
            pending: false,
            window_ms,
            policy,
        }
    }

    /// Feed one raw sample taken at `now` and return the validated value.
    pub fn update(&mut self, raw: T, now: Millis) -> T {
        match self.policy {
            Policy::Holder => self.hold(raw, now),
            Policy::Delayer => self.delay(raw, now),
            Policy::Blanker => self.blank(raw, now),
        }
        self.output
    }

    /// Current validated value.
    pub fn status(&self) -> T {
        self.output
    }

    /// A change is being timed (or, for the blanker, input is ignored).
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Force the output to `value` and drop any pending change.
    pub fn reset(&mut self, value: T) {
        self.output = value;
        self.candidate = value;
        self.pending = false;
    }

    pub fn window_ms(&self) -> u16 {
        self.window_ms
    }

    pub fn set_window(&mut self, window_ms: u16) {
        self.window_ms = window_ms;
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    fn window_elapsed(&self, now: Millis) -> bool {
        elapsed(now, self.since) >= Millis::from(self.window_ms)
    }

    fn hold(&mut self, raw: T, now: Millis) {
        if raw == self.output {
            self.candidate = raw;
            self.pending = false;
            return;
        }
        if !self.pending || raw != self.candidate {
            self.candidate = raw;
            self.since = now;
            self.pending = true;
        }
        if self.window_elapsed(now) {
            self.output = self.candidate;
            self.pending = false;
        }
    }

    fn delay(&mut self, raw: T, now: Millis) {
        if raw != self.candidate {
            self.candidate = raw;
            self.since = now;
            self.pending = true;
        }
        if self.pending && self.window_elapsed(now) {
            self.output = self.candidate;
            self.pending = false;
        }
    }

    fn blank(&mut self, raw: T, now: Millis) {
        if self.pending {
            if !self.window_elapsed(now) {
                return;
            }
            self.pending = false;
        }
        if raw != self.output {
            self.output = raw;
            self.candidate = raw;
            self.since = now;
            self.pending = true;
        }
    }
}
