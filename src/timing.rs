//! Millisecond timestamps, timing configuration and hold timers.
//!
//! Timestamps are free-running `u32` millisecond counters. Every interval
//! is computed with `wrapping_sub`, so a single counter wraparound between
//! two samples is harmless.

use crate::config::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_LONG_PRESS_MS, DEFAULT_REPEAT_DELAY_MS,
    DEFAULT_REPEAT_INTERVAL_MS, DELAY_STEP_MS, INTERVAL_STEP_MS,
};

/// Monotonic millisecond timestamp.
pub type Millis = u32;

/// Milliseconds from `since` to `now`, wraparound-safe.
#[inline]
pub const fn elapsed(now: Millis, since: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Round `ms` to the nearest multiple of `step` and store it as a byte.
///
/// Zero stays zero (feature off). Any non-zero request maps to at least one
/// step and saturates at 255 steps.
const fn quantize(ms: u16, step: u16) -> u8 {
    if ms == 0 {
        return 0;
    }
    let units = (ms as u32 + step as u32 / 2) / step as u32;
    if units == 0 {
        1
    } else if units > u8::MAX as u32 {
        u8::MAX
    } else {
        units as u8
    }
}

/// Debounce, repeat and long-press timing for a button or a bank.
///
/// Repeat delay and long-press delay are kept in 100 ms steps
/// (100 ms..25.5 s), the repeat interval in 10 ms steps (10 ms..2.55 s).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingConfig {
    debounce_ms: u16,
    repeat_delay: u8,
    repeat_interval: u8,
    long_delay: u8,
}

impl TimingConfig {
    pub const fn new() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            repeat_delay: quantize(DEFAULT_REPEAT_DELAY_MS, DELAY_STEP_MS),
            repeat_interval: quantize(DEFAULT_REPEAT_INTERVAL_MS, INTERVAL_STEP_MS),
            long_delay: quantize(DEFAULT_LONG_PRESS_MS, DELAY_STEP_MS),
        }
    }

    pub const fn debounce(mut self, ms: u16) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Delay before the first repeat. 0 disables repeat.
    pub const fn repeat_delay(mut self, ms: u16) -> Self {
        self.repeat_delay = quantize(ms, DELAY_STEP_MS);
        self
    }

    /// Interval between repeats. 0 disables repeat.
    pub const fn repeat_interval(mut self, ms: u16) -> Self {
        self.repeat_interval = quantize(ms, INTERVAL_STEP_MS);
        self
    }

    /// Long-press threshold. 0 disables long press.
    pub const fn long_press(mut self, ms: u16) -> Self {
        self.long_delay = quantize(ms, DELAY_STEP_MS);
        self
    }

    pub const fn debounce_ms(&self) -> u16 {
        self.debounce_ms
    }

    pub const fn repeat_delay_ms(&self) -> Millis {
        self.repeat_delay as Millis * DELAY_STEP_MS as Millis
    }

    pub const fn repeat_interval_ms(&self) -> Millis {
        self.repeat_interval as Millis * INTERVAL_STEP_MS as Millis
    }

    pub const fn long_press_ms(&self) -> Millis {
        self.long_delay as Millis * DELAY_STEP_MS as Millis
    }

    pub const fn repeat_enabled(&self) -> bool {
        self.repeat_delay != 0 && self.repeat_interval != 0
    }

    pub const fn long_press_enabled(&self) -> bool {
        self.long_delay != 0
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeat and long-press timer anchored at the last committed change.
///
/// Restarting the anchor is the only way to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoldTimer {
    anchor: Millis,
    last_repeat: Millis,
    repeating: bool,
}

impl HoldTimer {
    pub const fn new() -> Self {
        Self {
            anchor: 0,
            last_repeat: 0,
            repeating: false,
        }
    }

    pub fn restart(&mut self, now: Millis) {
        self.anchor = now;
        self.last_repeat = now;
        self.repeating = false;
    }

    /// `true` once per repeat period: first after the repeat delay, then
    /// every repeat interval.
    ///
    /// Periods are counted on the schedule from the anchor, not from the
    /// poll that noticed them, so a coarse poll cadence does not stretch
    /// them. Periods missed entirely are dropped.
    pub fn repeat_due(&mut self, timing: &TimingConfig, now: Millis) -> bool {
        if !timing.repeat_enabled() {
            return false;
        }
        let interval = timing.repeat_interval_ms();
        if self.repeating {
            if elapsed(now, self.last_repeat) < interval {
                return false;
            }
            self.last_repeat = self.last_repeat.wrapping_add(interval);
        } else {
            if elapsed(now, self.anchor) < timing.repeat_delay_ms() {
                return false;
            }
            self.repeating = true;
            self.last_repeat = self.anchor.wrapping_add(timing.repeat_delay_ms());
        }
        if elapsed(now, self.last_repeat) >= interval {
            self.last_repeat = now;
        }
        true
    }

    /// `true` while the long-press threshold has elapsed since the anchor.
    /// Callers mask out lines that already fired.
    pub fn long_due(&self, timing: &TimingConfig, now: Millis) -> bool {
        timing.long_press_enabled() && elapsed(now, self.anchor) >= timing.long_press_ms()
    }

    pub fn held_for(&self, now: Millis) -> Millis {
        elapsed(now, self.anchor)
    }
}

impl Default for HoldTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_handles_wraparound() {
        assert_eq!(elapsed(10, u32::MAX - 5), 16);
        assert_eq!(elapsed(500, 200), 300);
    }

    #[test]
    fn delays_round_to_100ms_steps() {
        let t = TimingConfig::new().repeat_delay(340).long_press(360);
        assert_eq!(t.repeat_delay_ms(), 300);
        assert_eq!(t.long_press_ms(), 400);
    }

    #[test]
    fn interval_rounds_to_10ms_steps() {
        let t = TimingConfig::new().repeat_interval(104);
        assert_eq!(t.repeat_interval_ms(), 100);
        let t = TimingConfig::new().repeat_interval(3);
        assert_eq!(t.repeat_interval_ms(), 10);
    }

    #[test]
    fn delays_clamp_to_byte_range() {
        let t = TimingConfig::new()
            .repeat_delay(u16::MAX)
            .repeat_interval(u16::MAX);
        assert_eq!(t.repeat_delay_ms(), 25_500);
        assert_eq!(t.repeat_interval_ms(), 2_550);
    }

    #[test]
    fn zero_disables_features() {
        let t = TimingConfig::new().repeat_delay(0).long_press(0);
        assert!(!t.repeat_enabled());
        assert!(!t.long_press_enabled());

        let t = TimingConfig::new().repeat_interval(0);
        assert!(!t.repeat_enabled());
    }

    #[test]
    fn hold_timer_repeats_after_delay_then_every_interval() {
        let timing = TimingConfig::new().repeat_delay(300).repeat_interval(100);
        let mut timer = HoldTimer::new();
        timer.restart(0);

        let fired: heapless::Vec<u32, 8> = (0..=600)
            .step_by(10)
            .filter(|&t| timer.repeat_due(&timing, t))
            .collect();
        assert_eq!(fired.as_slice(), &[300, 400, 500, 600]);
    }

    #[test]
    fn hold_timer_restart_cancels_repeat() {
        let timing = TimingConfig::new().repeat_delay(300).repeat_interval(100);
        let mut timer = HoldTimer::new();
        timer.restart(0);
        assert!(timer.repeat_due(&timing, 300));
        timer.restart(350);
        assert!(!timer.repeat_due(&timing, 400));
        assert!(timer.repeat_due(&timing, 650));
    }

    #[test]
    fn hold_timer_keeps_schedule_under_coarse_polling() {
        let timing = TimingConfig::new().repeat_delay(300).repeat_interval(100);
        let mut timer = HoldTimer::new();
        timer.restart(0);

        let fired: heapless::Vec<u32, 8> = (0..=700)
            .step_by(7)
            .filter(|&t| timer.repeat_due(&timing, t))
            .collect();
        assert_eq!(fired.as_slice(), &[301, 406, 504, 602, 700]);
    }

    #[test]
    fn hold_timer_drops_missed_periods() {
        let timing = TimingConfig::new().repeat_delay(300).repeat_interval(100);
        let mut timer = HoldTimer::new();
        timer.restart(0);
        assert!(timer.repeat_due(&timing, 300));
        // Poll stalls for several periods: one repeat, then back on cadence.
        assert!(timer.repeat_due(&timing, 750));
        assert!(!timer.repeat_due(&timing, 760));
        assert!(timer.repeat_due(&timing, 850));
    }

    #[test]
    fn hold_timer_long_due_after_threshold() {
        let timing = TimingConfig::new().long_press(500);
        let mut timer = HoldTimer::new();
        timer.restart(1_000);
        assert!(!timer.long_due(&timing, 1_499));
        assert!(timer.long_due(&timing, 1_500));
        assert_eq!(timer.held_for(1_500), 500);
    }
}
