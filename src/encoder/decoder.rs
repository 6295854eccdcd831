//! Quadrature decoder for up to eight encoders on one line vector.
//!
//! Encoder `i` occupies bits `3i` (A), `3i + 1` (B) and `3i + 2` (push
//! switch) of the `u32` handed to [`EncoderDecoder::update`]. A rising
//! edge on A (after the per-encoder inversion mask) is the rotation
//! trigger and B, steady at that instant, gives the direction: low is up,
//! high is down. Half-cycle encoders also trigger on the falling edge of A
//! with the direction reversed.
//!
//! Per-encoder results are sticky bitmasks (bit `i` = encoder `i`) and
//! counters that stay set until the consumer takes them.

use crate::config::{
    DEFAULT_ENCODER_LONG_TICKS, ENCODER_LONG_TICK_MS, ENCODER_SWITCH_DEBOUNCE_MS, FAST_MS,
    LINES_PER_ENCODER, MAX_ENCODERS, MODE_CYCLE_ON_LONG, STEP_FAST, STEP_VERYFAST, VERYFAST_MS,
};
use crate::debounce::{Debouncer, Policy};
use crate::timing::{elapsed, Millis};

/// Velocity thresholds and step sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccelConfig {
    /// Trigger interval below which a step is level 1 (ms).
    pub fast_ms: u16,
    /// Trigger interval below which a step is level 2 (ms).
    pub very_fast_ms: u16,
    pub fast_step: u8,
    pub very_fast_step: u8,
}

impl AccelConfig {
    pub const fn new() -> Self {
        Self {
            fast_ms: FAST_MS,
            very_fast_ms: VERYFAST_MS,
            fast_step: STEP_FAST,
            very_fast_step: STEP_VERYFAST,
        }
    }

    /// Every trigger is a unit step.
    pub const fn disabled() -> Self {
        Self {
            fast_ms: 0,
            very_fast_ms: 0,
            fast_step: 1,
            very_fast_step: 1,
        }
    }

    /// Acceleration level for a trigger `interval` ms after the previous one.
    pub fn level(&self, interval: Millis) -> u8 {
        if interval < Millis::from(self.very_fast_ms) {
            2
        } else if interval < Millis::from(self.fast_ms) {
            1
        } else {
            0
        }
    }

    pub fn step(&self, level: u8) -> i32 {
        match level {
            0 => 1,
            1 => i32::from(self.fast_step),
            _ => i32::from(self.very_fast_step),
        }
    }
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModeKind {
    Unused,
    Momentary,
    CycleOnShort(u8),
    CycleOnLong(u8),
}

impl ModeKind {
    fn from_count(count: u8) -> Self {
        match count & !MODE_CYCLE_ON_LONG {
            0 => ModeKind::Unused,
            1 => ModeKind::Momentary,
            n if count & MODE_CYCLE_ON_LONG != 0 => ModeKind::CycleOnLong(n),
            n => ModeKind::CycleOnShort(n),
        }
    }

    fn initial(self) -> u8 {
        match self {
            ModeKind::Unused | ModeKind::Momentary => 0,
            ModeKind::CycleOnShort(_) | ModeKind::CycleOnLong(_) => 1,
        }
    }
}

/// Next mode after `mode` in `1..=count`: wraps to 1 or clamps at `count`.
pub fn next_mode(mode: u8, count: u8, wrap: bool) -> u8 {
    if mode >= count {
        if wrap {
            1
        } else {
            count
        }
    } else {
        mode + 1
    }
}

/// Gather line `offset` (0 = A, 1 = B, 2 = switch) of every encoder into
/// one byte, bit `i` for encoder `i`.
fn gather(lines: u32, offset: u32) -> u8 {
    (0..MAX_ENCODERS as u32).fold(0u8, |mask, i| {
        let bit = (lines >> (LINES_PER_ENCODER * i + offset)) & 1;
        mask | ((bit as u8) << i)
    })
}

fn slot_mask(index: usize) -> Option<u8> {
    (index < MAX_ENCODERS).then(|| 1u8 << index)
}

/// Decoder state for up to [`MAX_ENCODERS`] encoders.
pub struct EncoderDecoder {
    enabled: u8,
    inverted: u8,
    half_cycle: u8,
    accel: AccelConfig,
    started: bool,
    last_tick: Millis,
    last_lines: u32,
    a_prev: u8,

    // rotation
    triggered: u8,
    last_trigger: [Millis; MAX_ENCODERS],
    count: [i32; MAX_ENCODERS],
    pending: [i32; MAX_ENCODERS],
    pulses: [i8; MAX_ENCODERS],
    fast_pulses: [i8; MAX_ENCODERS],
    changed: u8,
    up: u8,
    down: u8,
    quick_up: u8,
    quick_down: u8,

    // push switches
    switch_active_low: bool,
    switch_filter: Debouncer<u8>,
    pressed: u8,
    activated: u8,
    deactivated: u8,
    toggled: u8,
    shortpress: u8,
    longpress: u8,
    latched: u8,
    pattern_since: Millis,
    long_ticks: u8,

    // modes
    num_modes: [u8; MAX_ENCODERS],
    mode: [u8; MAX_ENCODERS],
    mode_wrap: u8,
    mode_changed: u8,
}

impl EncoderDecoder {
    /// Decoder for the first `encoders` slots (clamped to eight).
    pub const fn new(encoders: usize) -> Self {
        let enabled = if encoders >= MAX_ENCODERS {
            0xFF
        } else {
            (1u8 << encoders) - 1
        };
        Self {
            enabled,
            inverted: 0,
            half_cycle: 0,
            accel: AccelConfig::new(),
            started: false,
            last_tick: 0,
            last_lines: 0,
            a_prev: 0,
            triggered: 0,
            last_trigger: [0; MAX_ENCODERS],
            count: [0; MAX_ENCODERS],
            pending: [0; MAX_ENCODERS],
            pulses: [0; MAX_ENCODERS],
            fast_pulses: [0; MAX_ENCODERS],
            changed: 0,
            up: 0,
            down: 0,
            quick_up: 0,
            quick_down: 0,
            switch_active_low: true,
            switch_filter: Debouncer::new(0, ENCODER_SWITCH_DEBOUNCE_MS, Policy::Holder),
            pressed: 0,
            activated: 0,
            deactivated: 0,
            toggled: 0,
            shortpress: 0,
            longpress: 0,
            latched: 0,
            pattern_since: 0,
            long_ticks: DEFAULT_ENCODER_LONG_TICKS,
            num_modes: [0; MAX_ENCODERS],
            mode: [0; MAX_ENCODERS],
            mode_wrap: 0xFF,
            mode_changed: 0,
        }
    }

    // Configuration

    /// Invert A on encoder `index`, which reverses its direction.
    pub fn set_inverted(&mut self, index: usize, inverted: bool) {
        let Some(bit) = slot_mask(index) else {
            return;
        };
        let before = self.inverted;
        set_bit(&mut self.inverted, bit, inverted);
        if self.started {
            // Keep the stored A level in the new polarity.
            self.a_prev ^= before ^ self.inverted;
        }
    }

    /// Trigger on both edges of A (half-cycle detent encoders).
    pub fn set_half_cycle(&mut self, index: usize, half_cycle: bool) {
        if let Some(bit) = slot_mask(index) {
            set_bit(&mut self.half_cycle, bit, half_cycle);
        }
    }

    pub fn set_acceleration(&mut self, accel: AccelConfig) {
        self.accel = accel;
    }

    pub fn acceleration(&self) -> &AccelConfig {
        &self.accel
    }

    /// Switch long-press threshold in 10 ms ticks. 0 disables long press.
    pub fn set_long_ticks(&mut self, ticks: u8) {
        self.long_ticks = ticks;
    }

    /// Switches read low when pressed (default) or high when pressed.
    pub fn set_switch_active_low(&mut self, active_low: bool) {
        self.switch_active_low = active_low;
    }

    /// Mode count for encoder `index`: 0 unused, 1 momentary, 2..=127
    /// cycle on short press, with [`MODE_CYCLE_ON_LONG`] set cycle on long
    /// press. Resets the mode to its initial value.
    pub fn set_modes(&mut self, index: usize, count: u8) {
        if slot_mask(index).is_none() {
            return;
        }
        self.num_modes[index] = count;
        self.mode[index] = ModeKind::from_count(count).initial();
    }

    /// Wrap past the last mode back to 1 (default) or clamp at it.
    pub fn set_mode_wrap(&mut self, index: usize, wrap: bool) {
        if let Some(bit) = slot_mask(index) {
            set_bit(&mut self.mode_wrap, bit, wrap);
        }
    }

    /// Preset the absolute position of encoder `index`.
    pub fn set_count(&mut self, index: usize, value: i32) {
        if let Some(count) = self.count.get_mut(index) {
            *count = value;
        }
    }

    // Polling

    /// Process one sample of the line vector taken at `now`.
    ///
    /// The first call only records the baseline. Calls within the same
    /// millisecond are ignored.
    pub fn update(&mut self, lines: u32, now: Millis) {
        if !self.started {
            self.started = true;
            self.last_tick = now;
            self.last_lines = lines;
            self.a_prev = gather(lines, 0) ^ self.inverted;
            let switches = self.switch_sample(lines);
            self.switch_filter.reset(switches);
            self.pressed = switches;
            self.pattern_since = now;
            self.latched = 0;
            return;
        }

        if elapsed(now, self.last_tick) == 0 {
            return;
        }
        self.last_tick = now;

        if lines != self.last_lines {
            self.last_lines = lines;
            self.decode(lines, now);
        }
        self.update_switches(lines, now);
    }

    fn decode(&mut self, lines: u32, now: Millis) {
        let a = gather(lines, 0) ^ self.inverted;
        let b = gather(lines, 1);
        let rising = a & !self.a_prev;
        let falling = !a & self.a_prev & self.half_cycle;
        self.a_prev = a;

        let triggers = (rising | falling) & self.enabled;
        if triggers == 0 {
            return;
        }
        for index in 0..MAX_ENCODERS {
            let mask = 1u8 << index;
            if triggers & mask == 0 {
                continue;
            }
            let b_high = b & mask != 0;
            let up = if rising & mask != 0 { !b_high } else { b_high };
            self.step(index, up, now);
        }
    }

    fn step(&mut self, index: usize, up: bool, now: Millis) {
        let mask = 1u8 << index;
        let level = if self.triggered & mask != 0 {
            self.accel.level(elapsed(now, self.last_trigger[index]))
        } else {
            0
        };
        self.triggered |= mask;
        self.last_trigger[index] = now;

        let magnitude = self.accel.step(level);
        let delta = if up { magnitude } else { -magnitude };
        self.count[index] = self.count[index].wrapping_add(delta);
        self.pending[index] = self.pending[index].wrapping_add(delta);
        self.changed |= mask;

        let unit: i8 = if up { 1 } else { -1 };
        if up {
            self.up |= mask;
        } else {
            self.down |= mask;
        }
        if level > 0 {
            if up {
                self.quick_up |= mask;
            } else {
                self.quick_down |= mask;
            }
            self.fast_pulses[index] = self.fast_pulses[index].saturating_add(unit);
        } else {
            self.pulses[index] = self.pulses[index].saturating_add(unit);
        }
        trace!("encoder {}: {} (level {})", index, delta, level);
    }

    fn switch_sample(&self, lines: u32) -> u8 {
        let raw = gather(lines, 2);
        let active = if self.switch_active_low { !raw } else { raw };
        active & self.enabled
    }

    fn update_switches(&mut self, lines: u32, now: Millis) {
        let before = self.pressed;
        let after = self.switch_filter.update(self.switch_sample(lines), now);

        if after != before {
            let changed = after ^ before;
            let released = changed & before;
            let short = released & !self.latched;
            self.activated |= changed & after;
            self.deactivated |= released;
            self.toggled |= changed;
            self.shortpress |= short;
            self.latched &= after;
            self.pressed = after;
            self.pattern_since = now;
            self.follow_momentary(changed);
            self.cycle_modes(short, false);
        }

        let eligible = self.pressed & !self.latched;
        if eligible != 0
            && self.long_ticks != 0
            && elapsed(now, self.pattern_since)
                >= Millis::from(self.long_ticks) * ENCODER_LONG_TICK_MS
        {
            self.longpress |= eligible;
            self.latched |= self.pressed;
            self.cycle_modes(eligible, true);
            debug!("encoder switches {=u8:b} long press", eligible);
        }
    }

    fn follow_momentary(&mut self, changed: u8) {
        for index in 0..MAX_ENCODERS {
            let mask = 1u8 << index;
            if changed & mask == 0 {
                continue;
            }
            if ModeKind::from_count(self.num_modes[index]) == ModeKind::Momentary {
                let mode = u8::from(self.pressed & mask != 0);
                self.set_mode(index, mode);
            }
        }
    }

    fn cycle_modes(&mut self, switches: u8, long: bool) {
        for index in 0..MAX_ENCODERS {
            let mask = 1u8 << index;
            if switches & mask == 0 {
                continue;
            }
            let count = match (ModeKind::from_count(self.num_modes[index]), long) {
                (ModeKind::CycleOnShort(n), false) | (ModeKind::CycleOnLong(n), true) => n,
                _ => continue,
            };
            let wrap = self.mode_wrap & mask != 0;
            let mode = next_mode(self.mode[index], count, wrap);
            self.set_mode(index, mode);
        }
    }

    fn set_mode(&mut self, index: usize, mode: u8) {
        if self.mode[index] != mode {
            self.mode[index] = mode;
            self.mode_changed |= 1 << index;
        }
    }

    // Counts

    /// Accumulated count since the last call (read-and-reset).
    pub fn take_count(&mut self, index: usize) -> i32 {
        self.pending.get_mut(index).map_or(0, core::mem::take)
    }

    /// Absolute position; clears the encoder's changed bit.
    pub fn position(&mut self, index: usize) -> i32 {
        match slot_mask(index) {
            Some(mask) => {
                self.changed &= !mask;
                self.count[index]
            }
            None => 0,
        }
    }

    /// Absolute position without touching the changed bit.
    pub fn peek_position(&self, index: usize) -> i32 {
        self.count.get(index).copied().unwrap_or(0)
    }

    /// The position moved since it was last read with [`position`](Self::position).
    pub fn is_changed(&self, index: usize) -> bool {
        slot_mask(index).is_some_and(|mask| self.changed & mask != 0)
    }

    /// Unit and fast transitions since the last call (read-and-reset).
    pub fn take_transitions(&mut self, index: usize) -> (i8, i8) {
        if slot_mask(index).is_none() {
            return (0, 0);
        }
        (
            core::mem::take(&mut self.pulses[index]),
            core::mem::take(&mut self.fast_pulses[index]),
        )
    }

    // Modes

    pub fn mode(&self, index: usize) -> u8 {
        self.mode.get(index).copied().unwrap_or(0)
    }

    pub fn num_modes(&self, index: usize) -> u8 {
        self.num_modes.get(index).copied().unwrap_or(0)
    }

    pub fn take_mode_changed(&mut self) -> u8 {
        core::mem::take(&mut self.mode_changed)
    }

    // Sticky masks

    pub fn take_up(&mut self) -> u8 {
        core::mem::take(&mut self.up)
    }

    pub fn take_down(&mut self) -> u8 {
        core::mem::take(&mut self.down)
    }

    pub fn take_quick_up(&mut self) -> u8 {
        core::mem::take(&mut self.quick_up)
    }

    pub fn take_quick_down(&mut self) -> u8 {
        core::mem::take(&mut self.quick_down)
    }

    pub fn take_activated(&mut self) -> u8 {
        core::mem::take(&mut self.activated)
    }

    pub fn take_deactivated(&mut self) -> u8 {
        core::mem::take(&mut self.deactivated)
    }

    pub fn take_toggled(&mut self) -> u8 {
        core::mem::take(&mut self.toggled)
    }

    pub fn take_shortpress(&mut self) -> u8 {
        core::mem::take(&mut self.shortpress)
    }

    pub fn take_longpress(&mut self) -> u8 {
        core::mem::take(&mut self.longpress)
    }

    /// Debounced switch state, bit `i` for encoder `i`.
    pub fn pressed(&self) -> u8 {
        self.pressed
    }
}

impl Default for EncoderDecoder {
    fn default() -> Self {
        Self::new(MAX_ENCODERS)
    }
}

fn set_bit(mask: &mut u8, bit: u8, on: bool) {
    if on {
        *mask |= bit;
    } else {
        *mask &= !bit;
    }
}
