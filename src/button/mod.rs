//! Button state machine.
//!
//! A [`Button`] is `Idle` or `Pressed` and moves between the two on the
//! per-poll [`ButtonStatus`] it is handed:
//!
//! ```text
//! Idle    --DOWN-->   Pressed   on_press, mirror set
//! Pressed --UP-->     Idle      on_release, mirror cleared
//! Pressed --REPEAT--> Pressed   on_press again (only with repeat enabled)
//! Pressed --LONG-->   Pressed   on_long_press, then on_press again
//! ```
//!
//! A long press therefore dispatches twice: `on_long_press` and a second
//! `on_press`, on top of the `on_press` that fired on `DOWN`.
//!
//! Bank buttons get their status from the [`ButtonManager`]. Buttons
//! bound to a hardware line, a memory bit or an analog channel sample
//! themselves in [`Button::poll`], with their own debounce filter and
//! repeat/long-press timers.

pub mod manager;

#[cfg(test)]
mod tests;

use core::ops::{BitOr, BitOrAssign};

pub use manager::ButtonManager;

use crate::config::BANK_BITS;
use crate::debounce::{Debouncer, Policy};
use crate::io::{RawLine, StateSink, StateSource};
use crate::timing::{elapsed, HoldTimer, Millis, TimingConfig};

/// Events applicable to one button for exactly one poll call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonStatus(u8);

impl ButtonStatus {
    /// The line is active right now.
    pub const CURRENT: Self = Self(1 << 0);
    /// The line became active this cycle.
    pub const DOWN: Self = Self(1 << 1);
    /// The line became inactive this cycle.
    pub const UP: Self = Self(1 << 2);
    /// Repeat period elapsed while active.
    pub const REPEAT: Self = Self(1 << 3);
    /// Long-press threshold reached while active.
    pub const LONG: Self = Self(1 << 4);

    const ALL: u8 = 0x1F;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn current(self) -> bool {
        self.contains(Self::CURRENT)
    }

    pub const fn down(self) -> bool {
        self.contains(Self::DOWN)
    }

    pub const fn up(self) -> bool {
        self.contains(Self::UP)
    }

    pub const fn repeat(self) -> bool {
        self.contains(Self::REPEAT)
    }

    pub const fn long(self) -> bool {
        self.contains(Self::LONG)
    }
}

impl BitOr for ButtonStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ButtonStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Registry slot of a button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonId(u8);

impl ButtonId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Snapshot handed to button callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonRef {
    pub id: Option<ButtonId>,
    pub tag: u16,
    /// Bank bit for bank buttons.
    pub pin: Option<u8>,
    pub pressed: bool,
    /// Time since the press started; on release, how long it was held.
    pub held_ms: Millis,
}

pub type ButtonCallback<'a> = &'a dyn Fn(ButtonRef);

/// Where a button's raw level comes from.
pub enum InputSource<'a> {
    /// Bit `pin` of the manager's bank vector (`8 * bank + bit`).
    Bank { pin: u8 },
    /// A hardware line read by the button itself.
    Pin(&'a mut dyn RawLine),
    /// A memory-mapped source bit.
    Mirror(&'a dyn StateSource),
    /// Byte sample of analog channel `channel`, active inside
    /// `[lower, upper]` (1/256ths of full scale).
    Analog { channel: u8, lower: u8, upper: u8 },
}

/// One logical button.
pub struct Button<'a> {
    source: InputSource<'a>,
    id: Option<ButtonId>,
    tag: u16,
    has_repeat: bool,
    active_low: bool,
    hysteresis: u8,
    timing: TimingConfig,
    pressed: bool,
    initialized: bool,
    analog_on: bool,
    filter: Debouncer<bool>,
    hold: HoldTimer,
    long_fired: bool,
    last_change: Millis,
    press_start: Millis,
    mirror: Option<&'a dyn StateSink>,
    on_press: Option<ButtonCallback<'a>>,
    on_release: Option<ButtonCallback<'a>>,
    on_long_press: Option<ButtonCallback<'a>>,
}

impl<'a> Button<'a> {
    fn with_source(source: InputSource<'a>) -> Self {
        let timing = TimingConfig::new();
        Self {
            source,
            id: None,
            tag: 0,
            has_repeat: false,
            active_low: false,
            hysteresis: 0,
            timing,
            pressed: false,
            initialized: false,
            analog_on: false,
            filter: Debouncer::new(false, timing.debounce_ms(), Policy::Holder),
            hold: HoldTimer::new(),
            long_fired: false,
            last_change: 0,
            press_start: 0,
            mirror: None,
            on_press: None,
            on_release: None,
            on_long_press: None,
        }
    }

    /// Button on bit `pin` of a manager's bank vector.
    pub fn bank(pin: u8) -> Self {
        let mut button = Self::with_source(InputSource::Bank { pin });
        button.tag = u16::from(pin);
        button
    }

    /// Button reading a hardware line directly.
    pub fn pin(line: &'a mut dyn RawLine) -> Self {
        Self::with_source(InputSource::Pin(line))
    }

    /// Button following a memory-mapped source bit.
    pub fn mirror(source: &'a dyn StateSource) -> Self {
        Self::with_source(InputSource::Mirror(source))
    }

    /// Button thresholding an analog byte sample. `lower >= upper`
    /// disables it.
    pub fn analog(channel: u8, lower: u8, upper: u8) -> Self {
        Self::with_source(InputSource::Analog {
            channel,
            lower,
            upper,
        })
    }

    pub fn tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    /// Re-fire `on_press` on repeat events.
    pub fn repeat(mut self, enabled: bool) -> Self {
        self.has_repeat = enabled;
        self
    }

    /// Timing for self-sampled buttons. Bank buttons use the manager's.
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self.filter.set_window(timing.debounce_ms());
        self
    }

    /// Treat a low level as active (pin and mirror sources).
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    /// Widen the exit boundary of an analog band by `hysteresis` on each side.
    pub fn hysteresis(mut self, hysteresis: u8) -> Self {
        self.hysteresis = hysteresis;
        self
    }

    /// Keep `sink` in sync with the pressed state.
    pub fn mirror_to(mut self, sink: &'a dyn StateSink) -> Self {
        self.mirror = Some(sink);
        self
    }

    pub fn on_press(mut self, callback: ButtonCallback<'a>) -> Self {
        self.on_press = Some(callback);
        self
    }

    pub fn on_release(mut self, callback: ButtonCallback<'a>) -> Self {
        self.on_release = Some(callback);
        self
    }

    pub fn on_long_press(mut self, callback: ButtonCallback<'a>) -> Self {
        self.on_long_press = Some(callback);
        self
    }

    pub fn id(&self) -> Option<ButtonId> {
        self.id
    }

    pub fn tag_value(&self) -> u16 {
        self.tag
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn has_repeat(&self) -> bool {
        self.has_repeat
    }

    /// Bank bit, for buttons fed by a manager.
    pub fn bank_pin(&self) -> Option<u8> {
        match self.source {
            InputSource::Bank { pin } => Some(pin),
            _ => None,
        }
    }

    pub fn source(&self) -> &InputSource<'a> {
        &self.source
    }

    pub(crate) fn assign(&mut self, id: ButtonId) {
        self.id = Some(id);
    }

    /// Forget the startup state so the next poll reports it again.
    pub(crate) fn rearm(&mut self) {
        self.initialized = false;
    }

    pub fn snapshot(&self, now: Millis) -> ButtonRef {
        ButtonRef {
            id: self.id,
            tag: self.tag,
            pin: self.bank_pin(),
            pressed: self.pressed,
            held_ms: if self.pressed {
                elapsed(now, self.press_start)
            } else {
                elapsed(self.last_change, self.press_start)
            },
        }
    }

    /// Apply one poll's status.
    pub fn check(&mut self, status: ButtonStatus, now: Millis) {
        if status.down() && !self.pressed {
            self.pressed = true;
            self.press_start = now;
            self.last_change = now;
            self.set_mirror(true);
            self.fire(self.on_press, now);
        } else if status.up() && self.pressed {
            self.pressed = false;
            self.last_change = now;
            self.set_mirror(false);
            self.fire(self.on_release, now);
        }

        if !self.pressed {
            return;
        }
        if status.repeat() && self.has_repeat {
            self.fire(self.on_press, now);
        }
        if status.long() {
            self.fire(self.on_long_press, now);
            self.fire(self.on_press, now);
        }
    }

    /// Report the startup position: `on_press` if active, `on_release`
    /// otherwise. Never repeat or long press.
    pub fn init_state(&mut self, status: ButtonStatus, now: Millis) {
        self.initialized = true;
        self.pressed = status.current();
        self.press_start = now;
        self.last_change = now;
        self.long_fired = false;
        self.hold.restart(now);
        self.set_mirror(self.pressed);
        if self.pressed {
            self.fire(self.on_press, now);
        } else {
            self.fire(self.on_release, now);
        }
    }

    /// Sample a self-sourced button and run it through its state machine.
    ///
    /// `analog` holds the latest byte sample per analog channel. Bank
    /// buttons and analog buttons whose channel is missing are left alone.
    pub fn poll(&mut self, analog: &[u8], now: Millis) {
        let Some(level) = self.sample(analog) else {
            return;
        };

        if !self.initialized {
            self.filter.reset(level);
            let status = if level {
                ButtonStatus::CURRENT
            } else {
                ButtonStatus::empty()
            };
            self.init_state(status, now);
            return;
        }

        let before = self.filter.status();
        let after = self.filter.update(level, now);
        let mut status = ButtonStatus::empty();
        if after {
            status |= ButtonStatus::CURRENT;
        }
        if after != before {
            self.hold.restart(now);
            self.long_fired = false;
            status |= if after {
                ButtonStatus::DOWN
            } else {
                ButtonStatus::UP
            };
        } else if after {
            if self.hold.repeat_due(&self.timing, now) {
                status |= ButtonStatus::REPEAT;
            }
            if !self.long_fired && self.hold.long_due(&self.timing, now) {
                self.long_fired = true;
                status |= ButtonStatus::LONG;
            }
        }
        self.check(status, now);
    }

    fn sample(&mut self, analog: &[u8]) -> Option<bool> {
        let invert = self.active_low;
        match &mut self.source {
            InputSource::Bank { .. } => None,
            InputSource::Pin(line) => Some(matches!(line.level(), Some(high) if high != invert)),
            InputSource::Mirror(source) => Some(source.get() != invert),
            InputSource::Analog {
                channel,
                lower,
                upper,
            } => {
                let value = *analog.get(usize::from(*channel))?;
                let on = analog_level(value, *lower, *upper, self.hysteresis, self.analog_on);
                self.analog_on = on;
                Some(on)
            }
        }
    }

    fn set_mirror(&self, on: bool) {
        if let Some(sink) = self.mirror {
            sink.set(on);
        }
    }

    fn fire(&self, callback: Option<ButtonCallback<'a>>, now: Millis) {
        if let Some(callback) = callback {
            callback(self.snapshot(now));
        }
    }
}

/// Threshold an analog sample into a binary state.
///
/// Enters the active state inside `[lower, upper]`; once active, leaves
/// only outside `[lower - hysteresis, upper + hysteresis]`.
pub fn analog_level(value: u8, lower: u8, upper: u8, hysteresis: u8, active: bool) -> bool {
    if lower >= upper {
        return false;
    }
    let (lo, hi) = if active {
        (lower.saturating_sub(hysteresis), upper.saturating_add(hysteresis))
    } else {
        (lower, upper)
    };
    (lo..=hi).contains(&value)
}

/// Logical index of bit `bit` in bank `bank`.
pub const fn bank_index(bank: usize, bit: usize) -> usize {
    BANK_BITS * bank + bit
}
