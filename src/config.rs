//! Engine-wide constants and compile-time defaults.
//!
//! Timing defaults, quantization steps and encoder tuning live here so
//! they can be adjusted in one place. Runtime overrides go through
//! [`TimingConfig`](crate::timing::TimingConfig) and
//! [`AccelConfig`](crate::encoder::AccelConfig).

// Buttons

/// Default bank debounce window (ms).
pub const DEFAULT_DEBOUNCE_MS: u16 = 20;

/// Default delay before the first repeat (ms).
pub const DEFAULT_REPEAT_DELAY_MS: u16 = 500;

/// Default interval between repeats (ms).
pub const DEFAULT_REPEAT_INTERVAL_MS: u16 = 100;

/// Default long-press threshold (ms).
pub const DEFAULT_LONG_PRESS_MS: u16 = 1000;

/// Repeat delay and long-press delay are stored in steps of this size.
/// 255 steps = 25.5 s.
pub const DELAY_STEP_MS: u16 = 100;

/// Repeat interval is stored in steps of this size. 255 steps = 2.55 s.
pub const INTERVAL_STEP_MS: u16 = 10;

/// Width of one button bank.
pub const BANK_BITS: usize = 8;

// Encoders

/// Encoders sharing one 32-bit line vector.
pub const MAX_ENCODERS: usize = 8;

/// A, B and switch line per encoder.
pub const LINES_PER_ENCODER: u32 = 3;

/// Fixed debounce window for encoder push switches (ms).
pub const ENCODER_SWITCH_DEBOUNCE_MS: u16 = 10;

/// Long-press ticks for encoder switches are counted in this unit (ms).
pub const ENCODER_LONG_TICK_MS: u32 = 10;

/// Default encoder switch long-press threshold in ticks (50 = 500 ms).
pub const DEFAULT_ENCODER_LONG_TICKS: u8 = 50;

/// Trigger interval below which a step is "fast" (ms).
pub const FAST_MS: u16 = 15;

/// Trigger interval below which a step is "very fast" (ms).
pub const VERYFAST_MS: u16 = 5;

/// Step size at acceleration level 1.
pub const STEP_FAST: u8 = 2;

/// Step size at acceleration level 2.
pub const STEP_VERYFAST: u8 = 5;

/// Default count multiplier for fast transitions in managed encoders.
pub const DEFAULT_FAST_MULTIPLIER: i16 = 4;

/// Most `on_up`/`on_dn` calls one count-mode check synthesizes. Larger
/// jumps (a preset count, a first read) still report the full delta
/// through `on_change`.
pub const MAX_SYNTHESIZED_PULSES: u32 = 127;

/// Mode count flag: cycle modes on long press instead of short press.
pub const MODE_CYCLE_ON_LONG: u8 = 0x80;

// Firmware poll loop

/// Encoder poll period (ms).
pub const POLL_PERIOD_MS: u64 = 1;

/// Buttons are scanned every N encoder ticks.
pub const BUTTON_POLL_DIVIDER: u32 = 5;

/// Depth of the panel event queue between the poll loop and consumers.
pub const EVENT_QUEUE_DEPTH: usize = 16;
