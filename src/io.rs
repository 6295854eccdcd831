//! Line sources and mirror sinks.
//!
//! Buttons that do not live in a scanned bank read their level through one
//! of these seams, and any button can mirror its logical state into a
//! [`StateSink`]. The `Cell`-based adapters are `!Sync`: the engine runs on
//! one thread and reads/writes them without synchronisation.

use core::cell::Cell;

use embedded_hal::digital::InputPin;

/// A hardware line the engine samples directly.
///
/// Implemented for every `embedded-hal` [`InputPin`]. A failed read yields
/// `None`, which the button treats as an inactive line.
pub trait RawLine {
    /// Electrical level: `Some(true)` for high.
    fn level(&mut self) -> Option<bool>;
}

impl<P: InputPin> RawLine for P {
    fn level(&mut self) -> Option<bool> {
        self.is_high().ok()
    }
}

/// A memory location holding a line state.
pub trait StateSource {
    fn get(&self) -> bool;
}

/// A memory location kept in sync with a button's logical state.
pub trait StateSink {
    fn set(&self, on: bool);
}

impl StateSource for Cell<bool> {
    fn get(&self) -> bool {
        Cell::get(self)
    }
}

impl StateSink for Cell<bool> {
    fn set(&self, on: bool) {
        Cell::set(self, on)
    }
}

/// One bit inside a shared status byte.
#[derive(Clone, Copy)]
pub struct BitMirror<'a> {
    byte: &'a Cell<u8>,
    mask: u8,
}

impl<'a> BitMirror<'a> {
    /// Bit `bit` (0..=7) of `byte`. Larger indices wrap into the byte.
    pub fn new(byte: &'a Cell<u8>, bit: u8) -> Self {
        Self {
            byte,
            mask: 1 << (bit & 7),
        }
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }
}

impl StateSource for BitMirror<'_> {
    fn get(&self) -> bool {
        self.byte.get() & self.mask != 0
    }
}

impl StateSink for BitMirror<'_> {
    fn set(&self, on: bool) {
        let value = self.byte.get();
        self.byte.set(if on {
            value | self.mask
        } else {
            value & !self.mask
        });
    }
}
