//! Button bank manager.
//!
//! Owns the button registry and scans `BANKS` 8-bit banks per call:
//!
//! 1. normalize the raw vector to active-high and debounce it as a whole;
//! 2. on commit, derive press/release edges per bank
//!    (`DOWN = (new ^ old) & new`, `UP = (new ^ old) & !new`);
//! 3. run one repeat timer and one long-press timer for the whole bank,
//!    anchored at the last commit;
//! 4. hand every registered button its bit of the result (self-sampled
//!    buttons poll their own source);
//! 5. drop the transient edge/repeat/long flags.

use heapless::Vec;

use super::{Button, ButtonId, ButtonStatus};
use crate::config::BANK_BITS;
use crate::debounce::{Debouncer, Policy};
use crate::error::{Error, Result};
use crate::timing::{HoldTimer, Millis, TimingConfig};

/// Per-bank flag vectors for one manager cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Banks<const B: usize> {
    current: [u8; B],
    down: [u8; B],
    up: [u8; B],
    repeat: [u8; B],
    long: [u8; B],
}

impl<const B: usize> Banks<B> {
    const fn new() -> Self {
        Self {
            current: [0; B],
            down: [0; B],
            up: [0; B],
            repeat: [0; B],
            long: [0; B],
        }
    }

    /// Status of logical input `pin`, `None` when it lies outside the banks.
    fn status(&self, pin: u8) -> Option<ButtonStatus> {
        let bank = usize::from(pin) / BANK_BITS;
        if bank >= B {
            return None;
        }
        let mask = 1u8 << (usize::from(pin) % BANK_BITS);
        let flags = [
            (self.current[bank], ButtonStatus::CURRENT),
            (self.down[bank], ButtonStatus::DOWN),
            (self.up[bank], ButtonStatus::UP),
            (self.repeat[bank], ButtonStatus::REPEAT),
            (self.long[bank], ButtonStatus::LONG),
        ];
        Some(
            flags
                .into_iter()
                .filter(|(bits, _)| bits & mask != 0)
                .fold(ButtonStatus::empty(), |status, (_, flag)| status | flag),
        )
    }

    fn clear_transients(&mut self) {
        self.down = [0; B];
        self.up = [0; B];
        self.repeat = [0; B];
        self.long = [0; B];
    }
}

/// Registry and scanner for up to `N` buttons over `BANKS` 8-bit banks.
pub struct ButtonManager<'a, const N: usize, const BANKS: usize> {
    buttons: Vec<Button<'a>, N>,
    timing: TimingConfig,
    polarity: [u8; BANKS],
    filter: Debouncer<[u8; BANKS]>,
    banks: Banks<BANKS>,
    long_mask: [u8; BANKS],
    hold: HoldTimer,
    cursor: usize,
}

impl<'a, const N: usize, const BANKS: usize> ButtonManager<'a, N, BANKS> {
    pub const fn new(timing: TimingConfig) -> Self {
        Self {
            buttons: Vec::new(),
            timing,
            polarity: [0; BANKS],
            filter: Debouncer::new([0; BANKS], timing.debounce_ms(), Policy::Holder),
            banks: Banks::new(),
            long_mask: [0; BANKS],
            hold: HoldTimer::new(),
            cursor: 0,
        }
    }

    /// Raw lines read low when pressed (pull-up wiring) on every bank.
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.polarity = [if active_low { 0xFF } else { 0x00 }; BANKS];
        self
    }

    /// Per-bit inversion mask: a set bit means that line is active-low.
    pub fn polarity(mut self, mask: [u8; BANKS]) -> Self {
        self.polarity = mask;
        self
    }

    /// Debounce policy for the bank vector.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.filter = Debouncer::new(self.filter.status(), self.timing.debounce_ms(), policy);
        self
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: TimingConfig) {
        self.timing = timing;
        self.filter.set_window(timing.debounce_ms());
    }

    /// Append a button. Fails with [`Error::RegistryFull`] once `N`
    /// buttons are registered.
    pub fn register(&mut self, mut button: Button<'a>) -> Result<ButtonId> {
        let index = self.buttons.len();
        if index >= N || index > usize::from(u8::MAX) {
            warn!("button registry full ({} slots)", N);
            return Err(Error::RegistryFull);
        }
        let id = ButtonId(index as u8);
        button.assign(id);
        button.rearm();
        self.buttons.push(button).map_err(|_| Error::RegistryFull)?;
        debug!("button {} registered", index);
        Ok(id)
    }

    /// Adopt `raw` as the starting state without debouncing and report
    /// each button's startup position through `init_state`.
    pub fn init_buttons(&mut self, raw: &[u8], analog: &[u8], now: Millis) {
        let sample = self.normalize(raw);
        self.filter.reset(sample);
        self.banks = Banks::new();
        self.banks.current = sample;
        self.long_mask = [0; BANKS];
        self.hold.restart(now);

        for button in self.buttons.iter_mut() {
            match button.bank_pin() {
                Some(pin) => {
                    if let Some(status) = self.banks.status(pin) {
                        button.init_state(status, now);
                    }
                }
                None => {
                    button.rearm();
                    button.poll(analog, now);
                }
            }
        }
    }

    /// One manager cycle. `raw` holds one byte per bank; missing banks keep
    /// their previous state. `analog` holds one byte sample per channel.
    pub fn check_buttons(&mut self, raw: &[u8], analog: &[u8], now: Millis) {
        let sample = self.normalize(raw);
        let committed = self.filter.update(sample, now);
        if committed != self.banks.current {
            self.commit(committed, now);
        }
        self.tick_timers(now);
        self.dispatch(analog, now);
        self.banks.clear_transients();
    }

    fn normalize(&self, raw: &[u8]) -> [u8; BANKS] {
        let mut sample = self.banks.current;
        for (bank, byte) in raw.iter().take(BANKS).enumerate() {
            sample[bank] = byte ^ self.polarity[bank];
        }
        sample
    }

    fn commit(&mut self, new: [u8; BANKS], now: Millis) {
        for bank in 0..BANKS {
            let old = self.banks.current[bank];
            let changed = new[bank] ^ old;
            self.banks.down[bank] = changed & new[bank];
            self.banks.up[bank] = changed & !new[bank];
            self.long_mask[bank] &= new[bank];
        }
        self.banks.current = new;
        self.hold.restart(now);
        trace!("bank commit at {} ms", now);
    }

    fn tick_timers(&mut self, now: Millis) {
        if self.banks.current.iter().all(|&bank| bank == 0) {
            return;
        }
        if self.hold.repeat_due(&self.timing, now) {
            self.banks.repeat = self.banks.current;
        }
        if self.hold.long_due(&self.timing, now) {
            for bank in 0..BANKS {
                let fresh = self.banks.current[bank] & !self.long_mask[bank];
                self.banks.long[bank] = fresh;
                self.long_mask[bank] |= fresh;
            }
        }
    }

    fn dispatch(&mut self, analog: &[u8], now: Millis) {
        for button in self.buttons.iter_mut() {
            let Some(pin) = button.bank_pin() else {
                button.poll(analog, now);
                continue;
            };
            let Some(status) = self.banks.status(pin) else {
                continue;
            };
            if button.is_initialized() {
                button.check(status, now);
            } else {
                button.init_state(status, now);
            }
        }
    }

    /// Debounced active-high state of bank `bank`, 0 when out of range.
    pub fn current(&self, bank: usize) -> u8 {
        self.banks.current.get(bank).copied().unwrap_or(0)
    }

    /// Debounced state of logical input `index` (`8 * bank + bit`).
    pub fn is_active(&self, index: usize) -> bool {
        self.current(index / BANK_BITS) & (1 << (index % BANK_BITS)) != 0
    }

    pub fn get(&self, id: ButtonId) -> Option<&Button<'a>> {
        self.buttons.get(id.index())
    }

    pub fn get_mut(&mut self, id: ButtonId) -> Option<&mut Button<'a>> {
        self.buttons.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Button<'a>> {
        self.buttons.iter()
    }

    /// Round-robin cursor over the registry.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&mut Button<'a>> {
        let len = self.buttons.len();
        if len == 0 {
            return None;
        }
        let index = self.cursor % len;
        self.cursor = (index + 1) % len;
        self.buttons.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}
