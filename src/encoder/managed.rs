//! Per-encoder callback object.

use crate::config::{DEFAULT_FAST_MULTIPLIER, MAX_SYNTHESIZED_PULSES};

/// Registry slot of a managed encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderId(pub(crate) u8);

impl EncoderId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Snapshot handed to encoder callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderRef {
    pub id: Option<EncoderId>,
    pub tag: u16,
    /// Decoder slot the encoder reads from.
    pub slot: u8,
    pub count: i32,
    pub mode: u8,
    /// Count change that produced this callback.
    pub delta: i32,
}

pub type EncoderCallback<'a> = &'a dyn Fn(EncoderRef);

/// Which decoder output a managed encoder consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    /// Absolute position, via [`ManagedEncoder::check_cnt`].
    Counts,
    /// Unit and fast transitions, via [`ManagedEncoder::check_trn`].
    #[default]
    Transitions,
}

/// Dispatches decoder results for one encoder slot to callbacks.
pub struct ManagedEncoder<'a> {
    id: Option<EncoderId>,
    slot: u8,
    tag: u16,
    feed: Feed,
    synthesize: bool,
    fast_multiplier: i16,
    count: i32,
    last_count: i32,
    mode: u8,
    last_mode: u8,
    last_delta: i32,
    on_up: Option<EncoderCallback<'a>>,
    on_dn: Option<EncoderCallback<'a>>,
    on_fast_up: Option<EncoderCallback<'a>>,
    on_fast_dn: Option<EncoderCallback<'a>>,
    on_change: Option<EncoderCallback<'a>>,
    on_mode_change: Option<EncoderCallback<'a>>,
}

impl<'a> ManagedEncoder<'a> {
    /// Encoder reading decoder slot `slot`.
    pub fn new(slot: u8) -> Self {
        Self {
            id: None,
            slot,
            tag: u16::from(slot),
            feed: Feed::default(),
            synthesize: false,
            fast_multiplier: DEFAULT_FAST_MULTIPLIER,
            count: 0,
            last_count: 0,
            mode: 0,
            last_mode: 0,
            last_delta: 0,
            on_up: None,
            on_dn: None,
            on_fast_up: None,
            on_fast_dn: None,
            on_change: None,
            on_mode_change: None,
        }
    }

    pub fn tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    pub fn feed(mut self, feed: Feed) -> Self {
        self.feed = feed;
        self
    }

    /// In [`Feed::Counts`] mode, fire `on_up`/`on_dn` once per unit of
    /// count change, at most [`MAX_SYNTHESIZED_PULSES`] times per check.
    /// Preset the count with [`initial_count`](Self::initial_count) to
    /// match the decoder, or the first check sees the whole difference.
    pub fn synthesize_pulses(mut self, enabled: bool) -> Self {
        self.synthesize = enabled;
        self
    }

    /// Count added per fast transition.
    pub fn fast_multiplier(mut self, multiplier: i16) -> Self {
        self.fast_multiplier = multiplier;
        self
    }

    /// Start from `count` instead of 0.
    pub fn initial_count(mut self, count: i32) -> Self {
        self.count = count;
        self.last_count = count;
        self
    }

    pub fn on_up(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_up = Some(callback);
        self
    }

    pub fn on_dn(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_dn = Some(callback);
        self
    }

    /// Fast transitions up. Falls back to `on_up` when unset.
    pub fn on_fast_up(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_fast_up = Some(callback);
        self
    }

    /// Fast transitions down. Falls back to `on_dn` when unset.
    pub fn on_fast_dn(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_fast_dn = Some(callback);
        self
    }

    pub fn on_change(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_change = Some(callback);
        self
    }

    pub fn on_mode_change(mut self, callback: EncoderCallback<'a>) -> Self {
        self.on_mode_change = Some(callback);
        self
    }

    pub fn id(&self) -> Option<EncoderId> {
        self.id
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn tag_value(&self) -> u16 {
        self.tag
    }

    pub fn feed_kind(&self) -> Feed {
        self.feed
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub(crate) fn assign(&mut self, id: EncoderId) {
        self.id = Some(id);
    }

    pub fn snapshot(&self) -> EncoderRef {
        EncoderRef {
            id: self.id,
            tag: self.tag,
            slot: self.slot,
            count: self.count,
            mode: self.mode,
            delta: self.last_delta,
        }
    }

    /// Consume an absolute position and mode.
    pub fn check_cnt(&mut self, count: i32, mode: u8) {
        if count != self.last_count {
            let delta = count.wrapping_sub(self.last_count);
            self.count = count;
            self.last_count = count;
            self.last_delta = delta;
            self.fire(self.on_change);
            if self.synthesize {
                let callback = if delta > 0 { self.on_up } else { self.on_dn };
                self.fire_n(callback, delta.unsigned_abs().min(MAX_SYNTHESIZED_PULSES));
            }
        }
        self.check_mode(mode);
    }

    /// Consume unit and fast transitions and the current mode.
    pub fn check_trn(&mut self, pulses: i8, fast_pulses: i8, mode: u8) {
        let delta = i32::from(pulses)
            .wrapping_add(i32::from(fast_pulses).wrapping_mul(i32::from(self.fast_multiplier)));
        if delta != 0 {
            self.count = self.count.wrapping_add(delta);
            self.last_delta = delta;
        }

        let unit = if pulses > 0 { self.on_up } else { self.on_dn };
        self.fire_n(unit, u32::from(pulses.unsigned_abs()));

        let fast = if fast_pulses > 0 {
            self.on_fast_up.or(self.on_up)
        } else {
            self.on_fast_dn.or(self.on_dn)
        };
        self.fire_n(fast, u32::from(fast_pulses.unsigned_abs()));

        if self.count != self.last_count {
            self.last_count = self.count;
            self.fire(self.on_change);
        }
        self.check_mode(mode);
    }

    fn check_mode(&mut self, mode: u8) {
        if mode != self.last_mode {
            self.mode = mode;
            self.last_mode = mode;
            self.fire(self.on_mode_change);
        }
    }

    fn fire(&self, callback: Option<EncoderCallback<'a>>) {
        if let Some(callback) = callback {
            callback(self.snapshot());
        }
    }

    fn fire_n(&self, callback: Option<EncoderCallback<'a>>, times: u32) {
        if let Some(callback) = callback {
            for _ in 0..times {
                callback(self.snapshot());
            }
        }
    }
}
