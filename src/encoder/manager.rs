//! Encoder registry.

use heapless::Vec;

use super::decoder::EncoderDecoder;
use super::managed::{EncoderId, Feed, ManagedEncoder};
use crate::error::{Error, Result};

/// Fixed-capacity, append-only registry of managed encoders.
pub struct EncoderManager<'a, const N: usize> {
    encoders: Vec<ManagedEncoder<'a>, N>,
    cursor: usize,
}

impl<'a, const N: usize> EncoderManager<'a, N> {
    pub const fn new() -> Self {
        Self {
            encoders: Vec::new(),
            cursor: 0,
        }
    }

    /// Append an encoder. Fails with [`Error::RegistryFull`] once `N`
    /// encoders are registered.
    pub fn register(&mut self, mut encoder: ManagedEncoder<'a>) -> Result<EncoderId> {
        let index = self.encoders.len();
        if index >= N || index > usize::from(u8::MAX) {
            warn!("encoder registry full ({} slots)", N);
            return Err(Error::RegistryFull);
        }
        let id = EncoderId(index as u8);
        encoder.assign(id);
        self.encoders.push(encoder).map_err(|_| Error::RegistryFull)?;
        debug!("encoder {} registered", index);
        Ok(id)
    }

    /// Feed every registered encoder from `decoder`.
    pub fn dispatch(&mut self, decoder: &mut EncoderDecoder) {
        for encoder in self.encoders.iter_mut() {
            let slot = usize::from(encoder.slot());
            let mode = decoder.mode(slot);
            match encoder.feed_kind() {
                Feed::Counts => {
                    let count = decoder.position(slot);
                    encoder.check_cnt(count, mode);
                }
                Feed::Transitions => {
                    let (pulses, fast) = decoder.take_transitions(slot);
                    encoder.check_trn(pulses, fast, mode);
                }
            }
        }
    }

    pub fn get(&self, id: EncoderId) -> Option<&ManagedEncoder<'a>> {
        self.encoders.get(id.index())
    }

    pub fn get_mut(&mut self, id: EncoderId) -> Option<&mut ManagedEncoder<'a>> {
        self.encoders.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedEncoder<'a>> {
        self.encoders.iter()
    }

    /// Round-robin cursor over the registry.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&mut ManagedEncoder<'a>> {
        let len = self.encoders.len();
        if len == 0 {
            return None;
        }
        let index = self.cursor % len;
        self.cursor = (index + 1) % len;
        self.encoders.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for EncoderManager<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}
