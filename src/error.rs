//! Error type for the input engine.
//!
//! We avoid `alloc` - the error is a plain `Copy` enum. Only registration
//! can fail; out-of-range pins, channels and encoder slots are silent
//! no-ops, and inconsistent configuration disables the feature instead.

use core::fmt;

/// Errors surfaced by the registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The registry already holds its maximum number of entries.
    RegistryFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RegistryFull => f.write_str("registry full"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
