//! Digital input event engine for embedded control panels.
//!
//! Turns raw, bouncing digital inputs into clean events:
//!
//! - [`debounce`]: holder, delayer and blanker filters over a bit vector;
//! - [`button`]: the per-button state machine and the bank
//!   [`ButtonManager`] (press, release, auto-repeat, long press);
//! - [`encoder`]: quadrature decoding with acceleration, debounced push
//!   switches with long press and modes, and callback dispatch.
//!
//! The library is `no_std` and allocation-free. All state lives in
//! fixed-capacity `heapless` containers and the caller drives everything
//! by calling the poll functions with a millisecond timestamp.
//!
//! Usage: `cargo test` runs the engine tests on the host.
//!
//! Note: The embedded demo firmware is `src/main.rs`, built with
//! `--features embedded` for the nRF52840.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod button;
pub mod config;
pub mod debounce;
pub mod encoder;
pub mod error;
pub mod io;
pub mod timing;

pub use button::{Button, ButtonId, ButtonManager, ButtonRef, ButtonStatus, InputSource};
pub use debounce::{Debouncer, Policy};
pub use encoder::{
    AccelConfig, EncoderDecoder, EncoderId, EncoderManager, EncoderRef, Feed, ManagedEncoder,
};
pub use error::{Error, Result};
pub use io::{BitMirror, RawLine, StateSink, StateSource};
pub use timing::{Millis, TimingConfig};
