//! Rotary encoders: a shared quadrature decoder and per-encoder callback
//! objects fed from it.
//!
//! ```text
//! lines (u32) --> EncoderDecoder --> EncoderManager --> ManagedEncoder callbacks
//!                 counts, masks,      dispatch()
//!                 switches, modes
//! ```

pub mod decoder;
pub mod managed;
pub mod manager;


pub use decoder::{next_mode, AccelConfig, EncoderDecoder};
pub use managed::{EncoderCallback, EncoderId, EncoderRef, Feed, ManagedEncoder};
pub use manager::EncoderManager;
