#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

//! Wire-level building blocks for talking to a MythTV-compatible backend:
//! length-prefixed framing, the `[]:[]` field codec, protocol version
//! negotiation and the timestamp format used throughout the protocol.
//!
//! Nothing in this crate knows what a recording or a channel is — that
//! lives in `myth-client`, built on top of these primitives.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod frame;
pub mod logging;
pub mod select;
pub mod timestamp;
pub mod transport;
pub mod version;

pub use error::{Error, Result};
