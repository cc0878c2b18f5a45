//! Typed Open Protocol messages.
//!
//! Maps wire frames to typed inbound messages and operator intents to
//! outbound frames. Payload layouts are fixed-width ASCII and, for the
//! tightening result MID 0061, revision-sensitive: revision 1, 2/3, and 4
//! carry the same measurement at different offsets and precisions.

pub mod decode;
pub mod encode;
mod fields;
pub mod mids;
pub mod types;

mod error;

pub use decode::{decode_inbound, Inbound};
pub use encode::Outbound;
pub use error::{MidError, Result};
pub use types::{Alarm, TighteningResult};
