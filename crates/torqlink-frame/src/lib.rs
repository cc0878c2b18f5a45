//! ASCII length-prefixed framing for the Open Protocol wire format.
//!
//! Every message on the wire is text: a 4-digit decimal total length
//! (counting itself), then a 16-byte header (MID, revision, no-ack flag,
//! station, spindle, spare), then the payload. This crate owns:
//! - Incremental decoding from an append-only buffer, with one-byte
//!   resynchronization on corrupt input
//! - NUL stripping (simulators and some controller firmware emit stray NULs)
//! - Frame encoding with a computed length prefix
//!
//! Corruption never tears the connection down: a bad length prefix is
//! reported as a [`FrameDefect`] value and the decoder skips one byte.

pub mod codec;
pub mod error;

pub use codec::{
    decode_step, encode_frame, encode_frame_raw, extend_stripped, Decoded, DefectKind, Frame,
    FrameDefect, HEADER_SIZE, MAX_FRAME_LEN, MIN_FRAME_LEN, PAYLOAD_OFFSET,
};
pub use error::{FrameError, Result};
