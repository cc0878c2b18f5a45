use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Header size including the 4-byte length prefix.
pub const HEADER_SIZE: usize = 20;

/// Minimum total frame length (a bare header).
pub const MIN_FRAME_LEN: usize = 20;

/// Maximum total frame length representable in the 4-digit length field.
pub const MAX_FRAME_LEN: usize = 9999;

/// Payload offset into the body (the frame after the length prefix).
pub const PAYLOAD_OFFSET: usize = 16;

/// A decoded Open Protocol frame.
///
/// Header fields are parsed leniently: revision, station, and spindle are
/// zero when the controller sends spaces or garbage there, which several
/// firmwares do for fields they consider irrelevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message identifier (0001..9999).
    pub mid: u16,
    /// Header revision field.
    pub revision: u16,
    /// `true` when the sender asked for no acknowledgement.
    pub no_ack: bool,
    /// Station number.
    pub station: u8,
    /// Spindle number. Carries the result spindle for MID 0061 revision 1.
    pub spindle: u8,
    /// Payload bytes (body from offset 16).
    pub payload: Bytes,
}

/// What went wrong with the stream at the current decode position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    /// The 4-byte length prefix is not all ASCII digits.
    InvalidLength,
    /// The length parsed but is outside [20, 9999].
    LengthOutOfRange,
}

/// A localized stream defect. The decoder has already skipped one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameDefect {
    pub kind: DefectKind,
    /// The byte that was skipped to resynchronize.
    pub skipped: u8,
}

/// Outcome of one decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A complete frame was consumed from the buffer.
    Frame(Frame),
    /// The stream is corrupt at the head; one byte was consumed.
    Defect(FrameDefect),
    /// A frame with a valid length envelope whose MID field is not
    /// numeric. The whole frame was consumed; this is a payload-level
    /// failure, not stream corruption, so no resynchronization happens.
    GarbledMid { mid: [u8; 4] },
    /// Not enough buffered bytes for a complete frame.
    Incomplete,
}

/// Append received bytes to the decode buffer, dropping embedded NULs.
pub fn extend_stripped(dst: &mut BytesMut, src: &[u8]) {
    if src.contains(&0) {
        dst.extend(src.iter().filter(|&&b| b != 0));
    } else {
        dst.extend_from_slice(src);
    }
}

/// Attempt to decode one frame from the front of `src`.
///
/// On [`Decoded::Defect`] exactly one byte has been consumed; on
/// [`Decoded::GarbledMid`] the frame's full declared length has been.
/// Callers loop until [`Decoded::Incomplete`].
pub fn decode_step(src: &mut BytesMut) -> Decoded {
    if src.len() < 4 {
        return Decoded::Incomplete;
    }

    if !src[..4].iter().all(u8::is_ascii_digit) {
        return skip_one(src, DefectKind::InvalidLength);
    }

    let total = ascii_to_usize(&src[..4]);
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total) {
        return skip_one(src, DefectKind::LengthOutOfRange);
    }

    if src.len() < total {
        return Decoded::Incomplete;
    }

    // The length envelope is trusted from here on: whatever happens to
    // the header fields, exactly `total` bytes get consumed.
    let body_start = 4;
    let mid_bytes = &src[body_start..body_start + 4];
    if !mid_bytes.iter().all(u8::is_ascii_digit) {
        let mid = [src[4], src[5], src[6], src[7]];
        src.advance(total);
        return Decoded::GarbledMid { mid };
    }
    let mid = ascii_to_usize(mid_bytes) as u16;

    let body = &src[body_start..total];
    let revision = lenient_number(&body[4..7]) as u16;
    let no_ack = body[7] == b'1';
    let station = lenient_number(&body[8..10]) as u8;
    let spindle = lenient_number(&body[10..12]) as u8;

    let payload = Bytes::copy_from_slice(&body[PAYLOAD_OFFSET..]);
    src.advance(total);

    Decoded::Frame(Frame {
        mid,
        revision,
        no_ack,
        station,
        spindle,
        payload,
    })
}

/// Encode a frame with default header fields (revision 001, station 01,
/// spindle 01).
pub fn encode_frame(mid: u16, payload: &[u8], expect_ack: bool, dst: &mut BytesMut) -> Result<()> {
    encode_frame_raw(mid, 1, !expect_ack, 1, 1, payload, dst)
}

/// Encode a frame with explicit header fields.
///
/// Useful for simulators and tests that stand in for a controller.
pub fn encode_frame_raw(
    mid: u16,
    revision: u16,
    no_ack: bool,
    station: u8,
    spindle: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let total = HEADER_SIZE + payload.len();
    if total > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: MAX_FRAME_LEN,
        });
    }

    dst.reserve(total);
    put_padded(dst, total as u32, 4);
    put_padded(dst, u32::from(mid), 4);
    put_padded(dst, u32::from(revision), 3);
    dst.put_u8(if no_ack { b'1' } else { b'0' });
    put_padded(dst, u32::from(station), 2);
    put_padded(dst, u32::from(spindle), 2);
    dst.put_slice(b"    ");
    dst.put_slice(payload);
    Ok(())
}

fn skip_one(src: &mut BytesMut, kind: DefectKind) -> Decoded {
    let skipped = src[0];
    src.advance(1);
    Decoded::Defect(FrameDefect { kind, skipped })
}

fn ascii_to_usize(digits: &[u8]) -> usize {
    digits
        .iter()
        .fold(0usize, |acc, &b| acc * 10 + usize::from(b - b'0'))
}

/// Parse a zero-padded decimal field, treating spaces and garbage as zero.
fn lenient_number(field: &[u8]) -> u32 {
    let mut value = 0u32;
    for &b in field {
        if b.is_ascii_digit() {
            value = value * 10 + u32::from(b - b'0');
        } else if b != b' ' {
            return 0;
        }
    }
    value
}

fn put_padded(dst: &mut BytesMut, value: u32, width: usize) {
    let text = format!("{value:0width$}");
    debug_assert_eq!(text.len(), width);
    dst.put_slice(text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(wire: &[u8]) -> (Vec<Frame>, Vec<FrameDefect>) {
        let mut buf = BytesMut::new();
        extend_stripped(&mut buf, wire);
        let mut frames = Vec::new();
        let mut defects = Vec::new();
        loop {
            match decode_step(&mut buf) {
                Decoded::Frame(frame) => frames.push(frame),
                Decoded::Defect(defect) => defects.push(defect),
                Decoded::GarbledMid { .. } => {}
                Decoded::Incomplete => break,
            }
        }
        (frames, defects)
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut wire = BytesMut::new();
        encode_frame(61, b"0000012345", true, &mut wire).unwrap();

        assert_eq!(&wire[..4], b"0030");
        assert_eq!(&wire[4..8], b"0061");
        assert_eq!(wire[11], b'0'); // expect_ack => ack byte '0'

        let (frames, defects) = decode_all(&wire);
        assert!(defects.is_empty());
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.mid, 61);
        assert_eq!(frame.revision, 1);
        assert!(!frame.no_ack);
        assert_eq!(frame.station, 1);
        assert_eq!(frame.spindle, 1);
        assert_eq!(frame.payload.as_ref(), b"0000012345");
    }

    #[test]
    fn no_ack_flag_polarity() {
        let mut wire = BytesMut::new();
        encode_frame(9999, b"", false, &mut wire).unwrap();
        assert_eq!(wire[11], b'1');

        let (frames, _) = decode_all(&wire);
        assert!(frames[0].no_ack);
    }

    #[test]
    fn header_fields_roundtrip() {
        let mut wire = BytesMut::new();
        encode_frame_raw(61, 2, true, 3, 7, b"xyz", &mut wire).unwrap();

        let (frames, _) = decode_all(&wire);
        let frame = &frames[0];
        assert_eq!(frame.mid, 61);
        assert_eq!(frame.revision, 2);
        assert!(frame.no_ack);
        assert_eq!(frame.station, 3);
        assert_eq!(frame.spindle, 7);
        assert_eq!(frame.payload.as_ref(), b"xyz");
    }

    #[test]
    fn bare_header_frame() {
        let mut wire = BytesMut::new();
        encode_frame(42, b"", true, &mut wire).unwrap();
        assert_eq!(wire.len(), MIN_FRAME_LEN);

        let (frames, _) = decode_all(&wire);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn incomplete_frame_waits() {
        let mut wire = BytesMut::new();
        encode_frame(61, b"payload", true, &mut wire).unwrap();
        wire.truncate(wire.len() - 3);

        let mut buf = BytesMut::from(&wire[..]);
        assert_eq!(decode_step(&mut buf), Decoded::Incomplete);
        // The truncated bytes are still buffered for the next read.
        assert_eq!(buf.len(), wire.len());
    }

    #[test]
    fn garbage_prefix_resyncs_one_byte_at_a_time() {
        let garbage = b"ab!";
        let mut wire = BytesMut::new();
        wire.extend_from_slice(garbage);
        encode_frame(5, b"0018", true, &mut wire).unwrap();

        let (frames, defects) = decode_all(&wire);
        assert_eq!(defects.len(), garbage.len());
        assert!(defects
            .iter()
            .all(|d| d.kind == DefectKind::InvalidLength));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].mid, 5);
    }

    #[test]
    fn length_out_of_range_resyncs() {
        // "0004" parses but is below the 20-byte minimum.
        let mut buf = BytesMut::from(&b"0004rest"[..]);
        let step = decode_step(&mut buf);
        assert!(matches!(
            step,
            Decoded::Defect(FrameDefect {
                kind: DefectKind::LengthOutOfRange,
                skipped: b'0',
            })
        ));
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn garbled_mid_consumes_whole_frame() {
        let mut wire = BytesMut::new();
        encode_frame(61, b"payload", true, &mut wire).unwrap();
        wire[4..8].copy_from_slice(b"00x1");

        let mut buf = BytesMut::from(&wire[..]);
        let step = decode_step(&mut buf);
        assert_eq!(step, Decoded::GarbledMid { mid: *b"00x1" });
        // The length envelope was honored: nothing left to resync over.
        assert!(buf.is_empty());
    }

    #[test]
    fn garbled_mid_does_not_eat_into_next_frame() {
        let mut wire = BytesMut::new();
        encode_frame(61, b"payload", true, &mut wire).unwrap();
        wire[4..8].copy_from_slice(b"00x1");
        encode_frame(5, b"0018", true, &mut wire).unwrap();

        let mut buf = BytesMut::new();
        extend_stripped(&mut buf, &wire);
        assert!(matches!(
            decode_step(&mut buf),
            Decoded::GarbledMid { .. }
        ));
        let Decoded::Frame(frame) = decode_step(&mut buf) else {
            panic!("expected the next frame to decode cleanly");
        };
        assert_eq!(frame.mid, 5);
        assert_eq!(frame.payload.as_ref(), b"0018");
    }

    #[test]
    fn nul_bytes_stripped_on_append() {
        let mut wire = BytesMut::new();
        encode_frame(4, b"00180077err", true, &mut wire).unwrap();
        let mut salted = Vec::new();
        for &b in wire.iter() {
            salted.push(0);
            salted.push(b);
        }

        let (frames, defects) = decode_all(&salted);
        assert!(defects.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), b"00180077err");
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let mut wire = BytesMut::new();
        encode_frame(1, b"", true, &mut wire).unwrap();
        encode_frame(60, b"", true, &mut wire).unwrap();
        encode_frame(9999, b"", false, &mut wire).unwrap();

        let (frames, _) = decode_all(&wire);
        let mids: Vec<u16> = frames.iter().map(|f| f.mid).collect();
        assert_eq!(mids, vec![1, 60, 9999]);
    }

    #[test]
    fn spaces_in_numeric_header_fields_parse_as_zero() {
        let mut wire = BytesMut::new();
        encode_frame(3, b"02", true, &mut wire).unwrap();
        wire[8..11].copy_from_slice(b"   "); // revision
        wire[12..14].copy_from_slice(b"  "); // station

        let (frames, _) = decode_all(&wire);
        assert_eq!(frames[0].revision, 0);
        assert_eq!(frames[0].station, 0);
    }

    #[test]
    fn oversized_payload_rejected_on_encode() {
        let payload = vec![b'0'; MAX_FRAME_LEN];
        let mut dst = BytesMut::new();
        let err = encode_frame(61, &payload, true, &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
