use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::stream::StreamId;

/// magic (2) + length (4) + stream (2).
pub const HEADER_SIZE: usize = 8;

/// "GR".
pub const MAGIC: [u8; 2] = [0x47, 0x52];

/// 16 MiB; texture uploads are the largest payloads in practice.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One framed message routed to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub stream: StreamId,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(stream: StreamId, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }

    /// Header plus payload.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Append one frame to `dst`.
///
/// ```text
/// ┌────────────┬─────────────┬─────────────┬──────────────────┐
/// │ "GR" (2B)  │ length (4B) │ stream (2B) │ payload          │
/// │            │ LE          │ LE          │ (length bytes)   │
/// └────────────┴─────────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_frame(stream: StreamId, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_u16_le(stream);
    dst.put_slice(payload);
    Ok(())
}

/// Take one complete frame off the front of `src`.
///
/// Returns `Ok(None)` while the buffer holds less than a full frame; nothing is
/// consumed in that case. The length is checked against `max_payload` as soon
/// as the header is available, before waiting for the body.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }
    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let payload_len = header.get_u32_le() as usize;
    let stream = header.get_u16_le();

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(Frame { stream, payload }))
}

/// Frame-level limits and socket timeouts.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Default: [`DEFAULT_MAX_PAYLOAD`].
    pub max_payload_size: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode() {
        let mut buf = BytesMut::new();
        encode_frame(3, b"write-buffer", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 12);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame, Frame::new(3, &b"write-buffer"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_header_waits() {
        let mut buf = BytesMut::from(&MAGIC[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), 2, "nothing consumed");
    }

    #[test]
    fn partial_payload_waits() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"submit", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 3);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 3);
    }

    #[test]
    fn bad_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0, 0, 0, 0, 1, 0][..]);
        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::InvalidMagic)
        ));
    }

    #[test]
    fn oversized_length_rejected_before_body_arrives() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(64);
        buf.put_u16_le(1);
        assert!(matches!(
            decode_frame(&mut buf, 32),
            Err(FrameError::PayloadTooLarge { size: 64, max: 32 })
        ));
    }

    #[test]
    fn back_to_back_frames_keep_order() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"first", &mut buf).unwrap();
        encode_frame(2, b"", &mut buf).unwrap();
        encode_frame(1, b"third", &mut buf).unwrap();

        let streams: Vec<_> = std::iter::from_fn(|| decode_frame(&mut buf, 1024).unwrap())
            .map(|f| (f.stream, f.payload))
            .collect();
        assert_eq!(
            streams,
            vec![
                (1, Bytes::from_static(b"first")),
                (2, Bytes::new()),
                (1, Bytes::from_static(b"third")),
            ]
        );
    }
}
