use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use gpuremote_transport::IpcStream;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::stream::StreamId;

/// Writes whole frames to a byte stream.
///
/// Each call to [`FrameWriter::send`] writes exactly one frame; callers that
/// share a writer across threads must serialize calls (the session layer keeps
/// it behind a mutex) so frames never interleave.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            config,
        }
    }

    /// Frame `payload` for `stream`, write it completely and flush.
    pub fn send(&mut self, stream: StreamId, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(stream, payload, &mut self.buf)?;

        let mut written = 0;
        while written < self.buf.len() {
            match self.inner.write(&self.buf[written..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<IpcStream> {
    /// Wrap an [`IpcStream`], applying the configured write timeout to the socket.
    pub fn for_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }

    pub fn reconfigure(&mut self, config: FrameConfig) -> Result<()> {
        self.inner.set_write_timeout(config.write_timeout)?;
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{decode_frame, Frame};
    use crate::reader::FrameReader;

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Accepts at most three bytes per call, interrupting every other call.
    #[derive(Default)]
    struct Choppy {
        data: Vec<u8>,
        calls: usize,
        flushed: bool,
    }

    impl Write for Choppy {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn written_frame_decodes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(7, b"draw").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame, Frame::new(7, &b"draw"[..]));
    }

    #[test]
    fn short_and_interrupted_writes_complete_the_frame() {
        let mut writer = FrameWriter::new(Choppy::default());
        writer.send(2, b"set-viewport").unwrap();

        let inner = writer.into_inner();
        assert!(inner.flushed);
        let mut reader = FrameReader::new(Cursor::new(inner.data));
        assert_eq!(reader.read_frame().unwrap(), Frame::new(2, &b"set-viewport"[..]));
    }

    #[test]
    fn oversized_payload_is_not_written() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);
        assert!(matches!(
            writer.send(1, b"oversized"),
            Err(FrameError::PayloadTooLarge { .. })
        ));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        assert!(matches!(writer.send(1, b"x"), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn frames_cross_a_socket_pair() {
        let (left, right) = IpcStream::pair().unwrap();
        let mut writer = FrameWriter::for_ipc(left, FrameConfig::default()).unwrap();
        let mut reader = FrameReader::for_ipc(right, FrameConfig::default()).unwrap();

        for i in 0..32u16 {
            writer.send(i % 3 + 1, format!("op-{i}").as_bytes()).unwrap();
        }
        for i in 0..32u16 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.stream, i % 3 + 1);
            assert_eq!(frame.payload.as_ref(), format!("op-{i}").as_bytes());
        }
    }
}
