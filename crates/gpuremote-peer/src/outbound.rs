use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use gpuremote_frame::{stream_label, FrameWriter, StreamId, CONTROL};
use gpuremote_transport::IpcStream;
use gpuremote_wire::{encode_message, Message};
use tracing::{debug, trace};

use crate::control::ControlMessage;
use crate::error::{PeerError, Result};

/// Write half of a session, shared by every thread that sends.
///
/// Each frame is written whole while the lock is held, so frames from
/// different threads never interleave and frames from one thread keep their
/// order.
#[derive(Clone)]
pub struct Outbound {
    writer: Arc<Mutex<FrameWriter<IpcStream>>>,
    closed: Arc<AtomicBool>,
}

impl Outbound {
    pub fn new(writer: FrameWriter<IpcStream>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn send(&self, stream: StreamId, message: &Message) -> Result<()> {
        let payload = encode_message(message);
        trace!(
            stream = %stream_label(stream),
            message = message.name(),
            bytes = payload.len(),
            "send"
        );
        self.send_raw(stream, &payload)
    }

    pub fn send_control(&self, message: &ControlMessage) -> Result<()> {
        debug!(msg_type = %message.msg_type, "send control");
        self.send_raw(CONTROL, &message.to_json()?)
    }

    /// Write an already-encoded payload.
    pub fn send_raw(&self, stream: StreamId, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(PeerError::Disconnected("session closed".to_string()));
        }
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.send(stream, payload)?;
        Ok(())
    }

    /// Shut the socket down in both directions. Readers blocked on any clone
    /// of the socket wake with EOF. Later sends fail with `Disconnected`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.get_ref().shutdown()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use gpuremote_frame::FrameReader;
    use gpuremote_wire::{decode_message, Command, GpuOp};

    use super::*;

    fn sync() -> Message {
        Message::Post(Command::Gpu(GpuOp::Synchronize))
    }

    #[test]
    fn concurrent_senders_never_interleave_frames() {
        let (left, right) = IpcStream::pair().unwrap();
        let outbound = Outbound::new(FrameWriter::new(left));

        let senders: Vec<_> = (1..=4u16)
            .map(|stream| {
                let outbound = outbound.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        outbound.send(stream, &sync()).unwrap();
                    }
                })
            })
            .collect();

        let mut reader = FrameReader::new(right);
        let mut counts = [0usize; 5];
        for _ in 0..200 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(decode_message(&frame.payload).unwrap(), sync());
            counts[frame.stream as usize] += 1;
        }
        for sender in senders {
            sender.join().unwrap();
        }
        assert_eq!(counts, [0, 50, 50, 50, 50]);
    }

    #[test]
    fn close_rejects_later_sends() {
        let (left, _right) = IpcStream::pair().unwrap();
        let outbound = Outbound::new(FrameWriter::new(left));
        outbound.close().unwrap();
        outbound.close().unwrap();
        assert!(matches!(
            outbound.send(1, &sync()),
            Err(PeerError::Disconnected(_))
        ));
    }
}
