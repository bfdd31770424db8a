//! A client connection to the GPU host.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use gpuremote_frame::{is_command_stream, stream_label, FrameError, FrameReader, StreamId, CONTROL};
use gpuremote_peer::{
    establish_client, in_dispatch, next_session_key, CallbackTable, ControlMessage, Established,
    HandshakeResult, Outbound, ReplyTable, CONTROL_PONG, CONTROL_SHUTDOWN_ACK,
};
use gpuremote_transport::{GpuSocket, IpcStream};
use gpuremote_wire::kind::{Adapter, Device};
use gpuremote_wire::types::{DeviceDescriptor, RequestAdapterOptions};
use gpuremote_wire::{decode_message, Command, FaultReport, GpuOp, Identifier, Message, ReplyValue};
use tracing::{debug, info, warn};

use crate::authority::IdentifierAuthority;
use crate::config::ConnectionConfig;
use crate::error::{ClientError, Result};
use crate::proxy::Proxy;

/// A fault the host reported for a posted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFault {
    pub stream: StreamId,
    pub report: FaultReport,
}

/// State the reader thread shares with the connection.
struct Inbound {
    replies: ReplyTable,
    callbacks: CallbackTable,
    faults: Mutex<Vec<StreamFault>>,
}

struct Inner {
    session_key: u64,
    handshake: HandshakeResult,
    config: ConnectionConfig,
    authority: IdentifierAuthority,
    outbound: Outbound,
    inbound: Arc<Inbound>,
    control: Mutex<Receiver<ControlMessage>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    reader_thread: Option<ThreadId>,
}

impl Inner {
    fn join_reader(&self) {
        if self.reader_thread == Some(thread::current().id()) {
            return;
        }
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(session = %self.handshake.session_id, "client reader panicked");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.outbound.close();
        self.join_reader();
    }
}

/// A connection to the GPU host, shared by every proxy created through it.
///
/// Cloning is cheap and yields another handle to the same connection. The
/// connection closes when the last handle and the last proxy are dropped, or
/// on [`Connection::shutdown`]. Closing cancels every pending callback and
/// fails every waiting request with [`ClientError::Disconnected`].
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Connect to the host socket at `path`.
    pub fn connect(path: impl AsRef<Path>, config: ConnectionConfig) -> Result<Self> {
        let stream = GpuSocket::connect(path)?;
        Self::establish(stream, config)
    }

    /// Run the client handshake over an already-connected stream.
    pub fn establish(stream: IpcStream, config: ConnectionConfig) -> Result<Self> {
        let established = establish_client(stream, config.streams, &config.handshake, &config.frame)?;
        Self::from_established(established, config)
    }

    pub fn from_established(established: Established, config: ConnectionConfig) -> Result<Self> {
        let Established {
            reader,
            writer,
            handshake,
        } = established;
        let session_key = next_session_key();
        let outbound = Outbound::new(writer);
        let inbound = Arc::new(Inbound {
            replies: ReplyTable::new(),
            callbacks: CallbackTable::new(session_key),
            faults: Mutex::new(Vec::new()),
        });
        let (control_tx, control_rx) = mpsc::channel();

        let reader_inbound = Arc::clone(&inbound);
        let reader_outbound = outbound.clone();
        let streams = handshake.streams;
        let handle = thread::Builder::new()
            .name(format!("gpuremote-client-{}", handshake.session_id))
            .spawn(move || {
                read_loop(reader, streams, &reader_inbound, &reader_outbound, &control_tx);
            })
            .map_err(|err| ClientError::Disconnected(format!("failed to start reader: {err}")))?;
        let reader_thread = Some(handle.thread().id());

        Ok(Self {
            inner: Arc::new(Inner {
                session_key,
                handshake,
                config,
                authority: IdentifierAuthority::new(),
                outbound,
                inbound,
                control: Mutex::new(control_rx),
                reader: Mutex::new(Some(handle)),
                reader_thread,
            }),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.inner.handshake.session_id
    }

    /// Command streams `1..=streams()` are open.
    pub fn streams(&self) -> u16 {
        self.inner.handshake.streams
    }

    pub fn handshake(&self) -> &HandshakeResult {
        &self.inner.handshake
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.outbound.is_closed()
    }

    /// A fresh identifier for an object about to be created.
    pub fn generate_id(&self) -> Identifier {
        self.inner.authority.generate()
    }

    /// Callbacks registered and not yet fulfilled.
    pub fn pending_callbacks(&self) -> usize {
        self.inner.inbound.callbacks.pending()
    }

    pub(crate) fn callbacks(&self) -> &CallbackTable {
        &self.inner.inbound.callbacks
    }

    pub(crate) fn session_key(&self) -> u64 {
        self.inner.session_key
    }

    fn check_stream(&self, stream: StreamId) -> Result<()> {
        if is_command_stream(stream, self.streams()) {
            Ok(())
        } else {
            Err(ClientError::UnsupportedStream(stream))
        }
    }

    /// Send `command` without waiting for anything.
    ///
    /// Messages posted on one stream are dispatched by the host in the order
    /// they were posted. If the host cannot apply the command, it reports a
    /// fault that shows up in [`Connection::take_faults`].
    pub fn post(&self, stream: StreamId, command: Command) -> Result<()> {
        self.check_stream(stream)?;
        debug!(stream = %stream_label(stream), target = ?command.target(), operation = command.name(), "post");
        self.inner
            .outbound
            .send(stream, &Message::Post(command))
            .map_err(Into::into)
    }

    /// Send `command` and block until the host replies, for at most the
    /// configured reply timeout.
    ///
    /// A [`ClientError::Timeout`] means the outcome is unknown: the host may
    /// already have applied the operation. A late reply is discarded.
    pub fn request(&self, stream: StreamId, command: Command) -> Result<ReplyValue> {
        self.request_with_timeout(stream, command, self.inner.config.reply_timeout)
    }

    pub fn request_with_timeout(
        &self,
        stream: StreamId,
        command: Command,
        timeout: Duration,
    ) -> Result<ReplyValue> {
        if in_dispatch(self.inner.session_key) {
            return Err(ClientError::ReentrantRequest);
        }
        self.check_stream(stream)?;

        let replies = &self.inner.inbound.replies;
        let pending = replies.register()?;
        let request = pending.id;
        debug!(stream = %stream_label(stream), %request, target = ?command.target(), operation = command.name(), "request");
        if let Err(err) = self
            .inner
            .outbound
            .send(stream, &Message::Request { request, command })
        {
            replies.forget(request);
            return Err(err.into());
        }
        Ok(replies.wait(pending, timeout)??)
    }

    /// Block until every message posted earlier on `stream` has been
    /// dispatched. Faults those messages caused are in
    /// [`Connection::take_faults`] once this returns.
    pub fn synchronize(&self, stream: StreamId) -> Result<()> {
        match self.request(stream, Command::Gpu(GpuOp::Synchronize))? {
            ReplyValue::Unit => Ok(()),
            other => Err(ClientError::UnexpectedReply(format!("{other:?}"))),
        }
    }

    /// Take every fault reported so far, oldest first.
    pub fn take_faults(&self) -> Vec<StreamFault> {
        std::mem::take(
            &mut *self
                .inner
                .inbound
                .faults
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    fn control(&self) -> MutexGuard<'_, Receiver<ControlMessage>> {
        self.inner
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn await_control(
        &self,
        control: &Receiver<ControlMessage>,
        msg_type: &str,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match control.recv_timeout(remaining) {
                Ok(message) if message.is(msg_type) => return Ok(()),
                Ok(message) => debug!(msg_type = %message.msg_type, "skipping control message"),
                Err(RecvTimeoutError::Timeout) => return Err(ClientError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ClientError::Disconnected("connection closed".to_string()))
                }
            }
        }
    }

    /// Round trip on the control stream.
    pub fn ping(&self) -> Result<Duration> {
        if in_dispatch(self.inner.session_key) {
            return Err(ClientError::ReentrantRequest);
        }
        let control = self.control();
        while control.try_recv().is_ok() {}
        let started = Instant::now();
        self.inner.outbound.send_control(&ControlMessage::ping())?;
        self.await_control(&control, CONTROL_PONG, self.inner.config.reply_timeout)?;
        Ok(started.elapsed())
    }

    /// Ask the host to end the session, wait for its acknowledgement and
    /// close.
    pub fn shutdown(&self, reason: Option<&str>) -> Result<()> {
        if in_dispatch(self.inner.session_key) {
            return Err(ClientError::ReentrantRequest);
        }
        let acked = {
            let control = self.control();
            self.inner
                .outbound
                .send_control(&ControlMessage::shutdown_request(reason))
                .map_err(ClientError::from)
                .and_then(|()| {
                    self.await_control(
                        &control,
                        CONTROL_SHUTDOWN_ACK,
                        self.inner.config.handshake.timeout,
                    )
                })
        };
        self.close();
        info!(session = %self.session_id(), "connection shut down");
        acked
    }

    /// Close without telling the host. Pending work is cancelled.
    pub fn close(&self) {
        let _ = self.inner.outbound.close();
        self.inner.join_reader();
    }

    /// Create a device on `stream`. Every object created from it speaks on
    /// the same stream.
    pub fn create_device(
        &self,
        stream: StreamId,
        descriptor: &DeviceDescriptor,
    ) -> Result<Proxy<Device>> {
        let device = self.generate_id();
        self.post(
            stream,
            Command::Gpu(GpuOp::CreateDevice {
                device,
                descriptor: descriptor.clone(),
            }),
        )?;
        Ok(Proxy::new(device, stream, self.clone()))
    }

    /// Ask the host for an adapter on `stream`. Devices requested from it
    /// speak on the same stream.
    pub fn request_adapter(
        &self,
        stream: StreamId,
        options: &RequestAdapterOptions,
    ) -> Result<Proxy<Adapter>> {
        let adapter = self.generate_id();
        self.post(
            stream,
            Command::Gpu(GpuOp::RequestAdapter {
                adapter,
                options: *options,
            }),
        )?;
        Ok(Proxy::new(adapter, stream, self.clone()))
    }
}

fn read_loop(
    mut reader: FrameReader<IpcStream>,
    streams: u16,
    inbound: &Inbound,
    outbound: &Outbound,
    control: &Sender<ControlMessage>,
) {
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                debug!("host closed the connection");
                break;
            }
            Err(err) => {
                if !outbound.is_closed() {
                    warn!(error = %err, "connection read failed");
                }
                break;
            }
        };

        if frame.stream == CONTROL {
            match ControlMessage::from_json(&frame.payload) {
                Ok(message) => {
                    let _ = control.send(message);
                }
                Err(err) => {
                    warn!(error = %err, "undecodable control message; closing");
                    break;
                }
            }
            continue;
        }

        if !is_command_stream(frame.stream, streams) {
            warn!(stream = frame.stream, "message on a stream that was not negotiated; closing");
            break;
        }

        match decode_message(&frame.payload) {
            Ok(Message::Reply { request, result }) => {
                inbound.replies.fulfill(request, result);
            }
            Ok(Message::Callback { callback, outcome }) => {
                inbound.callbacks.fulfill(callback, outcome);
            }
            Ok(Message::Fault(report)) => {
                warn!(
                    stream = %stream_label(frame.stream),
                    target = ?report.target,
                    operation = %report.operation,
                    fault = %report.fault,
                    "host reported a fault"
                );
                inbound
                    .faults
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(StreamFault {
                        stream: frame.stream,
                        report,
                    });
            }
            Ok(other) => {
                warn!(message = other.name(), "host sent a client-only message; closing");
                break;
            }
            Err(err) => {
                warn!(stream = %stream_label(frame.stream), error = %err, "undecodable message; closing");
                break;
            }
        }
    }

    let _ = outbound.close();
    let failed = inbound.replies.close();
    let cancelled = inbound.callbacks.cancel_all();
    debug!(failed, cancelled, "client reader stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gpuremote_host::{spawn_local, HostConfig, MemoryBackend};

    use super::*;

    fn local(backend: MemoryBackend) -> Connection {
        let (stream, _host) = spawn_local(Arc::new(backend), HostConfig::default()).unwrap();
        Connection::establish(stream, ConnectionConfig::default()).unwrap()
    }

    #[test]
    fn negotiates_streams_and_pings() {
        let conn = local(MemoryBackend::new());
        assert_eq!(conn.session_id(), "session-local");
        assert_eq!(conn.streams(), 4);
        assert!(conn.ping().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn rejects_unnegotiated_streams_locally() {
        let conn = local(MemoryBackend::new());
        assert!(matches!(
            conn.post(9, Command::Gpu(GpuOp::Synchronize)),
            Err(ClientError::UnsupportedStream(9))
        ));
        assert!(matches!(
            conn.synchronize(CONTROL),
            Err(ClientError::UnsupportedStream(CONTROL))
        ));
    }

    #[test]
    fn shutdown_is_acknowledged_and_closes() {
        let conn = local(MemoryBackend::new());
        conn.shutdown(Some("test over")).unwrap();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.synchronize(1),
            Err(ClientError::Disconnected(_))
        ));
    }

    #[test]
    fn identifiers_are_connection_scoped() {
        let conn = local(MemoryBackend::new());
        let a = conn.generate_id();
        let b = conn.generate_id();
        assert_eq!((a.get(), b.get()), (1, 2));
    }
}
