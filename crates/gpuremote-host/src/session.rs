//! One client connection on the host side.
//!
//! A single reader thread owns the socket's read half. Control frames are
//! answered inline; command frames are handed to one dispatcher thread per
//! stream, spawned the first time the stream is used. Each dispatcher
//! decodes and dispatches its stream's messages strictly in arrival order,
//! so a slow operation on one stream never holds up another.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use gpuremote_frame::{is_command_stream, stream_label, FrameError, FrameReader, StreamId, CONTROL};
use gpuremote_peer::{
    establish_server, ControlMessage, Established, HandshakeResult, Outbound, CONTROL_PING,
    CONTROL_PONG, CONTROL_SHUTDOWN_REQUEST,
};
use gpuremote_transport::IpcStream;
use gpuremote_wire::{decode_message, Command, FaultReport, Message, RemoteFault};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::completion::CompletionTracker;
use crate::config::HostConfig;
use crate::dispatch::{dispatch, DispatchContext, Outcome};
use crate::error::{HostError, Result};
use crate::heap::ObjectHeap;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection.
    PeerClosed,
    /// The client asked for an orderly shutdown.
    ShutdownRequested,
    /// The client sent something undecodable or out of place.
    ProtocolError(String),
    /// The host closed the session through a [`SessionCloser`].
    Closed,
    Transport(String),
    /// A stream's dispatcher stopped while the client was still sending.
    Internal(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => f.write_str("peer closed"),
            SessionEnd::ShutdownRequested => f.write_str("shutdown requested"),
            SessionEnd::ProtocolError(reason) => write!(f, "protocol error: {reason}"),
            SessionEnd::Closed => f.write_str("closed by host"),
            SessionEnd::Transport(reason) => write!(f, "transport error: {reason}"),
            SessionEnd::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: String,
    pub streams: u16,
    /// Command-stream messages dispatched.
    pub messages: u64,
    /// Operations that ended in a fault report or a faulted reply.
    pub faults: u64,
    /// Objects still alive at teardown, released then.
    pub released_on_teardown: usize,
    /// Callbacks still pending at teardown, cancelled then.
    pub cancelled_callbacks: usize,
    pub end: SessionEnd,
}

/// Closes a running session from another thread.
#[derive(Clone)]
pub struct SessionCloser {
    outbound: Outbound,
}

impl SessionCloser {
    pub fn close(&self) {
        if let Err(err) = self.outbound.close() {
            debug!(error = %err, "session already torn down");
        }
    }
}

#[derive(Default)]
struct StreamStats {
    messages: u64,
    faults: u64,
}

struct Dispatcher {
    tx: SyncSender<Bytes>,
    handle: JoinHandle<StreamStats>,
}

/// Shared with every dispatcher of a session.
struct Shared {
    session_id: String,
    backend: Arc<dyn Backend>,
    heap: Mutex<ObjectHeap>,
    completions: Arc<CompletionTracker>,
    outbound: Outbound,
    queue_depth: usize,
    /// First reason the host gave up on the session, if any.
    failure: Mutex<Option<SessionEnd>>,
}

impl Shared {
    /// Record the first protocol error and close the connection.
    fn fail(&self, stream: StreamId, reason: String) {
        warn!(session = %self.session_id, stream = %stream_label(stream), %reason, "protocol error; closing session");
        let fault = RemoteFault::protocol(reason.clone());
        self.close_with(stream, "decode", fault, SessionEnd::ProtocolError(reason));
    }

    /// A stream can no longer be served. The client is told on that stream
    /// before the connection closes, so its waiters fail fast.
    fn abort(&self, stream: StreamId, reason: String) {
        warn!(session = %self.session_id, stream = %stream_label(stream), %reason, "stream lost; closing session");
        let fault = RemoteFault::backend(reason.clone());
        self.close_with(stream, "dispatch", fault, SessionEnd::Internal(reason));
    }

    fn close_with(&self, stream: StreamId, operation: &str, fault: RemoteFault, end: SessionEnd) {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(end);
        if stream != CONTROL {
            let report = FaultReport {
                target: None,
                operation: operation.to_string(),
                fault,
            };
            let _ = self.outbound.send(stream, &Message::Fault(report));
        }
        let _ = self.outbound.close();
    }

    fn send(&self, stream: StreamId, message: &Message) {
        if let Err(err) = self.outbound.send(stream, message) {
            debug!(stream = %stream_label(stream), message = message.name(), error = %err, "dropping outbound message");
        }
    }
}

/// A host session that has completed its handshake.
pub struct Session {
    reader: FrameReader<IpcStream>,
    handshake: HandshakeResult,
    shared: Arc<Shared>,
}

impl Session {
    /// Run the host handshake over `stream` and prepare the session.
    pub fn establish(
        stream: IpcStream,
        session_id: &str,
        backend: Arc<dyn Backend>,
        config: &HostConfig,
    ) -> Result<Self> {
        let established = establish_server(
            stream,
            config.max_streams,
            session_id,
            &config.handshake,
            &config.frame,
        )?;
        Ok(Self::from_established(established, backend).with_queue_depth(config.queue_depth))
    }

    pub fn from_established(established: Established, backend: Arc<dyn Backend>) -> Self {
        let Established {
            reader,
            writer,
            handshake,
        } = established;
        let outbound = Outbound::new(writer);
        let shared = Arc::new(Shared {
            session_id: handshake.session_id.clone(),
            backend,
            heap: Mutex::new(ObjectHeap::new()),
            completions: Arc::new(CompletionTracker::new(outbound.clone())),
            outbound,
            queue_depth: HostConfig::default().queue_depth,
            failure: Mutex::new(None),
        });
        Self {
            reader,
            handshake,
            shared,
        }
    }

    /// Messages a stream may have queued before the reader stops reading
    /// the socket.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.queue_depth = depth.max(1);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.handshake.session_id
    }

    pub fn handshake(&self) -> &HandshakeResult {
        &self.handshake
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            outbound: self.shared.outbound.clone(),
        }
    }

    /// Serve the client until it disconnects, asks to shut down or breaks
    /// the protocol, then tear everything down.
    ///
    /// Teardown waits for every dispatcher to finish what it has queued,
    /// cancels pending callbacks and releases every object still alive.
    pub fn run(mut self) -> SessionReport {
        let streams = self.handshake.streams;
        let mut dispatchers: HashMap<StreamId, Dispatcher> = HashMap::new();

        let end = loop {
            let frame = match self.reader.read_frame() {
                Ok(frame) => frame,
                Err(err) if self.shared.outbound.is_closed() => {
                    debug!(session = %self.id(), error = %err, "read ended after close");
                    break SessionEnd::Closed;
                }
                Err(FrameError::ConnectionClosed) => break SessionEnd::PeerClosed,
                Err(err @ (FrameError::InvalidMagic | FrameError::PayloadTooLarge { .. })) => {
                    self.shared.fail(CONTROL, err.to_string());
                    break SessionEnd::ProtocolError(err.to_string());
                }
                Err(err) => break SessionEnd::Transport(err.to_string()),
            };

            if frame.stream == CONTROL {
                match self.handle_control(&frame.payload) {
                    Ok(true) => continue,
                    Ok(false) => break SessionEnd::ShutdownRequested,
                    Err(reason) => {
                        self.shared.fail(CONTROL, reason.clone());
                        break SessionEnd::ProtocolError(reason);
                    }
                }
            }

            if !is_command_stream(frame.stream, streams) {
                let reason = format!("stream {} was not negotiated", frame.stream);
                self.shared.fail(CONTROL, reason.clone());
                break SessionEnd::ProtocolError(reason);
            }

            let dispatcher = match dispatchers.entry(frame.stream) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    match spawn_dispatcher(&self.shared, frame.stream) {
                        Ok(dispatcher) => entry.insert(dispatcher),
                        Err(err) => break SessionEnd::Transport(err.to_string()),
                    }
                }
            };
            // Blocks while the stream's queue is full.
            if dispatcher.tx.send(frame.payload).is_err() {
                let reason = format!("dispatcher for {} stopped", stream_label(frame.stream));
                self.shared.abort(frame.stream, reason.clone());
                break SessionEnd::Internal(reason);
            }
        };

        self.teardown(dispatchers, end)
    }

    /// `Ok(false)` when the client asked to shut down.
    fn handle_control(&self, payload: &[u8]) -> std::result::Result<bool, String> {
        let message = ControlMessage::from_json(payload).map_err(|err| err.to_string())?;
        debug!(session = %self.id(), msg_type = %message.msg_type, "control message");
        if message.is(CONTROL_PING) {
            if let Err(err) = self.shared.outbound.send_control(&ControlMessage::pong()) {
                debug!(error = %err, "pong not sent");
            }
            Ok(true)
        } else if message.is(CONTROL_SHUTDOWN_REQUEST) {
            info!(session = %self.id(), reason = message.reason().unwrap_or("none"), "client requested shutdown");
            if let Err(err) = self
                .shared
                .outbound
                .send_control(&ControlMessage::shutdown_ack())
            {
                debug!(error = %err, "shutdown ack not sent");
            }
            Ok(false)
        } else if message.is(CONTROL_PONG) {
            Ok(true)
        } else {
            debug!(msg_type = %message.msg_type, "ignoring unknown control message");
            Ok(true)
        }
    }

    fn teardown(self, dispatchers: HashMap<StreamId, Dispatcher>, end: SessionEnd) -> SessionReport {
        let mut totals = StreamStats::default();
        for (stream, dispatcher) in dispatchers {
            drop(dispatcher.tx);
            match dispatcher.handle.join() {
                Ok(stats) => {
                    totals.messages += stats.messages;
                    totals.faults += stats.faults;
                }
                Err(_) => warn!(stream = %stream_label(stream), "dispatcher panicked"),
            }
        }

        let cancelled_callbacks = self.shared.completions.cancel_all();
        let remaining = self
            .shared
            .heap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain();
        let released_on_teardown = remaining.len();
        drop(remaining);
        let _ = self.shared.outbound.close();

        let end = self
            .shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or(end);

        info!(
            session = %self.handshake.session_id,
            messages = totals.messages,
            faults = totals.faults,
            released = released_on_teardown,
            cancelled = cancelled_callbacks,
            %end,
            "session ended"
        );

        SessionReport {
            session_id: self.handshake.session_id.clone(),
            streams: self.handshake.streams,
            messages: totals.messages,
            faults: totals.faults,
            released_on_teardown,
            cancelled_callbacks,
            end,
        }
    }
}

fn spawn_dispatcher(shared: &Arc<Shared>, stream: StreamId) -> Result<Dispatcher> {
    let (tx, rx) = mpsc::sync_channel(shared.queue_depth);
    let worker = Arc::clone(shared);
    let name = format!("{}-{}", shared.session_id, stream_label(stream));
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_dispatcher(&worker, stream, rx))
        .map_err(|source| HostError::Spawn { what: name, source })?;
    debug!(session = %shared.session_id, stream = %stream_label(stream), "dispatcher started");
    Ok(Dispatcher { tx, handle })
}

fn run_dispatcher(shared: &Shared, stream: StreamId, rx: Receiver<Bytes>) -> StreamStats {
    let ctx = DispatchContext {
        backend: &shared.backend,
        heap: &shared.heap,
        completions: &shared.completions,
        stream,
    };
    let mut stats = StreamStats::default();

    for payload in rx {
        if shared.outbound.is_closed() {
            break;
        }
        let message = match decode_message(&payload) {
            Ok(message) => message,
            Err(err) => {
                shared.fail(stream, format!("undecodable message: {err}"));
                break;
            }
        };
        stats.messages += 1;

        match message {
            Message::Post(command) => {
                let target = command.target();
                let operation = command.name();
                debug!(stream = %stream_label(stream), ?target, operation, "post");
                if let Err(fault) = guarded_dispatch(&ctx, command) {
                    stats.faults += 1;
                    warn!(stream = %stream_label(stream), ?target, operation, %fault, "posted operation aborted");
                    let report = FaultReport {
                        target,
                        operation: operation.to_string(),
                        fault,
                    };
                    shared.send(stream, &Message::Fault(report));
                }
            }
            Message::Request { request, command } => {
                let target = command.target();
                let operation = command.name();
                debug!(stream = %stream_label(stream), %request, ?target, operation, "request");
                let result = guarded_dispatch(&ctx, command);
                if let Err(fault) = &result {
                    stats.faults += 1;
                    debug!(%request, operation, %fault, "request faulted");
                }
                shared.send(stream, &Message::Reply { request, result });
            }
            other => {
                shared.fail(stream, format!("clients may not send {} messages", other.name()));
                break;
            }
        }
    }
    stats
}

/// A backend panic fails the one operation instead of the stream.
fn guarded_dispatch(ctx: &DispatchContext<'_>, command: Command) -> Outcome {
    let operation = command.name();
    panic::catch_unwind(AssertUnwindSafe(|| dispatch(ctx, command))).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(stream = %stream_label(ctx.stream), operation, %detail, "backend panicked");
        Err(RemoteFault::backend(format!("{operation} panicked: {detail}")))
    })
}
