use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use gpuremote_frame::{FrameError, FrameReader, FrameWriter, CONTROL};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PeerError, Result};

/// Upper bound on command streams per connection.
pub const MAX_STREAMS: u16 = 256;

const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_SESSION_ID_LEN: usize = 128;
const MAX_AUTH_TOKEN_LEN: usize = 4096;

/// First control message, sent by the client.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientHello {
    pub protocol: String,
    pub version: String,
    /// Number of command streams the client wants.
    pub streams: u16,
    /// Opaque credential; redacted in debug output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Host reply to [`ClientHello`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerHello {
    pub protocol: String,
    pub version: String,
    /// Granted command streams: `1..=streams` are usable.
    pub streams: u16,
    /// Host-assigned session identifier.
    pub session_id: String,
}

/// Result of a successful handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    pub session_id: String,
    pub protocol_version: String,
    /// Command streams `1..=streams` are open.
    pub streams: u16,
    /// Client auth token observed by the host side.
    pub client_auth_token: Option<String>,
}

/// Configuration for handshake negotiation.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// Timeout for each blocking handshake operation.
    pub timeout: Duration,
    pub protocol_name: String,
    pub protocol_version: String,
    /// Handshake frames are held to this size before the peer is trusted.
    pub max_handshake_payload: usize,
    /// Sent by the client. Plaintext on a local socket; never logged.
    pub auth_token: Option<String>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: "gpuremote".to_string(),
            protocol_version: "1.0".to_string(),
            max_handshake_payload: 16 * 1024,
            auth_token: None,
        }
    }
}

impl HandshakeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

struct Redacted<'a>(&'a Option<String>);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(token) => write!(f, "<redacted:{} bytes>", token.len()),
            None => f.write_str("None"),
        }
    }
}

impl fmt::Debug for ClientHello {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHello")
            .field("protocol", &self.protocol)
            .field("version", &self.version)
            .field("streams", &self.streams)
            .field("auth_token", &Redacted(&self.auth_token))
            .finish()
    }
}

impl fmt::Debug for HandshakeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeResult")
            .field("session_id", &self.session_id)
            .field("protocol_version", &self.protocol_version)
            .field("streams", &self.streams)
            .field("client_auth_token", &Redacted(&self.client_auth_token))
            .finish()
    }
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("timeout", &self.timeout)
            .field("protocol_name", &self.protocol_name)
            .field("protocol_version", &self.protocol_version)
            .field("max_handshake_payload", &self.max_handshake_payload)
            .field("auth_token", &Redacted(&self.auth_token))
            .finish()
    }
}

/// Client side: ask for `streams` command streams.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    streams: u16,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    check_stream_count(streams)?;
    if let Some(token) = config.auth_token.as_deref() {
        check_len("auth_token", token, MAX_AUTH_TOKEN_LEN)?;
    }

    let hello = ClientHello {
        protocol: config.protocol_name.clone(),
        version: config.protocol_version.clone(),
        streams,
        auth_token: config.auth_token.clone(),
    };
    debug!(?hello, "sending client hello");
    send_control_json(writer, &hello)?;

    let reply: ServerHello = recv_control_json(reader, config)?;
    check_peer(config, &reply.protocol, &config.protocol_version, &reply.version)?;
    check_len("session_id", &reply.session_id, MAX_SESSION_ID_LEN)?;
    if !(1..=streams).contains(&reply.streams) {
        return Err(failed(format!(
            "host granted {} streams (requested {streams})",
            reply.streams
        )));
    }

    Ok(HandshakeResult {
        session_id: reply.session_id,
        protocol_version: reply.version,
        streams: reply.streams,
        client_auth_token: None,
    })
}

/// Host side: grant at most `max_streams` command streams.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    max_streams: u16,
    session_id: &str,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    check_stream_count(max_streams)?;
    check_len("session_id", session_id, MAX_SESSION_ID_LEN)?;

    let hello: ClientHello = recv_control_json(reader, config)?;
    debug!(?hello, session = session_id, "received client hello");
    check_peer(config, &hello.protocol, &hello.version, &config.protocol_version)?;
    check_stream_count(hello.streams)?;
    if let Some(token) = hello.auth_token.as_deref() {
        check_len("auth_token", token, MAX_AUTH_TOKEN_LEN)?;
    }

    let granted = hello.streams.min(max_streams);
    send_control_json(
        writer,
        &ServerHello {
            protocol: config.protocol_name.clone(),
            version: config.protocol_version.clone(),
            streams: granted,
            session_id: session_id.to_string(),
        },
    )?;

    Ok(HandshakeResult {
        session_id: session_id.to_string(),
        protocol_version: config.protocol_version.clone(),
        streams: granted,
        client_auth_token: hello.auth_token,
    })
}

fn failed(reason: String) -> PeerError {
    PeerError::HandshakeFailed(reason)
}

fn send_control_json<T: Serialize, W: Write>(writer: &mut FrameWriter<W>, value: &T) -> Result<()> {
    writer.send(CONTROL, &serde_json::to_vec(value)?)?;
    Ok(())
}

/// Wait for the next control frame and decode it, giving up after
/// `config.timeout`. Read timeouts on the socket only re-check the deadline.
fn recv_control_json<T, R>(reader: &mut FrameReader<R>, config: &HandshakeConfig) -> Result<T>
where
    T: serde::de::DeserializeOwned,
    R: Read,
{
    let deadline = Instant::now() + config.timeout;
    let frame = loop {
        if Instant::now() >= deadline {
            return Err(PeerError::Timeout(config.timeout));
        }
        match reader.read_frame() {
            Ok(frame) => break frame,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(FrameError::ConnectionClosed) => {
                return Err(PeerError::Disconnected(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    };

    if frame.stream != CONTROL {
        return Err(failed(format!(
            "stream {} spoke before the handshake finished",
            frame.stream
        )));
    }
    if frame.payload.len() > config.max_handshake_payload {
        return Err(failed(format!(
            "hello of {} bytes exceeds {}",
            frame.payload.len(),
            config.max_handshake_payload
        )));
    }
    Ok(serde_json::from_slice(&frame.payload)?)
}

/// Protocol name must match ours; versions must share a major and the
/// client's minor must be at least the host's.
fn check_peer(
    config: &HandshakeConfig,
    protocol: &str,
    client_version: &str,
    host_version: &str,
) -> Result<()> {
    check_len("protocol", protocol, MAX_PROTOCOL_LEN)?;
    if protocol != config.protocol_name {
        return Err(failed(format!(
            "unknown protocol '{protocol}' (expected '{}')",
            config.protocol_name
        )));
    }
    let (client_major, client_minor) = parse_version(client_version)?;
    let (host_major, host_minor) = parse_version(host_version)?;
    if client_major != host_major || client_minor < host_minor {
        return Err(failed(format!(
            "client version {client_version} cannot talk to host version {host_version}"
        )));
    }
    Ok(())
}

fn check_stream_count(streams: u16) -> Result<()> {
    if (1..=MAX_STREAMS).contains(&streams) {
        Ok(())
    } else {
        Err(failed(format!(
            "invalid stream count {streams} (expected 1..={MAX_STREAMS})"
        )))
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() || value.len() > max {
        return Err(failed(format!(
            "{field} must be 1..={max} bytes, got {}",
            value.len()
        )));
    }
    Ok(())
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    check_len("version", version, MAX_VERSION_LEN)?;
    let invalid = || failed(format!("version '{version}' is not '<major>.<minor>'"));
    let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
    let major = major.parse::<u16>().map_err(|_| invalid())?;
    let minor = minor.parse::<u16>().map_err(|_| invalid())?;
    Ok((major, minor))
}
