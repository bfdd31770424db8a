use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use gpuremote_client::{ClientError, Connection, ConnectionConfig};
use gpuremote_frame::stream_label;
use gpuremote_peer::HandshakeConfig;
use gpuremote_transport::TransportError;
use serde::Serialize;

use crate::cmd::{parse_timeout, InfoArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{millis, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    session_id: String,
    protocol_version: String,
    requested_streams: u16,
    streams: Vec<String>,
    ping_latency_ms: Option<f64>,
    connected: bool,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let config = client_config(args.streams, timeout, args.auth_token.as_deref());
    let conn = connect_with_timeout(&args.path, config, timeout)?;

    let ping_latency_ms = conn.ping().ok().map(millis);
    let out = InfoOutput {
        session_id: conn.session_id().to_string(),
        protocol_version: conn.handshake().protocol_version.clone(),
        requested_streams: args.streams,
        streams: (1..=conn.streams()).map(stream_label).collect(),
        ping_latency_ms,
        connected: true,
    };
    let _ = conn.shutdown(Some("info complete"));

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["SESSION", "PROTOCOL", "STREAMS", "PING"],
            [vec![
                out.session_id.clone(),
                out.protocol_version.clone(),
                out.streams.len().to_string(),
                ping_text(out.ping_latency_ms),
            ]],
        ),
        OutputFormat::Pretty => {
            println!("Session Info:");
            println!("  Session ID:  {}", out.session_id);
            println!("  Protocol:    gpuremote {}", out.protocol_version);
            println!(
                "  Streams:     {} of {} requested ({})",
                out.streams.len(),
                out.requested_streams,
                out.streams.join(", ")
            );
            println!("  Ping:        {}", ping_text(out.ping_latency_ms));
        }
    }
    Ok(SUCCESS)
}

fn ping_text(ms: Option<f64>) -> String {
    ms.map_or_else(|| "unavailable".to_string(), |ms| format!("{ms:.2}ms"))
}

pub fn client_config(streams: u16, timeout: Duration, auth_token: Option<&str>) -> ConnectionConfig {
    let config = ConnectionConfig::default()
        .with_streams(streams)
        .with_reply_timeout(timeout)
        .with_handshake(HandshakeConfig::default().with_timeout(timeout));
    match auth_token {
        Some(token) => config.with_auth_token(token),
        None => config,
    }
}

/// Retry while the socket is missing or refusing, up to `timeout`.
pub fn connect_with_timeout(
    path: &Path,
    config: ConnectionConfig,
    timeout: Duration,
) -> CliResult<Connection> {
    let start = Instant::now();
    loop {
        match Connection::connect(path, config.clone()) {
            Ok(conn) => return Ok(conn),
            Err(err) if is_retryable_connect_error(&err) => {
                if start.elapsed() >= timeout {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("connect timed out after {timeout:?}"),
                    ));
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => return Err(client_error("connect failed", err)),
        }
    }
}

fn is_retryable_connect_error(err: &ClientError) -> bool {
    match err {
        ClientError::Transport(TransportError::Connect { source, .. }) => matches!(
            source.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_socket_is_retryable() {
        let err = ClientError::Transport(TransportError::Connect {
            path: "/tmp/none.sock".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert!(is_retryable_connect_error(&err));
        assert!(!is_retryable_connect_error(&ClientError::ReentrantRequest));
    }

    #[test]
    fn config_carries_timeout_and_token() {
        let config = client_config(2, Duration::from_secs(3), Some("secret"));
        assert_eq!(config.streams, 2);
        assert_eq!(config.reply_timeout, Duration::from_secs(3));
        assert_eq!(config.handshake.timeout, Duration::from_secs(3));
        assert_eq!(config.handshake.auth_token.as_deref(), Some("secret"));
    }
}
