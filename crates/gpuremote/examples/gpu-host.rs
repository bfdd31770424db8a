//! Minimal GPU host: serves one client session against the in-memory
//! backend and prints the session report.
//!
//! Run with:
//!   cargo run --example gpu-host --features host
//!
//! In another terminal:
//!   cargo run --example gpu-client --features client

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use gpuremote::host::{HostConfig, HostListener, MemoryBackend};

fn socket_path() -> PathBuf {
    env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("gpuremote-example.sock"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_path = socket_path();

    // Ensure no stale socket
    let _ = fs::remove_file(&sock_path);

    let backend = MemoryBackend::new().with_max_allocation(64 * 1024 * 1024);
    let listener = HostListener::bind(&sock_path, Arc::new(backend))?
        .with_config(HostConfig::default().with_max_streams(4));
    eprintln!("Listening on {}", sock_path.display());

    let session = listener.accept()?;
    eprintln!(
        "Client connected: {} ({} streams)",
        session.id(),
        session.handshake().streams
    );

    let report = session.run();
    eprintln!(
        "Session {} ended ({}): {} messages, {} faults, {} objects released at teardown",
        report.session_id,
        report.end,
        report.messages,
        report.faults,
        report.released_on_teardown
    );

    let _ = fs::remove_file(&sock_path);
    Ok(())
}
