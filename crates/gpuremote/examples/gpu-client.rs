//! Minimal GPU client: requests an adapter and device from a running
//! `gpu-host`, round-trips a buffer through a copy and waits for the queue.
//!
//! Run with:
//!   cargo run --example gpu-client --features client

use std::env;
use std::path::PathBuf;

use gpuremote::client::{Connection, ConnectionConfig};
use gpuremote::wire::types::{
    BufferDescriptor, BufferUsage, CommandEncoderDescriptor, DeviceDescriptor,
    RequestAdapterOptions,
};

fn socket_path() -> PathBuf {
    env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("gpuremote-example.sock"))
}

fn staging(label: &str) -> BufferDescriptor {
    BufferDescriptor {
        label: Some(label.into()),
        size: 16,
        usage: BufferUsage::COPY_SRC | BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        mapped_at_creation: false,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::connect(socket_path(), ConnectionConfig::default())?;
    eprintln!("[client] session {} with {} streams", conn.session_id(), conn.streams());

    let adapter = conn.request_adapter(1, &RequestAdapterOptions::default())?;
    let device = adapter.request_device(&DeviceDescriptor::default())?;
    let queue = device.create_queue()?;
    let source = device.create_buffer(&staging("source"))?;
    let destination = device.create_buffer(&staging("destination"))?;

    let pattern: Vec<u8> = (0..16).collect();
    queue.write_buffer(&source, 0, pattern.clone())?;

    let encoder = device.create_command_encoder(&CommandEncoderDescriptor::default())?;
    encoder.copy_buffer_to_buffer(&source, 0, &destination, 0, 16)?;
    let commands = encoder.finish(Some("copy"))?;
    queue.submit(&[&commands])?;

    let outcome = queue.on_submitted_work_done()?.wait()?;
    eprintln!("[client] work done: {outcome:?}");

    let copied = destination.read(0, 16)?;
    eprintln!("[client] copied bytes match: {}", copied[..] == pattern[..]);

    for fault in conn.take_faults() {
        eprintln!("[client] stream {} fault: {}", fault.stream, fault.report.fault);
    }

    conn.shutdown(Some("example finished"))?;
    Ok(())
}
