use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use gpuremote_host::{HostConfig, HostListener, MemoryBackend, SessionCloser, SessionReport};
use gpuremote_transport::GpuSocket;
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{host_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct SessionOutput<'a> {
    session_id: &'a str,
    streams: u16,
    messages: u64,
    faults: u64,
    released_on_teardown: usize,
    cancelled_callbacks: usize,
    end: String,
    timestamp: String,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.max_streams == 0 {
        return Err(CliError::new(USAGE, "--max-streams must be at least 1"));
    }
    if args.queue_depth == 0 {
        return Err(CliError::new(USAGE, "--queue-depth must be at least 1"));
    }
    let config = HostConfig::default()
        .with_max_streams(args.max_streams)
        .with_queue_depth(args.queue_depth);
    let backend = MemoryBackend::new().with_max_allocation(args.max_allocation);
    let listener = HostListener::bind(&args.path, Arc::new(backend))
        .map_err(|err| host_error("bind failed", err))?
        .with_config(config);
    info!(
        path = %listener.path().display(),
        max_streams = args.max_streams,
        queue_depth = args.queue_depth,
        "serving"
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), args.path.clone())?;

    let mut accepted = 0usize;
    let mut sessions: Vec<(JoinHandle<()>, SessionCloser)> = Vec::new();
    while running.load(Ordering::SeqCst) {
        if args.sessions.is_some_and(|limit| accepted >= limit) {
            break;
        }
        let session = match listener.accept() {
            Ok(session) => session,
            Err(_) if !running.load(Ordering::SeqCst) => break,
            Err(err) => {
                warn!(error = %err, "session setup failed");
                continue;
            }
        };
        accepted += 1;
        let id = session.id().to_string();
        let closer = session.closer();
        let handle = thread::Builder::new()
            .name(id.clone())
            .spawn(move || print_session(&session.run(), format))
            .map_err(|err| CliError::new(INTERNAL, format!("failed to start {id}: {err}")))?;
        sessions.retain(|(handle, _)| !handle.is_finished());
        sessions.push((handle, closer));
    }

    let interrupted = !running.load(Ordering::SeqCst);
    for (handle, closer) in sessions {
        if interrupted {
            closer.close();
        }
        if handle.join().is_err() {
            warn!("session thread panicked");
        }
    }
    info!("host stopped");
    Ok(SUCCESS)
}

/// Stop accepting on Ctrl-C. A throwaway connection wakes the blocked
/// accept so the loop sees the flag.
fn install_ctrlc_handler(running: Arc<AtomicBool>, path: PathBuf) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = GpuSocket::connect(&path);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn print_session(report: &SessionReport, format: OutputFormat) {
    let out = SessionOutput {
        session_id: &report.session_id,
        streams: report.streams,
        messages: report.messages,
        faults: report.faults,
        released_on_teardown: report.released_on_teardown,
        cancelled_callbacks: report.cancelled_callbacks,
        end: report.end.to_string(),
        timestamp: now_unix_seconds(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["SESSION", "STREAMS", "MESSAGES", "FAULTS", "RELEASED", "CANCELLED", "END"],
            [vec![
                out.session_id.to_string(),
                out.streams.to_string(),
                out.messages.to_string(),
                out.faults.to_string(),
                out.released_on_teardown.to_string(),
                out.cancelled_callbacks.to_string(),
                out.end.clone(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "{} ended ({}): streams={} messages={} faults={} released={} cancelled={}",
            out.session_id,
            out.end,
            out.streams,
            out.messages,
            out.faults,
            out.released_on_teardown,
            out.cancelled_callbacks
        ),
    }
}
