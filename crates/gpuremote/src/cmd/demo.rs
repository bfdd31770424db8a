use std::time::Instant;

use gpuremote_client::{ClientError, Connection};
use gpuremote_wire::types::{
    BufferDescriptor, BufferUsage, CommandEncoderDescriptor, DeviceDescriptor, RequestAdapterOptions,
};
use gpuremote_wire::CallbackOutcome;
use serde::Serialize;
use tracing::info;

use crate::cmd::info::{client_config, connect_with_timeout};
use crate::cmd::{parse_timeout, DemoArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{millis, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct Step {
    step: &'static str,
    ok: bool,
    detail: String,
    elapsed_ms: f64,
}

#[derive(Serialize)]
struct DemoOutput {
    session_id: String,
    stream: u16,
    steps: Vec<Step>,
    faults: Vec<String>,
    passed: bool,
}

/// Records each step's timing and stops at the first client error.
struct Recorder {
    steps: Vec<Step>,
}

impl Recorder {
    fn step<T>(
        &mut self,
        step: &'static str,
        f: impl FnOnce() -> Result<(T, String), ClientError>,
    ) -> CliResult<T> {
        let started = Instant::now();
        let result = f();
        let elapsed_ms = millis(started.elapsed());
        match result {
            Ok((value, detail)) => {
                self.steps.push(Step {
                    step,
                    ok: true,
                    detail,
                    elapsed_ms,
                });
                Ok(value)
            }
            Err(err) => {
                self.steps.push(Step {
                    step,
                    ok: false,
                    detail: err.to_string(),
                    elapsed_ms,
                });
                Err(client_error(step, err))
            }
        }
    }

    fn check(&mut self, step: &'static str, ok: bool, detail: String) {
        self.steps.push(Step {
            step,
            ok,
            detail,
            elapsed_ms: 0.0,
        });
    }
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    if args.size == 0 || args.size % 4 != 0 {
        return Err(CliError::new(USAGE, "--size must be a non-zero multiple of 4"));
    }
    let timeout = parse_timeout(&args.timeout)?;
    let config = client_config(args.stream, timeout, args.auth_token.as_deref());
    let conn = connect_with_timeout(&args.path, config, timeout)?;
    if args.stream > conn.streams() {
        return Err(CliError::new(
            USAGE,
            format!(
                "stream {} not granted; the host opened {}",
                args.stream,
                conn.streams()
            ),
        ));
    }

    let mut recorder = Recorder { steps: Vec::new() };
    let outcome = scenario(&conn, &args, &mut recorder);
    let faults: Vec<String> = match conn.synchronize(args.stream) {
        Ok(()) => conn
            .take_faults()
            .into_iter()
            .map(|fault| {
                format!(
                    "{} on {:?}: {}",
                    fault.report.operation, fault.report.target, fault.report.fault
                )
            })
            .collect(),
        Err(err) => vec![format!("synchronize failed: {err}")],
    };
    let _ = conn.shutdown(Some("demo complete"));

    let passed = outcome.is_ok() && faults.is_empty() && recorder.steps.iter().all(|s| s.ok);
    let out = DemoOutput {
        session_id: conn.session_id().to_string(),
        stream: args.stream,
        steps: recorder.steps,
        faults,
        passed,
    };
    print_demo(&out, format);
    info!(session = %out.session_id, passed, "demo finished");

    outcome?;
    Ok(if passed { SUCCESS } else { FAILURE })
}

fn scenario(conn: &Connection, args: &DemoArgs, rec: &mut Recorder) -> CliResult<()> {
    let staging = BufferDescriptor {
        label: Some("demo-staging".into()),
        size: args.size,
        usage: BufferUsage::COPY_SRC | BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        mapped_at_creation: false,
    };
    let pattern: Vec<u8> = (0..args.size).map(|i| (i % 251) as u8).collect();

    let adapter = rec.step("request_adapter", || {
        let adapter = conn.request_adapter(args.stream, &RequestAdapterOptions::default())?;
        let detail = format!("adapter {}", adapter.id());
        Ok((adapter, detail))
    })?;
    let device = rec.step("request_device", || {
        let device = adapter.request_device(&DeviceDescriptor::default())?;
        let detail = format!("device {}", device.id());
        Ok((device, detail))
    })?;
    let queue = rec.step("create_queue", || {
        let queue = device.create_queue()?;
        let detail = format!("queue {}", queue.id());
        Ok((queue, detail))
    })?;
    let source = rec.step("create_buffer", || {
        let buffer = device.create_buffer(&staging)?;
        let detail = format!("buffer {} ({} bytes)", buffer.id(), args.size);
        Ok((buffer, detail))
    })?;
    rec.step("write_buffer", || {
        queue.write_buffer(&source, 0, pattern.clone())?;
        Ok(((), format!("{} bytes", pattern.len())))
    })?;
    let read = rec.step("read_back", || {
        let bytes = source.read(0, args.size)?;
        let detail = format!("{} bytes", bytes.len());
        Ok((bytes, detail))
    })?;
    rec.check(
        "verify_read_back",
        read[..] == pattern[..],
        "read matches write".to_string(),
    );

    let destination = rec.step("create_copy_target", || {
        let buffer = device.create_buffer(&staging)?;
        let detail = format!("buffer {}", buffer.id());
        Ok((buffer, detail))
    })?;
    let commands = rec.step("encode_copy", || {
        let encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("demo-copy".into()),
        })?;
        encoder.copy_buffer_to_buffer(&source, 0, &destination, 0, args.size)?;
        let commands = encoder.finish(Some("demo-copy"))?;
        let detail = format!("command buffer {}", commands.id());
        Ok((commands, detail))
    })?;
    rec.step("submit", || {
        queue.submit(&[&commands])?;
        Ok(((), "1 command buffer".to_string()))
    })?;
    let outcome = rec.step("work_done", || {
        let outcome = queue.on_submitted_work_done()?.wait()?;
        let detail = format!("{outcome:?}");
        Ok((outcome, detail))
    })?;
    rec.check(
        "verify_work_done",
        outcome == CallbackOutcome::Completed,
        format!("{outcome:?}"),
    );
    let copied = rec.step("read_copy", || {
        let bytes = destination.read(0, args.size)?;
        let detail = format!("{} bytes", bytes.len());
        Ok((bytes, detail))
    })?;
    rec.check(
        "verify_copy",
        copied[..] == pattern[..],
        "copy matches source".to_string(),
    );
    Ok(())
}

fn print_demo(out: &DemoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            print_table(
                &["STEP", "OK", "MS", "DETAIL"],
                out.steps.iter().map(|s| {
                    vec![
                        s.step.to_string(),
                        s.ok.to_string(),
                        format!("{:.2}", s.elapsed_ms),
                        s.detail.clone(),
                    ]
                }),
            );
            for fault in &out.faults {
                println!("fault: {fault}");
            }
        }
        OutputFormat::Pretty => {
            for s in &out.steps {
                let mark = if s.ok { "ok" } else { "FAILED" };
                println!("{:<20} {:<6} {:>8.2}ms  {}", s.step, mark, s.elapsed_ms, s.detail);
            }
            for fault in &out.faults {
                println!("fault: {fault}");
            }
            println!("{}", if out.passed { "PASSED" } else { "FAILED" });
        }
    }
}
