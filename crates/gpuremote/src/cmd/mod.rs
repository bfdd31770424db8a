use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod info;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host GPU sessions on a socket with the in-memory backend.
    Serve(ServeArgs),
    /// Connect to a host and print the negotiated session.
    Info(InfoArgs),
    /// Run a device/queue/buffer round trip against a host.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Most command streams granted to one session.
    #[arg(long, default_value = "8", env = "GPUREMOTE_MAX_STREAMS")]
    pub max_streams: u16,
    /// Messages queued per command stream before the reader waits.
    #[arg(long, default_value = "256", env = "GPUREMOTE_QUEUE_DEPTH")]
    pub queue_depth: usize,
    /// Largest single buffer or texture allocation, in bytes.
    #[arg(long, default_value = "268435456", env = "GPUREMOTE_MAX_ALLOCATION")]
    pub max_allocation: u64,
    /// Exit after this many sessions have ended.
    #[arg(long)]
    pub sessions: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Command streams to request.
    #[arg(long, default_value = "4")]
    pub streams: u16,
    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Token presented in the client hello.
    #[arg(long, env = "GPUREMOTE_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Command stream the demo objects live on.
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    pub stream: u16,
    /// Size of the demo buffer in bytes (multiple of 4).
    #[arg(long, default_value = "16")]
    pub size: u64,
    /// Connection and reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Token presented in the client hello.
    #[arg(long, env = "GPUREMOTE_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// `5s`, `500ms`, or a bare number of seconds.
pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_seconds() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_timeout_millis() {
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_timeout_invalid() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert_eq!(parse_timeout("").unwrap_err().code, USAGE);
    }
}
