mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gpuremote", version, about = "GPU command remoting CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true, env = "GPUREMOTE_FORMAT")]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        global = true,
        env = "GPUREMOTE_LOG_FORMAT"
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "GPUREMOTE_LOG_LEVEL"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "gpuremote",
            "serve",
            "/tmp/gpu.sock",
            "--max-streams",
            "4",
        ])
        .expect("serve args should parse");

        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from([
            "gpuremote",
            "--format",
            "json",
            "demo",
            "/tmp/gpu.sock",
            "--stream",
            "2",
        ])
        .expect("demo args should parse");

        assert!(matches!(cli.command, Command::Demo(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn parses_info_subcommand() {
        let cli = Cli::try_parse_from(["gpuremote", "info", "/tmp/gpu.sock", "--timeout", "3s"])
            .expect("info args should parse");
        assert!(matches!(cli.command, Command::Info(_)));
    }

    #[test]
    fn rejects_stream_zero_for_demo() {
        let err = Cli::try_parse_from(["gpuremote", "demo", "/tmp/gpu.sock", "--stream", "0"])
            .expect_err("the control stream is not a command stream");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
