mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "codrone", version, about = "CoDrone EDU link tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "CODRONE_LOG",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use codrone_link::{DeviceType, MessageKind};

    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "codrone",
            "send",
            "tcp://127.0.0.1:2000",
            "--kind",
            "command",
            "--hex",
            "0100",
            "--confirm",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.frame.kind, MessageKind::Command);
        assert_eq!(args.frame.to, DeviceType::Drone);
        assert!(args.confirm);
        assert_eq!(args.retries, 3);
    }

    #[test]
    fn rejects_conflicting_decode_inputs() {
        let err = Cli::try_parse_from([
            "codrone", "decode", "--hex", "0a55", "--file", "capture.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn decode_requires_input() {
        let err = Cli::try_parse_from(["codrone", "decode"]).expect_err("input is required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_monitor_kind_filter() {
        let cli = Cli::try_parse_from([
            "codrone",
            "--format",
            "pretty",
            "monitor",
            "/tmp/drone.sock",
            "--kinds",
            "state,0x41",
            "--count",
            "2",
        ])
        .expect("monitor args should parse");

        let Command::Monitor(args) = cli.command else {
            panic!("expected monitor");
        };
        assert_eq!(
            args.kinds,
            Some(vec![MessageKind::State, MessageKind::Attitude])
        );
        assert_eq!(args.count, Some(2));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = Cli::try_parse_from(["codrone", "encode", "--kind", "teleport"])
            .expect_err("unknown kind should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
