mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "rdpwire", version, about = "Remote debugging protocol wire tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true, env = "RDPWIRE_FORMAT")]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        global = true,
        env = "RDPWIRE_LOG_FORMAT"
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "RDPWIRE_LOG_LEVEL"
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
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "rdpwire",
            "send",
            "localhost:6000",
            "--json",
            "{\"to\":\"root\",\"type\":\"listTabs\"}",
            "--wait",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "rdpwire",
            "send",
            "6000",
            "--json",
            "{\"x\":1}",
            "--file",
            "request.json",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn actor_shorthand_requires_type() {
        let err = Cli::try_parse_from(["rdpwire", "send", "6000", "--to", "root"])
            .expect_err("--to without --type should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_echo_with_event() {
        let cli = Cli::try_parse_from([
            "rdpwire",
            "echo",
            "/tmp/echo.sock",
            "--greeting",
            "--event",
            "{\"type\":\"tick\"}",
        ])
        .expect("echo args should parse");
        assert!(matches!(cli.command, Command::Echo(_)));
    }

    #[test]
    fn parses_codec_subcommands() {
        let cli = Cli::try_parse_from(["rdpwire", "--format", "raw", "decode"])
            .expect("decode should parse");
        assert!(matches!(cli.command, Command::Decode(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Raw)));

        let cli = Cli::try_parse_from(["rdpwire", "encode"]).expect("encode should parse");
        assert!(matches!(cli.command, Command::Encode(_)));
    }
}
