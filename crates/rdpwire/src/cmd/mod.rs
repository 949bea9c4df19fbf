use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use rdpwire_peer::{NotificationKind, Protocol, ProtocolConfig};
use rdpwire_transport::Endpoint;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod codec;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request to a debugging server.
    Send(SendArgs),
    /// Connect and print unsolicited events.
    Listen(ListenArgs),
    /// Run a mock debugging server that echoes every packet.
    Echo(EchoArgs),
    /// Frame a stream of JSON values read from stdin.
    Encode(EncodeArgs),
    /// Print the payloads of framed packets read from stdin.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Encode(args) => codec::encode(args),
        Command::Decode(args) => codec::decode(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server endpoint: `host:port`, a port, or a socket path.
    #[arg(env = "RDPWIRE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Request as JSON text.
    #[arg(long, conflicts_with_all = ["file", "to"])]
    pub json: Option<String>,
    /// Read the request from a JSON file.
    #[arg(long, conflicts_with_all = ["json", "to"])]
    pub file: Option<PathBuf>,
    /// Actor to address (`{"to": ACTOR, "type": TYPE}` shorthand).
    #[arg(long, requires = "kind")]
    pub to: Option<String>,
    /// Request type for `--to`.
    #[arg(long = "type", id = "kind", requires = "to")]
    pub kind: Option<String>,
    /// Wait for the reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// The server sends a greeting on connect; absorb it.
    #[arg(long, env = "RDPWIRE_GREETING")]
    pub greeting: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Server endpoint: `host:port`, a port, or a socket path.
    #[arg(env = "RDPWIRE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// The server sends a greeting on connect; absorb it.
    #[arg(long, env = "RDPWIRE_GREETING")]
    pub greeting: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind.
    #[arg(env = "RDPWIRE_ENDPOINT")]
    pub endpoint: Endpoint,
    /// Greet every client as a root actor before echoing.
    #[arg(long)]
    pub greeting: bool,
    /// Unsolicited event (JSON) sent to every client after the greeting.
    #[arg(long, value_name = "JSON")]
    pub event: Option<String>,
    /// Application type announced in the greeting.
    #[arg(long, default_value = "rdpwire-echo")]
    pub application_type: String,
}

#[derive(Args, Debug, Default)]
pub struct EncodeArgs {}

#[derive(Args, Debug, Default)]
pub struct DecodeArgs {
    /// Fail on the first malformed header instead of skipping past it.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A protocol that logs every fault it reports.
pub(crate) fn logging_protocol(greeting: bool) -> Protocol {
    let mut config = ProtocolConfig::default();
    config.expect_greeting = greeting;
    let protocol = Protocol::with_config(config);
    protocol.on(NotificationKind::Error, |note| {
        match note.as_fault() {
            Some(fault) if fault.is_inbound_data() => {
                tracing::warn!(error = %fault, "peer sent malformed data")
            }
            Some(fault) => tracing::error!(error = %fault, "protocol stream error"),
            None => {}
        }
    });
    protocol
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
