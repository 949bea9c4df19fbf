use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use rdpwire_peer::{ActorRequest, NotificationKind, ProtocolFault};
use serde_json::Value;

use crate::cmd::{logging_protocol, parse_duration, SendArgs};
use crate::exit::{
    peer_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_message, MessageKind, OutputFormat};

/// What ends a `send --wait`.
#[derive(Debug)]
enum Outcome {
    Reply(Value),
    Invalid(String),
    Closed,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let request = resolve_request(&args)?;

    let protocol = logging_protocol(args.greeting);
    let (tx, rx) = mpsc::channel();
    if args.wait {
        let invalid = tx.clone();
        protocol.on(NotificationKind::Error, move |note| {
            if let Some(fault @ ProtocolFault::InvalidContent { .. }) = note.as_fault() {
                let _ = invalid.send(Outcome::Invalid(fault.to_string()));
            }
        });
        let closed = tx.clone();
        protocol.on(NotificationKind::Close, move |_| {
            let _ = closed.send(Outcome::Closed);
        });
    }

    let connection = protocol
        .connect(&args.endpoint)
        .map_err(|err| peer_error("connect failed", err))?;

    if !args.wait {
        protocol
            .send_request(&request)
            .map_err(|err| peer_error("send failed", err))?;
        connection
            .close()
            .map_err(|err| peer_error("close failed", err))?;
        return Ok(SUCCESS);
    }

    protocol
        .send_request_with(&request, move |reply: Value| {
            let _ = tx.send(Outcome::Reply(reply));
        })
        .map_err(|err| peer_error("send failed", err))?;

    let outcome = wait_for_reply(&rx, wait_timeout, &args.wait_timeout).map(|reply| {
        print_message(MessageKind::Reply, &reply, format);
        SUCCESS
    });

    if let Err(err) = connection.close() {
        tracing::warn!(error = %err, "close failed");
    }
    outcome
}

fn wait_for_reply(
    rx: &mpsc::Receiver<Outcome>,
    timeout: Duration,
    timeout_label: &str,
) -> CliResult<Value> {
    match rx.recv_timeout(timeout) {
        Ok(Outcome::Reply(reply)) => Ok(reply),
        Ok(Outcome::Invalid(fault)) => Err(CliError::new(
            DATA_INVALID,
            format!("reply was not valid JSON: {fault}"),
        )),
        Ok(Outcome::Closed) | Err(mpsc::RecvTimeoutError::Disconnected) => Err(CliError::new(
            FAILURE,
            "connection closed before reply",
        )),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {timeout_label}"),
        )),
    }
}

fn resolve_request(args: &SendArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        return serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
    }
    if let Some(path) = &args.file {
        let text = fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return serde_json::from_slice(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("{} is not valid JSON: {err}", path.display()),
            )
        });
    }
    if let (Some(to), Some(kind)) = (&args.to, &args.kind) {
        return serde_json::to_value(ActorRequest::new(to, kind))
            .map_err(|err| CliError::new(crate::exit::INTERNAL, err.to_string()));
    }
    Err(CliError::new(
        USAGE,
        "a request is required: --json, --file, or --to with --type",
    ))
}
