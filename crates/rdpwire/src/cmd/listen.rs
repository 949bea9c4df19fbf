use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use rdpwire_peer::{Notification, NotificationKind};
use serde_json::Value;

use crate::cmd::{logging_protocol, ListenArgs};
use crate::exit::{peer_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_message, MessageKind, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

enum Incoming {
    Event(Value),
    Closed,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let protocol = logging_protocol(args.greeting);

    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    protocol.on(NotificationKind::Event, move |note| {
        if let Notification::Event(body) = note {
            let _ = events.send(Incoming::Event(body.clone()));
        }
    });
    protocol.on(NotificationKind::Close, move |_| {
        let _ = tx.send(Incoming::Closed);
    });

    let connection = protocol
        .connect(&args.endpoint)
        .map_err(|err| peer_error("connect failed", err))?;
    tracing::info!(endpoint = %args.endpoint, "listening for events");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Incoming::Event(body)) => {
                print_message(MessageKind::Event, &body, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Ok(Incoming::Closed) => {
                connection
                    .wait_closed()
                    .map_err(|err| peer_error("connection failed", err))?;
                return match args.count {
                    Some(count) if printed < count => Err(CliError::new(
                        FAILURE,
                        format!("connection closed after {printed} of {count} events"),
                    )),
                    _ => Ok(SUCCESS),
                };
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = connection.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
