use rdpwire_frame::{FrameConfig, FrameError, PacketReader, PacketWriter};
use rdpwire_peer::Greeting;
use rdpwire_transport::{Listener, RemoteStream};
use serde_json::Value;

use crate::cmd::EchoArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, USAGE};

/// What the mock server sends before echoing.
struct Preamble {
    greeting: Option<Vec<u8>>,
    event: Option<Vec<u8>>,
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let preamble = preamble(&args)?;
    let listener =
        Listener::bind(&args.endpoint).map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(endpoint = %listener.local_endpoint(), "echo server listening");

    loop {
        let stream = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        tracing::debug!(transport = stream.transport_name(), "client connected");

        match serve(stream, &preamble) {
            Ok(echoed) => tracing::debug!(echoed, "client disconnected"),
            Err(err) => tracing::warn!(error = %err, "dropping client"),
        }
    }
}

fn preamble(args: &EchoArgs) -> CliResult<Preamble> {
    let greeting = if args.greeting {
        let hello = Greeting::root(args.application_type.clone());
        Some(serde_json::to_vec(&hello).map_err(|err| CliError::new(USAGE, err.to_string()))?)
    } else {
        None
    };

    let event = match &args.event {
        Some(text) => {
            let body: Value = serde_json::from_str(text)
                .map_err(|err| CliError::new(USAGE, format!("--event is not valid JSON: {err}")))?;
            Some(body.to_string().into_bytes())
        }
        None => None,
    };

    Ok(Preamble { greeting, event })
}

/// Serve one client until it disconnects. Returns the number of packets
/// echoed.
fn serve(stream: RemoteStream, preamble: &Preamble) -> CliResult<usize> {
    let config = FrameConfig::default();
    let inbound = stream
        .try_clone()
        .map_err(|err| transport_error("clone failed", err))?;
    let mut reader = PacketReader::with_config_remote(inbound, config.clone())
        .map_err(|err| frame_error("read setup failed", err))?;
    let mut writer = PacketWriter::with_config_remote(stream, config)
        .map_err(|err| frame_error("write setup failed", err))?;

    for payload in [&preamble.greeting, &preamble.event].into_iter().flatten() {
        writer
            .send(payload)
            .map_err(|err| frame_error("preamble failed", err))?;
    }

    let mut echoed = 0usize;
    loop {
        let payload = match reader.read_packet() {
            Ok(payload) => payload,
            Err(FrameError::ConnectionClosed) if reader.is_at_boundary() => return Ok(echoed),
            Err(err) => return Err(frame_error("receive failed", err)),
        };
        tracing::info!(size = payload.len(), "echoing packet");
        writer
            .send(&payload)
            .map_err(|err| frame_error("echo failed", err))?;
        echoed += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::thread;

    use rdpwire_transport::Endpoint;

    use super::*;

    fn echo_args(greeting: bool, event: Option<&str>) -> EchoArgs {
        EchoArgs {
            endpoint: "127.0.0.1:0".parse().unwrap(),
            greeting,
            event: event.map(str::to_string),
            application_type: "test".to_string(),
        }
    }

    #[test]
    fn preamble_rejects_invalid_event() {
        let err = preamble(&echo_args(false, Some("{bad"))).err().unwrap();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn serve_sends_preamble_then_echoes() {
        let listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".to_string())).unwrap();
        let endpoint = listener.local_endpoint();
        let pre = preamble(&echo_args(true, Some(r#"{"type":"tick"}"#))).unwrap();

        let server = thread::spawn(move || {
            let stream = listener.accept().unwrap();
            serve(stream, &pre).unwrap()
        });

        let client = endpoint.connect().unwrap();
        let mut writer = PacketWriter::new(client.try_clone().unwrap());
        writer.send(b"[1]").unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        let mut wire = Vec::new();
        let mut reader = client;
        reader.read_to_end(&mut wire).unwrap();

        assert_eq!(server.join().unwrap(), 1);
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with(r#"52:{"from":"root","applicationType":"test","traits":{}}"#));
        assert!(text.ends_with(r#"15:{"type":"tick"}3:[1]"#));
    }
}
