use std::io::{self, ErrorKind, Read, Write};

use rdpwire_frame::{PacketDecoder, PacketWriter};
use rdpwire_peer::json::encode_request;
use serde_json::Value;

use crate::cmd::{DecodeArgs, EncodeArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_payload, OutputFormat};

const READ_CHUNK_SIZE: usize = 8 * 1024;

pub fn encode(_args: EncodeArgs) -> CliResult<i32> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let written = encode_stream(stdin.lock(), stdout.lock())?;
    tracing::debug!(packets = written, "encoded");
    Ok(SUCCESS)
}

pub fn decode(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let stdin = io::stdin();
    decode_stream(stdin.lock(), args.strict, |payload| print_payload(payload, format))?;
    Ok(SUCCESS)
}

/// Frame every JSON value in `input`, whitespace separated, onto `output`.
fn encode_stream<R: Read, W: Write>(input: R, output: W) -> CliResult<usize> {
    let mut writer = PacketWriter::new(output);
    let mut written = 0usize;
    for value in serde_json::Deserializer::from_reader(input).into_iter::<Value>() {
        let value = value
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid JSON input: {err}")))?;
        let payload = encode_request(&value)
            .map_err(|err| CliError::new(DATA_INVALID, err.to_string()))?;
        writer
            .send(&payload)
            .map_err(|err| frame_error("write failed", err))?;
        written += 1;
    }
    Ok(written)
}

/// Hand every payload framed in `input` to `on_payload`.
///
/// Malformed headers are skipped with a warning unless `strict` is set.
/// Input that ends inside a packet is an error.
fn decode_stream<R, F>(mut input: R, strict: bool, mut on_payload: F) -> CliResult<usize>
where
    R: Read,
    F: FnMut(&[u8]),
{
    let mut decoder = PacketDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut decoded = 0usize;

    loop {
        let read = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read failed", err)),
        };
        decoder.extend(&chunk[..read]);

        loop {
            match decoder.next_packet() {
                Ok(Some(payload)) => {
                    on_payload(&payload);
                    decoded += 1;
                }
                Ok(None) => break,
                Err(err) if strict => return Err(frame_error("decode failed", err)),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed header");
                    decoder.skip_malformed_header();
                }
            }
        }
    }

    if decoder.buffered() > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "input ends inside a packet ({} bytes left over)",
                decoder.buffered()
            ),
        ));
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn decode_all(wire: &[u8], strict: bool) -> CliResult<Vec<Vec<u8>>> {
        let mut payloads = Vec::new();
        decode_stream(Cursor::new(wire.to_vec()), strict, |p| payloads.push(p.to_vec()))?;
        Ok(payloads)
    }

    #[test]
    fn encode_frames_each_value() {
        let mut out = Vec::new();
        let count = encode_stream(Cursor::new(" {\"a\": 1}\n[2]  \"ü\" "), &mut out).unwrap();
        assert_eq!(count, 3);
        assert_eq!(out, "7:{\"a\":1}3:[2]4:\"ü\"".as_bytes());
    }

    #[test]
    fn encode_rejects_invalid_json() {
        let err = encode_stream(Cursor::new("[1] {oops"), Vec::new()).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn decode_yields_payloads_in_order() {
        let payloads = decode_all(b"2:{}0:4:true", false).unwrap();
        assert_eq!(payloads, vec![b"{}".to_vec(), Vec::new(), b"true".to_vec()]);
    }

    #[test]
    fn decode_skips_bad_header_unless_strict() {
        let payloads = decode_all(b"zz:2:[]", false).unwrap();
        assert_eq!(payloads, vec![b"[]".to_vec()]);

        let err = decode_all(b"zz:2:[]", true).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let err = decode_all(b"2:{}10:{\"a\"", false).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("7 bytes left over"));
    }
}
