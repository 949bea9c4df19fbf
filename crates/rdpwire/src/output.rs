use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// What a printed message was on the wire.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Reply,
    Event,
    Packet,
}

impl MessageKind {
    fn label(self) -> &'static str {
        match self {
            MessageKind::Reply => "reply",
            MessageKind::Event => "event",
            MessageKind::Packet => "packet",
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    size: usize,
    body: &'a Value,
    timestamp: String,
}

/// Print one decoded JSON message.
pub fn print_message(kind: MessageKind, body: &Value, format: OutputFormat) {
    println!("{}", render_message(kind, body, format));
}

fn render_message(kind: MessageKind, body: &Value, format: OutputFormat) -> String {
    let compact = body.to_string();
    let from = body.get("from").and_then(Value::as_str);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind,
                from,
                size: compact.len(),
                body,
                timestamp: now_unix_seconds(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "FROM", "SIZE", "BODY"])
                .add_row(vec![
                    kind.label().to_string(),
                    from.unwrap_or("-").to_string(),
                    compact.len().to_string(),
                    compact,
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "{} {}",
            kind.label(),
            serde_json::to_string_pretty(body).unwrap_or(compact)
        ),
        OutputFormat::Raw => compact,
    }
}

/// Print one framed payload that may not be valid JSON.
pub fn print_payload(payload: &[u8], format: OutputFormat) {
    match (format, serde_json::from_slice::<Value>(payload)) {
        (OutputFormat::Raw, _) => {
            print_raw(payload);
            print_raw(b"\n");
        }
        (_, Ok(body)) => print_message(MessageKind::Packet, &body, format),
        (_, Err(_)) => println!(
            "{}",
            render_message(
                MessageKind::Packet,
                &Value::String(payload_preview(payload)),
                format
            )
        ),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
