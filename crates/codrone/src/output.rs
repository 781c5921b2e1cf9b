use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use codrone_frame::{Received, SyncStats};
use codrone_link::Message;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

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

/// One received frame, flattened for printing.
#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub kind: String,
    pub tag: String,
    pub from: String,
    pub to: String,
    pub length: usize,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub timestamp: String,
    #[serde(skip)]
    raw: Vec<u8>,
}

impl FrameRecord {
    pub fn from_received(received: &Received) -> Self {
        match received {
            Received::Frame(frame) => Self {
                kind: frame.kind().name().to_string(),
                tag: format!("0x{:02X}", frame.kind().as_u8()),
                from: frame.header.from.name().to_string(),
                to: frame.header.to.name().to_string(),
                length: frame.payload.len(),
                payload: hex(&frame.payload),
                message: Some(Message::from_frame(frame)),
                timestamp: now_unix_seconds(),
                raw: frame.payload.to_vec(),
            },
            Received::Unrecognized { tag, payload } => Self {
                kind: "unknown".to_string(),
                tag: format!("0x{tag:02X}"),
                from: "-".to_string(),
                to: "-".to_string(),
                length: payload.len(),
                payload: hex(payload),
                message: None,
                timestamp: now_unix_seconds(),
                raw: payload.to_vec(),
            },
        }
    }

    fn summary(&self) -> String {
        match &self.message {
            Some(Message::Opaque { .. }) | None => self.payload.clone(),
            Some(message) => serde_json::to_string(message).unwrap_or_else(|_| self.payload.clone()),
        }
    }
}

pub fn print_frame(record: &FrameRecord, format: OutputFormat) {
    print_frames(std::slice::from_ref(record), format);
}

pub fn print_frames(records: &[FrameRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            if records.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TAG", "FROM", "TO", "LEN", "DATA"]);
            for record in records {
                table.add_row(vec![
                    record.kind.clone(),
                    record.tag.clone(),
                    record.from.clone(),
                    record.to.clone(),
                    record.length.to_string(),
                    record.summary(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!(
                    "{} ({}) {} -> {} len={} {}",
                    record.kind,
                    record.tag,
                    record.from,
                    record.to,
                    record.length,
                    record.summary()
                );
            }
        }
        OutputFormat::Raw => {
            for record in records {
                print_raw(&record.raw);
            }
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    #[serde(flatten)]
    stats: &'a SyncStats,
    discarded: u64,
}

pub fn print_stats(stats: &SyncStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                stats,
                discarded: stats.discarded(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["FRAMES", "UNKNOWN KIND", "CHECKSUM", "OVERSIZED", "MALFORMED", "TIMEOUTS", "SKIPPED BYTES"])
                .add_row(vec![
                    stats.frames.to_string(),
                    stats.unrecognized.to_string(),
                    stats.checksum_errors.to_string(),
                    stats.oversized.to_string(),
                    stats.malformed.to_string(),
                    stats.timeouts.to_string(),
                    stats.skipped_bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "frames={} unknown_kind={} checksum_errors={} oversized={} malformed={} timeouts={} skipped_bytes={}",
                stats.frames,
                stats.unrecognized,
                stats.checksum_errors,
                stats.oversized,
                stats.malformed,
                stats.timeouts,
                stats.skipped_bytes
            );
        }
        // Raw output carries only frame bytes.
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    kind: &'a str,
    from: &'a str,
    to: &'a str,
    length: usize,
    bytes: String,
}

pub fn print_encoded(kind: &str, from: &str, to: &str, length: usize, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                kind,
                from,
                to,
                length,
                bytes: hex(wire),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "FROM", "TO", "LEN", "BYTES"])
                .add_row(vec![
                    kind.to_string(),
                    from.to_string(),
                    to.to_string(),
                    length.to_string(),
                    spaced_hex(wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", spaced_hex(wire)),
        OutputFormat::Raw => print_raw(wire),
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    kind: &'a str,
    to: &'a str,
    length: usize,
    confirmed: bool,
}

pub fn print_sent(kind: &str, to: &str, length: usize, confirmed: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                kind,
                to,
                length,
                confirmed,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["KIND", "TO", "LEN", "CONFIRMED"])
                .add_row(vec![
                    kind.to_string(),
                    to.to_string(),
                    length.to_string(),
                    confirmed.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let status = if confirmed { "acknowledged" } else { "sent" };
            println!("{kind} -> {to} len={length} {status}");
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn spaced_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
