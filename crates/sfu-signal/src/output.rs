use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use sfu_signal_rtp::{CodecCapability, RtpCapabilities};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
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

/// One netstring payload read back from a capture.
#[derive(Debug, Serialize)]
pub struct DecodedFrame {
    pub index: usize,
    pub size: usize,
    pub kind: &'static str,
    pub summary: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub payload: Value,
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

pub fn print_frames(frames: &[DecodedFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => frames.iter().for_each(print_json),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "KIND", "SIZE", "SUMMARY"]);
            for frame in frames {
                table.add_row(vec![
                    frame.index.to_string(),
                    frame.kind.to_string(),
                    frame.size.to_string(),
                    frame.summary.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                println!(
                    "#{} {} size={} {}",
                    frame.index, frame.kind, frame.size, frame.summary
                );
            }
        }
        OutputFormat::Raw => frames.iter().for_each(|frame| print_raw(&frame.raw)),
    }
}

pub fn print_capabilities(caps: &RtpCapabilities, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(caps),
        OutputFormat::Raw => println!(
            "{}",
            serde_json::to_string_pretty(caps).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut codecs = Table::new();
            codecs
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "MIME TYPE", "PT", "CLOCK", "CHANNELS", "PARAMETERS"]);
            for codec in &caps.codecs {
                codecs.add_row(codec_row(codec));
            }
            println!("{codecs}");

            let mut extensions = Table::new();
            extensions
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "URI", "ID", "DIRECTION"]);
            for ext in &caps.header_extensions {
                extensions.add_row(vec![
                    ext.kind.to_string(),
                    ext.uri.clone(),
                    ext.preferred_id.to_string(),
                    direction_name(&ext.direction),
                ]);
            }
            println!("{extensions}");
        }
        OutputFormat::Pretty => {
            println!("Codecs:");
            for codec in &caps.codecs {
                let row = codec_row(codec);
                println!("  {:<6} {:<20} pt={:<4} {}", row[0], row[1], row[2], row[5]);
            }
            println!("Header extensions:");
            for ext in &caps.header_extensions {
                println!("  {:<6} id={:<3} {}", ext.kind, ext.preferred_id, ext.uri);
            }
        }
    }
}

fn codec_row(codec: &CodecCapability) -> Vec<String> {
    let (mime_type, clock_rate, channels, parameters) = match codec {
        CodecCapability::Media(c) => (&c.mime_type, c.clock_rate, c.channels, &c.parameters),
        CodecCapability::Rtx(c) => (&c.mime_type, c.clock_rate, None, &c.parameters),
    };
    vec![
        codec.kind().to_string(),
        mime_type.clone(),
        codec
            .preferred_payload_type()
            .map_or_else(|| "-".to_string(), |pt| pt.to_string()),
        clock_rate.to_string(),
        channels.map_or_else(|| "-".to_string(), |n| n.to_string()),
        serde_json::to_string(parameters).unwrap_or_default(),
    ]
}

fn direction_name<T: Serialize>(direction: &T) -> String {
    serde_json::to_value(direction)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
