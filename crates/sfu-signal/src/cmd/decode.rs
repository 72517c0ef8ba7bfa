use std::fs::File;
use std::io::{self, BufReader, Read};

use serde_json::Value;
use sfu_signal_channel::message::{ChannelMessage, Inbound};
use sfu_signal_channel::parse_log_line;
use sfu_signal_frame::{FrameConfig, FrameReader};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frames, DecodedFrame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input: Box<dyn Read> = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let mut config = FrameConfig::default();
    if let Some(max) = args.max_payload {
        config.max_payload_size = max;
    }
    let mut reader = FrameReader::with_config(input, config);

    let mut frames = Vec::new();
    let failure = loop {
        match reader.read_frame() {
            Ok(Some(payload)) => frames.push(describe(frames.len(), &payload)),
            Ok(None) => break None,
            Err(err) => break Some(err),
        }
    };

    // Whatever decoded cleanly is still worth printing.
    print_frames(&frames, format);
    match failure {
        Some(err) => Err(frame_error(
            &format!("frame {} is invalid", frames.len()),
            err,
        )),
        None => Ok(SUCCESS),
    }
}

/// Classify one payload the way the channel read loop would.
pub fn describe(index: usize, payload: &[u8]) -> DecodedFrame {
    let (kind, summary, value) = if payload.first() == Some(&b'{') {
        describe_json(payload)
    } else if let Some((level, text)) = parse_log_line(payload) {
        let level = format!("{level:?}").to_lowercase();
        let summary = format!("{level}: {text}");
        ("log", summary, Value::String(text))
    } else {
        ("binary", format!("<{} bytes>", payload.len()), Value::Null)
    };

    DecodedFrame {
        index,
        size: payload.len(),
        kind,
        summary,
        raw: payload.to_vec(),
        payload: value,
    }
}

fn describe_json(payload: &[u8]) -> (&'static str, String, Value) {
    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(err) => return ("invalid", format!("bad JSON: {err}"), Value::Null),
    };

    // Requests flow towards the worker and carry a method.
    if let Some(method) = value.get("method").and_then(Value::as_str) {
        let id = value.get("id").and_then(Value::as_u64).unwrap_or_default();
        return ("request", format!("id={id} method={method}"), value);
    }

    let message: ChannelMessage = match serde_json::from_value(value.clone()) {
        Ok(message) => message,
        Err(err) => return ("invalid", format!("unexpected shape: {err}"), value),
    };
    let (kind, summary) = match message.classify() {
        Some(Inbound::Accepted { id, .. }) => ("response", format!("id={id} accepted")),
        Some(Inbound::Rejected { id, error, reason }) => {
            ("error", format!("id={id} {error}: {reason}"))
        }
        Some(Inbound::Notification {
            target_id, event, ..
        }) => ("notification", format!("target={target_id} event={event}")),
        Some(Inbound::WorkerNotification { event, .. }) => {
            ("notification", format!("event={event}"))
        }
        None => ("unknown", "unclassified message".to_string()),
    };
    (kind, summary, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_worker_traffic() {
        let request = describe(0, br#"{"id":3,"method":"router.close","internal":{"routerId":"r"}}"#);
        assert_eq!(request.kind, "request");
        assert_eq!(request.summary, "id=3 method=router.close");

        let accepted = describe(1, br#"{"id":3,"accepted":true,"data":{}}"#);
        assert_eq!(accepted.kind, "response");

        let rejected = describe(2, br#"{"id":4,"error":"Error","reason":"boom"}"#);
        assert_eq!(rejected.kind, "error");
        assert_eq!(rejected.summary, "id=4 Error: boom");

        let score = describe(3, br#"{"targetId":"p1","event":"score","data":[]}"#);
        assert_eq!(score.kind, "notification");
        assert_eq!(score.summary, "target=p1 event=score");
    }

    #[test]
    fn classifies_logs_and_binary() {
        let log = describe(0, b"Wsomething odd");
        assert_eq!(log.kind, "log");
        assert_eq!(log.summary, "warn: something odd");

        let binary = describe(1, &[0x00, 0xff, 0x10]);
        assert_eq!(binary.kind, "binary");
        assert_eq!(binary.size, 3);

        let broken = describe(2, b"{not json");
        assert_eq!(broken.kind, "invalid");
    }
}
