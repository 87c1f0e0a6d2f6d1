//! Inbound packet → log entry conversion.

use chrono::{DateTime, Utc};
use groundlink_frame::{DialectMessage, RawPacket, Registry};
use mavlink::ardupilotmega::MavCmd;
use serde_json::{Map, Number, Value};
use tracing::{debug, info, warn};

use crate::log_buffer::LogEntry;

/// Largest integer an IEEE-754 double represents exactly.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Decode a packet into a log entry stamped with `received`.
///
/// Returns `None` for unregistered message ids, which are expected traffic,
/// and for registered ids whose payload does not decode.
pub fn decode_entry(packet: &RawPacket, received: DateTime<Utc>) -> Option<LogEntry> {
    let (class, message) = match Registry::decode(packet) {
        Ok(Some(decoded)) => decoded,
        Ok(None) => {
            debug!(id = packet.message_id, "dropping unregistered message");
            return None;
        }
        Err(err) => {
            warn!(id = packet.message_id, error = %err, "dropping undecodable message");
            return None;
        }
    };

    let payload = match serde_json::to_value(&message) {
        Ok(value) => sanitize(unwrap_message(value, class.name), class.name),
        Err(err) => {
            warn!(message = class.name, error = %err, "payload serialization failed");
            return None;
        }
    };

    let entry = LogEntry {
        message_name: class.name.to_string(),
        magic_number: class.magic,
        timestamp: received,
        payload,
    };

    if should_surface(&entry, &message) {
        info!(target: "groundlink::ack", "{entry}");
    }
    Some(entry)
}

/// Acknowledgements are echoed at info level, except the acks that answer
/// our own periodic status requests.
fn should_surface(entry: &LogEntry, message: &DialectMessage) -> bool {
    if !entry.is_ack() {
        return false;
    }
    match message {
        DialectMessage::COMMAND_ACK(ack) => ack.command != MavCmd::MAV_CMD_REQUEST_MESSAGE,
        _ => true,
    }
}

/// Strip the enum tag the dialect serializer adds around each message.
fn unwrap_message(value: Value, name: &str) -> Value {
    match value {
        Value::Object(mut fields) => {
            if fields.len() == 1 {
                if let Some(inner) = fields.remove(name) {
                    return inner;
                }
            }
            if fields.get("type").and_then(Value::as_str) == Some(name) {
                fields.remove("type");
            }
            Value::Object(fields)
        }
        other => other,
    }
}

/// Normalize a decoded payload for JSON consumers.
///
/// Enum values collapse to their symbolic name, bitflag sets to their raw
/// bits, fixed-width `param_id` fields to a string, and 64-bit integers
/// beyond double precision are widened to floats.
fn sanitize(value: Value, message: &str) -> Value {
    match value {
        Value::Object(fields) => {
            if let Some(collapsed) = collapse_wrapper(&fields) {
                return collapsed;
            }
            let fields = fields
                .into_iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("param_id", Value::Array(bytes)) => fixed_string(&bytes)
                            .map(Value::String)
                            .unwrap_or_else(|| sanitize(Value::Array(bytes), message)),
                        (_, value) => sanitize(value, message),
                    };
                    (key, value)
                })
                .collect();
            Value::Object(fields)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize(item, message))
                .collect(),
        ),
        Value::Number(number) => Value::Number(widen(number, message)),
        other => other,
    }
}

fn collapse_wrapper(fields: &Map<String, Value>) -> Option<Value> {
    if fields.len() != 1 {
        return None;
    }
    match fields.iter().next() {
        Some((key, Value::String(name))) if key == "type" => Some(Value::String(name.clone())),
        Some((key, Value::Number(bits))) if key == "bits" => Some(Value::Number(bits.clone())),
        _ => None,
    }
}

fn fixed_string(bytes: &[Value]) -> Option<String> {
    let raw = bytes
        .iter()
        .map(|byte| byte.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect::<Option<Vec<u8>>>()?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn widen(number: Number, message: &str) -> Number {
    let out_of_range = match (number.as_u64(), number.as_i64()) {
        (Some(unsigned), _) => unsigned > MAX_SAFE_INTEGER,
        (None, Some(signed)) => signed.unsigned_abs() > MAX_SAFE_INTEGER,
        _ => false,
    };
    if !out_of_range {
        return number;
    }
    match number.as_f64().and_then(Number::from_f64) {
        Some(widened) => {
            debug!(message, original = %number, "integer exceeds double precision");
            widened
        }
        None => number,
    }
}
