use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use groundlink_link::LogEntry;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// The link's log line format: `NAME(MAGIC)::TIMESTAMP::JSON`.
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

#[derive(Serialize)]
struct EntryOutput<'a> {
    message: &'a str,
    magic: u8,
    timestamp: String,
    payload: &'a Value,
}

impl<'a> From<&'a LogEntry> for EntryOutput<'a> {
    fn from(entry: &'a LogEntry) -> Self {
        Self {
            message: &entry.message_name,
            magic: entry.magic_number,
            timestamp: entry.timestamp_iso(),
            payload: &entry.payload,
        }
    }
}

/// Print a batch of log entries. Tables group the batch; other formats
/// print one line per entry.
pub fn print_entries(entries: &[LogEntry], format: OutputFormat) {
    if entries.is_empty() {
        return;
    }
    match format {
        OutputFormat::Json => {
            for entry in entries {
                println!("{}", to_json(&EntryOutput::from(entry)));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "MAGIC", "TIME", "PAYLOAD"]);
            for entry in entries {
                table.add_row(vec![
                    entry.message_name.clone(),
                    entry.magic_number.to_string(),
                    entry.timestamp_iso(),
                    entry.payload.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in entries {
                println!(
                    "{} {:<24} {}",
                    entry.timestamp_iso(),
                    entry.message_name,
                    entry.payload
                );
            }
        }
        OutputFormat::Raw => {
            for entry in entries {
                println!("{entry}");
            }
        }
    }
}

/// One parameter as reported by PARAM_VALUE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRow {
    pub id: String,
    pub value: f64,
    pub param_type: String,
    pub index: u64,
}

impl ParamRow {
    /// Extract a parameter from a PARAM_VALUE entry.
    pub fn from_entry(entry: &LogEntry) -> Option<Self> {
        if entry.message_name != "PARAM_VALUE" {
            return None;
        }
        let payload = &entry.payload;
        Some(Self {
            id: payload.get("param_id")?.as_str()?.to_string(),
            value: payload.get("param_value")?.as_f64()?,
            param_type: match payload.get("param_type") {
                Some(Value::String(name)) => name.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            },
            index: payload.get("param_index").and_then(Value::as_u64).unwrap_or(0),
        })
    }
}

pub fn print_params(rows: &[ParamRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(&rows)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PARAM", "VALUE", "TYPE"]);
            for row in rows {
                table.add_row(vec![
                    row.id.clone(),
                    row.value.to_string(),
                    row.param_type.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in rows {
                println!("{:<16} {}", row.id, row.value);
            }
        }
    }
}

/// Summary printed after a dispatch command.
#[derive(Debug, Serialize)]
pub struct DispatchOutput {
    pub action: &'static str,
    pub target: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn print_dispatch(out: &DispatchOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ACTION", "TARGET", "LINK", "DETAIL"])
                .add_row(vec![
                    out.action.to_string(),
                    out.target.clone(),
                    out.link.clone(),
                    out.detail.clone().unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => match &out.detail {
            Some(detail) => println!("{} {} via {} ({detail})", out.action, out.target, out.link),
            None => println!("{} {} via {}", out.action, out.target, out.link),
        },
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn param_entry(id: &str, value: f64) -> LogEntry {
        LogEntry {
            message_name: "PARAM_VALUE".to_string(),
            magic_number: 220,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            payload: json!({
                "param_id": id,
                "param_value": value,
                "param_type": "MAV_PARAM_TYPE_REAL32",
                "param_count": 2,
                "param_index": 1
            }),
        }
    }

    #[test]
    fn param_row_from_param_value() {
        let row = ParamRow::from_entry(&param_entry("ROLL_LIMIT", 45.0)).unwrap();
        assert_eq!(row.id, "ROLL_LIMIT");
        assert_eq!(row.value, 45.0);
        assert_eq!(row.param_type, "MAV_PARAM_TYPE_REAL32");
        assert_eq!(row.index, 1);
    }

    #[test]
    fn non_param_entries_are_skipped() {
        let mut entry = param_entry("ROLL_LIMIT", 45.0);
        entry.message_name = "HEARTBEAT".to_string();
        assert!(ParamRow::from_entry(&entry).is_none());
    }

    #[test]
    fn entry_json_shape() {
        let entry = param_entry("ROLL_LIMIT", 45.0);
        let json = to_json(&EntryOutput::from(&entry));
        assert!(json.starts_with("{\"message\":\"PARAM_VALUE\",\"magic\":220"));
        assert!(json.contains("\"timestamp\":\"2024-05-01T12:00:00.000Z\""));
    }

    #[test]
    fn dispatch_json_omits_missing_detail() {
        let out = DispatchOutput {
            action: "clear-mission",
            target: "1/1".to_string(),
            link: "tcp:sitl:5760".to_string(),
            detail: None,
        };
        assert!(!to_json(&out).contains("detail"));
    }
}
